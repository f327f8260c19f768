//! Highlight Synchronizer and the document host it decorates.
//!
//! The synchronizer owns at most one paragraph span and one word span. Offsets
//! arrive relative to the cleaned text frozen at session start and are mapped
//! back to the host document through [`CleanedText`]. Highlighting is best
//! effort: every host failure is reported and swallowed.

use crate::config::HighlightConfig;
use crate::error::{ReadAloudError, Result};
use crate::report::ErrorReporter;
use crate::text::{CleanedText, Paragraph, Word};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Zero-based line and column (in characters) of a document offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayPosition {
    pub line: usize,
    pub column: usize,
}

/// Opaque handle of a rendered highlight, issued by the host.
pub type HighlightHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    Paragraph,
    Word,
}

/// A highlight currently shown, in source-document character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    pub absolute_start: usize,
    pub absolute_end: usize,
    pub kind: HighlightKind,
    pub handle: HighlightHandle,
}

/// The editor or viewer showing the document.
pub trait DocumentHost {
    /// Full plain text of the document.
    fn text(&self) -> String;

    fn offset_to_position(&self, offset: usize) -> Result<DisplayPosition>;

    fn create_highlight(
        &mut self,
        from: DisplayPosition,
        to: DisplayPosition,
        style: &str,
    ) -> Result<HighlightHandle>;

    fn clear_highlight(&mut self, handle: HighlightHandle) -> Result<()>;
}

/// Position of a character offset in `text`. The end of the text is a
/// valid position; anything past it is out of range.
pub fn position_of(text: &str, offset: usize) -> Result<DisplayPosition> {
    let mut position = DisplayPosition { line: 0, column: 0 };
    let mut seen = 0usize;
    for ch in text.chars() {
        if seen == offset {
            return Ok(position);
        }
        if ch == '\n' {
            position.line += 1;
            position.column = 0;
        } else {
            position.column += 1;
        }
        seen += 1;
    }
    if seen == offset {
        Ok(position)
    } else {
        Err(ReadAloudError::OffsetOutOfRange {
            offset,
            length: seen,
        })
    }
}

/// Character offset of a position in `text`, the inverse of [`position_of`].
pub fn offset_of(text: &str, position: DisplayPosition) -> Option<usize> {
    let mut line = 0usize;
    let mut column = 0usize;
    for (offset, ch) in text.chars().enumerate() {
        if line == position.line && column == position.column {
            return Some(offset);
        }
        if ch == '\n' {
            if line == position.line {
                return None;
            }
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    (line == position.line && column == position.column).then(|| text.chars().count())
}

/// Owns the active highlight spans and drives the host.
pub struct Highlighter<H: DocumentHost> {
    host: H,
    config: HighlightConfig,
    paragraph: Option<HighlightSpan>,
    word: Option<HighlightSpan>,
    reporter: Arc<dyn ErrorReporter>,
}

impl<H: DocumentHost> Highlighter<H> {
    pub fn new(host: H, config: HighlightConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            host,
            config,
            paragraph: None,
            word: None,
            reporter,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Replace the highlight settings, e.g. with a session's snapshot.
    pub fn set_config(&mut self, config: HighlightConfig) {
        self.config = config;
    }

    pub fn set_reporter(&mut self, reporter: Arc<dyn ErrorReporter>) {
        self.reporter = reporter;
    }

    pub fn word_enabled(&self) -> bool {
        self.config.word
    }

    /// Spans currently shown, paragraph first.
    pub fn active(&self) -> Vec<HighlightSpan> {
        self.paragraph.iter().chain(self.word.iter()).copied().collect()
    }

    pub fn show_paragraph(&mut self, document: &CleanedText, paragraph: &Paragraph) {
        if !self.config.paragraph {
            return;
        }
        self.clear(HighlightKind::Paragraph);
        self.paragraph = self.create(
            document,
            paragraph.start_offset,
            paragraph.end_offset,
            HighlightKind::Paragraph,
        );
    }

    /// Show `word`, whose offsets are relative to `paragraph`.
    pub fn show_word(&mut self, document: &CleanedText, paragraph: &Paragraph, word: &Word) {
        if !self.config.word {
            return;
        }
        self.clear(HighlightKind::Word);
        let start = paragraph.start_offset + word.start;
        self.word = self.create(document, start, start + word.length, HighlightKind::Word);
    }

    pub fn clear_word(&mut self) {
        self.clear(HighlightKind::Word);
    }

    pub fn clear_all(&mut self) {
        self.clear(HighlightKind::Word);
        self.clear(HighlightKind::Paragraph);
    }

    fn clear(&mut self, kind: HighlightKind) {
        let slot = match kind {
            HighlightKind::Paragraph => &mut self.paragraph,
            HighlightKind::Word => &mut self.word,
        };
        if let Some(span) = slot.take()
            && let Err(e) = self.host.clear_highlight(span.handle)
        {
            self.reporter.report("highlight", &e);
        }
    }

    fn create(
        &mut self,
        document: &CleanedText,
        start: usize,
        end: usize,
        kind: HighlightKind,
    ) -> Option<HighlightSpan> {
        match self.try_create(document, start, end, kind) {
            Ok(span) => Some(span),
            Err(e) => {
                self.reporter.report("highlight", &e);
                None
            }
        }
    }

    fn try_create(
        &mut self,
        document: &CleanedText,
        start: usize,
        end: usize,
        kind: HighlightKind,
    ) -> Result<HighlightSpan> {
        if end > document.len() || start > end {
            return Err(ReadAloudError::OffsetOutOfRange {
                offset: end.max(start),
                length: document.len(),
            });
        }
        let (absolute_start, absolute_end) = document.to_source_range(start, end);
        let from = self.host.offset_to_position(absolute_start)?;
        let to = self.host.offset_to_position(absolute_end)?;
        let style = match kind {
            HighlightKind::Paragraph => &self.config.paragraph_style,
            HighlightKind::Word => &self.config.word_style,
        };
        let handle = self.host.create_highlight(from, to, style)?;
        Ok(HighlightSpan {
            absolute_start,
            absolute_end,
            kind,
            handle,
        })
    }
}

/// A highlight as recorded by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryHighlight {
    pub from: DisplayPosition,
    pub to: DisplayPosition,
    pub style: String,
}

#[derive(Debug, Default)]
struct MemoryHostState {
    text: String,
    next_handle: HighlightHandle,
    highlights: BTreeMap<HighlightHandle, MemoryHighlight>,
    created: usize,
    should_fail_create: bool,
}

/// In-memory document host for testing.
///
/// Clones share state, so a test keeps a handle while the controller owns
/// the host.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<MemoryHostState>>,
}

impl MemoryHost {
    pub fn new(text: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryHostState {
                text: text.to_string(),
                ..MemoryHostState::default()
            })),
        }
    }

    /// Configure the host to reject every highlight
    pub fn with_create_failure(self) -> Self {
        self.state().should_fail_create = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryHostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate an edit of the live document.
    pub fn set_text(&self, text: &str) {
        self.state().text = text.to_string();
    }

    /// Highlights currently shown, in creation order.
    pub fn highlights(&self) -> Vec<MemoryHighlight> {
        self.state().highlights.values().cloned().collect()
    }

    /// Number of highlights ever created.
    pub fn created_count(&self) -> usize {
        self.state().created
    }

    /// Text covered by the shown highlight with `style`.
    pub fn highlighted_text(&self, style: &str) -> Option<String> {
        let state = self.state();
        let highlight = state.highlights.values().find(|h| h.style == style)?;
        let from = offset_of(&state.text, highlight.from)?;
        let to = offset_of(&state.text, highlight.to)?;
        Some(state.text.chars().skip(from).take(to - from).collect())
    }
}

impl DocumentHost for MemoryHost {
    fn text(&self) -> String {
        self.state().text.clone()
    }

    fn offset_to_position(&self, offset: usize) -> Result<DisplayPosition> {
        position_of(&self.state().text, offset)
    }

    fn create_highlight(
        &mut self,
        from: DisplayPosition,
        to: DisplayPosition,
        style: &str,
    ) -> Result<HighlightHandle> {
        let mut state = self.state();
        if state.should_fail_create {
            return Err(ReadAloudError::Highlight {
                message: "mock host rejected the highlight".to_string(),
            });
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state.highlights.insert(
            handle,
            MemoryHighlight {
                from,
                to,
                style: style.to_string(),
            },
        );
        state.created += 1;
        Ok(handle)
    }

    fn clear_highlight(&mut self, handle: HighlightHandle) -> Result<()> {
        match self.state().highlights.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(ReadAloudError::Highlight {
                message: format!("unknown highlight handle {handle}"),
            }),
        }
    }
}
