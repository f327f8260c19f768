//! Terminal document host for the command line.
//!
//! Shows one line per paragraph: a window of the paragraph text around the
//! word being spoken, redrawn in place as the word highlight moves.

use crate::error::{ReadAloudError, Result};
use crate::playback::highlight::{
    DisplayPosition, DocumentHost, HighlightHandle, offset_of, position_of,
};
use crate::playback::{PlaybackState, PlayerEvent};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Characters of context shown around the current word.
const WINDOW: usize = 72;

#[derive(Debug, Clone)]
struct Span {
    from: usize,
    to: usize,
    style: String,
}

/// [`DocumentHost`] that renders highlights to a terminal.
pub struct TerminalHost<W: Write = io::Stdout> {
    text: String,
    chars: Vec<char>,
    spans: BTreeMap<HighlightHandle, Span>,
    next_handle: HighlightHandle,
    out: W,
    color: bool,
    paragraph_style: String,
    line_open: bool,
}

impl TerminalHost<io::Stdout> {
    pub fn stdout(text: &str, color: bool) -> Self {
        Self::with_writer(text, io::stdout(), color)
    }
}

impl<W: Write> TerminalHost<W> {
    pub fn with_writer(text: &str, out: W, color: bool) -> Self {
        Self {
            text: text.to_string(),
            chars: text.chars().collect(),
            spans: BTreeMap::new(),
            next_handle: 0,
            out,
            color,
            paragraph_style: crate::defaults::PARAGRAPH_STYLE.to_string(),
            line_open: false,
        }
    }

    /// Style name that marks paragraph spans; every other style is a word.
    pub fn with_paragraph_style(mut self, style: &str) -> Self {
        self.paragraph_style = style.to_string();
        self
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    /// End the current line, if one is being redrawn.
    pub fn finish_line(&mut self) -> Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.out.flush()?;
            self.line_open = false;
        }
        Ok(())
    }

    fn to_offset(&self, position: DisplayPosition) -> Result<usize> {
        offset_of(&self.text, position).ok_or_else(|| ReadAloudError::Highlight {
            message: format!(
                "position {}:{} is not in the document",
                position.line + 1,
                position.column + 1
            ),
        })
    }

    fn span_with(&self, paragraph: bool) -> Option<&Span> {
        self.spans
            .values()
            .rev()
            .find(|s| (s.style == self.paragraph_style) == paragraph)
    }

    /// Redraw the current line from the active spans.
    fn render(&mut self) -> Result<()> {
        let Some(paragraph) = self
            .span_with(true)
            .filter(|p| p.from <= p.to)
            .cloned()
        else {
            return Ok(());
        };
        // A word outside the paragraph is stale.
        let word = self
            .span_with(false)
            .filter(|w| paragraph.from <= w.from && w.from <= w.to && w.to <= paragraph.to)
            .cloned();

        let (start, end) = match &word {
            Some(w) => {
                let start = w.from.saturating_sub(WINDOW / 3).max(paragraph.from);
                (start, (start + WINDOW).min(paragraph.to))
            }
            None => (paragraph.from, (paragraph.from + WINDOW).min(paragraph.to)),
        };

        let mut line = String::new();
        if start > paragraph.from {
            line.push('…');
        }
        let flatten = |c: &char| if c.is_whitespace() { ' ' } else { *c };
        match word {
            Some(w) if w.from >= start && w.to <= end => {
                let before: String = self.chars[start..w.from].iter().map(flatten).collect();
                let current: String = self.chars[w.from..w.to].iter().map(flatten).collect();
                let after: String = self.chars[w.to..end].iter().map(flatten).collect();
                line.push_str(&before);
                if self.color {
                    line.push_str(&current.black().on_yellow().to_string());
                } else {
                    line.push('[');
                    line.push_str(&current);
                    line.push(']');
                }
                line.push_str(&after);
            }
            _ => line.extend(self.chars[start..end].iter().map(flatten)),
        }
        if end < paragraph.to {
            line.push('…');
        }

        write!(self.out, "\r\x1b[2K{line}")?;
        self.out.flush()?;
        self.line_open = true;
        Ok(())
    }
}

impl<W: Write> DocumentHost for TerminalHost<W> {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn offset_to_position(&self, offset: usize) -> Result<DisplayPosition> {
        position_of(&self.text, offset)
    }

    fn create_highlight(
        &mut self,
        from: DisplayPosition,
        to: DisplayPosition,
        style: &str,
    ) -> Result<HighlightHandle> {
        let from = self.to_offset(from)?;
        let to = self.to_offset(to)?;
        if style == self.paragraph_style {
            self.finish_line()?;
        }
        self.next_handle += 1;
        let handle = self.next_handle;
        self.spans.insert(
            handle,
            Span {
                from,
                to,
                style: style.to_string(),
            },
        );
        self.render()?;
        Ok(handle)
    }

    fn clear_highlight(&mut self, handle: HighlightHandle) -> Result<()> {
        self.spans
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| ReadAloudError::Highlight {
                message: format!("unknown highlight handle {handle}"),
            })
    }
}

/// Status line for a player event, or `None` for events not worth showing.
pub fn describe_event(event: &PlayerEvent, paragraphs: usize) -> Option<String> {
    match event {
        PlayerEvent::ParagraphStarted(index) => {
            Some(format!("paragraph {}/{}", index + 1, paragraphs.max(index + 1)))
        }
        PlayerEvent::StateChanged(PlaybackState::Paused) => Some("paused".to_string()),
        PlayerEvent::StateChanged(PlaybackState::Error) => Some("stopped after an error".to_string()),
        PlayerEvent::Finished => Some("finished".to_string()),
        PlayerEvent::Stopped => Some("stopped".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HighlightConfig;
    use crate::playback::Highlighter;
    use crate::report::CollectingReporter;
    use crate::text::{clean_document, segment_paragraphs, segment_words};
    use std::sync::Arc;

    fn output(host: &TerminalHost<Vec<u8>>) -> String {
        String::from_utf8_lossy(host.writer()).to_string()
    }

    #[test]
    fn test_word_is_marked_without_color() {
        let text = "Hello brave world";
        let host = TerminalHost::with_writer(text, Vec::new(), false);
        let mut highlighter = Highlighter::new(
            host,
            HighlightConfig::default(),
            Arc::new(CollectingReporter::new()),
        );
        let document = clean_document(text);
        let paragraph = &segment_paragraphs(document.text())[0];
        let words = segment_words(&paragraph.text);

        highlighter.show_paragraph(&document, paragraph);
        highlighter.show_word(&document, paragraph, &words[1]);

        let out = output(highlighter.host());
        assert!(out.ends_with("\r\x1b[2KHello [brave] world"), "got {out:?}");
    }

    #[test]
    fn test_new_paragraph_starts_new_line() {
        let text = "One.\n\nTwo.";
        let host = TerminalHost::with_writer(text, Vec::new(), false);
        let mut highlighter = Highlighter::new(
            host,
            HighlightConfig::default(),
            Arc::new(CollectingReporter::new()),
        );
        let document = clean_document(text);
        let paragraphs = segment_paragraphs(document.text());

        highlighter.show_paragraph(&document, &paragraphs[0]);
        highlighter.show_paragraph(&document, &paragraphs[1]);

        assert_eq!(output(highlighter.host()), "\r\x1b[2KOne.\n\r\x1b[2KTwo.");
    }

    #[test]
    fn test_long_paragraph_is_windowed() {
        let text = format!("{} target {}", "a ".repeat(100), "b ".repeat(100));
        let mut host = TerminalHost::with_writer(&text, Vec::new(), false);
        let chars = text.chars().count();
        let paragraph_from = position_of(&text, 0).unwrap();
        let paragraph_to = position_of(&text, chars).unwrap();
        host.create_highlight(paragraph_from, paragraph_to, "paragraph")
            .unwrap();

        let start = text.find("target").unwrap();
        let from = position_of(&text, start).unwrap();
        let to = position_of(&text, start + 6).unwrap();
        host.create_highlight(from, to, "word").unwrap();

        let out = output(&host);
        let last_line = out.rsplit("\r\x1b[2K").next().unwrap();
        assert!(last_line.starts_with('…'));
        assert!(last_line.ends_with('…'));
        assert!(last_line.contains("[target]"));
    }

    #[test]
    fn test_word_outside_paragraph_is_ignored() {
        let text = format!("One two.\n\n{}five six.", "x ".repeat(30));
        let mut host = TerminalHost::with_writer(&text, Vec::new(), false);
        let from = position_of(&text, 0).unwrap();
        let to = position_of(&text, 8).unwrap();
        host.create_highlight(from, to, "paragraph").unwrap();

        // Far enough past the paragraph that its window would start beyond it.
        let start = text.find("five").unwrap();
        let from = position_of(&text, start).unwrap();
        let to = position_of(&text, start + 4).unwrap();
        host.create_highlight(from, to, "word").unwrap();

        let out = output(&host);
        assert_eq!(out.rsplit("\r\x1b[2K").next(), Some("One two."));
    }

    #[test]
    fn test_unknown_handle_is_error() {
        let mut host = TerminalHost::with_writer("x", Vec::new(), false);
        assert!(host.clear_highlight(42).is_err());
    }

    #[test]
    fn test_describe_event() {
        assert_eq!(
            describe_event(&PlayerEvent::ParagraphStarted(1), 3).as_deref(),
            Some("paragraph 2/3")
        );
        assert_eq!(
            describe_event(&PlayerEvent::StateChanged(PlaybackState::Speaking), 3),
            None
        );
    }
}
