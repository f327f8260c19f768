//! Paragraph and word segmentation.

use serde::Serialize;

/// A maximal run of non-blank lines.
///
/// `start_offset`/`end_offset` are absolute character offsets into the text
/// that was segmented; `end_offset - start_offset == text.chars().count()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    pub index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Paragraph {
    /// Length of the paragraph in characters.
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}

/// A whitespace-delimited run inside a paragraph.
///
/// `start` and `length` are character offsets relative to the owning
/// paragraph's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Word {
    pub text: String,
    pub start: usize,
    pub length: usize,
}

impl Word {
    /// Exclusive end offset relative to the paragraph.
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Paragraph being accumulated while scanning lines.
struct OpenParagraph {
    char_start: usize,
    char_end: usize,
    byte_start: usize,
    byte_end: usize,
}

/// Split text into paragraphs on blank lines (lines holding only whitespace).
///
/// The separator between two paragraphs is whatever was actually matched:
/// the line terminator of the last line (`\n` or `\r\n`), every blank line,
/// and nothing else. Leading indentation of the next line stays part of that
/// paragraph.
pub fn segment_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut open: Option<OpenParagraph> = None;
    let mut char_pos = 0usize;
    let mut byte_pos = 0usize;

    for line in text.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        let content = content.strip_suffix('\r').unwrap_or(content);
        let content_chars = content.chars().count();

        if content.trim().is_empty() {
            if let Some(finished) = open.take() {
                push_paragraph(&mut paragraphs, text, finished);
            }
        } else {
            let char_end = char_pos + content_chars;
            let byte_end = byte_pos + content.len();
            match open.as_mut() {
                Some(paragraph) => {
                    paragraph.char_end = char_end;
                    paragraph.byte_end = byte_end;
                }
                None => {
                    open = Some(OpenParagraph {
                        char_start: char_pos,
                        char_end,
                        byte_start: byte_pos,
                        byte_end,
                    });
                }
            }
        }

        char_pos += line.chars().count();
        byte_pos += line.len();
    }

    if let Some(finished) = open.take() {
        push_paragraph(&mut paragraphs, text, finished);
    }

    paragraphs
}

fn push_paragraph(paragraphs: &mut Vec<Paragraph>, text: &str, open: OpenParagraph) {
    paragraphs.push(Paragraph {
        index: paragraphs.len(),
        text: text[open.byte_start..open.byte_end].to_string(),
        start_offset: open.char_start,
        end_offset: open.char_end,
    });
}

/// Split a paragraph into whitespace-delimited words.
///
/// Runs of whitespace collapse into one boundary; leading and trailing
/// whitespace produce no word.
pub fn segment_words(paragraph_text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (index, ch) in paragraph_text.chars().enumerate() {
        if ch.is_whitespace() {
            if let Some((start, text)) = current.take() {
                let length = text.chars().count();
                words.push(Word {
                    text,
                    start,
                    length,
                });
            }
        } else {
            match current.as_mut() {
                Some((_, text)) => text.push(ch),
                None => current = Some((index, ch.to_string())),
            }
        }
    }

    if let Some((start, text)) = current {
        let length = text.chars().count();
        words.push(Word {
            text,
            start,
            length,
        });
    }

    words
}
