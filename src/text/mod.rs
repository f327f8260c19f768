//! Document text handling: cleanup before reading and segmentation into
//! paragraphs and words with exact character offsets.
//!
//! All offsets in this module count Unicode scalar values (`char`s), not bytes.

pub mod clean;
pub mod segment;

pub use clean::{CleanedText, clean_document};
pub use segment::{Paragraph, Word, segment_paragraphs, segment_words};
