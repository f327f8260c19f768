//! Document cleanup before segmentation.
//!
//! Strips a leading front-matter block (`---` fenced key/value header),
//! standalone `key:: value` property lines and leading blank lines. Only whole
//! lines are removed, so every character of the cleaned text maps back to one
//! character of the source through a list of contiguous segments.

/// A contiguous run of kept source lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    clean_start: usize,
    source_start: usize,
}

/// Cleaned document text plus the mapping back to source offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedText {
    text: String,
    char_len: usize,
    segments: Vec<Segment>,
}

impl CleanedText {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the cleaned text in characters.
    pub fn len(&self) -> usize {
        self.char_len
    }

    pub fn is_empty(&self) -> bool {
        self.char_len == 0
    }

    /// Map a cleaned start offset to the source document.
    pub fn to_source(&self, offset: usize) -> usize {
        self.segments
            .iter()
            .rev()
            .find(|s| s.clean_start <= offset)
            .map(|s| s.source_start + (offset - s.clean_start))
            .unwrap_or(offset)
    }

    /// Map a cleaned half-open range to the source document.
    ///
    /// The end is resolved against the segment holding its last character so
    /// a range ending exactly where removed lines begin does not swallow them.
    pub fn to_source_range(&self, start: usize, end: usize) -> (usize, usize) {
        let source_start = self.to_source(start);
        if end <= start {
            return (source_start, source_start);
        }
        let source_end = self.to_source(end - 1) + 1;
        (source_start, source_end)
    }
}

/// Remove reader-irrelevant metadata from a document.
pub fn clean_document(raw: &str) -> CleanedText {
    let lines: Vec<&str> = raw.split_inclusive('\n').collect();
    let skip_front_matter = front_matter_len(&lines);

    let mut text = String::with_capacity(raw.len());
    let mut char_len = 0usize;
    let mut segments: Vec<Segment> = Vec::new();
    let mut source_pos = 0usize;
    let mut previous_kept_end: Option<usize> = None;
    let mut seen_content = false;

    for (index, line) in lines.iter().enumerate() {
        let line_chars = line.chars().count();
        let body = line.trim_end_matches(['\n', '\r']);

        let removed = index < skip_front_matter
            || is_property_line(body)
            || (!seen_content && body.trim().is_empty());

        if !removed {
            seen_content = true;
            if previous_kept_end != Some(source_pos) {
                segments.push(Segment {
                    clean_start: char_len,
                    source_start: source_pos,
                });
            }
            text.push_str(line);
            char_len += line_chars;
            previous_kept_end = Some(source_pos + line_chars);
        }

        source_pos += line_chars;
    }

    CleanedText {
        text,
        char_len,
        segments,
    }
}

/// Number of leading lines forming a `---` fenced header, or 0.
fn front_matter_len(lines: &[&str]) -> usize {
    let is_fence = |line: &str| line.trim_end() == "---";
    match lines.first() {
        Some(first) if is_fence(first) => lines
            .iter()
            .skip(1)
            .position(|line| is_fence(line))
            .map(|closing| closing + 2)
            .unwrap_or(0),
        _ => 0,
    }
}

/// True for a standalone inline property such as `status:: draft`.
fn is_property_line(line: &str) -> bool {
    let trimmed = line.trim();
    let Some((key, value)) = trimmed.split_once("::") else {
        return false;
    };
    // `std::mem::swap` is a path, not a property.
    if !(value.is_empty() || value.starts_with(char::is_whitespace)) {
        return false;
    }
    let key = key.trim_end();
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
