use serde::{Deserialize, Serialize};

/// One bounded-size contiguous slice of source text.
///
/// `overlap` counts leading chars carried over from the previous chunk's
/// tail for cross-chunk context. Stripping each chunk's overlap prefix and
/// concatenating the bodies reproduces the normalized source exactly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub char_length: usize,
    pub overlap: usize,
}

impl Chunk {
    /// The chunk text minus the overlap prefix.
    pub fn body(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte_idx, _)) => &self.text[byte_idx..],
            None if self.overlap == 0 => &self.text,
            None => "",
        }
    }

    /// Body length in chars, the size the bound applies to.
    pub fn body_len(&self) -> usize {
        self.char_length - self.overlap
    }
}

/// Normalize line endings and excess blank lines before segmentation.
/// CRLF/CR become LF, runs of three or more newlines collapse to a blank
/// line, and outer whitespace is trimmed.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut newline_run = 0usize;
    for ch in unified.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(ch);
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }
    out.trim().to_string()
}

/// Split `text` into ordered chunks whose bodies are at most
/// `max_chunk_size` chars, preferring paragraph boundaries, then sentence
/// boundaries, then raw char offsets. `overlap` chars of the previous
/// chunk's tail are prepended to each subsequent chunk.
///
/// Empty (or whitespace-only) input yields no chunks; input that already
/// fits yields exactly one.
pub fn segment(text: &str, max_chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let max = max_chunk_size.max(1);
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let bodies = if normalized.chars().count() <= max {
        vec![normalized]
    } else {
        pack(split_units(&normalized, max), max)
    };

    let mut chunks = Vec::with_capacity(bodies.len());
    let mut prev_tail = String::new();
    for (index, body) in bodies.into_iter().enumerate() {
        let carried = if index == 0 { String::new() } else { prev_tail.clone() };
        let overlap_len = carried.chars().count();
        prev_tail = tail_chars(&body, overlap);
        let text = format!("{carried}{body}");
        let char_length = text.chars().count();
        chunks.push(Chunk {
            index,
            text,
            char_length,
            overlap: overlap_len,
        });
    }
    chunks
}

/// Greedily pack units into bodies without exceeding `max` chars each.
/// Every unit is already at most `max` chars.
fn pack(units: Vec<String>, max: usize) -> Vec<String> {
    let mut bodies = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for unit in units {
        let unit_len = unit.chars().count();
        if current_len > 0 && current_len + unit_len > max {
            bodies.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(&unit);
        current_len += unit_len;
    }
    if !current.is_empty() {
        bodies.push(current);
    }
    bodies
}

/// Produce ordered units, each at most `max` chars, via the granularity
/// cascade. Trailing separators stay attached to their unit so that
/// concatenation is lossless.
fn split_units(text: &str, max: usize) -> Vec<String> {
    let mut units = Vec::new();
    for paragraph in split_paragraphs(text) {
        if paragraph.chars().count() <= max {
            units.push(paragraph.to_string());
            continue;
        }
        for sentence in split_sentences(paragraph) {
            if sentence.chars().count() <= max {
                units.push(sentence.to_string());
            } else {
                units.extend(split_fixed(sentence, max));
            }
        }
    }
    units
}

/// Split on blank-line boundaries, keeping the separator with the
/// preceding paragraph.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\n' && bytes[i + 1] == b'\n' {
            parts.push(&text[start..i + 2]);
            start = i + 2;
            i += 2;
        } else {
            i += 1;
        }
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

/// Split on sentence-terminal punctuation, keeping closing quotes/brackets
/// and trailing whitespace with the sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    const CLOSERS: &[char] = &['"', '\'', '\u{2019}', '\u{201d}', ')', ']', '\u{00bb}'];

    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut iter = text.char_indices().peekable();
    while let Some((idx, ch)) = iter.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let mut end = idx + ch.len_utf8();
        while let Some(&(next_idx, next_ch)) = iter.peek() {
            if CLOSERS.contains(&next_ch) {
                end = next_idx + next_ch.len_utf8();
                iter.next();
            } else {
                break;
            }
        }
        while let Some(&(next_idx, next_ch)) = iter.peek() {
            if next_ch.is_whitespace() {
                end = next_idx + next_ch.len_utf8();
                iter.next();
            } else {
                break;
            }
        }
        parts.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

/// Last-resort split into fixed windows of at most `max` chars.
fn split_fixed(text: &str, max: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max {
            parts.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Up to `n` trailing chars of `text`, on a char boundary.
fn tail_chars(text: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(n)).collect()
}
