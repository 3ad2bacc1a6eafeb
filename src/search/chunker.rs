//! Sentence-aligned chunking
//!
//! Splits a document into passages of roughly `target_size` bytes at sentence
//! or paragraph boundaries. Each passage after the first is prefixed with the
//! tail of its predecessor so retrieval does not lose context at the seams.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENTENCE_END: Regex = Regex::new(r#"[.!?]["')\]]*\s+|\n\s*\n"#).unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Passage text including overlap, trimmed
    pub text: String,
    /// Byte range of the passage body (without overlap) in the source
    pub span: Range<usize>,
    pub index: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    target_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size: target_size.max(1),
            overlap: overlap.min(target_size),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut spans: Vec<Range<usize>> = Vec::new();
        let mut start = 0;
        let mut cut = 0;

        for end in sentence_ends(text) {
            if end - start > self.target_size && cut > start {
                spans.push(start..cut);
                start = cut;
            }
            cut = end;
        }
        if start < text.len() {
            spans.push(start..text.len());
        }

        spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let from = if index == 0 {
                    span.start
                } else {
                    self.overlap_start(text, span.start)
                };
                Chunk {
                    text: text[from..span.end].trim().to_string(),
                    span,
                    index,
                }
            })
            .collect()
    }

    /// Start of the overlap prefix for a body beginning at `body_start`,
    /// moved forward to a char and word boundary.
    fn overlap_start(&self, text: &str, body_start: usize) -> usize {
        if self.overlap == 0 {
            return body_start;
        }
        let mut pos = body_start.saturating_sub(self.overlap);
        while !text.is_char_boundary(pos) {
            pos += 1;
        }
        match text[pos..body_start].find(char::is_whitespace) {
            Some(ws) => {
                let after = pos + ws;
                let rest = &text[after..body_start];
                after + (rest.len() - rest.trim_start().len())
            }
            None => body_start,
        }
    }
}

/// Byte offsets just past each sentence or paragraph break, ending with `text.len()`.
fn sentence_ends(text: &str) -> Vec<usize> {
    let mut ends: Vec<usize> = SENTENCE_END.find_iter(text).map(|m| m.end()).collect();
    if ends.last() != Some(&text.len()) {
        ends.push(text.len());
    }
    ends
}
