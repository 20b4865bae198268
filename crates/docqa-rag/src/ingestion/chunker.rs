//! Text chunking into overlapping passages with byte-offset tracking

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::config::{ChunkUnit, ChunkingConfig};
use crate::error::Result;

/// Boundary kinds, best first
const PARAGRAPH: usize = 0;
const LINE: usize = 1;
const SENTENCE: usize = 2;
const WORD: usize = 3;

/// Text chunker with configurable size, overlap and length unit
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    unit: ChunkUnit,
}

/// One passage of the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passage<'a> {
    /// Position in the passage sequence, starting at 0
    pub ordinal: u32,
    /// Borrowed passage text
    pub text: &'a str,
    /// Byte offset of the passage start
    pub byte_start: usize,
    /// Byte offset one past the passage end
    pub byte_end: usize,
}

impl TextChunker {
    /// Create a new chunker, rejecting invalid size/overlap combinations
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            unit: config.unit,
        })
    }

    /// Maximum passage length in units
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive passages in units
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Length unit
    pub fn unit(&self) -> ChunkUnit {
        self.unit
    }

    /// Length of `text` in this chunker's unit
    pub fn measure(&self, text: &str) -> usize {
        match self.unit {
            ChunkUnit::Chars => text.chars().count(),
            ChunkUnit::Tokens => text.split_word_bounds().count(),
        }
    }

    /// Split `text` into passages.
    ///
    /// The iterator is lazy and can be cloned to restart from the same point.
    /// Concatenating the first passage with every later passage minus its
    /// leading `overlap` units reproduces `text` exactly.
    pub fn chunk<'a>(&self, text: &'a str) -> Passages<'a> {
        let mut offsets: Vec<usize> = match self.unit {
            ChunkUnit::Chars => text.char_indices().map(|(i, _)| i).collect(),
            ChunkUnit::Tokens => text
                .split_word_bound_indices()
                .map(|(i, _)| i)
                .collect(),
        };
        offsets.push(text.len());

        Passages {
            text,
            offsets: offsets.into(),
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            next_start: if text.is_empty() { None } else { Some(0) },
            ordinal: 0,
        }
    }
}

/// Lazy iterator over the passages of one text
#[derive(Debug, Clone)]
pub struct Passages<'a> {
    text: &'a str,
    /// Byte offset of every unit start, plus `text.len()`
    offsets: Arc<[usize]>,
    chunk_size: usize,
    overlap: usize,
    next_start: Option<usize>,
    ordinal: u32,
}

impl<'a> Passages<'a> {
    fn units(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Classify the cut at unit index `end`, if it is a preferred boundary
    fn boundary_kind(&self, end: usize) -> Option<usize> {
        let head = &self.text[..self.offsets[end]];
        let mut rev = head.chars().rev();
        let last = rev.next()?;

        if last == '\n' {
            return Some(if rev.next() == Some('\n') { PARAGRAPH } else { LINE });
        }
        if !last.is_whitespace() {
            return None;
        }
        match head.trim_end().chars().last() {
            Some('.' | '!' | '?') => Some(SENTENCE),
            _ => Some(WORD),
        }
    }

    /// Pick the end unit for a passage starting at `start` that cannot reach
    /// the end of the text
    fn cut(&self, start: usize) -> usize {
        let hard = start + self.chunk_size;
        let min_len = (self.chunk_size + 1) / 2;
        let min_end = start + min_len.max(self.overlap + 1);

        let mut best: [Option<usize>; 4] = [None; 4];
        for end in (min_end..=hard).rev() {
            if let Some(kind) = self.boundary_kind(end) {
                if kind == PARAGRAPH {
                    return end;
                }
                best[kind].get_or_insert(end);
            }
        }

        best.iter().flatten().next().copied().unwrap_or(hard)
    }
}

impl<'a> Iterator for Passages<'a> {
    type Item = Passage<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let units = self.units();

        let end = if start + self.chunk_size >= units {
            self.next_start = None;
            units
        } else {
            let end = self.cut(start);
            self.next_start = Some(end - self.overlap);
            end
        };

        let byte_start = self.offsets[start];
        let byte_end = self.offsets[end];
        let passage = Passage {
            ordinal: self.ordinal,
            text: &self.text[byte_start..byte_end],
            byte_start,
            byte_end,
        };
        self.ordinal += 1;
        Some(passage)
    }
}

impl std::iter::FusedIterator for Passages<'_> {}
