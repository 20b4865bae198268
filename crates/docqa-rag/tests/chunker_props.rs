//! Property tests for passage splitting.

use docqa_rag::config::{ChunkUnit, ChunkingConfig};
use docqa_rag::ingestion::{Passage, TextChunker};
use proptest::prelude::*;
use unicode_segmentation::UnicodeSegmentation;

fn chunker(size: usize, overlap: usize, unit: ChunkUnit) -> TextChunker {
    TextChunker::new(&ChunkingConfig {
        chunk_size: size,
        chunk_overlap: overlap,
        unit,
    })
    .unwrap()
}

/// Byte length of the first `n` units of `text`.
fn prefix_len(text: &str, n: usize, unit: ChunkUnit) -> usize {
    match unit {
        ChunkUnit::Chars => text.chars().take(n).map(char::len_utf8).sum(),
        ChunkUnit::Tokens => text.split_word_bounds().take(n).map(str::len).sum(),
    }
}

/// First passage plus every later passage minus its leading overlap.
fn reassemble(passages: &[Passage<'_>], overlap: usize, unit: ChunkUnit) -> String {
    let mut out = String::new();
    for (i, p) in passages.iter().enumerate() {
        if i == 0 {
            out.push_str(p.text);
        } else {
            out.push_str(&p.text[prefix_len(p.text, overlap, unit)..]);
        }
    }
    out
}

/// Prose-like text with paragraph, line and sentence boundaries plus some non-ASCII.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => "[a-zA-Z]{1,12}",
            2 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\n\n".to_string()),
            1 => Just("é".to_string()),
            1 => Just("日本".to_string()),
        ],
        0..120,
    )
    .prop_map(|parts| parts.concat())
}

/// Plain ASCII words and punctuation, so word boundaries are the same inside
/// a passage as in the full text.
fn arb_ascii_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => "[a-z]{1,8}",
            3 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("\n\n".to_string()),
        ],
        0..120,
    )
    .prop_map(|parts| parts.concat())
}

fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (2usize..80).prop_flat_map(|size| (Just(size), 1..size))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn chars_round_trip(text in arb_text(), (size, overlap) in arb_sizes()) {
        let c = chunker(size, overlap, ChunkUnit::Chars);
        let passages: Vec<_> = c.chunk(&text).collect();

        prop_assert_eq!(reassemble(&passages, overlap, ChunkUnit::Chars), text.clone());
        prop_assert_eq!(passages.is_empty(), text.is_empty());
    }

    #[test]
    fn tokens_round_trip(text in arb_ascii_text(), (size, overlap) in arb_sizes()) {
        let c = chunker(size, overlap, ChunkUnit::Tokens);
        let passages: Vec<_> = c.chunk(&text).collect();

        prop_assert_eq!(reassemble(&passages, overlap, ChunkUnit::Tokens), text.clone());
    }

    #[test]
    fn passages_are_bounded_and_overlap_exactly(
        text in arb_text(),
        (size, overlap) in arb_sizes(),
    ) {
        let c = chunker(size, overlap, ChunkUnit::Chars);
        let passages: Vec<_> = c.chunk(&text).collect();

        for (i, p) in passages.iter().enumerate() {
            prop_assert!(c.measure(p.text) <= size);
            prop_assert!(!p.text.is_empty());
            prop_assert_eq!(p.ordinal as usize, i);
            prop_assert_eq!(&text[p.byte_start..p.byte_end], p.text);
        }
        for pair in passages.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let shared = &next.text[..prefix_len(next.text, overlap, ChunkUnit::Chars)];
            prop_assert!(prev.text.ends_with(shared));
            prop_assert_eq!(prev.byte_end - shared.len(), next.byte_start);
        }
    }

    #[test]
    fn iteration_is_restartable(text in arb_text(), (size, overlap) in arb_sizes()) {
        let c = chunker(size, overlap, ChunkUnit::Chars);
        let mut passages = c.chunk(&text);
        let snapshot = passages.clone();

        let first: Vec<_> = passages.by_ref().map(|p| p.text).collect();
        let again: Vec<_> = snapshot.map(|p| p.text).collect();
        prop_assert_eq!(first, again);
        prop_assert!(passages.next().is_none());
    }
}
