//! Natural (numeric-aware) filename ordering.
//!
//! Bracketed series come off cameras with names like `IMG_2.jpg` …
//! `IMG_10.jpg`. Plain lexical ordering puts `IMG_10` before `IMG_2`, which
//! would misalign the image sequence with its exposure-time sequence. The
//! collector therefore orders filenames *naturally*: embedded digit runs
//! compare as numbers, everything else compares as text.
//!
//! - `img1.jpg` < `img2.jpg` < `img10.jpg`
//! - `a2b.jpg` < `a10a.jpg`
//! - Numeric ties (`img07` vs `img7`) fall back to lexical order so the
//!   ordering is total and stable.

use std::cmp::Ordering;

/// A filename decomposed into alternating text and digit runs.
#[derive(Debug, PartialEq)]
enum Chunk<'a> {
    Text(&'a str),
    Number(&'a str),
}

/// Split a name into text and digit runs.
///
/// `"img10.jpg"` → `[Text("img"), Number("10"), Text(".jpg")]`
fn chunks(name: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let bytes = name.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let digit = bytes[start].is_ascii_digit();
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() == digit {
            end += 1;
        }
        let run = &name[start..end];
        out.push(if digit {
            Chunk::Number(run)
        } else {
            Chunk::Text(run)
        });
        start = end;
    }
    out
}

/// Compare two digit runs numerically without overflow.
///
/// Strips leading zeros, then compares by length and lexically — equivalent
/// to big-integer comparison for arbitrarily long runs.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural comparison of two filenames.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_chunks = chunks(a);
    let b_chunks = chunks(b);

    for (ca, cb) in a_chunks.iter().zip(b_chunks.iter()) {
        let ord = match (ca, cb) {
            (Chunk::Number(x), Chunk::Number(y)) => compare_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            // A digit run sorts before a text run at the same position
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    // All shared chunks equal: shorter name first, then full lexical order
    // as the final tie-break (distinguishes "img07" from "img7").
    a_chunks.len().cmp(&b_chunks.len()).then_with(|| a.cmp(b))
}
