//! Sentence splitting and word counting.

use unicode_segmentation::UnicodeSegmentation;

/// Tokens that never end a sentence (lowercase, no trailing period).
const ABBREVIATIONS: &[&str] = &[
    "rs", "nos", "e.g", "i.e", "mr", "mrs", "ms", "dr", "sr", "jr", "govt", "dept", "approx",
    "para", "paras", "sec", "vol", "fig", "vs", "p", "pp", "cf", "viz", "ltd", "pvt",
];

/// Tokens that are also ordinary words. They only continue a sentence when
/// the next piece starts with a digit or a lowercase letter.
const AMBIGUOUS_ABBREVIATIONS: &[&str] = &["no", "st", "art", "co", "inc", "min", "max", "est"];

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into trimmed sentences.
///
/// Uses Unicode sentence boundaries, then re-joins pieces that were cut
/// after an abbreviation such as `Rs.` or `e.g.`. Ambiguous tokens like
/// `No.` or a single capital only join when the next piece reads as a
/// continuation (`No. 4`, `B. of the`).
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();

    for piece in text.unicode_sentences() {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }

        match sentences.last_mut() {
            Some(last) if ends_with_abbreviation(last, piece) => {
                last.push(' ');
                last.push_str(piece);
            }
            _ => sentences.push(piece.to_string()),
        }
    }

    sentences
}

fn ends_with_abbreviation(sentence: &str, next: &str) -> bool {
    let Some(token) = sentence.split_whitespace().last() else {
        return false;
    };
    let Some(stem) = token.strip_suffix('.') else {
        return false;
    };
    let stem = stem.trim_start_matches(|c: char| !c.is_alphanumeric());
    let lower = stem.to_lowercase();

    if ABBREVIATIONS.contains(&lower.as_str()) {
        return true;
    }

    let mut chars = stem.chars();
    let initial = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase());
    if initial || AMBIGUOUS_ABBREVIATIONS.contains(&lower.as_str()) {
        return reads_as_continuation(next);
    }

    false
}

fn reads_as_continuation(piece: &str) -> bool {
    piece
        .chars()
        .find(|c| c.is_alphanumeric())
        .is_some_and(|c| c.is_ascii_digit() || c.is_lowercase())
}
