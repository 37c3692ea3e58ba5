//! Overlapping-window text splitter.
//!
//! Splits document text into windows of at most `max_chars` characters,
//! with `overlap_chars` of shared text between consecutive windows so
//! that context survives a split boundary. Cut points prefer paragraph
//! breaks (`\n\n`), then sentence ends, then word boundaries, before
//! falling back to a hard character cut. All cuts land on UTF-8
//! character boundaries, and splitting is deterministic.

/// Split `text` into overlapping chunks.
///
/// Guarantees:
/// - every chunk is at most `max_chars` characters long;
/// - consecutive chunks share exactly `overlap` characters, except when
///   a degenerate cut leaves too little room to step back;
/// - whitespace-only input produces no chunks;
/// - input no longer than `max_chars` produces a single chunk.
pub fn split_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    debug_assert!(max_chars > 0);
    let overlap = overlap.min(max_chars.saturating_sub(1));

    if text.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every character boundary, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    if total_chars <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize; // char offset

    loop {
        let end = (start + max_chars).min(total_chars);
        if end == total_chars {
            chunks.push(text[bounds[start]..].to_string());
            break;
        }

        let window = &text[bounds[start]..bounds[end]];
        // The cut must leave more than `overlap` characters behind it,
        // otherwise stepping back for the overlap would not advance.
        let cut_in_window = pick_cut(window, overlap + 1);
        let cut = start + cut_in_window;

        chunks.push(text[bounds[start]..bounds[cut]].to_string());
        start = if cut_in_window > overlap { cut - overlap } else { cut };
    }

    chunks
}

/// Choose where to cut a full window, as a character offset into it.
/// Boundary preference: paragraph break, sentence end, word boundary,
/// hard cut at the window end. Only offsets `>= min_chars` qualify.
fn pick_cut(window: &str, min_chars: usize) -> usize {
    const PARAGRAPH: [&str; 1] = ["\n\n"];
    const SENTENCE: [&str; 4] = [". ", "! ", "? ", "\n"];
    const WORD: [&str; 1] = [" "];

    for boundary_set in [&PARAGRAPH[..], &SENTENCE[..], &WORD[..]] {
        if let Some(cut) = boundary_cut(window, boundary_set, min_chars) {
            return cut;
        }
    }

    window.chars().count()
}

/// Latest cut position just after any of `patterns`, at or beyond
/// `min_chars` characters into the window.
fn boundary_cut(window: &str, patterns: &[&str], min_chars: usize) -> Option<usize> {
    patterns
        .iter()
        .filter_map(|pat| {
            let byte_end = window.rfind(pat)? + pat.len();
            Some(window[..byte_end].chars().count())
        })
        .filter(|&chars| chars >= min_chars)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_suffix(s: &str, n: usize) -> String {
        let count = s.chars().count();
        s.chars().skip(count.saturating_sub(n)).collect()
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_text("Namaste, how can I help?", 1000, 200);
        assert_eq!(chunks, vec!["Namaste, how can I help?".to_string()]);
    }

    #[test]
    fn whitespace_only_yields_no_chunks() {
        assert!(split_text("", 1000, 200).is_empty());
        assert!(split_text("  \n\n  ", 1000, 200).is_empty());
    }

    #[test]
    fn every_chunk_respects_max_chars() {
        let text = "word ".repeat(800);
        let chunks = split_text(&text, 100, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "oversized chunk: {:?}", chunk);
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "The yatra departs from Delhi. ".repeat(100);
        let overlap = 20;
        let chunks = split_text(&text, 120, overlap);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let suffix = char_suffix(&pair[0], overlap);
            assert!(
                pair[1].starts_with(&suffix),
                "chunks do not overlap: {:?} / {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn overlap_stripped_chunks_reconstruct_source() {
        let text = "Kedarnath opens in May. Badrinath follows. ".repeat(60);
        let overlap = 15;
        let chunks = split_text(&text, 90, overlap);

        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let para = "a".repeat(60);
        let text = format!("{}\n\n{}\n\n{}", para, para, para);
        let chunks = split_text(&text, 80, 10);
        assert!(chunks.len() > 1);
        assert!(
            chunks[0].ends_with("\n\n"),
            "expected the first cut at the paragraph break, got {:?}",
            chunks[0]
        );
    }

    #[test]
    fn hard_cut_when_no_boundary_exists() {
        let text = "x".repeat(500);
        let chunks = split_text(&text, 100, 25);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
        // Coverage must still be complete.
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(25));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_character() {
        let text = "यात्रा कार्यक्रम — १७ अप्रैल से १९ अप्रैल। ".repeat(50);
        let chunks = split_text(&text, 64, 16);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 64);
            // Slicing on a non-boundary would have panicked already; make
            // sure the pieces are valid standalone strings.
            assert_eq!(chunk, &chunk.chars().collect::<String>());
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "Route details and tentative dates.\n\n".repeat(40);
        let a = split_text(&text, 100, 30);
        let b = split_text(&text, 100, 30);
        assert_eq!(a, b);
    }
}
