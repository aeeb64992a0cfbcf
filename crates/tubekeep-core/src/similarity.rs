//! Edit distance between strings.

/// Levenshtein distance between `a` and `b`, counted in `char`s.
///
/// Uses two rolling rows, so memory is proportional to the shorter input.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // Keep the row length bound by the shorter string
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(lc != sc);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            let substitution = prev[j] + cost;
            curr[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

/// Normalize a title for similarity comparison: trimmed and lowercased.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
