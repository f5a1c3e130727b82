//! String similarity metrics used for column alignment and row matching
//!
//! All functions work on Unicode scalar values, so `"café"` has length 4.
//! Every similarity is bounded to `[0, 1]` where `1.0` means identical.

/// Jaro similarity below which no Winkler prefix boost is applied.
pub const WINKLER_BOOST_THRESHOLD: f64 = 0.7;

/// Parameters for the Jaro-Winkler prefix boost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JaroWinkler {
    pub prefix_weight: f64,
    pub prefix_length: usize,
}

impl Default for JaroWinkler {
    fn default() -> Self {
        Self {
            prefix_weight: 0.1,
            prefix_length: 4,
        }
    }
}

impl JaroWinkler {
    pub fn new(prefix_weight: f64, prefix_length: usize) -> Self {
        Self {
            prefix_weight,
            prefix_length,
        }
    }

    /// Jaro similarity boosted by the length of the common prefix
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        self.similarity_chars(&a, &b)
    }

    pub(crate) fn similarity_chars(&self, a: &[char], b: &[char]) -> f64 {
        let jaro = jaro_chars(a, b);
        if jaro < WINKLER_BOOST_THRESHOLD {
            return jaro;
        }

        let prefix = a
            .iter()
            .zip(b.iter())
            .take(self.prefix_length)
            .take_while(|(x, y)| x == y)
            .count();

        (jaro + self.prefix_weight * prefix as f64 * (1.0 - jaro)).clamp(0.0, 1.0)
    }
}

/// Minimum number of single-character edits turning `a` into `b`
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    levenshtein_chars(&a, &b)
}

pub(crate) fn levenshtein_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    if a == b {
        return 0;
    }

    // Two rolling rows of the (|a|+1) x (|b|+1) table
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Edit distance normalized by the longer string's length
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    levenshtein_similarity_chars(&a, &b)
}

pub(crate) fn levenshtein_similarity_chars(a: &[char], b: &[char]) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_chars(a, b) as f64 / max_len as f64
}

/// Standard Jaro similarity
pub fn jaro_distance(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    jaro_chars(&a, &b)
}

pub(crate) fn jaro_chars(a: &[char], b: &[char]) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let window = (a.len().max(b.len()) / 2) as isize - 1;
    if window < 0 {
        return 0.0;
    }
    let window = window as usize;

    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut matches = 0usize;

    for (i, ca) in a.iter().enumerate() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(b.len());
        for j in start..end {
            if b_matched[j] || *ca != b[j] {
                continue;
            }
            a_matched[i] = true;
            b_matched[j] = true;
            matches += 1;
            break;
        }
    }

    if matches == 0 {
        return 0.0;
    }

    // Matched characters of b, in order, paired against matched characters of a
    let b_in_order = b
        .iter()
        .zip(b_matched.iter())
        .filter(|(_, matched)| **matched)
        .map(|(c, _)| c);
    let half_transpositions = a
        .iter()
        .zip(a_matched.iter())
        .filter(|(_, matched)| **matched)
        .map(|(c, _)| c)
        .zip(b_in_order)
        .filter(|(x, y)| x != y)
        .count();
    let transpositions = half_transpositions as f64 / 2.0;

    let m = matches as f64;
    (m / a.len() as f64 + m / b.len() as f64 + (m - transpositions) / m) / 3.0
}

/// Jaro-Winkler similarity with the default prefix weight (0.1) and length (4)
pub fn jaro_winkler_distance(a: &str, b: &str) -> f64 {
    JaroWinkler::default().similarity(a, b)
}
