//! "Did you mean" suggestions for unknown commands

use crate::config::defaults;

/// Edit distance between two strings, by character
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut curr = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        prev = curr;
    }
    prev[b.len()]
}

/// Candidates close to `typed`, in candidate order
///
/// A candidate qualifies when it is within the suggestion distance or
/// starts with what was typed. The literal `help` always suggests `--help`.
pub fn suggestions<'a, I>(typed: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if typed == "help" {
        return vec!["--help".to_string()];
    }
    let lower = typed.to_lowercase();
    candidates
        .into_iter()
        .filter(|c| {
            let c = c.to_lowercase();
            levenshtein(&lower, &c) <= defaults::SUGGESTION_DISTANCE || c.starts_with(&lower)
        })
        .map(str::to_string)
        .collect()
}
