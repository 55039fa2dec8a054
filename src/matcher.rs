/// Approximate postal-code matching against the demographics reference set.
///
/// The similarity metric is normalized Levenshtein: `1 - distance / max_len`,
/// with wildcard positions in the fragment matching any single digit at full
/// credit. The threshold is inclusive; ties break to the lexicographically
/// smallest code so outcomes are deterministic.
use std::collections::{HashMap, HashSet};

use crate::models::{MatchOutcome, MatchResult, RawDemographic};
use crate::normalizer::WILDCARD;

/// Length of the literal-digit prefix used to bucket the reference codes.
const PREFIX_LEN: usize = 3;

/// Immutable reference set of known postal codes, built once per pipeline
/// run and read concurrently without mutation during a matching pass.
///
/// Codes are kept sorted so candidate scans visit them in lexicographic
/// order, which makes the tie-break fall out of a strict-improvement
/// comparison. The prefix buckets keep wildcard resolution from scanning the
/// whole set.
#[derive(Debug, Clone)]
pub struct PostalIndex {
    /// Sorted, deduplicated known codes.
    codes: Vec<String>,
    /// Exact-lookup set over the same codes.
    exact: HashSet<String>,
    /// Indices into `codes`, keyed by the code's first `PREFIX_LEN` digits.
    by_prefix: HashMap<String, Vec<usize>>,
}

impl PostalIndex {
    /// Builds the index from the demographics table's postal codes.
    pub fn build(demographics: &[RawDemographic]) -> Self {
        let mut codes: Vec<String> = demographics
            .iter()
            .map(|d| d.postal_code.clone())
            .collect();
        codes.sort();
        codes.dedup();

        let exact: HashSet<String> = codes.iter().cloned().collect();

        let mut by_prefix: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, code) in codes.iter().enumerate() {
            if let Some(prefix) = code.get(..PREFIX_LEN) {
                by_prefix
                    .entry(prefix.to_string())
                    .or_default()
                    .push(idx);
            }
        }

        tracing::debug!(
            "Postal index built: {} codes, {} prefix buckets",
            codes.len(),
            by_prefix.len()
        );

        Self {
            codes,
            exact,
            by_prefix,
        }
    }

    /// Number of distinct known codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Resolves a fragment to its best-matching known code.
    ///
    /// Empty fragments yield `None` with no score. Wildcard-free fragments
    /// found in the set short-circuit to `Exact` with score 1.0. Everything
    /// else is scored against the candidate codes; the best score wins when
    /// it reaches the threshold (inclusive), with ties broken toward the
    /// lexicographically smallest code.
    pub fn best_match(&self, fragment: &str, threshold: f64) -> MatchResult {
        if fragment.is_empty() {
            return MatchResult::none();
        }

        let has_wildcard = fragment.contains(WILDCARD);
        if !has_wildcard && self.exact.contains(fragment) {
            return MatchResult {
                outcome: MatchOutcome::Exact,
                matched_code: Some(fragment.to_string()),
                score: Some(1.0),
            };
        }

        let mut best_score = f64::NEG_INFINITY;
        let mut best_code: Option<&str> = None;
        for code in self.candidates(fragment) {
            let score = similarity(fragment, code);
            // Strict improvement only: candidates arrive in lexicographic
            // order, so the smallest code keeps a tied score.
            if score > best_score {
                best_score = score;
                best_code = Some(code);
            }
        }

        match best_code {
            // Threshold is inclusive: a score of exactly 0.8 at threshold
            // 0.8 is a fuzzy match.
            Some(code) if best_score >= threshold => MatchResult {
                outcome: MatchOutcome::Fuzzy,
                matched_code: Some(code.to_string()),
                score: Some(best_score),
            },
            _ => MatchResult::none(),
        }
    }

    /// Candidate codes for a fragment, in lexicographic order.
    ///
    /// Fragments opening with at least `PREFIX_LEN` literal digits are
    /// restricted to their prefix bucket when one exists; this is an
    /// optimization, not a correctness requirement, so a bucket miss falls
    /// back to the full scan.
    fn candidates<'a>(&'a self, fragment: &str) -> Candidates<'a> {
        let literal_prefix: String = fragment
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .take(PREFIX_LEN)
            .collect();

        let bucket = if literal_prefix.len() == PREFIX_LEN {
            self.by_prefix.get(literal_prefix.as_str())
        } else {
            None
        };

        match bucket {
            Some(indices) => Candidates::Bucket {
                codes: &self.codes,
                indices: indices.iter(),
            },
            None => Candidates::Full(self.codes.iter()),
        }
    }
}

/// Iterator over either a prefix bucket or the full code list.
enum Candidates<'a> {
    Bucket {
        codes: &'a [String],
        indices: std::slice::Iter<'a, usize>,
    },
    Full(std::slice::Iter<'a, String>),
}

impl<'a> Iterator for Candidates<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Candidates::Bucket { codes, indices } => {
                indices.next().map(|idx| codes[*idx].as_str())
            }
            Candidates::Full(iter) => iter.next().map(|code| code.as_str()),
        }
    }
}

/// Normalized similarity between a fragment and a known code, in [0, 1].
///
/// Wildcard-free pairs use `strsim::normalized_levenshtein` directly;
/// fragments carrying wildcards go through the local wildcard-aware distance,
/// normalized by the same `1 - d / max_len` formula.
pub fn similarity(fragment: &str, code: &str) -> f64 {
    if !fragment.contains(WILDCARD) {
        return strsim::normalized_levenshtein(fragment, code);
    }

    let frag: Vec<char> = fragment.chars().collect();
    let code_chars: Vec<char> = code.chars().collect();
    let max_len = frag.len().max(code_chars.len());
    if max_len == 0 {
        return 1.0;
    }

    let distance = wildcard_levenshtein(&frag, &code_chars);
    1.0 - (distance as f64 / max_len as f64)
}

/// Levenshtein distance where a wildcard in the fragment matches any single
/// ASCII digit in the code at zero cost.
fn wildcard_levenshtein(fragment: &[char], code: &[char]) -> usize {
    let cols = code.len() + 1;
    let mut prev: Vec<usize> = (0..cols).collect();
    let mut curr: Vec<usize> = vec![0; cols];

    for (i, fc) in fragment.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cc) in code.iter().enumerate() {
            let matches = fc == cc || (*fc == WILDCARD && cc.is_ascii_digit());
            let substitution = prev[j] + usize::from(!matches);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[code.len()]
}
