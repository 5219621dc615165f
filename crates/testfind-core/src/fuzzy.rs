//! Edit-distance suggestions for unresolved references.
//!
//! When nothing matches, the closest testable module names are offered
//! instead. Distances are weighted Levenshtein distances; two cost profiles
//! exist:
//!
//! - `typo` (1, 1, 1): plain edit distance, good at `FooTset` → `FooTest`.
//! - `search` (8, 1, 5): insertions are cheap, so a keyword like `Camera`
//!   ranks `CameraServiceTest` close.
//!
//! Candidates are ranked by distance; equal distances keep the caller's
//! iteration order.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Costs
// ============================================================================

/// Edit costs used by the distance computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostProfile {
    pub deletion: usize,
    pub insertion: usize,
    pub replacement: usize,
}

impl CostProfile {
    /// Unit costs, for typo correction.
    pub const TYPO: CostProfile = CostProfile {
        deletion: 1,
        insertion: 1,
        replacement: 1,
    };

    /// Cheap insertions, for keyword search.
    pub const SEARCH: CostProfile = CostProfile {
        deletion: 8,
        insertion: 1,
        replacement: 5,
    };
}

/// Named cost profile, as written in config files and on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuzzyProfile {
    #[default]
    Typo,
    Search,
}

impl FuzzyProfile {
    /// The costs of this profile.
    pub fn costs(&self) -> CostProfile {
        match self {
            FuzzyProfile::Typo => CostProfile::TYPO,
            FuzzyProfile::Search => CostProfile::SEARCH,
        }
    }
}

// ============================================================================
// Distance
// ============================================================================

/// Weighted Levenshtein distance turning `input` into `candidate`.
pub fn levenshtein(input: &str, candidate: &str, costs: CostProfile) -> usize {
    let input: Vec<char> = input.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    // One row per input prefix; `previous[col]` is the cost for the
    // candidate prefix of length `col`.
    let mut previous: Vec<usize> = (0..=candidate.len())
        .map(|col| col * costs.insertion)
        .collect();
    let mut current = vec![0; candidate.len() + 1];
    for (row, a) in input.iter().enumerate() {
        current[0] = (row + 1) * costs.deletion;
        for (col, b) in candidate.iter().enumerate() {
            let replace = if a == b { 0 } else { costs.replacement };
            current[col + 1] = (previous[col + 1] + costs.deletion)
                .min(current[col] + costs.insertion)
                .min(previous[col] + replace);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[candidate.len()]
}

// ============================================================================
// Matcher
// ============================================================================

/// A module name with its distance from the user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyCandidate {
    pub distance: usize,
    pub module_name: String,
}

/// Ranks module names against user input.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    costs: CostProfile,
    max_distance: usize,
}

impl FuzzyMatcher {
    /// A matcher accepting candidates up to `max_distance`.
    pub fn new(profile: FuzzyProfile, max_distance: usize) -> Self {
        FuzzyMatcher {
            costs: profile.costs(),
            max_distance,
        }
    }

    /// Distances for every module whose length is within `length_range` of
    /// the input; `0` means no length bound.
    ///
    /// Names are visited shortest first so the scan stops at the first name
    /// longer than the bound. The result is ordered by distance, ties in
    /// the order `modules` yielded them.
    pub fn rank<I, S>(&self, user_input: &str, modules: I, length_range: usize) -> Vec<FuzzyCandidate>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let started = Instant::now();
        let mut by_length: Vec<(usize, String)> = modules
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .enumerate()
            .collect();
        by_length.sort_by_key(|(order, name)| (name.chars().count(), *order));

        let input_len = user_input.chars().count();
        let lower = input_len.saturating_sub(length_range);
        let upper = input_len + length_range;
        let mut ranked: Vec<(usize, usize, String)> = Vec::new();
        for (order, name) in by_length {
            let len = name.chars().count();
            if length_range != 0 {
                if len < lower {
                    continue;
                }
                if len > upper {
                    break;
                }
            }
            ranked.push((levenshtein(user_input, &name, self.costs), order, name));
        }
        ranked.sort_by_key(|(distance, order, _)| (*distance, *order));
        debug!(
            input = user_input,
            candidates = ranked.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fuzzy search"
        );
        ranked
            .into_iter()
            .map(|(distance, _, module_name)| FuzzyCandidate {
                distance,
                module_name,
            })
            .collect()
    }

    /// Module names within `max_distance`, closest first.
    pub fn suggest<I, S>(&self, user_input: &str, modules: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rank(user_input, modules, self.max_distance)
            .into_iter()
            .filter(|c| c.distance <= self.max_distance)
            .map(|c| c.module_name)
            .collect()
    }
}

/// Typo-profile suggestions within `max_distance`, closest first.
pub fn suggest<I, S>(user_input: &str, modules: I, max_distance: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    FuzzyMatcher::new(FuzzyProfile::Typo, max_distance).suggest(user_input, modules)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod distance_tests {
        use super::*;

        #[test]
        fn typo_distances() {
            assert_eq!(levenshtein("fst", "fist", CostProfile::TYPO), 1);
            assert_eq!(levenshtein("fst", "first", CostProfile::TYPO), 2);
            assert_eq!(levenshtein("kitten", "sitting", CostProfile::TYPO), 3);
            assert_eq!(levenshtein("", "abc", CostProfile::TYPO), 3);
            assert_eq!(levenshtein("abc", "", CostProfile::TYPO), 3);
            assert_eq!(levenshtein("same", "same", CostProfile::TYPO), 0);
        }

        #[test]
        fn search_costs_favor_insertions() {
            let costs = CostProfile::SEARCH;
            assert_eq!(levenshtein("Camera", "CameraTests", costs), 5);
            assert_eq!(levenshtein("Cameras", "Camera", costs), 8);
            assert!(
                levenshtein("Camera", "CameraServiceTest", costs)
                    < levenshtein("Camera", "Canvas", costs)
            );
        }
    }

    mod suggest_tests {
        use super::*;

        #[test]
        fn closest_first_and_bounded() {
            let modules = ["first", "fist", "zzz"];
            assert_eq!(suggest("fst", modules, 2), vec!["fist", "first"]);
            assert_eq!(suggest("fst", modules, 1), vec!["fist"]);
        }

        #[test]
        fn ties_keep_iteration_order() {
            assert_eq!(suggest("ab", ["ax", "xb", "abc"], 1), vec!["ax", "xb", "abc"]);
            assert_eq!(suggest("ab", ["abc", "xb", "ax"], 1), vec!["abc", "xb", "ax"]);
        }

        #[test]
        fn length_bound_prunes_far_names() {
            let matcher = FuzzyMatcher::new(FuzzyProfile::Typo, 2);
            let ranked = matcher.rank("abc", ["a", "abcd", "abcdefgh"], 2);
            let names: Vec<&str> = ranked.iter().map(|c| c.module_name.as_str()).collect();
            assert_eq!(names, vec!["abcd", "a"]);
        }

        #[test]
        fn unbounded_rank_visits_everything() {
            let matcher = FuzzyMatcher::new(FuzzyProfile::Search, 0);
            let ranked = matcher.rank("Camera", ["CameraTests", "Canvas", "x"], 0);
            assert_eq!(ranked.len(), 3);
            assert_eq!(ranked[0].module_name, "CameraTests");
        }

        #[test]
        fn profile_names_deserialize() {
            let profile: FuzzyProfile = serde_json::from_str("\"search\"").unwrap();
            assert_eq!(profile, FuzzyProfile::Search);
            assert_eq!(FuzzyProfile::default().costs(), CostProfile::TYPO);
        }
    }
}
