//! OCR-aware edit distance and catalog ranking
//!
//! Plain Levenshtein alignment, except that substituting glyphs OCR tends to
//! confuse costs less than 1. Recognized text is ranked against catalog names
//! by distance divided by the recognized text length.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogEntry};

/// Cost of replacing `a` with `b`
pub fn substitution_cost(a: char, b: char) -> f64 {
    if a == b {
        return 0.0;
    }

    match (a.min(b), a.max(b)) {
        ('I', 'l') => 0.2,
        ('I', 't') => 0.25,
        ('i', 't') => 0.3,
        ('r', 't') => 0.45,
        _ => 1.0,
    }
}

/// Weighted edit distance between two strings, by characters
pub fn distance(s: &str, t: &str) -> f64 {
    let s: Vec<char> = s.chars().collect();
    let t: Vec<char> = t.chars().collect();

    if s.is_empty() {
        return t.len() as f64;
    }
    if t.is_empty() {
        return s.len() as f64;
    }

    let mut prev: Vec<f64> = (0..=t.len()).map(|j| j as f64).collect();
    let mut curr = vec![0.0; t.len() + 1];

    for (i, &sc) in s.iter().enumerate() {
        curr[0] = (i + 1) as f64;
        for (j, &tc) in t.iter().enumerate() {
            curr[j + 1] = (prev[j + 1] + 1.0)
                .min(curr[j] + 1.0)
                .min(prev[j] + substitution_cost(sc, tc));
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[t.len()]
}

/// A catalog printing scored against recognized text
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub entry: Arc<CatalogEntry>,
    /// Raw weighted edit distance
    pub distance: f64,
    /// Distance divided by the recognized text length
    pub normalized: f64,
}

impl MatchResult {
    pub fn name(&self) -> &str {
        &self.entry.name
    }
}

/// Printings closest to `text`
///
/// Returns the single first printing whose distance is below `short_circuit`,
/// otherwise every printing tied at the minimum distance.
pub fn closest_entries(catalog: &Catalog, text: &str, short_circuit: f64) -> Vec<MatchResult> {
    let length = text.chars().count();
    if length == 0 {
        return Vec::new();
    }

    let mut memo: HashMap<&str, f64> = HashMap::new();
    let mut best = f64::MAX;
    let mut results = Vec::new();

    for entry in catalog.iter() {
        let d = *memo
            .entry(entry.name.as_str())
            .or_insert_with(|| distance(&entry.name, text));

        if d > best {
            continue;
        }
        best = d;

        let result = MatchResult {
            entry: Arc::clone(entry),
            distance: d,
            normalized: d / length as f64,
        };

        if d < short_circuit {
            return vec![result];
        }
        results.push(result);
    }

    results.retain(|r| r.distance == best);
    results
}

/// Pool of results reduced to those at the minimum normalized distance,
/// without repeated (printing, distance) pairs
pub fn keep_minimum(results: Vec<MatchResult>) -> Vec<MatchResult> {
    let Some(min) = results.iter().map(|r| r.normalized).min_by(|a, b| a.total_cmp(b)) else {
        return Vec::new();
    };

    let mut kept: Vec<MatchResult> = Vec::new();
    for result in results.into_iter().filter(|r| r.normalized == min) {
        let duplicate = kept
            .iter()
            .any(|k| k.entry.id == result.entry.id && k.distance == result.distance);
        if !duplicate {
            kept.push(result);
        }
    }
    kept
}

/// Distinct names among the results, in first-seen order
pub fn distinct_names(results: &[MatchResult]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for result in results {
        if !names.contains(&result.name()) {
            names.push(result.name());
        }
    }
    names
}

/// The name when the results agree on exactly one
pub fn resolved_name(results: &[MatchResult]) -> Option<&str> {
    match distinct_names(results).as_slice() {
        [name] => Some(name),
        _ => None,
    }
}

/// Confidence in [0, 100] that the resolved name is right; 0 when unresolved
pub fn confidence(results: &[MatchResult]) -> f64 {
    if resolved_name(results).is_none() {
        return 0.0;
    }

    let min = results
        .iter()
        .map(|r| r.normalized)
        .fold(f64::INFINITY, f64::min);

    ((1.0 - min) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT_CIRCUIT: f64 = 1.0;

    #[test]
    fn test_identity_and_empty() {
        for s in ["", "a", "Forest", "Llanowar Elves", "Æther Vial"] {
            assert_eq!(distance(s, s), 0.0);
            assert_eq!(distance(s, ""), s.chars().count() as f64);
            assert_eq!(distance("", s), s.chars().count() as f64);
        }
    }

    #[test]
    fn test_cost_table_is_symmetric() {
        let pairs = [('l', 'I', 0.2), ('I', 't', 0.25), ('i', 't', 0.3), ('t', 'r', 0.45)];
        for (a, b, cost) in pairs {
            assert_eq!(substitution_cost(a, b), cost);
            assert_eq!(substitution_cost(b, a), cost);
        }
        for c in ['a', 'I', 'l', 't', 'r', 'i', ' '] {
            assert_eq!(substitution_cost(c, c), 0.0);
        }
        assert_eq!(substitution_cost('a', 'b'), 1.0);
        assert_eq!(substitution_cost('l', 't'), 1.0);
    }

    #[test]
    fn test_confusable_substitutions() {
        assert!((distance("Llanowar", "LIanowar") - 0.2).abs() < 1e-9);
        assert!((distance("Giant", "Giani") - 0.3).abs() < 1e-9);
        assert!((distance("Forest", "Foresr") - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_matches_plain_levenshtein_without_confusables() {
        for (a, b) in [("sunday", "saturday"), ("Forest", "Forcst"), ("Plains", "Plane"), ("abc", "xyz")] {
            assert_eq!(distance(a, b), strsim::levenshtein(a, b) as f64, "{} / {}", a, b);
        }
    }

    #[test]
    fn test_forcst_resolves_to_forest() {
        let catalog = Catalog::from_names(&["Forest", "Island", "Mountain"]);
        let results = closest_entries(&catalog, "Forcst", SHORT_CIRCUIT);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "Forest");
        assert_eq!(results[0].distance, 1.0);
        assert!((results[0].normalized - 1.0 / 6.0).abs() < 1e-9);

        for other in ["Island", "Mountain"] {
            assert!(distance(other, "Forcst") / 6.0 > results[0].normalized);
        }
        assert_eq!(resolved_name(&results), Some("Forest"));
    }

    #[test]
    fn test_exact_match_short_circuits() {
        let catalog = Catalog::from_names(&["Forest", "Forest Bear", "Island"]);
        let results = closest_entries(&catalog, "Forest", SHORT_CIRCUIT);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].distance, 0.0);
    }

    #[test]
    fn test_tie_is_ambiguous() {
        let catalog = Catalog::from_names(&["Cat", "Hat", "Island"]);
        let results = keep_minimum(closest_entries(&catalog, "Bat", SHORT_CIRCUIT));

        assert_eq!(distinct_names(&results), vec!["Cat", "Hat"]);
        assert_eq!(resolved_name(&results), None);
        assert_eq!(confidence(&results), 0.0);
    }

    #[test]
    fn test_keep_minimum_dedups() {
        let catalog = Catalog::from_names(&["Forest", "Island"]);
        let mut pooled = closest_entries(&catalog, "Forcst", SHORT_CIRCUIT);
        pooled.extend(closest_entries(&catalog, "Forcst", SHORT_CIRCUIT));
        pooled.extend(closest_entries(&catalog, "Islanb", SHORT_CIRCUIT));

        let kept = keep_minimum(pooled);
        assert_eq!(kept.len(), 2);
        assert_eq!(resolved_name(&kept), None);

        let kept = keep_minimum(closest_entries(&catalog, "Forcst", SHORT_CIRCUIT));
        assert_eq!(kept.len(), 1);
        assert!((confidence(&kept) - (1.0 - 1.0 / 6.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let catalog = Catalog::from_names(&["Mountain"]);
        let results = closest_entries(&catalog, "xy", SHORT_CIRCUIT);
        assert_eq!(resolved_name(&results), Some("Mountain"));
        assert_eq!(confidence(&results), 0.0);
        assert!(keep_minimum(Vec::new()).is_empty());
        assert!(closest_entries(&catalog, "", SHORT_CIRCUIT).is_empty());
    }
}
