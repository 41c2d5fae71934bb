//! Retrieval metrics against known relevant documents.

use std::collections::HashSet;

/// Fraction of the first `k` retrieved documents that are relevant.
///
/// The denominator is always `k`, so returning fewer than `k` results is
/// penalized. `k = 0` scores 0.
pub fn precision_at_k<S: AsRef<str>>(retrieved: &[S], relevant: &HashSet<String>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits_in_top_k(retrieved, relevant, k) as f64 / k as f64
}

/// Fraction of the relevant documents found in the first `k` retrieved.
/// An empty relevant set scores 0.
pub fn recall_at_k<S: AsRef<str>>(retrieved: &[S], relevant: &HashSet<String>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    hits_in_top_k(retrieved, relevant, k) as f64 / relevant.len() as f64
}

/// Distinct relevant documents among the first `k` results. Several chunks
/// of the same document count once.
fn hits_in_top_k<S: AsRef<str>>(retrieved: &[S], relevant: &HashSet<String>, k: usize) -> usize {
    let mut seen: HashSet<&str> = HashSet::new();
    for id in retrieved.iter().take(k) {
        let id: &str = id.as_ref();
        if relevant.contains(id) {
            seen.insert(id);
        }
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relevant(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_precision_at_k() {
        let retrieved = ["a", "x", "b", "y"];
        let rel = relevant(&["a", "b"]);
        assert_eq!(precision_at_k(&retrieved, &rel, 2), 0.5);
        assert_eq!(precision_at_k(&retrieved, &rel, 4), 0.5);
        assert_eq!(precision_at_k(&retrieved, &rel, 0), 0.0);
        // Fewer results than k.
        assert_eq!(precision_at_k(&["a"], &rel, 4), 0.25);
    }

    #[test]
    fn test_recall_at_k() {
        let retrieved = ["a", "x", "b"];
        let rel = relevant(&["a", "b", "c", "d"]);
        assert_eq!(recall_at_k(&retrieved, &rel, 1), 0.25);
        assert_eq!(recall_at_k(&retrieved, &rel, 3), 0.5);
        assert_eq!(recall_at_k(&retrieved, &relevant(&[]), 3), 0.0);
    }

    #[test]
    fn test_duplicate_documents_count_once() {
        let retrieved = ["a", "a", "a"];
        let rel = relevant(&["a"]);
        assert_eq!(recall_at_k(&retrieved, &rel, 3), 1.0);
        assert!((precision_at_k(&retrieved, &rel, 3) - 1.0 / 3.0).abs() < 1e-12);
    }
}
