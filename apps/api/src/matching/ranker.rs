//! Cosine top-K over a candidate subset of the index.

use std::cmp::Ordering;

use crate::matching::index::EmbeddingIndex;

/// Relevance floor applied when the caller does not pass one.
pub const DEFAULT_THRESHOLD: f32 = 0.35;

/// One surviving candidate: its index row, raw similarity and 0–100 score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate {
    pub row: usize,
    pub similarity: f32,
    pub score: f64,
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Similarity scaled to a percentage, rounded to one decimal, clamped to [0, 100].
pub fn similarity_to_percent(similarity: f32) -> f64 {
    let percent = round1(f64::from(similarity) * 100.0);
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scores `candidates` against `query`, drops those strictly below `threshold`,
/// sorts by similarity descending (ties keep candidate order) and keeps `top_n`.
///
/// Both operands are unit vectors, so the dot product is the cosine similarity.
pub fn rank(
    index: &EmbeddingIndex,
    query: &[f32],
    candidates: &[usize],
    top_n: usize,
    threshold: f32,
) -> Vec<RankedCandidate> {
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .filter(|&&row| row < index.len())
        .map(|&row| (row, dot(index.row(row), query)))
        .filter(|(_, similarity)| *similarity >= threshold)
        .collect();

    // Vec::sort_by is stable, which preserves candidate order on ties.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_n);

    scored
        .into_iter()
        .map(|(row, similarity)| RankedCandidate {
            row,
            similarity,
            score: similarity_to_percent(similarity),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::catalog::JobRecord;

    fn index(rows: Vec<Vec<f32>>) -> EmbeddingIndex {
        let metas = (0..rows.len())
            .map(|i| JobRecord::fixture(&format!("job_{i}"), "t", "", ""))
            .collect();
        EmbeddingIndex::assemble("fp".to_string(), rows, metas).unwrap()
    }

    fn sample() -> EmbeddingIndex {
        index(vec![
            vec![1.0, 0.0],
            vec![0.6, 0.8],
            vec![0.0, 1.0],
            vec![0.8, 0.6],
            vec![-1.0, 0.0],
        ])
    }

    #[test]
    fn test_sorted_descending() {
        let ranked = rank(&sample(), &[1.0, 0.0], &[0, 1, 2, 3, 4], 10, -1.0);
        let rows: Vec<usize> = ranked.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 3, 1, 2, 4]);
        assert!(ranked.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_threshold_discards_below() {
        let ranked = rank(&sample(), &[1.0, 0.0], &[0, 1, 2, 3, 4], 10, 0.7);
        let rows: Vec<usize> = ranked.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 3]);
        assert!(ranked.iter().all(|r| r.similarity >= 0.7));
    }

    #[test]
    fn test_top_n_caps_results() {
        let ranked = rank(&sample(), &[1.0, 0.0], &[0, 1, 2, 3, 4], 2, -1.0);
        assert_eq!(ranked.len(), 2);
        assert!(rank(&sample(), &[1.0, 0.0], &[0, 1], 0, -1.0).is_empty());
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let idx = index(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]]);
        let ranked = rank(&idx, &[1.0, 0.0], &[0, 1, 2], 5, 0.0);
        let rows: Vec<usize> = ranked.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 2, 0]);

        let ranked = rank(&idx, &[1.0, 0.0], &[2, 1], 5, 0.0);
        let rows: Vec<usize> = ranked.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![2, 1]);
    }

    #[test]
    fn test_only_candidates_are_scored() {
        let ranked = rank(&sample(), &[1.0, 0.0], &[2, 4], 10, -1.0);
        let rows: Vec<usize> = ranked.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![2, 4]);
    }

    #[test]
    fn test_empty_candidates_is_empty() {
        assert!(rank(&sample(), &[1.0, 0.0], &[], 5, DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn test_nothing_clears_threshold_is_empty() {
        assert!(rank(&sample(), &[0.0, -1.0], &[0, 1, 2, 3], 5, DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn test_percent_scaling() {
        assert_eq!(similarity_to_percent(0.87654), 87.7);
        assert_eq!(similarity_to_percent(1.2), 100.0);
        assert_eq!(similarity_to_percent(-0.4), 0.0);
        assert_eq!(similarity_to_percent(f32::NAN), 0.0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(66.66), 66.7);
    }
}
