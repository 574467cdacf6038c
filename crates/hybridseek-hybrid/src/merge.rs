//! Score normalization and fusion of the vector and keyword result lists.
//!
//! Each list is scaled by its own maximum before the union, so the best hit
//! of either mode scores `1.0`. The two raw scales (bounded similarity and
//! unbounded BM25) are never compared directly.

use std::cmp::Ordering;
use std::collections::HashMap;

use hybridseek_core::types::{ChunkIndex, NormalizedHit, ScoredHit};

/// Divide every raw score by the list maximum.
///
/// An empty list stays empty. When the maximum is not positive every hit
/// scores `0.0`. Results are clamped to `[0, 1]`, so negative raw scores
/// floor at zero.
pub fn normalize(hits: &[ScoredHit]) -> Vec<NormalizedHit> {
    let max = hits.iter().map(|h| h.raw_score).filter(|s| s.is_finite()).fold(f32::NEG_INFINITY, f32::max);
    hits.iter()
        .map(|h| {
            let score = if max > 0.0 && h.raw_score.is_finite() { (h.raw_score / max).clamp(0.0, 1.0) } else { 0.0 };
            NormalizedHit { index: h.index, text: h.text.clone(), score }
        })
        .collect()
}

/// Best first; equal scores fall back to ascending chunk index.
pub fn rank_order(a: &NormalizedHit, b: &NormalizedHit) -> Ordering {
    b.score.total_cmp(&a.score).then(a.index.cmp(&b.index))
}

/// Normalize both lists, keep the higher score per chunk, rank and cut to `k`.
pub fn merge(vector: &[ScoredHit], keyword: &[ScoredHit], k: usize) -> Vec<NormalizedHit> {
    let mut by_index: HashMap<ChunkIndex, NormalizedHit> = HashMap::new();
    for hit in normalize(vector).into_iter().chain(normalize(keyword)) {
        by_index
            .entry(hit.index)
            .and_modify(|old| {
                if hit.score > old.score {
                    *old = hit.clone();
                }
            })
            .or_insert(hit);
    }
    let mut merged: Vec<NormalizedHit> = by_index.into_values().collect();
    merged.sort_by(rank_order);
    merged.truncate(k);
    merged
}

/// Single-mode ranking with the same normalization as [`merge`].
pub fn rank_single(hits: &[ScoredHit], k: usize) -> Vec<NormalizedHit> {
    merge(hits, &[], k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybridseek_core::types::SourceKind;

    fn hit(index: ChunkIndex, raw_score: f32, source: SourceKind) -> ScoredHit {
        ScoredHit { index, text: format!("chunk {index}"), raw_score, source }
    }

    fn vector(pairs: &[(ChunkIndex, f32)]) -> Vec<ScoredHit> {
        pairs.iter().map(|&(i, s)| hit(i, s, SourceKind::Vector)).collect()
    }

    fn keyword(pairs: &[(ChunkIndex, f32)]) -> Vec<ScoredHit> {
        pairs.iter().map(|&(i, s)| hit(i, s, SourceKind::Keyword)).collect()
    }

    fn pairs(hits: &[NormalizedHit]) -> Vec<(ChunkIndex, f32)> {
        hits.iter().map(|h| (h.index, h.score)).collect()
    }

    #[test]
    fn worked_example_from_both_modes() {
        let merged = merge(&vector(&[(3, 0.8), (5, 0.4)]), &keyword(&[(5, 10.0), (7, 5.0)]), 2);
        assert_eq!(pairs(&merged), vec![(3, 1.0), (5, 1.0)]);
        assert_eq!(merged[0].text, "chunk 3");
    }

    #[test]
    fn both_lists_empty_is_an_empty_result() {
        assert!(merge(&[], &[], 4).is_empty());
    }

    #[test]
    fn one_empty_list_contributes_nothing() {
        let merged = merge(&[], &keyword(&[(1, 4.0), (2, 2.0)]), 4);
        assert_eq!(pairs(&merged), vec![(1, 1.0), (2, 0.5)]);
    }

    #[test]
    fn all_zero_list_normalizes_to_zero() {
        let normalized = normalize(&keyword(&[(1, 0.0), (2, 0.0)]));
        assert!(normalized.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn negative_scores_floor_at_zero() {
        let normalized = normalize(&vector(&[(1, 0.5), (2, -0.5)]));
        assert_eq!(pairs(&normalized), vec![(1, 1.0), (2, 0.0)]);
        assert!(normalize(&vector(&[(1, -1.0)])).iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn duplicate_chunk_keeps_maximum_and_appears_once() {
        let merged = merge(&vector(&[(1, 1.0), (2, 0.3)]), &keyword(&[(2, 8.0), (1, 2.0)]), 10);
        assert_eq!(pairs(&merged), vec![(1, 1.0), (2, 1.0)]);
    }

    #[test]
    fn result_never_exceeds_k_or_the_union() {
        let v = vector(&[(1, 0.9), (2, 0.8), (3, 0.7)]);
        let kw = keyword(&[(3, 3.0), (4, 1.0)]);
        assert_eq!(merge(&v, &kw, 2).len(), 2);
        assert_eq!(merge(&v, &kw, 50).len(), 4);
        for h in merge(&v, &kw, 50) {
            assert!((0.0..=1.0).contains(&h.score));
        }
    }

    #[test]
    fn ties_break_by_ascending_index_regardless_of_input_order() {
        let a = merge(&vector(&[(9, 1.0), (4, 1.0)]), &keyword(&[(6, 2.0)]), 3);
        let b = merge(&vector(&[(4, 1.0), (9, 1.0)]), &keyword(&[(6, 2.0)]), 3);
        assert_eq!(pairs(&a), vec![(4, 1.0), (6, 1.0), (9, 1.0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn non_finite_scores_do_not_poison_the_maximum() {
        let normalized = normalize(&keyword(&[(1, f32::NAN), (2, 2.0), (3, 1.0)]));
        assert_eq!(pairs(&normalized)[1..], [(2, 1.0), (3, 0.5)]);
        assert_eq!(normalized[0].score, 0.0);
    }
}
