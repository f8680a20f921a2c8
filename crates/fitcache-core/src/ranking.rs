//! Ranking of scored predictions with seeded, reproducible tie-breaking.
//!
//! Scores sort descending. Positions with equal scores are ordered by a
//! per-position key derived from the seed:
//! `u64::from_be_bytes(SHA-256(position_be ‖ seed_be)[..8])`, ascending, with
//! the position itself as the last resort. NaN scores sort after every number.

use std::cmp::Ordering;

use sha2::{Digest, Sha256};

use crate::domain::error::{FitcacheError, Result};

/// Seed-derived tie-break key for `position`.
pub fn tie_break_key(position: usize, seed: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update((position as u64).to_be_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Positions of `scores` in ranked order.
pub fn rank_order(scores: &[f64], seed: u64) -> Vec<usize> {
    let mut keyed: Vec<(usize, u64)> = (0..scores.len())
        .map(|i| (i, tie_break_key(i, seed)))
        .collect();
    keyed.sort_by(|(i, ki), (j, kj)| {
        descending_nan_last(scores[*i], scores[*j])
            .then(ki.cmp(kj))
            .then(i.cmp(j))
    });
    keyed.into_iter().map(|(i, _)| i).collect()
}

/// Apply one ranking permutation to scores and labels alike.
pub fn rank<L: Clone>(scores: &[f64], labels: &[L], seed: u64) -> Result<(Vec<f64>, Vec<L>)> {
    if scores.len() != labels.len() {
        return Err(FitcacheError::Configuration(format!(
            "cannot rank {} scores against {} labels",
            scores.len(),
            labels.len()
        )));
    }
    let order = rank_order(scores, seed);
    Ok((
        order.iter().map(|&i| scores[i]).collect(),
        order.iter().map(|&i| labels[i].clone()).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORES: [f64; 4] = [0.5, 0.4, 0.6, 0.5];
    const LABELS: [bool; 4] = [false, false, true, true];

    #[test]
    fn seed_8_orders_tied_positive_first() {
        let (scores, labels) = rank(&SCORES, &LABELS, 8).unwrap();
        assert_eq!(scores, vec![0.6, 0.5, 0.5, 0.4]);
        assert_eq!(labels, vec![true, true, false, false]);
    }

    #[test]
    fn seed_12345_orders_tied_negative_first() {
        let (scores, labels) = rank(&SCORES, &LABELS, 12345).unwrap();
        assert_eq!(scores, vec![0.6, 0.5, 0.5, 0.4]);
        assert_eq!(labels, vec![true, false, true, false]);
    }

    #[test]
    fn same_inputs_same_output() {
        let scores: Vec<f64> = (0..50).map(|i| (i % 5) as f64 / 5.0).collect();
        assert_eq!(rank_order(&scores, 99), rank_order(&scores, 99));
    }

    #[test]
    fn pairs_stay_together() {
        let scores: Vec<f64> = (0..40).map(|i| ((i * 7) % 6) as f64).collect();
        let labels: Vec<usize> = (0..40).collect();
        let (ranked_scores, ranked_labels) = rank(&scores, &labels, 3).unwrap();
        for (score, original) in ranked_scores.iter().zip(&ranked_labels) {
            assert_eq!(*score, scores[*original]);
        }
        assert!(ranked_scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn nan_scores_sort_last() {
        let order = rank_order(&[f64::NAN, 0.1, f64::NAN, 0.9], 1);
        assert_eq!(&order[..2], &[3, 1]);
        assert!(order[2..].contains(&0) && order[2..].contains(&2));
    }

    #[test]
    fn mismatched_lengths_rejected() {
        assert!(matches!(
            rank(&[0.1, 0.2], &[true], 0),
            Err(FitcacheError::Configuration(_))
        ));
    }

    #[test]
    fn empty_input_ranks_to_empty() {
        let (scores, labels) = rank::<bool>(&[], &[], 0).unwrap();
        assert!(scores.is_empty() && labels.is_empty());
    }
}
