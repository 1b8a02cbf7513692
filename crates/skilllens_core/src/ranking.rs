//! crates/skilllens_core/src/ranking.rs
//!
//! Read-only helpers for presenting evaluation results: ordering, score tiers
//! and star ratings.

use crate::domain::{clamp_score, EvaluationResult, MAX_SCORE};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Score,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// Returns the results ordered for display. Ties keep their original order.
pub fn sort_results(
    results: &[EvaluationResult],
    key: SortKey,
    order: SortOrder,
) -> Vec<&EvaluationResult> {
    let mut sorted: Vec<&EvaluationResult> = results.iter().collect();
    sorted.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Score => a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal),
            SortKey::Name => a
                .candidate_name
                .to_lowercase()
                .cmp(&b.candidate_name.to_lowercase()),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}

pub fn find_candidate<'a>(
    results: &'a [EvaluationResult],
    candidate_id: &str,
) -> Option<&'a EvaluationResult> {
    results.iter().find(|r| r.candidate_id == candidate_id)
}

/// Colour band of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    High,
    Medium,
    Low,
}

impl ScoreTier {
    pub fn from_score(score: f32) -> Self {
        if score >= 4.0 {
            ScoreTier::High
        } else if score >= 3.0 {
            ScoreTier::Medium
        } else {
            ScoreTier::Low
        }
    }
}

/// Five-star rendering of a 0–5 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarRating {
    pub full: u8,
    pub half: bool,
    pub empty: u8,
}

impl StarRating {
    pub fn from_score(score: f32) -> Self {
        let score = clamp_score(score);
        let full = score.floor() as u8;
        let half = full < MAX_SCORE as u8 && score.fract() >= 0.5;
        let empty = MAX_SCORE as u8 - full - u8::from(half);
        Self { full, half, empty }
    }
}
