//! Consensus classification over ranked match records.
//!
//! Records are chained into redshift clusters regardless of type, each
//! cluster is split by type label, and every (type, cluster) group gets a
//! score from its strongest members. The best group decides the type; its
//! members supply the redshift, age and subtype estimates.

pub mod clustering;
pub mod scoring;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::common::config::ConsensusConfig;
use crate::domain::{ClassificationResult, ConfidenceLevel, GroupSummary, MatchRecord, QualityLevel};
use crate::numerics::{stable_sum, weighted_median};
use crate::ranking::compare_matches;

use clustering::{cluster_by_redshift, split_by_type};
use scoring::{combine_redshifts, confidence_level, group_score, quality_level, span_quality};

/// Records sharing a type label and a redshift cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchGroup {
    pub type_name: String,
    /// Members in ranking order.
    pub members: Vec<MatchRecord>,
    pub score: f64,
    pub redshift: f64,
    pub redshift_error: f64,
}

impl MatchGroup {
    pub fn best_quality(&self) -> f64 {
        self.members
            .iter()
            .map(|record| record.quality)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn redshift_span(&self) -> f64 {
        let (low, high) = self
            .members
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), record| {
                (low.min(record.redshift), high.max(record.redshift))
            });
        if high >= low { high - low } else { 0.0 }
    }

    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            type_name: self.type_name.clone(),
            redshift: self.redshift,
            score: self.score,
            member_count: self.members.len(),
        }
    }
}

/// Higher score first; ties go to the group with the stronger best member,
/// then to the type name and lower redshift.
pub fn compare_groups(lhs: &MatchGroup, rhs: &MatchGroup) -> Ordering {
    rhs.score
        .total_cmp(&lhs.score)
        .then_with(|| rhs.best_quality().total_cmp(&lhs.best_quality()))
        .then_with(|| lhs.type_name.cmp(&rhs.type_name))
        .then_with(|| lhs.redshift.total_cmp(&rhs.redshift))
}

/// All (type, redshift cluster) groups, best first.
pub fn build_groups(records: &[MatchRecord], config: &ConsensusConfig) -> Vec<MatchGroup> {
    let mut canonical = records.to_vec();
    canonical.sort_by(compare_matches);

    let mut groups = Vec::new();
    for cluster in cluster_by_redshift(
        &canonical,
        config.redshift_tolerance,
        config.sigma_multiplier,
    ) {
        for (type_name, indices) in split_by_type(&canonical, &cluster) {
            let members: Vec<&MatchRecord> = indices.iter().map(|index| &canonical[*index]).collect();
            let Some((redshift, redshift_error)) = combine_redshifts(&members) else {
                continue;
            };
            let qualities: Vec<f64> = members.iter().map(|record| record.quality).collect();
            groups.push(MatchGroup {
                type_name,
                score: group_score(&qualities, config.top_n, config.small_cluster_penalty),
                members: members.into_iter().cloned().collect(),
                redshift,
                redshift_error,
            });
        }
    }

    groups.sort_by(compare_groups);
    groups
}

/// Quality-weighted median over members with a known age, falling back to
/// the best member's age when the weights are unusable.
pub fn consensus_age(members: &[MatchRecord]) -> Option<f64> {
    let (ages, weights): (Vec<f64>, Vec<f64>) = members
        .iter()
        .filter_map(|record| record.age.map(|age| (age, record.quality)))
        .unzip();
    if ages.is_empty() {
        return None;
    }
    weighted_median(&ages, &weights).or_else(|| ages.first().copied())
}

/// Best subtype and its share of the subtype score total.
pub fn consensus_subtype(members: &[MatchRecord], config: &ConsensusConfig) -> (Option<String>, f64) {
    let mut by_subtype: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in members.iter().filter(|record| !record.subtype.is_empty()) {
        by_subtype
            .entry(record.subtype.as_str())
            .or_default()
            .push(record.quality);
    }
    if by_subtype.is_empty() || config.top_n == 0 {
        return (None, 0.0);
    }

    let scores: Vec<(&str, f64)> = by_subtype
        .iter()
        .map(|(subtype, qualities)| {
            let share = qualities.len().min(config.top_n) as f64 / config.top_n as f64;
            (*subtype, group_score(qualities, config.top_n, 1.0) * share)
        })
        .collect();

    let total = stable_sum(&scores.iter().map(|(_, score)| *score).collect::<Vec<_>>());
    let best = scores
        .iter()
        .fold(None::<&(&str, f64)>, |best, candidate| match best {
            Some(current) if current.1 >= candidate.1 => Some(current),
            _ => Some(candidate),
        });

    match best {
        Some((subtype, score)) if total > 0.0 => (Some((*subtype).to_string()), score / total),
        Some((subtype, _)) => (Some((*subtype).to_string()), 0.0),
        None => (None, 0.0),
    }
}

/// Final classification of ranked, filtered matches. `None` when there is
/// nothing to classify.
///
/// The runner-up is the strongest group of a different type; several
/// clusters of the winning type do not count against it.
pub fn classify_matches(
    records: &[MatchRecord],
    config: &ConsensusConfig,
) -> Option<ClassificationResult> {
    let groups = build_groups(records, config);
    let winner = groups.first()?;
    let runner_up = groups
        .iter()
        .skip(1)
        .find(|group| group.type_name != winner.type_name);

    let total_score = stable_sum(&groups.iter().map(|group| group.score).collect::<Vec<_>>());
    let type_confidence = if total_score > 0.0 {
        winner.score / total_score
    } else {
        0.0
    };

    let confidence = confidence_level(winner.score, runner_up.map(|group| group.score));
    let quality = quality_level(winner.score, config);
    let redshift_span = winner.redshift_span();
    let (best_subtype, subtype_confidence) = consensus_subtype(&winner.members, config);

    Some(ClassificationResult {
        best_type: winner.type_name.clone(),
        type_confidence,
        confidence_level: confidence,
        best_subtype,
        subtype_confidence,
        redshift: winner.redshift,
        redshift_error: winner.redshift_error,
        age: consensus_age(&winner.members),
        group_score: winner.score,
        quality_level: quality,
        redshift_span,
        redshift_span_quality: span_quality(redshift_span, config.redshift_tolerance),
        low_confidence: quality == QualityLevel::Low
            || matches!(confidence, ConfidenceLevel::Low | ConfidenceLevel::VeryLow),
        members: winner.members.clone(),
        runner_up: runner_up.map(MatchGroup::summary),
    })
}
