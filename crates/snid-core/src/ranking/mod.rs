//! Quality thresholds and deterministic ordering of match records.

use std::cmp::Ordering;

use crate::common::config::FilterConfig;
use crate::domain::MatchRecord;

/// Whether `record` survives the thresholds: valid status, quality and
/// overlap at or above their minimums, and a redshift inside the plausible
/// range.
pub fn passes(record: &MatchRecord, thresholds: &FilterConfig) -> bool {
    record.status.is_valid()
        && record.quality.is_finite()
        && record.redshift.is_finite()
        && record.quality >= thresholds.min_quality
        && record.overlap >= thresholds.min_overlap
        && (thresholds.z_min..=thresholds.z_max).contains(&record.redshift)
}

/// Descending quality, then ascending redshift error, template id and peak
/// rank.
pub fn compare_matches(lhs: &MatchRecord, rhs: &MatchRecord) -> Ordering {
    rhs.quality
        .total_cmp(&lhs.quality)
        .then_with(|| lhs.redshift_error.total_cmp(&rhs.redshift_error))
        .then_with(|| lhs.template_id.cmp(&rhs.template_id))
        .then_with(|| lhs.peak_rank.cmp(&rhs.peak_rank))
}

/// Survivors of [`passes`], sorted by [`compare_matches`]. Idempotent; the
/// input is left untouched.
pub fn rank_matches(records: &[MatchRecord], thresholds: &FilterConfig) -> Vec<MatchRecord> {
    let mut ranked: Vec<MatchRecord> = records
        .iter()
        .filter(|record| passes(record, thresholds))
        .cloned()
        .collect();
    ranked.sort_by(compare_matches);
    ranked
}

/// At most `limit` leading records, or all of them without a limit.
pub fn truncate(ranked: &[MatchRecord], limit: Option<usize>) -> Vec<MatchRecord> {
    let len = limit.map_or(ranked.len(), |limit| limit.min(ranked.len()));
    ranked[..len].to_vec()
}

#[cfg(test)]
mod tests {
    use super::{passes, rank_matches, truncate};
    use crate::common::config::FilterConfig;
    use crate::domain::{MatchRecord, MatchStatus};

    fn record(id: &str, quality: f64, redshift: f64, error: f64) -> MatchRecord {
        MatchRecord {
            template_id: id.to_string(),
            type_name: "Ia".to_string(),
            subtype: "Ia-norm".to_string(),
            age: Some(0.0),
            redshift,
            redshift_error: error,
            quality,
            r_value: quality,
            overlap: 1.0,
            peak_height: 0.8,
            peak_width: 6.0,
            lag: 10.0,
            peak_rank: 0,
            status: MatchStatus::Valid,
        }
    }

    #[test]
    fn thresholds_drop_weak_invalid_and_implausible_records() {
        let thresholds = FilterConfig::default();
        assert!(passes(&record("a", 8.0, 0.05, 0.001), &thresholds));
        assert!(!passes(&record("b", 4.0, 0.05, 0.001), &thresholds));
        assert!(!passes(&record("c", 8.0, 1.5, 0.001), &thresholds));

        let mut low_overlap = record("d", 8.0, 0.05, 0.001);
        low_overlap.overlap = 0.2;
        assert!(!passes(&low_overlap, &thresholds));

        let mut flagged = record("e", 8.0, 0.05, 0.001);
        flagged.status = MatchStatus::InsufficientOverlap;
        assert!(!passes(&flagged, &thresholds));

        assert!(!passes(&record("f", f64::NAN, 0.05, 0.001), &thresholds));
    }

    #[test]
    fn ordering_breaks_ties_deterministically() {
        let mut second_peak = record("a", 9.0, 0.1, 0.002);
        second_peak.peak_rank = 1;
        let records = vec![
            record("b", 9.0, 0.1, 0.002),
            second_peak,
            record("a", 9.0, 0.1, 0.002),
            record("c", 9.0, 0.1, 0.001),
            record("d", 12.0, 0.1, 0.005),
        ];
        let ranked = rank_matches(&records, &FilterConfig::default());
        let order: Vec<(&str, usize)> = ranked
            .iter()
            .map(|record| (record.template_id.as_str(), record.peak_rank))
            .collect();
        assert_eq!(order, vec![("d", 0), ("c", 0), ("a", 0), ("a", 1), ("b", 0)]);
    }

    #[test]
    fn ranking_is_idempotent() {
        let records: Vec<MatchRecord> = (0..20)
            .map(|index| {
                record(
                    &format!("t{index:02}"),
                    3.0 + (index * 7 % 11) as f64,
                    0.01 * index as f64,
                    0.001 * (index % 3 + 1) as f64,
                )
            })
            .collect();
        let thresholds = FilterConfig::default();
        let once = rank_matches(&records, &thresholds);
        let twice = rank_matches(&once, &thresholds);
        assert_eq!(once, twice);
        assert!(once.len() < records.len());
    }

    #[test]
    fn truncation_only_limits_length() {
        let ranked = vec![record("a", 9.0, 0.1, 0.001), record("b", 8.0, 0.1, 0.001)];
        assert_eq!(truncate(&ranked, None).len(), 2);
        assert_eq!(truncate(&ranked, Some(1))[0].template_id, "a");
        assert_eq!(truncate(&ranked, Some(5)).len(), 2);
    }
}
