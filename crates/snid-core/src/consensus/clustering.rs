use std::collections::BTreeMap;

use crate::domain::MatchRecord;

/// Whether two redshift estimates are close enough to share a cluster.
///
/// The gap may not exceed the fixed tolerance or `sigma_multiplier`
/// combined standard errors, whichever is larger.
pub fn redshifts_agree(
    lhs: &MatchRecord,
    rhs: &MatchRecord,
    tolerance: f64,
    sigma_multiplier: f64,
) -> bool {
    let combined = (lhs.redshift_error.powi(2) + rhs.redshift_error.powi(2)).sqrt();
    let limit = tolerance.max(sigma_multiplier * combined);
    (lhs.redshift - rhs.redshift).abs() <= limit
}

/// Single-linkage chains over the records sorted by redshift.
///
/// Returns index lists into `records`; each list is in ascending redshift
/// order and the lists themselves are ordered by their lowest redshift.
/// Equal redshifts keep their input order, so callers that want a
/// permutation-independent result must pass records in a canonical order.
pub fn cluster_by_redshift(
    records: &[MatchRecord],
    tolerance: f64,
    sigma_multiplier: f64,
) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|lhs, rhs| records[*lhs].redshift.total_cmp(&records[*rhs].redshift));

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for index in order {
        let joins = clusters
            .last()
            .and_then(|cluster| cluster.last())
            .is_some_and(|previous| {
                redshifts_agree(&records[*previous], &records[index], tolerance, sigma_multiplier)
            });
        match clusters.last_mut() {
            Some(cluster) if joins => cluster.push(index),
            _ => clusters.push(vec![index]),
        }
    }
    clusters
}

/// Splits one redshift cluster by type label. Indices inside each part
/// are ascending, i.e. they follow the caller's record order.
pub fn split_by_type(records: &[MatchRecord], cluster: &[usize]) -> BTreeMap<String, Vec<usize>> {
    let mut parts: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for &index in cluster {
        parts
            .entry(records[index].type_name.clone())
            .or_default()
            .push(index);
    }
    for indices in parts.values_mut() {
        indices.sort_unstable();
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::{cluster_by_redshift, redshifts_agree, split_by_type};
    use crate::domain::{MatchRecord, MatchStatus};

    fn record(id: &str, type_name: &str, redshift: f64, error: f64) -> MatchRecord {
        MatchRecord {
            template_id: id.to_string(),
            type_name: type_name.to_string(),
            subtype: String::new(),
            age: None,
            redshift,
            redshift_error: error,
            quality: 8.0,
            r_value: 8.0,
            overlap: 1.0,
            peak_height: 0.7,
            peak_width: 5.0,
            lag: 0.0,
            peak_rank: 0,
            status: MatchStatus::Valid,
        }
    }

    #[test]
    fn agreement_uses_the_wider_of_tolerance_and_errors() {
        let lhs = record("a", "Ia", 0.10, 0.001);
        let near = record("b", "Ia", 0.115, 0.001);
        let far = record("c", "Ia", 0.15, 0.001);
        assert!(redshifts_agree(&lhs, &near, 0.02, 3.0));
        assert!(!redshifts_agree(&lhs, &far, 0.02, 3.0));

        let uncertain = record("d", "Ia", 0.15, 0.02);
        assert!(redshifts_agree(&lhs, &uncertain, 0.02, 3.0));
    }

    #[test]
    fn chains_link_neighbours_transitively() {
        let records = vec![
            record("a", "Ia", 0.30, 0.001),
            record("b", "Ia", 0.10, 0.001),
            record("c", "II", 0.115, 0.001),
            record("d", "Ia", 0.13, 0.001),
        ];
        let clusters = cluster_by_redshift(&records, 0.02, 3.0);
        assert_eq!(clusters, vec![vec![1, 2, 3], vec![0]]);
    }

    #[test]
    fn clusters_split_by_type_label() {
        let records = vec![
            record("a", "Ia", 0.10, 0.001),
            record("b", "II", 0.11, 0.001),
            record("c", "Ia", 0.105, 0.001),
        ];
        let parts = split_by_type(&records, &[0, 2, 1]);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts["Ia"], vec![0, 2]);
        assert_eq!(parts["II"], vec![1]);
    }

    #[test]
    fn empty_input_has_no_clusters() {
        assert!(cluster_by_redshift(&[], 0.02, 3.0).is_empty());
    }
}
