// Representative selection
// Spreads the output budget across clusters and picks the most typical members

use crate::chops::cluster::Clustering;

/// One segment chosen for output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Segment index
    pub segment: usize,

    /// 1-based typicality rank within its cluster (1 = closest to centroid)
    pub rank: usize,
}

/// Choose at most `max_chops` segments
///
/// With a budget of at least one per cluster, every cluster gets one and the
/// rest is shared in proportion to cluster size (largest remainder, capped at
/// cluster size). With a smaller budget, the largest clusters get one each.
/// Members are ranked by distance to their centroid, earlier segment first on
/// ties. The result is in segment (chronological) order.
pub fn select_representatives(clustering: &Clustering, max_chops: usize) -> Vec<Selection> {
    let sizes: Vec<usize> = clustering.clusters.iter().map(|c| c.size()).collect();
    let allocation = allocate_budget(&sizes, max_chops);

    let mut selected = Vec::new();
    for (cluster, &count) in clustering.clusters.iter().zip(&allocation) {
        if count == 0 {
            continue;
        }

        let mut ranked: Vec<(f64, usize)> = cluster
            .members
            .iter()
            .map(|&m| (clustering.distance_to_centroid(m), m))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        selected.extend(
            ranked
                .into_iter()
                .take(count)
                .enumerate()
                .map(|(i, (_, segment))| Selection {
                    segment,
                    rank: i + 1,
                }),
        );
    }

    selected.sort_by_key(|s| s.segment);

    log::debug!(
        "Selected {} of {} segments across {} clusters (budget {})",
        selected.len(),
        clustering.labels.len(),
        allocation.iter().filter(|&&c| c > 0).count(),
        max_chops
    );

    selected
}

/// Number of representatives per cluster for a budget
pub fn allocate_budget(sizes: &[usize], budget: usize) -> Vec<usize> {
    let k = sizes.len();
    let total: usize = sizes.iter().sum();
    let mut allocation = vec![0usize; k];

    if k == 0 || budget == 0 {
        return allocation;
    }

    if budget < k {
        // Largest clusters first, lower label on ties
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));
        for &c in order.iter().take(budget) {
            allocation[c] = 1;
        }
        return allocation;
    }

    let target = budget.min(total);
    let quota: Vec<f64> = sizes
        .iter()
        .map(|&s| target as f64 * s as f64 / total as f64)
        .collect();

    for c in 0..k {
        allocation[c] = (quota[c].floor() as usize).max(1).min(sizes[c]);
    }

    let mut assigned: usize = allocation.iter().sum();

    while assigned < target {
        // Largest unmet remainder, then larger cluster, then lower label
        let next = (0..k)
            .filter(|&c| allocation[c] < sizes[c])
            .max_by(|&a, &b| {
                let ra = quota[a] - allocation[a] as f64;
                let rb = quota[b] - allocation[b] as f64;
                ra.total_cmp(&rb)
                    .then(sizes[a].cmp(&sizes[b]))
                    .then(b.cmp(&a))
            });
        match next {
            Some(c) => {
                allocation[c] += 1;
                assigned += 1;
            }
            None => break,
        }
    }

    while assigned > target {
        // Floors can overshoot; take back from the most over-served cluster
        let next = (0..k)
            .filter(|&c| allocation[c] > 1)
            .min_by(|&a, &b| {
                let ra = quota[a] - allocation[a] as f64;
                let rb = quota[b] - allocation[b] as f64;
                ra.total_cmp(&rb)
                    .then(sizes[a].cmp(&sizes[b]))
                    .then(b.cmp(&a))
            });
        match next {
            Some(c) => {
                allocation[c] -= 1;
                assigned -= 1;
            }
            None => break,
        }
    }

    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chops::cluster::cluster_segments;
    use crate::chops::types::{FeatureVector, FEATURE_DIMS};

    fn vector(values: [f64; FEATURE_DIMS]) -> FeatureVector {
        FeatureVector::new(values)
    }

    /// Three groups of sizes 3, 2 and 1
    fn clustered() -> Clustering {
        let vectors = vec![
            vector([0.10, 500.0, 0.05, 0.02, 0.6, 0.05, -30.0, 2.0, 5.0, 1.0]),
            vector([0.80, 6000.0, 0.60, 0.40, 0.0, 0.80, -15.0, -1.0, 2.0, 0.0]),
            vector([0.11, 520.0, 0.05, 0.02, 0.6, 0.05, -29.8, 2.1, 5.0, 1.1]),
            vector([0.79, 6100.0, 0.62, 0.41, 0.0, 0.82, -15.1, -1.1, 2.1, 0.0]),
            vector([0.09, 480.0, 0.04, 0.03, 0.6, 0.04, -30.2, 1.9, 4.9, 0.9]),
            vector([0.40, 2500.0, 0.30, 0.20, 0.3, 0.40, -22.0, 0.5, 3.5, 0.5]),
        ];
        cluster_segments(&vectors, 3, 100)
    }

    #[test]
    fn test_budget_below_cluster_count_takes_largest_clusters() {
        let clustering = clustered();
        let selected = select_representatives(&clustering, 2);

        assert_eq!(selected.len(), 2);
        let labels: Vec<usize> = selected
            .iter()
            .map(|s| clustering.labels[s.segment])
            .collect();
        assert_ne!(labels[0], labels[1]);
        // The singleton outlier is never picked
        assert!(selected.iter().all(|s| s.segment != 5));
    }

    #[test]
    fn test_floor_of_one_per_cluster() {
        let clustering = clustered();
        let selected = select_representatives(&clustering, 3);

        assert_eq!(selected.len(), 3);
        let mut labels: Vec<usize> = selected
            .iter()
            .map(|s| clustering.labels[s.segment])
            .collect();
        labels.sort();
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn test_budget_larger_than_segments_returns_all() {
        let clustering = clustered();
        let selected = select_representatives(&clustering, 16);
        let segments: Vec<usize> = selected.iter().map(|s| s.segment).collect();
        assert_eq!(segments, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_output_is_chronological() {
        let clustering = clustered();
        for budget in 1..=6 {
            let selected = select_representatives(&clustering, budget);
            assert!(selected.windows(2).all(|w| w[0].segment < w[1].segment));
            assert!(selected.len() <= budget);
        }
    }

    #[test]
    fn test_ranks_start_at_one_per_cluster() {
        let clustering = clustered();
        let selected = select_representatives(&clustering, 6);
        let firsts = selected.iter().filter(|s| s.rank == 1).count();
        assert_eq!(firsts, clustering.clusters_used());
    }

    #[test]
    fn test_allocation_is_proportional() {
        assert_eq!(allocate_budget(&[6, 3, 1], 5), vec![3, 1, 1]);
        assert_eq!(allocate_budget(&[5, 5], 4), vec![2, 2]);
        assert_eq!(allocate_budget(&[4, 4, 2], 5), vec![2, 2, 1]);
    }

    #[test]
    fn test_allocation_respects_budget_and_sizes() {
        let sizes = [7, 1, 1, 1, 2, 9];
        for budget in 1..=30 {
            let allocation = allocate_budget(&sizes, budget);
            let total: usize = allocation.iter().sum();
            assert_eq!(total, budget.min(sizes.iter().sum()));
            for (a, s) in allocation.iter().zip(sizes.iter()) {
                assert!(a <= s);
                if budget >= sizes.len() {
                    assert!(*a >= 1);
                }
            }
        }
    }

    #[test]
    fn test_allocation_ties_go_to_lower_label() {
        assert_eq!(allocate_budget(&[2, 2, 2], 1), vec![1, 0, 0]);
        assert_eq!(allocate_budget(&[1, 3, 3], 2), vec![0, 1, 1]);
    }
}
