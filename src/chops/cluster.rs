// Segment clustering
// Deterministic k-means over standardized feature vectors with farthest-point seeding

use crate::chops::types::{Cluster, FeatureVector, FEATURE_DIMS};

type Point = [f64; FEATURE_DIMS];

/// Result of clustering one run's segments
#[derive(Debug, Clone)]
pub struct Clustering {
    /// Cluster label per segment index, in [0, clusters.len())
    pub labels: Vec<usize>,

    /// Non-empty clusters, label = position; labels follow first appearance
    /// in segment order
    pub clusters: Vec<Cluster>,

    /// Cluster means in standardized feature space, indexed by label
    pub centroids: Vec<Point>,

    /// Standardized feature vectors, indexed by segment
    pub points: Vec<Point>,

    /// Refinement passes run before assignments stopped changing
    pub iterations: usize,
}

impl Clustering {
    pub fn clusters_used(&self) -> usize {
        self.clusters.len()
    }

    /// Euclidean distance from a segment to its own cluster's centroid
    pub fn distance_to_centroid(&self, segment: usize) -> f64 {
        let label = self.labels[segment];
        squared_distance(&self.points[segment], &self.centroids[label]).sqrt()
    }
}

/// Partition feature vectors into at most `n_clusters` groups
///
/// Each dimension is standardized with the run's own mean and standard
/// deviation. Seeds are chosen by the farthest-point rule starting from the
/// vector nearest the mean, so identical input always yields identical
/// clusters. Refinement stops when assignments are stable or after
/// `max_iterations` passes. Clusters that end up empty are dropped and the
/// remaining labels renumbered.
pub fn cluster_segments(
    vectors: &[FeatureVector],
    n_clusters: usize,
    max_iterations: usize,
) -> Clustering {
    let points = standardize(vectors);
    let n = points.len();

    if n == 0 {
        return Clustering {
            labels: Vec::new(),
            clusters: Vec::new(),
            centroids: Vec::new(),
            points,
            iterations: 0,
        };
    }

    let k = n_clusters.max(1).min(n);

    if n == 1 || k == 1 {
        return finalize(points, vec![0; n], 0);
    }

    let mut centroids: Vec<Point> = seed_farthest_point(&points, k)
        .into_iter()
        .map(|i| points[i])
        .collect();
    let mut labels = assign(&points, &centroids);
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        update_centroids(&points, &labels, &mut centroids);
        let next = assign(&points, &centroids);
        if next == labels {
            break;
        }
        labels = next;
    }

    log::debug!("k-means converged after {} iterations (k={})", iterations, k);

    finalize(points, labels, iterations)
}

/// Z-score every dimension; constant dimensions become 0
fn standardize(vectors: &[FeatureVector]) -> Vec<Point> {
    let n = vectors.len();
    if n == 0 {
        return Vec::new();
    }

    let mut mean = [0.0f64; FEATURE_DIMS];
    for v in vectors {
        for (m, x) in mean.iter_mut().zip(v.values()) {
            *m += x;
        }
    }
    for m in mean.iter_mut() {
        *m /= n as f64;
    }

    let mut std = [0.0f64; FEATURE_DIMS];
    for v in vectors {
        for d in 0..FEATURE_DIMS {
            std[d] += (v.values()[d] - mean[d]).powi(2);
        }
    }
    for s in std.iter_mut() {
        *s = (*s / n as f64).sqrt();
    }

    vectors
        .iter()
        .map(|v| {
            let mut p = [0.0f64; FEATURE_DIMS];
            for d in 0..FEATURE_DIMS {
                p[d] = if std[d] > 1e-12 {
                    (v.values()[d] - mean[d]) / std[d]
                } else {
                    0.0
                };
            }
            p
        })
        .collect()
}

fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Farthest-point seeding
/// First seed is the point nearest the mean (the origin after standardization);
/// each next seed maximizes its distance to the seeds already chosen.
/// Ties go to the lower index.
fn seed_farthest_point(points: &[Point], k: usize) -> Vec<usize> {
    let origin = [0.0f64; FEATURE_DIMS];

    let mut first = 0;
    let mut first_dist = f64::INFINITY;
    for (i, p) in points.iter().enumerate() {
        let d = squared_distance(p, &origin);
        if d < first_dist {
            first = i;
            first_dist = d;
        }
    }

    let mut seeds = vec![first];
    let mut chosen = vec![false; points.len()];
    chosen[first] = true;
    let mut nearest: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &points[first]))
        .collect();

    while seeds.len() < k {
        let mut best: Option<(usize, f64)> = None;
        for (i, &d) in nearest.iter().enumerate() {
            if chosen[i] {
                continue;
            }
            if best.map_or(true, |(_, best_d)| d > best_d) {
                best = Some((i, d));
            }
        }

        let Some((next, _)) = best else { break };
        seeds.push(next);
        chosen[next] = true;
        for (i, p) in points.iter().enumerate() {
            nearest[i] = nearest[i].min(squared_distance(p, &points[next]));
        }
    }

    seeds
}

/// Nearest centroid per point, ties to the lower centroid index
fn assign(points: &[Point], centroids: &[Point]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = squared_distance(p, centroid);
                if d < best_dist {
                    best = c;
                    best_dist = d;
                }
            }
            best
        })
        .collect()
}

/// Move each centroid to the mean of its members; empty clusters stay put
fn update_centroids(points: &[Point], labels: &[usize], centroids: &mut [Point]) {
    let k = centroids.len();
    let mut sums = vec![[0.0f64; FEATURE_DIMS]; k];
    let mut counts = vec![0usize; k];

    for (p, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for d in 0..FEATURE_DIMS {
            sums[label][d] += p[d];
        }
    }

    for c in 0..k {
        if counts[c] == 0 {
            continue;
        }
        for d in 0..FEATURE_DIMS {
            centroids[c][d] = sums[c][d] / counts[c] as f64;
        }
    }
}

/// Renumber labels by first appearance, drop empty clusters, recompute centroids
fn finalize(points: Vec<Point>, raw_labels: Vec<usize>, iterations: usize) -> Clustering {
    let mut remap: Vec<Option<usize>> = Vec::new();
    let mut labels = Vec::with_capacity(raw_labels.len());
    let mut clusters: Vec<Cluster> = Vec::new();

    for (segment, &raw) in raw_labels.iter().enumerate() {
        if raw >= remap.len() {
            remap.resize(raw + 1, None);
        }
        let label = match remap[raw] {
            Some(label) => label,
            None => {
                let label = clusters.len();
                remap[raw] = Some(label);
                clusters.push(Cluster {
                    label,
                    members: Vec::new(),
                });
                label
            }
        };
        clusters[label].members.push(segment);
        labels.push(label);
    }

    let mut centroids = vec![[0.0f64; FEATURE_DIMS]; clusters.len()];
    update_centroids(&points, &labels, &mut centroids);

    Clustering {
        labels,
        clusters,
        centroids,
        points,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: [f64; FEATURE_DIMS]) -> FeatureVector {
        FeatureVector::new(values)
    }

    /// Two tight groups far apart plus one outlier
    fn grouped() -> Vec<FeatureVector> {
        vec![
            vector([0.10, 500.0, 0.05, 0.02, 0.6, 0.05, -30.0, 2.0, 5.0, 1.0]),
            vector([0.80, 6000.0, 0.60, 0.40, 0.0, 0.80, -15.0, -1.0, 2.0, 0.0]),
            vector([0.11, 520.0, 0.05, 0.02, 0.6, 0.05, -29.8, 2.1, 5.0, 1.1]),
            vector([0.79, 6100.0, 0.62, 0.41, 0.0, 0.82, -15.1, -1.1, 2.1, 0.0]),
            vector([0.09, 480.0, 0.04, 0.03, 0.6, 0.04, -30.2, 1.9, 4.9, 0.9]),
            vector([0.40, 2500.0, 0.30, 0.20, 0.3, 0.40, -22.0, 0.5, 3.5, 0.5]),
        ]
    }

    fn assert_partition(clustering: &Clustering, n: usize) {
        let mut seen = vec![0; n];
        for cluster in &clustering.clusters {
            assert!(!cluster.members.is_empty());
            for &m in &cluster.members {
                seen[m] += 1;
                assert_eq!(clustering.labels[m], cluster.label);
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_single_segment_short_circuit() {
        let clustering = cluster_segments(&[vector([1.0; FEATURE_DIMS])], 4, 100);
        assert_eq!(clustering.labels, vec![0]);
        assert_eq!(clustering.clusters_used(), 1);
        assert_eq!(clustering.iterations, 0);
    }

    #[test]
    fn test_more_clusters_than_segments() {
        let vectors: Vec<FeatureVector> = (0..8)
            .map(|i| {
                let x = i as f64;
                vector([
                    x,
                    x * x,
                    (x * 0.7).sin(),
                    x * 0.1,
                    1.0 / (x + 1.0),
                    x % 3.0,
                    -100.0 - x,
                    x.cos(),
                    x * 0.5,
                    (x * 1.3).sin(),
                ])
            })
            .collect();

        let clustering = cluster_segments(&vectors, 10, 100);

        assert_eq!(clustering.clusters_used(), 8);
        assert_eq!(clustering.labels, (0..8).collect::<Vec<_>>());
        assert_partition(&clustering, 8);
    }

    #[test]
    fn test_groups_are_recovered() {
        let clustering = cluster_segments(&grouped(), 3, 100);

        assert_eq!(clustering.clusters_used(), 3);
        assert_partition(&clustering, 6);
        assert_eq!(clustering.labels[0], clustering.labels[2]);
        assert_eq!(clustering.labels[0], clustering.labels[4]);
        assert_eq!(clustering.labels[1], clustering.labels[3]);
        assert_ne!(clustering.labels[0], clustering.labels[1]);
        assert_ne!(clustering.labels[5], clustering.labels[0]);
        assert_ne!(clustering.labels[5], clustering.labels[1]);
    }

    #[test]
    fn test_labels_follow_first_appearance() {
        let clustering = cluster_segments(&grouped(), 3, 100);
        assert_eq!(clustering.labels[0], 0);
        assert_eq!(clustering.labels[1], 1);
        assert_eq!(clustering.labels[5], 2);
    }

    #[test]
    fn test_identical_vectors_collapse_to_one_cluster() {
        let vectors = vec![vector([0.5; FEATURE_DIMS]); 4];
        let clustering = cluster_segments(&vectors, 3, 100);

        assert_eq!(clustering.clusters_used(), 1);
        assert_eq!(clustering.labels, vec![0, 0, 0, 0]);
        assert_partition(&clustering, 4);
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let a = cluster_segments(&grouped(), 2, 100);
        let b = cluster_segments(&grouped(), 2, 100);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_standardization_is_scale_invariant() {
        let base = grouped();
        let scaled: Vec<FeatureVector> = base
            .iter()
            .map(|v| {
                let mut values = *v.values();
                values[1] *= 1000.0;
                vector(values)
            })
            .collect();

        let a = cluster_segments(&base, 3, 100);
        let b = cluster_segments(&scaled, 3, 100);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn test_distance_to_own_centroid() {
        let clustering = cluster_segments(&grouped(), 3, 100);
        // The outlier is alone in its cluster
        assert!(clustering.distance_to_centroid(5) < 1e-9);
        assert!(clustering.distance_to_centroid(0) > 0.0);
    }
}
