//! Average linkage agglomerative clustering on a precomputed distance matrix.

use ndarray::{Array2, ArrayView2};

use crate::cluster::{check_samples, ClustererT};
use crate::errors::StudyError;

#[derive(Clone, Debug)]
pub struct AverageLinkage {
    n_clusters: usize,
}

impl AverageLinkage {
    pub fn new(n_clusters: usize) -> Self {
        AverageLinkage { n_clusters }
    }

    /// merges the closest clusters until n_clusters remain.
    /// Returns the members of each remaining cluster.
    pub fn merge(&self, dist: &ArrayView2<f64>) -> Vec<Vec<usize>> {
        let n = dist.nrows();
        let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut active = vec![true; n];
        let mut d: Array2<f64> = dist.to_owned();
        let mut nb_active = n;
        while nb_active > self.n_clusters {
            let mut best = (usize::MAX, usize::MAX);
            let mut best_dist = f64::INFINITY;
            for i in (0..n).filter(|i| active[*i]) {
                for j in ((i + 1)..n).filter(|j| active[*j]) {
                    if d[[i, j]] < best_dist || best.0 == usize::MAX {
                        best_dist = d[[i, j]];
                        best = (i, j);
                    }
                }
            }
            let (a, b) = best;
            let size_a = members[a].len() as f64;
            let size_b = members[b].len() as f64;
            // Lance-Williams update for average linkage
            for k in (0..n).filter(|k| active[*k] && *k != a && *k != b) {
                let new_dist = (size_a * d[[a, k]] + size_b * d[[b, k]]) / (size_a + size_b);
                d[[a, k]] = new_dist;
                d[[k, a]] = new_dist;
            }
            let moved = std::mem::take(&mut members[b]);
            members[a].extend(moved);
            active[b] = false;
            nb_active -= 1;
            log::trace!("merged {} and {} at distance {:.3e}", a, b, best_dist);
        }
        members.into_iter().filter(|m| !m.is_empty()).collect()
    } // end of merge
} // end of impl AverageLinkage

impl ClustererT for AverageLinkage {
    fn cluster(&self, dist: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>> {
        if dist.nrows() != dist.ncols() {
            return Err(StudyError::clustering(format!("precomputed distances must be square, got {:?}", dist.dim())).into());
        }
        check_samples("acp", dist.nrows(), self.n_clusters)?;
        let clusters = self.merge(dist);
        let mut labels = vec![0i64; dist.nrows()];
        for (label, cluster) in clusters.iter().enumerate() {
            for i in cluster {
                labels[*i] = label as i64;
            }
        }
        Ok(labels)
    }
}

// end of mod tests
