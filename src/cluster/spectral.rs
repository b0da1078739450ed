//! Spectral clustering.
//!
//! - affinity : rbf kernel exp(-gamma * |x - y|^2) with gamma = 1
//! - embedding : top eigenvectors of the normalized adjacency D^-1/2 A D^-1/2 (diagonal excluded),
//!   i.e the bottom of the normalized laplacian, rescaled by D^-1/2 and sign fixed.
//! - assignment : discretization (Yu and Shi) searching the rotation that brings the embedding
//!   closest to an indicator matrix.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::cluster::linalg::{argmax, argmin, pairwise_squared_distances, svd, top_eigen};
use crate::cluster::{check_samples, ClustererT};

const DISCRETIZE_RESTARTS: usize = 30;
const DISCRETIZE_MAX_ITER: usize = 20;

#[derive(Clone, Debug)]
pub struct SpectralClustering {
    n_clusters: usize,
    gamma: f64,
    seed: u64,
}

impl SpectralClustering {
    pub fn new(n_clusters: usize) -> Self {
        SpectralClustering { n_clusters, gamma: 1., seed: 0 }
    }

    pub fn rbf_affinity(&self, data: &ArrayView2<f64>) -> Array2<f64> {
        let gamma = self.gamma;
        pairwise_squared_distances(data).mapv(|d| (-gamma * d).exp())
    }

    /// spectral embedding of an affinity, one row by sample, n_clusters columns
    pub fn embed(&self, affinity: &Array2<f64>, rng: &mut Xoshiro256PlusPlus) -> anyhow::Result<Array2<f64>> {
        let n = affinity.nrows();
        let mut adjacency = affinity.clone();
        adjacency.diag_mut().fill(0.);
        // isolated nodes get a unit degree
        let dd: Vec<f64> = adjacency
            .sum_axis(Axis(1))
            .iter()
            .map(|d| if *d > 0. { d.sqrt() } else { 1. })
            .collect();
        let mut normalized = adjacency;
        for i in 0..n {
            for j in 0..n {
                normalized[[i, j]] /= dd[i] * dd[j];
            }
        }
        let (_values, vectors) = top_eigen(&normalized, self.n_clusters, rng)?;
        let mut embedding = vectors;
        for (i, mut row) in embedding.rows_mut().into_iter().enumerate() {
            row.mapv_inplace(|x| x / dd[i]);
        }
        // deterministic sign : the entry of max absolute value of each vector is positive
        for mut col in embedding.columns_mut() {
            let abs: Vec<f64> = col.iter().map(|x| x.abs()).collect();
            let rank = argmax(&abs);
            if col[rank] < 0. {
                col.mapv_inplace(|x| -x);
            }
        }
        Ok(embedding)
    } // end of embed

    /// Yu-Shi discretization of a spectral embedding.
    /// A restart with a new initial rotation happens only if the objective is not finite.
    pub fn discretize(&self, embedding: &Array2<f64>, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let (n, k) = embedding.dim();
        let mut vectors = embedding.clone();
        // columns scaled to norm sqrt(n), first entry made non positive
        let norm_ones = (n as f64).sqrt();
        for mut col in vectors.columns_mut() {
            let norm = col.dot(&col).sqrt();
            if norm > 0. {
                col.mapv_inplace(|x| x / norm * norm_ones);
            }
            if col[0] != 0. {
                let sign = col[0].signum();
                col.mapv_inplace(|x| -x * sign);
            }
        }
        // rows normalized to unit length
        for mut row in vectors.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 0. {
                row.mapv_inplace(|x| x / norm);
            }
        }
        let mut labels = vec![0usize; n];
        for restart in 0..DISCRETIZE_RESTARTS {
            // initial rotation from k mutually far rows
            let mut rotation = Array2::<f64>::zeros((k, k));
            let first = rng.gen_range(0..n);
            rotation.column_mut(0).assign(&vectors.row(first));
            let mut c = Array1::<f64>::zeros(n);
            for j in 1..k {
                c += &vectors.dot(&rotation.column(j - 1)).mapv(f64::abs);
                let rank = argmin(&c.to_vec());
                rotation.column_mut(j).assign(&vectors.row(rank));
            }
            let mut last_objective = 0.;
            let mut finite = true;
            for iter in 0..=DISCRETIZE_MAX_ITER {
                let t_discrete = vectors.dot(&rotation);
                labels = t_discrete.rows().into_iter().map(|r| argmax(&r.to_vec())).collect();
                let mut indicator = Array2::<f64>::zeros((n, k));
                for (i, l) in labels.iter().enumerate() {
                    indicator[[i, *l]] = 1.;
                }
                let t_svd = indicator.t().dot(&vectors);
                let (u, s, v) = match svd(&t_svd) {
                    Some(usv) => usv,
                    None => {
                        finite = false;
                        break;
                    }
                };
                let objective = 2. * (n as f64 - s.sum());
                if !objective.is_finite() {
                    finite = false;
                    break;
                }
                if (objective - last_objective).abs() < f64::EPSILON || iter == DISCRETIZE_MAX_ITER {
                    log::debug!("discretize stopped at iteration {}, ncut {:.3e}", iter, objective);
                    break;
                }
                last_objective = objective;
                // vh^t u^t with t_svd = u s vh
                rotation = v.dot(&u.t());
            }
            if finite {
                return labels;
            }
            log::debug!("discretize, restart {} after a non finite objective", restart);
        }
        log::warn!("spectral discretization failed after {} restarts", DISCRETIZE_RESTARTS);
        labels
    } // end of discretize
} // end of impl SpectralClustering

impl ClustererT for SpectralClustering {
    fn cluster(&self, data: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>> {
        check_samples("sc", data.nrows(), self.n_clusters)?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let affinity = self.rbf_affinity(data);
        let embedding = self.embed(&affinity, &mut rng)?;
        let labels = self.discretize(&embedding, &mut rng);
        Ok(labels.into_iter().map(|l| l as i64).collect())
    }
}

// end of mod tests
