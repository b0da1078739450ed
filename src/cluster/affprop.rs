//! Affinity propagation.
//!
//! Responsabilities and availabilities are exchanged between samples until the set of exemplars
//! stays the same during `convergence_iter` iterations. The similarity is either the negative
//! squared euclidean distance between rows (ap) or a precomputed matrix (app).
//! The preference (diagonal of the similarity) is the median of the similarities.

use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::cluster::linalg::{argmax, pairwise_squared_distances};
use crate::cluster::ClustererT;
use crate::errors::StudyError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApSimilarity {
    /// -|x - y|^2 between rows
    NegSquaredEuclidean,
    /// the input matrix is the similarity
    Precomputed,
}

#[derive(Clone, Debug)]
pub struct AffinityPropagation {
    damping: f64,
    similarity: ApSimilarity,
    max_iter: usize,
    convergence_iter: usize,
    seed: u64,
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

impl AffinityPropagation {
    /// damping must be in [0.5, 1)
    pub fn new(damping: f64, similarity: ApSimilarity) -> anyhow::Result<Self> {
        if !(0.5..1.).contains(&damping) {
            return Err(StudyError::clustering(format!("affinity propagation damping must be in [0.5, 1), got {}", damping)).into());
        }
        Ok(AffinityPropagation { damping, similarity, max_iter: 200, convergence_iter: 15, seed: 0 })
    }

    pub fn get_damping(&self) -> f64 {
        self.damping
    }

    fn similarity_matrix(&self, data: &ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        match self.similarity {
            ApSimilarity::NegSquaredEuclidean => Ok(pairwise_squared_distances(data).mapv(|d| -d)),
            ApSimilarity::Precomputed => {
                if data.nrows() != data.ncols() {
                    return Err(StudyError::clustering(format!("precomputed similarity must be square, got {:?}", data.dim())).into());
                }
                Ok(data.to_owned())
            }
        }
    }

    /// returns labels, exemplars get consecutive labels in the order of their index.
    /// All labels are -1 if no exemplar emerges.
    pub fn propagate(&self, mut s: Array2<f64>) -> Vec<i64> {
        let n = s.nrows();
        let preference = median(&mut s.iter().cloned().collect::<Vec<f64>>());
        // equal similarities : every sample its own cluster or a single one
        let off_diag: Vec<f64> = (0..n)
            .flat_map(|i| (0..n).filter(move |j| *j != i).map(move |j| (i, j)))
            .map(|(i, j)| s[[i, j]])
            .collect();
        let equal = off_diag.iter().all(|v| *v == off_diag[0]);
        if n == 1 || equal {
            log::warn!("affinity propagation, all samples have mutually equal similarities");
            if n > 1 && preference > s[[0, n - 1]] {
                return (0..n as i64).collect();
            } else {
                return vec![0; n];
            }
        }
        s.diag_mut().fill(preference);
        // remove degeneracies
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        s.mapv_inplace(|x| {
            let noise: f64 = rng.sample(StandardNormal);
            x + (f64::EPSILON * x + f64::MIN_POSITIVE * 100.) * noise
        });
        let mut a = Array2::<f64>::zeros((n, n));
        let mut r = Array2::<f64>::zeros((n, n));
        let mut history = Array2::<u8>::zeros((n, self.convergence_iter));
        let mut exemplars = vec![false; n];
        let mut never_converged = true;
        let damping = self.damping;
        for it in 0..self.max_iter {
            // responsabilities
            let tmp = &a + &s;
            let mut new_r = Array2::<f64>::zeros((n, n));
            for i in 0..n {
                let row = tmp.row(i).to_vec();
                let best = argmax(&row);
                let y = row[best];
                let y2 = row
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != best)
                    .map(|(_, v)| *v)
                    .fold(f64::NEG_INFINITY, f64::max);
                for k in 0..n {
                    new_r[[i, k]] = s[[i, k]] - y;
                }
                new_r[[i, best]] = s[[i, best]] - y2;
            }
            r = r * damping + new_r * (1. - damping);
            // availabilities
            let mut rp = r.mapv(|x| x.max(0.));
            for k in 0..n {
                rp[[k, k]] = r[[k, k]];
            }
            let col_sums = rp.sum_axis(Axis(0));
            let mut new_a = Array2::<f64>::zeros((n, n));
            for i in 0..n {
                for k in 0..n {
                    let v = col_sums[k] - rp[[i, k]];
                    new_a[[i, k]] = if i == k { v } else { v.min(0.) };
                }
            }
            a = a * damping + new_a * (1. - damping);
            // convergence
            for k in 0..n {
                exemplars[k] = a[[k, k]] + r[[k, k]] > 0.;
                history[[k, it % self.convergence_iter]] = exemplars[k] as u8;
            }
            let nb_exemplars = exemplars.iter().filter(|e| **e).count();
            if it >= self.convergence_iter {
                let stable = history
                    .rows()
                    .into_iter()
                    .all(|row| {
                        let se: usize = row.iter().map(|x| *x as usize).sum();
                        se == self.convergence_iter || se == 0
                    });
                if stable && nb_exemplars > 0 {
                    log::debug!("affinity propagation converged at iteration {}", it);
                    never_converged = false;
                    break;
                }
            }
        }
        let mut centers: Vec<usize> = (0..n).filter(|k| exemplars[*k]).collect();
        if centers.is_empty() {
            log::warn!("affinity propagation did not converge and has no exemplar");
            return vec![-1; n];
        }
        if never_converged {
            log::warn!("affinity propagation did not converge, clusters may be degenerate");
        }
        let assign = |centers: &[usize]| -> Vec<usize> {
            let mut c: Vec<usize> = (0..n)
                .map(|i| argmax(&centers.iter().map(|k| s[[i, *k]]).collect::<Vec<f64>>()))
                .collect();
            for (rank, k) in centers.iter().enumerate() {
                c[*k] = rank;
            }
            c
        };
        // refine each exemplar as the member maximizing the sum of similarities in its cluster
        let c = assign(&centers);
        for rank in 0..centers.len() {
            let members: Vec<usize> = (0..n).filter(|i| c[*i] == rank).collect();
            let sums: Vec<f64> = members
                .iter()
                .map(|j| members.iter().map(|i| s[[*i, *j]]).sum())
                .collect();
            centers[rank] = members[argmax(&sums)];
        }
        let c = assign(&centers);
        let exemplar_of: Vec<usize> = c.iter().map(|rank| centers[*rank]).collect();
        let mut distinct = exemplar_of.clone();
        distinct.sort_unstable();
        distinct.dedup();
        exemplar_of
            .iter()
            .map(|e| distinct.binary_search(e).unwrap_or(0) as i64)
            .collect()
    } // end of propagate
} // end of impl AffinityPropagation

impl ClustererT for AffinityPropagation {
    fn cluster(&self, data: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>> {
        if data.nrows() == 0 {
            return Err(StudyError::clustering("affinity propagation on an empty matrix").into());
        }
        let s = self.similarity_matrix(data)?;
        Ok(self.propagate(s))
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::cluster::tests::two_blobs;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn damping_range() {
        assert!(AffinityPropagation::new(0.4, ApSimilarity::NegSquaredEuclidean).is_err());
        assert!(AffinityPropagation::new(1.0, ApSimilarity::NegSquaredEuclidean).is_err());
        assert!(AffinityPropagation::new(0.5, ApSimilarity::NegSquaredEuclidean).is_ok());
    }

    #[test]
    fn two_exemplars() {
        log_init_test();
        let data = two_blobs(6);
        let ap = AffinityPropagation::new(0.5, ApSimilarity::NegSquaredEuclidean).unwrap();
        let labels = ap.cluster(&data.view()).unwrap();
        assert!(labels[..6].iter().all(|l| *l == labels[0]));
        assert!(labels[6..].iter().all(|l| *l == labels[6]));
        assert_ne!(labels[0], labels[6]);
    } // end of two_exemplars

    #[test]
    fn equal_similarities() {
        log_init_test();
        let ap = AffinityPropagation::new(0.5, ApSimilarity::Precomputed).unwrap();
        // off diagonal all equal, median 1 is not above similarities : one cluster
        let s = Array2::<f64>::ones((3, 3));
        assert_eq!(ap.cluster(&s.view()).unwrap(), vec![0, 0, 0]);
        let single = Array2::<f64>::zeros((1, 1));
        assert_eq!(ap.cluster(&single.view()).unwrap(), vec![0]);
    }

    #[test]
    fn precomputed_must_be_square() {
        let ap = AffinityPropagation::new(0.5, ApSimilarity::Precomputed).unwrap();
        let s = Array2::<f64>::ones((3, 2));
        assert!(ap.cluster(&s.view()).is_err());
    }
} // end of mod tests
