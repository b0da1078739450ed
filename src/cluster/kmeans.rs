//! K-means. k-means++ seeding and Lloyd iterations serve as initialization of the gaussian mixture,
//! [MiniBatchKMeans] is the km strategy.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::cluster::linalg::{argmin, squared_distance};
use crate::cluster::{check_samples, ClustererT};

/// index of nearest center and squared distance to it
pub(crate) fn nearest_center(x: &ArrayView1<f64>, centers: &Array2<f64>) -> (usize, f64) {
    let dist: Vec<f64> = centers.rows().into_iter().map(|c| squared_distance(x, &c)).collect();
    let rank = argmin(&dist);
    (rank, dist[rank])
}

/// k-means++ seeding, greedy variant : at each step 2 + ln(k) candidates are drawn with
/// probability proportional to the squared distance to the nearest chosen center, and the one
/// reducing the most the potential is kept.
pub(crate) fn kmeans_plusplus(data: &ArrayView2<f64>, k: usize, rng: &mut Xoshiro256PlusPlus) -> Array2<f64> {
    let (n, dim) = data.dim();
    let mut centers = Array2::<f64>::zeros((k, dim));
    let nb_trials = 2 + (k as f64).ln() as usize;
    let first = rng.gen_range(0..n);
    centers.row_mut(0).assign(&data.row(first));
    let mut closest: Vec<f64> = data.rows().into_iter().map(|x| squared_distance(&x, &data.row(first))).collect();
    for c in 1..k {
        let potential: f64 = closest.iter().sum();
        let mut best_candidate = 0;
        let mut best_potential = f64::INFINITY;
        let mut best_closest = Vec::<f64>::new();
        for _ in 0..nb_trials {
            let candidate = if potential > 0. {
                let target = rng.gen::<f64>() * potential;
                let mut acc = 0.;
                let mut chosen = n - 1;
                for (i, d) in closest.iter().enumerate() {
                    acc += d;
                    if acc > target {
                        chosen = i;
                        break;
                    }
                }
                chosen
            } else {
                rng.gen_range(0..n)
            };
            let new_closest: Vec<f64> = data
                .rows()
                .into_iter()
                .zip(closest.iter())
                .map(|(x, d)| squared_distance(&x, &data.row(candidate)).min(*d))
                .collect();
            let new_potential: f64 = new_closest.iter().sum();
            if new_potential < best_potential {
                best_potential = new_potential;
                best_candidate = candidate;
                best_closest = new_closest;
            }
        }
        centers.row_mut(c).assign(&data.row(best_candidate));
        closest = best_closest;
    }
    centers
} // end of kmeans_plusplus

/// Lloyd iterations from given centers. Returns labels and final centers.
/// An emptied cluster keeps its previous center.
pub(crate) fn lloyd(data: &ArrayView2<f64>, mut centers: Array2<f64>, max_iter: usize, tol: f64) -> (Vec<usize>, Array2<f64>) {
    let (n, dim) = data.dim();
    let k = centers.nrows();
    let mut labels = vec![0usize; n];
    for iter in 0..max_iter {
        for (i, x) in data.rows().into_iter().enumerate() {
            labels[i] = nearest_center(&x, &centers).0;
        }
        let mut sums = Array2::<f64>::zeros((k, dim));
        let mut counts = vec![0usize; k];
        for (i, x) in data.rows().into_iter().enumerate() {
            sums.row_mut(labels[i]).scaled_add(1., &x);
            counts[labels[i]] += 1;
        }
        let mut shift = 0.;
        for c in 0..k {
            if counts[c] > 0 {
                let new_center = sums.row(c).mapv(|x| x / counts[c] as f64);
                shift += squared_distance(&new_center.view(), &centers.row(c));
                centers.row_mut(c).assign(&new_center);
            }
        }
        if shift <= tol {
            log::debug!("lloyd converged at iteration {}", iter);
            break;
        }
    }
    for (i, x) in data.rows().into_iter().enumerate() {
        labels[i] = nearest_center(&x, &centers).0;
    }
    (labels, centers)
} // end of lloyd

/// Mini batch k-means. At each step a batch of samples drawn with replacement updates the centers
/// it is assigned to, with a learning rate 1/count of the center.
/// Iterations stop after max_iter epochs or when the smoothed batch inertia has not improved
/// for max_no_improvement steps.
#[derive(Clone, Debug)]
pub struct MiniBatchKMeans {
    n_clusters: usize,
    batch_size: usize,
    max_iter: usize,
    max_no_improvement: usize,
    seed: u64,
}

impl MiniBatchKMeans {
    pub fn new(n_clusters: usize) -> Self {
        MiniBatchKMeans { n_clusters, batch_size: 10, max_iter: 100, max_no_improvement: 10, seed: 0 }
    }

    pub fn get_n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// fit and return centers
    pub fn fit(&self, data: &ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        let n = data.nrows();
        check_samples("km", n, self.n_clusters)?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let mut centers = kmeans_plusplus(data, self.n_clusters, &mut rng);
        let mut counts = Array1::<f64>::zeros(self.n_clusters);
        let batch_size = self.batch_size.min(n);
        let n_steps = (self.max_iter * n) / batch_size;
        let alpha = (batch_size as f64 * 2. / (n as f64 + 1.)).min(1.);
        let mut ewa_inertia: Option<f64> = None;
        let mut ewa_min = f64::INFINITY;
        let mut no_improvement = 0;
        log::debug!("MiniBatchKMeans::fit n_steps {}", n_steps);
        for step in 0..n_steps {
            let batch: Vec<usize> = (0..batch_size).map(|_| rng.gen_range(0..n)).collect();
            let mut assigned = Vec::<(usize, usize)>::with_capacity(batch_size);
            let mut inertia = 0.;
            for i in &batch {
                let (c, d) = nearest_center(&data.row(*i), &centers);
                assigned.push((*i, c));
                inertia += d;
            }
            // per center update on the batch
            for c in 0..self.n_clusters {
                let members: Vec<usize> = assigned.iter().filter(|(_, a)| *a == c).map(|(i, _)| *i).collect();
                if members.is_empty() {
                    continue;
                }
                let old_count = counts[c];
                let mut new_center = centers.row(c).mapv(|x| x * old_count);
                for i in &members {
                    new_center.scaled_add(1., &data.row(*i));
                }
                counts[c] = old_count + members.len() as f64;
                centers.row_mut(c).assign(&new_center.mapv(|x| x / counts[c]));
            }
            // early stop on smoothed inertia
            let inertia = inertia / batch_size as f64;
            let ewa = match ewa_inertia {
                None => inertia,
                Some(prev) => prev * (1. - alpha) + inertia * alpha,
            };
            ewa_inertia = Some(ewa);
            if ewa < ewa_min {
                no_improvement = 0;
                ewa_min = ewa;
            } else {
                no_improvement += 1;
            }
            if no_improvement >= self.max_no_improvement {
                log::debug!("MiniBatchKMeans stopped at step {} without improvement", step);
                break;
            }
        }
        Ok(centers)
    } // end of fit
} // end of impl MiniBatchKMeans

impl ClustererT for MiniBatchKMeans {
    fn cluster(&self, data: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>> {
        let centers = self.fit(data)?;
        let labels = data
            .rows()
            .into_iter()
            .map(|x| nearest_center(&x, &centers).0 as i64)
            .collect();
        Ok(labels)
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
    fn lloyd_separates_blobs() {
        log_init_test();
        let data = two_blobs(10);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let centers = kmeans_plusplus(&data.view(), 2, &mut rng);
        let (labels, _) = lloyd(&data.view(), centers, 100, 1.0E-8);
        assert!(labels[..10].iter().all(|l| *l == labels[0]));
        assert!(labels[10..].iter().all(|l| *l == labels[10]));
        assert_ne!(labels[0], labels[10]);
    } // end of lloyd_separates_blobs

    #[test]
    fn minibatch_separates_blobs() {
        log_init_test();
        let data = two_blobs(15);
        let labels = MiniBatchKMeans::new(2).cluster(&data.view()).unwrap();
        assert_eq!(labels.len(), 30);
        assert!(labels[..15].iter().all(|l| *l == labels[0]));
        assert!(labels[15..].iter().all(|l| *l == labels[15]));
        assert_ne!(labels[0], labels[15]);
        // same seed, same result
        assert_eq!(labels, MiniBatchKMeans::new(2).cluster(&data.view()).unwrap());
    } // end of minibatch_separates_blobs

    #[test]
    fn too_few_samples() {
        log_init_test();
        let data = two_blobs(1);
        assert!(MiniBatchKMeans::new(3).cluster(&data.view()).is_err());
    }
} // end of mod tests
