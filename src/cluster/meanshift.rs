//! Mean shift with a flat kernel, every sample used as a seed.

use ndarray::{Array1, ArrayView2};
use rayon::prelude::*;

use crate::cluster::linalg::{argmin, euclidean_distance, pairwise_distances};
use crate::cluster::ClustererT;
use crate::errors::StudyError;

#[derive(Clone, Debug)]
pub struct MeanShift {
    /// quantile of neighbour distances used to estimate the bandwidth
    quantile: f64,
    max_iter: usize,
}

impl Default for MeanShift {
    fn default() -> Self {
        MeanShift { quantile: 0.3, max_iter: 300 }
    }
}

impl MeanShift {
    pub fn new() -> Self {
        MeanShift::default()
    }

    /// mean over samples of the distance to their k-th nearest neighbour, self included,
    /// with k = max(1, quantile * n)
    pub fn estimate_bandwidth(&self, data: &ArrayView2<f64>) -> f64 {
        let n = data.nrows();
        let k = ((n as f64 * self.quantile) as usize).max(1);
        let dist = pairwise_distances(data);
        let total: f64 = dist
            .rows()
            .into_iter()
            .map(|row| {
                let mut d = row.to_vec();
                d.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                d[k - 1]
            })
            .sum();
        total / n as f64
    }

    // climbs from a seed, returns the mode and the number of samples within bandwidth of it
    fn shift_seed(&self, data: &ArrayView2<f64>, seed: Array1<f64>, bandwidth: f64) -> (Array1<f64>, usize) {
        let stop_thresh = 1.0E-3 * bandwidth;
        let mut mean = seed;
        let mut nb_within = 0;
        let mut completed = 0;
        loop {
            let within: Vec<usize> = data
                .rows()
                .into_iter()
                .enumerate()
                .filter(|(_, x)| euclidean_distance(x, &mean.view()) <= bandwidth)
                .map(|(i, _)| i)
                .collect();
            if within.is_empty() {
                break;
            }
            nb_within = within.len();
            let old_mean = mean.clone();
            let mut new_mean = Array1::<f64>::zeros(data.ncols());
            for i in &within {
                new_mean.scaled_add(1., &data.row(*i));
            }
            mean = new_mean / within.len() as f64;
            if euclidean_distance(&mean.view(), &old_mean.view()) <= stop_thresh || completed == self.max_iter {
                break;
            }
            completed += 1;
        }
        (mean, nb_within)
    } // end of shift_seed

    /// modes sorted by decreasing intensity, near duplicates removed
    pub fn find_modes(&self, data: &ArrayView2<f64>, bandwidth: f64) -> anyhow::Result<Vec<Array1<f64>>> {
        let results: Vec<(Array1<f64>, usize)> = (0..data.nrows())
            .into_par_iter()
            .map(|i| self.shift_seed(data, data.row(i).to_owned(), bandwidth))
            .collect();
        let mut modes: Vec<(Array1<f64>, usize)> = Vec::new();
        for (mode, intensity) in results.into_iter().filter(|(_, nb)| *nb > 0) {
            // identical modes are counted once
            if !modes.iter().any(|(m, _)| *m == mode) {
                modes.push((mode, intensity));
            }
        }
        if modes.is_empty() {
            return Err(StudyError::clustering(format!("mean shift, no sample within bandwidth {:.3e} of any seed", bandwidth)).into());
        }
        // decreasing intensity, then decreasing coordinates
        modes.sort_by(|(m1, i1), (m2, i2)| {
            i2.cmp(i1).then_with(|| {
                m2.iter()
                    .zip(m1.iter())
                    .map(|(a, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                    .find(|o| *o != std::cmp::Ordering::Equal)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        let mut unique = vec![true; modes.len()];
        for i in 0..modes.len() {
            if unique[i] {
                for j in 0..modes.len() {
                    if j != i && euclidean_distance(&modes[i].0.view(), &modes[j].0.view()) <= bandwidth {
                        unique[j] = false;
                    }
                }
            }
        }
        let centers: Vec<Array1<f64>> = modes
            .into_iter()
            .zip(unique.iter())
            .filter(|(_, u)| **u)
            .map(|((m, _), _)| m)
            .collect();
        Ok(centers)
    } // end of find_modes
} // end of impl MeanShift

impl ClustererT for MeanShift {
    fn cluster(&self, data: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>> {
        if data.nrows() == 0 {
            return Err(StudyError::clustering("mean shift on an empty matrix").into());
        }
        let bandwidth = self.estimate_bandwidth(data);
        log::info!("mean shift bandwidth {:.3e}", bandwidth);
        let centers = self.find_modes(data, bandwidth)?;
        log::debug!("mean shift found {} modes", centers.len());
        let labels = data
            .rows()
            .into_iter()
            .map(|x| {
                let d: Vec<f64> = centers.iter().map(|c| euclidean_distance(&x, &c.view())).collect();
                argmin(&d) as i64
            })
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
    fn bandwidth_of_line() {
        log_init_test();
        // 10 points on a line, k = 3 : third nearest including self is at distance 1 or 2
        let data = ndarray::Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let bw = MeanShift::new().estimate_bandwidth(&data.view());
        // ends are at distance 2, the 8 inner points at distance 1
        assert!((bw - (2. * 2. + 8.) / 10.).abs() < 1.0E-12);
    }

    #[test]
    fn two_modes() {
        log_init_test();
        let data = two_blobs(10);
        let labels = MeanShift::new().cluster(&data.view()).unwrap();
        assert!(labels[..10].iter().all(|l| *l == labels[0]));
        assert!(labels[10..].iter().all(|l| *l == labels[10]));
        assert_ne!(labels[0], labels[10]);
    }
} // end of mod tests
