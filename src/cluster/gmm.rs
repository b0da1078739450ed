//! Gaussian mixture with diagonal covariances fitted by EM.
//!
//! Initialization : responsabilities are the one hot encoding of a k-means partition.
//! Each covariance gets `reg_covar` added to stay positive.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::cluster::kmeans::{kmeans_plusplus, lloyd};
use crate::cluster::linalg::argmax;
use crate::cluster::{check_samples, ClustererT};
use crate::errors::StudyError;

#[derive(Clone, Debug)]
pub struct GaussianMixture {
    n_components: usize,
    max_iter: usize,
    tol: f64,
    reg_covar: f64,
    seed: u64,
}

/// parameters of a fitted mixture
#[derive(Clone, Debug)]
pub struct MixtureParams {
    pub weights: Array1<f64>,
    pub means: Array2<f64>,
    /// diagonal variances, one row by component
    pub variances: Array2<f64>,
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

impl GaussianMixture {
    pub fn new(n_components: usize) -> Self {
        GaussianMixture { n_components, max_iter: 100, tol: 1.0E-3, reg_covar: 1.0E-6, seed: 0 }
    }

    fn m_step(&self, data: &ArrayView2<f64>, resp: &Array2<f64>) -> MixtureParams {
        let n = data.nrows();
        let nk = resp.sum_axis(Axis(0)).mapv(|x| x + 10. * f64::EPSILON);
        let mut means = resp.t().dot(data);
        let squares = data.mapv(|x| x * x);
        let mut variances = resp.t().dot(&squares);
        for k in 0..self.n_components {
            means.row_mut(k).mapv_inplace(|x| x / nk[k]);
            let mk = means.row(k).to_owned();
            variances
                .row_mut(k)
                .iter_mut()
                .zip(mk.iter())
                .for_each(|(v, m)| *v = *v / nk[k] - m * m + self.reg_covar);
        }
        let weights = nk.mapv(|x| x / n as f64);
        MixtureParams { weights, means, variances }
    } // end of m_step

    /// log(w_k) + log N(x, mu_k, diag(var_k)) for each sample and component
    fn weighted_log_prob(&self, data: &ArrayView2<f64>, params: &MixtureParams) -> Array2<f64> {
        let (n, dim) = data.dim();
        let log_2pi = (2. * std::f64::consts::PI).ln();
        let mut logp = Array2::<f64>::zeros((n, self.n_components));
        for k in 0..self.n_components {
            let var = params.variances.row(k);
            let mean = params.means.row(k);
            let log_det: f64 = var.iter().map(|v| v.ln()).sum();
            let log_w = params.weights[k].ln();
            for (i, x) in data.rows().into_iter().enumerate() {
                let maha: f64 = x
                    .iter()
                    .zip(mean.iter())
                    .zip(var.iter())
                    .map(|((xi, mi), vi)| (xi - mi) * (xi - mi) / vi)
                    .sum();
                logp[[i, k]] = -0.5 * (dim as f64 * log_2pi + log_det + maha) + log_w;
            }
        }
        logp
    } // end of weighted_log_prob

    /// returns responsabilities and mean log likelihood
    fn e_step(&self, data: &ArrayView2<f64>, params: &MixtureParams) -> (Array2<f64>, f64) {
        let mut logp = self.weighted_log_prob(data, params);
        let mut total = 0.;
        for mut row in logp.rows_mut() {
            let norm = log_sum_exp(&row.to_vec());
            total += norm;
            row.mapv_inplace(|x| (x - norm).exp());
        }
        (logp, total / data.nrows() as f64)
    }

    pub fn fit(&self, data: &ArrayView2<f64>) -> anyhow::Result<MixtureParams> {
        let n = data.nrows();
        check_samples("gm", n, self.n_components)?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let centers = kmeans_plusplus(data, self.n_components, &mut rng);
        let (labels, _) = lloyd(data, centers, 300, 1.0E-8);
        let mut resp = Array2::<f64>::zeros((n, self.n_components));
        for (i, l) in labels.iter().enumerate() {
            resp[[i, *l]] = 1.;
        }
        let mut params = self.m_step(data, &resp);
        let mut lower_bound = f64::NEG_INFINITY;
        let mut converged = false;
        for iter in 1..=self.max_iter {
            let (new_resp, new_bound) = self.e_step(data, &params);
            if !new_bound.is_finite() {
                return Err(StudyError::clustering("gaussian mixture log likelihood is not finite").into());
            }
            params = self.m_step(data, &new_resp);
            let change = new_bound - lower_bound;
            lower_bound = new_bound;
            if change.abs() < self.tol {
                log::debug!("GaussianMixture converged at iteration {}", iter);
                converged = true;
                break;
            }
        }
        if !converged {
            log::warn!("GaussianMixture did not converge in {} iterations", self.max_iter);
        }
        Ok(params)
    } // end of fit
} // end of impl GaussianMixture

impl ClustererT for GaussianMixture {
    fn cluster(&self, data: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>> {
        let params = self.fit(data)?;
        let logp = self.weighted_log_prob(data, &params);
        let labels = logp
            .rows()
            .into_iter()
            .map(|row| argmax(&row.to_vec()) as i64)
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
    fn mixture_of_two_blobs() {
        log_init_test();
        let data = two_blobs(12);
        let gmm = GaussianMixture::new(2);
        let params = gmm.fit(&data.view()).unwrap();
        assert!((params.weights.sum() - 1.).abs() < 1.0E-6);
        assert!(params.variances.iter().all(|v| *v > 0.));
        let labels = gmm.cluster(&data.view()).unwrap();
        assert!(labels[..12].iter().all(|l| *l == labels[0]));
        assert!(labels[12..].iter().all(|l| *l == labels[12]));
        assert_ne!(labels[0], labels[12]);
    } // end of mixture_of_two_blobs

    #[test]
    fn log_sum_exp_stable() {
        let v = log_sum_exp(&[1000., 1000.]);
        assert!((v - (1000. + 2f64.ln())).abs() < 1.0E-9);
    }
} // end of mod tests
