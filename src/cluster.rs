//! Clustering of the networks of a study.
//!
//! A strategy is selected by a tag and consumes either the embedding matrix (one row by network)
//! or the precomputed distance matrix built by [affinity]. It returns one integer label by row,
//! with no constraint on their range, that [labels] remaps to contiguous ids.
//!
//! | tag | input        | algorithm                                              |
//! |-----|--------------|--------------------------------------------------------|
//! | gm  | embedding    | gaussian mixture, count components                     |
//! | sc  | embedding    | spectral clustering, count clusters                    |
//! | km  | embedding    | mini batch k-means, count clusters                     |
//! | op  | embedding    | optics, min_samples = count                            |
//! | ms  | embedding    | mean shift, count unused                               |
//! | ap  | embedding    | affinity propagation, damping count / 40               |
//! | app | precomputed  | affinity propagation on the matrix, damping count / 40 |
//! | acp | precomputed  | average linkage, count clusters                        |

use ndarray::ArrayView2;

use std::fmt;

use crate::config::StudyConfig;
use crate::errors::StudyError;

pub mod affinity;
pub mod affprop;
pub mod agglomerative;
pub mod gmm;
pub mod kmeans;
pub mod labels;
pub mod linalg;
pub mod meanshift;
pub mod optics;
pub mod spectral;

use affprop::{AffinityPropagation, ApSimilarity};
use agglomerative::AverageLinkage;
use gmm::GaussianMixture;
use kmeans::MiniBatchKMeans;
use meanshift::MeanShift;
use optics::Optics;
use spectral::SpectralClustering;

/// divisor giving affinity propagation damping from the count parameter
pub const DAMPING_DIVISOR: f64 = 40.;

/// Anything turning a matrix, one row by sample, into a label by sample.
pub trait ClustererT {
    fn cluster(&self, data: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>>;
}

/// checks there are samples and enough of them for the requested number of clusters
pub(crate) fn check_samples(tag: &str, nb_samples: usize, nb_clusters: usize) -> anyhow::Result<()> {
    if nb_samples == 0 {
        return Err(StudyError::clustering(format!("{} : empty matrix", tag)).into());
    }
    if nb_clusters == 0 {
        return Err(StudyError::clustering(format!("{} : number of clusters must be positive", tag)).into());
    }
    if nb_samples < nb_clusters {
        return Err(StudyError::clustering(format!(
            "{} : {} samples for {} clusters",
            tag, nb_samples, nb_clusters
        )).into());
    }
    Ok(())
} // end of check_samples

/// what a strategy clusters
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClusterInput {
    /// the embedding matrix
    Embedding,
    /// the precomputed distance matrix between networks
    Precomputed,
}

pub enum ClusterStrategy {
    GaussianMixture(GaussianMixture),
    Spectral(SpectralClustering),
    MiniBatchKMeans(MiniBatchKMeans),
    Optics(Optics),
    MeanShift(MeanShift),
    AffinityPropagation(AffinityPropagation),
    AffinityPropagationPrecomputed(AffinityPropagation),
    AverageLinkage(AverageLinkage),
}

impl ClusterStrategy {
    /// builds the strategy of a tag. The count parameter is decoded only by strategies using it.
    pub fn new(tag: &str, count: impl Fn() -> anyhow::Result<usize>) -> anyhow::Result<Self> {
        let strategy = match tag {
            "gm" => ClusterStrategy::GaussianMixture(GaussianMixture::new(count()?)),
            "sc" => ClusterStrategy::Spectral(SpectralClustering::new(count()?)),
            "km" => ClusterStrategy::MiniBatchKMeans(MiniBatchKMeans::new(count()?)),
            "op" => ClusterStrategy::Optics(Optics::new(count()?)),
            "ms" => ClusterStrategy::MeanShift(MeanShift::new()),
            "ap" => {
                let damping = count()? as f64 / DAMPING_DIVISOR;
                ClusterStrategy::AffinityPropagation(AffinityPropagation::new(damping, ApSimilarity::NegSquaredEuclidean)?)
            }
            "app" => {
                let damping = count()? as f64 / DAMPING_DIVISOR;
                ClusterStrategy::AffinityPropagationPrecomputed(AffinityPropagation::new(damping, ApSimilarity::Precomputed)?)
            }
            "acp" => ClusterStrategy::AverageLinkage(AverageLinkage::new(count()?)),
            _ => {
                return Err(StudyError::configuration(format!(
                    "unknown cluster method {:?}, expected one of gm, sc, km, op, ms, ap, app, acp",
                    tag
                )).into())
            }
        };
        Ok(strategy)
    } // end of new

    pub fn from_config(config: &StudyConfig) -> anyhow::Result<Self> {
        ClusterStrategy::new(&config.cluster_method, || config.count_param())
    }

    pub fn get_input(&self) -> ClusterInput {
        match self {
            ClusterStrategy::AffinityPropagationPrecomputed(_) | ClusterStrategy::AverageLinkage(_) => ClusterInput::Precomputed,
            _ => ClusterInput::Embedding,
        }
    }

    pub fn get_tag(&self) -> &'static str {
        match self {
            ClusterStrategy::GaussianMixture(_) => "gm",
            ClusterStrategy::Spectral(_) => "sc",
            ClusterStrategy::MiniBatchKMeans(_) => "km",
            ClusterStrategy::Optics(_) => "op",
            ClusterStrategy::MeanShift(_) => "ms",
            ClusterStrategy::AffinityPropagation(_) => "ap",
            ClusterStrategy::AffinityPropagationPrecomputed(_) => "app",
            ClusterStrategy::AverageLinkage(_) => "acp",
        }
    }

    fn get_clusterer(&self) -> &dyn ClustererT {
        match self {
            ClusterStrategy::GaussianMixture(c) => c,
            ClusterStrategy::Spectral(c) => c,
            ClusterStrategy::MiniBatchKMeans(c) => c,
            ClusterStrategy::Optics(c) => c,
            ClusterStrategy::MeanShift(c) => c,
            ClusterStrategy::AffinityPropagation(c) => c,
            ClusterStrategy::AffinityPropagationPrecomputed(c) => c,
            ClusterStrategy::AverageLinkage(c) => c,
        }
    }
} // end of impl ClusterStrategy

impl fmt::Display for ClusterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_tag())
    }
}

impl ClustererT for ClusterStrategy {
    fn cluster(&self, data: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>> {
        log::info!("clustering {} rows with {}", data.nrows(), self.get_tag());
        let labels = self.get_clusterer().cluster(data)?;
        if labels.len() != data.nrows() {
            return Err(StudyError::clustering(format!("{} returned {} labels for {} rows", self, labels.len(), data.nrows())).into());
        }
        Ok(labels)
    }
}

#[cfg(test)]
pub(crate) mod tests {

    use super::*;
    use ndarray::Array2;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// n points on a circle of radius 0.1 around (0, 0) then n around (10, 10)
    pub(crate) fn two_blobs(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((2 * n, 2), |(i, j)| {
            let center = if i < n { 0. } else { 10. };
            let angle = 2. * std::f64::consts::PI * (i % n) as f64 / n as f64;
            let offset = if j == 0 { angle.cos() } else { angle.sin() };
            center + 0.1 * offset
        })
    }

    #[test]
    fn tags() {
        log_init_test();
        for tag in ["gm", "sc", "km", "op", "ms", "ap", "app", "acp"] {
            let strategy = ClusterStrategy::new(tag, || Ok(30)).unwrap();
            assert_eq!(strategy.get_tag(), tag);
        }
        let err = ClusterStrategy::new("xx", || Ok(3)).err().unwrap();
        assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::Configuration(_))));
        // damping 10 / 40 out of range
        let err = ClusterStrategy::new("app", || Ok(10)).err().unwrap();
        assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::ClusteringAlgorithm(_))));
        // mean shift does not need a count
        assert!(ClusterStrategy::new("ms", || Err(anyhow::anyhow!("unused"))).is_ok());
    } // end of tags

    #[test]
    fn inputs() {
        assert_eq!(ClusterStrategy::new("app", || Ok(35)).unwrap().get_input(), ClusterInput::Precomputed);
        assert_eq!(ClusterStrategy::new("acp", || Ok(3)).unwrap().get_input(), ClusterInput::Precomputed);
        assert_eq!(ClusterStrategy::new("km", || Ok(3)).unwrap().get_input(), ClusterInput::Embedding);
    }

    #[test]
    fn every_strategy_gives_a_label_by_row() {
        log_init_test();
        let data = two_blobs(6);
        let dist = linalg::pairwise_distances(&data.view());
        for tag in ["gm", "sc", "km", "op", "ms", "ap", "app", "acp"] {
            let count = if tag.starts_with("ap") { 20 } else { 2 };
            let strategy = ClusterStrategy::new(tag, || Ok(count)).unwrap();
            let input = match strategy.get_input() {
                ClusterInput::Embedding => data.view(),
                ClusterInput::Precomputed => dist.view(),
            };
            let labels = strategy.cluster(&input).unwrap();
            assert_eq!(labels.len(), 12, "strategy {}", tag);
        }
    } // end of every_strategy_gives_a_label_by_row

    #[test]
    fn degenerate_inputs() {
        log_init_test();
        let empty = Array2::<f64>::zeros((0, 2));
        for tag in ["gm", "sc", "km", "op", "ms", "ap", "acp"] {
            let strategy = ClusterStrategy::new(tag, || Ok(20)).unwrap();
            let err = strategy.cluster(&empty.view()).unwrap_err();
            assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::ClusteringAlgorithm(_))), "strategy {}", tag);
        }
    }
} // end of mod tests
