//! Default worker : moments of the weights of the edges incident to each node.
//!
//! For a network, the adjacency is stored as a symetric csr matrix over the gene catalog
//! (duplicated edges are summed). The row of a node gives the weights of its incident edges,
//! transformed according to the averaging mode, and we compute on these values
//! - raw moments m_k = mean(x^k)
//! - standardized moments : mean, variance, skewness, kurtosis.
//!
//! A node without edge has all its moments at 0, as has a skewness or kurtosis with a null variance.

use ndarray::Array1;
use sprs::{CsMatI, TriMatI};

use crate::embedding::*;
use crate::errors::StudyError;
use crate::io::csv::read_edge_list;

// variance below which standardized moments of order 3 and 4 are set to 0
const VARIANCE_EPSIL: f64 = 1.0E-12;

/// moments of a sample. Returns the 8 values in [MOMENT_SELECTORS] order.
pub fn sample_moments(values: &[f64]) -> [f64; NB_MOMENTS] {
    let mut res = [0f64; NB_MOMENTS];
    if values.is_empty() {
        return res;
    }
    let n = values.len() as f64;
    let mut raw = [0f64; 4];
    for x in values {
        let mut p = 1.;
        for r in raw.iter_mut() {
            p *= *x;
            *r += p;
        }
    }
    raw.iter_mut().for_each(|r| *r /= n);
    let mean = raw[0];
    let mu2 = (raw[1] - mean * mean).max(0.);
    let mu3 = raw[2] - 3. * mean * raw[1] + 2. * mean.powi(3);
    let mu4 = raw[3] - 4. * mean * raw[2] + 6. * mean * mean * raw[1] - 3. * mean.powi(4);
    let (skew, kurt) = if mu2 > VARIANCE_EPSIL {
        (mu3 / mu2.powf(1.5), mu4 / (mu2 * mu2))
    } else {
        (0., 0.)
    };
    let standardized = [mean, mu2, skew, kurt];
    for order in 0..4 {
        res[2 * order] = standardized[order];
        res[2 * order + 1] = raw[order];
    }
    res
} // end of sample_moments

/// The default [MomentEmbedderT].
#[derive(Copy, Clone, Debug, Default)]
pub struct EdgeMomentEmbedder;

impl EdgeMomentEmbedder {
    pub fn new() -> Self {
        EdgeMomentEmbedder
    }

    fn transform(average_type: u8, w: f64) -> f64 {
        match average_type {
            0 => w.ln_1p(),
            _ => w,
        }
    }

    /// loads network of rank net as a symetric csr matrix of transformed weights
    fn load_adjacency(context: &EmbedContext, net: usize) -> anyhow::Result<CsMatI<f64, usize>> {
        let path = &context.network_files[net];
        let edges = read_edge_list(path)?;
        let ngene = context.ngene;
        let mut rows = Vec::<usize>::with_capacity(2 * edges.len());
        let mut cols = Vec::<usize>::with_capacity(2 * edges.len());
        let mut values = Vec::<f64>::with_capacity(2 * edges.len());
        for e in &edges {
            if e.node_a >= ngene || e.node_b >= ngene {
                return Err(StudyError::data_format(format!(
                    "edge ({}, {}) of {} out of gene catalog of size {}",
                    e.node_a, e.node_b, path.display(), ngene
                )).into());
            }
            let x = Self::transform(context.average_type, e.weight);
            rows.push(e.node_a);
            cols.push(e.node_b);
            values.push(x);
            if e.node_a != e.node_b {
                rows.push(e.node_b);
                cols.push(e.node_a);
                values.push(x);
            }
        }
        let trimat = TriMatI::<f64, usize>::from_triplets((ngene, ngene), rows, cols, values);
        Ok(trimat.to_csr())
    } // end of load_adjacency

    fn row_moments(csr: &CsMatI<f64, usize>, row: usize) -> [f64; NB_MOMENTS] {
        match csr.outer_view(row) {
            Some(view) => sample_moments(view.data()),
            None => [0f64; NB_MOMENTS],
        }
    }

    fn embed_network(context: &EmbedContext, net: usize) -> anyhow::Result<EmbeddingOutput> {
        let csr = Self::load_adjacency(context, net)?;
        let mut moments = vec![Array1::<f64>::zeros(context.ngene); NB_MOMENTS];
        for node in 0..context.ngene {
            let m = Self::row_moments(&csr, node);
            for (k, v) in m.iter().enumerate() {
                moments[k][node] = *v;
            }
        }
        EmbeddingOutput::new(moments)
    } // end of embed_network

    // each call reloads every network, this level is for small collections
    fn embed_node(context: &EmbedContext, node: usize) -> anyhow::Result<EmbeddingOutput> {
        let nb_net = context.network_files.len();
        let mut moments = vec![Array1::<f64>::zeros(nb_net); NB_MOMENTS];
        for net in 0..nb_net {
            let csr = Self::load_adjacency(context, net)?;
            let m = Self::row_moments(&csr, node);
            for (k, v) in m.iter().enumerate() {
                moments[k][net] = *v;
            }
        }
        EmbeddingOutput::new(moments)
    } // end of embed_node
} // end of impl EdgeMomentEmbedder

impl MomentEmbedderT for EdgeMomentEmbedder {
    fn embed(&self, context: &EmbedContext, index: usize) -> anyhow::Result<EmbeddingOutput> {
        log::trace!("EdgeMomentEmbedder::embed index {}", index);
        match context.level {
            AggregationLevel::Network => Self::embed_network(context, index),
            AggregationLevel::Node => Self::embed_node(context, index),
        }
    }
} // end of impl MomentEmbedderT for EdgeMomentEmbedder

#[cfg(test)]
mod tests {

    use super::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn moments_of_small_sample() {
        log_init_test();
        let m = sample_moments(&[1., 2., 3., 4.]);
        // mean and raw moment of order 1
        assert!((m[0] - 2.5).abs() < 1.0E-12);
        assert!((m[1] - 2.5).abs() < 1.0E-12);
        // variance 1.25, E(x^2) = 7.5
        assert!((m[2] - 1.25).abs() < 1.0E-12);
        assert!((m[3] - 7.5).abs() < 1.0E-12);
        // symetric sample has no skewness
        assert!(m[4].abs() < 1.0E-12);
        // E(x^4) = (1+16+81+256)/4
        assert!((m[7] - 88.5).abs() < 1.0E-12);
        // kurtosis of uniform 4 points : mu4 / mu2^2 = 2.5625 / 1.5625
        assert!((m[6] - 1.64).abs() < 1.0E-12);
        // constant sample
        let m = sample_moments(&[2., 2.]);
        assert_eq!(m[2], 0.);
        assert_eq!(m[4], 0.);
        assert_eq!(m[6], 0.);
        assert_eq!(sample_moments(&[]), [0.; NB_MOMENTS]);
    } // end of moments_of_small_sample

    #[test]
    fn network_level_output() {
        log_init_test();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.txt");
        std::fs::write(&path, "0 1 1.0\n1 2 3.0\n").unwrap();
        let context = EmbedContext {
            network_files: vec![path],
            average_type: 1,
            ngene: 4,
            level: AggregationLevel::Network,
            intra_threads: 1,
        };
        let out = EdgeMomentEmbedder::new().embed(&context, 0).unwrap();
        let mean = out.get_moment(&MomentSelector::new(1, MomentKind::Sm).unwrap());
        assert_eq!(mean.len(), 4);
        assert_eq!(mean[0], 1.);
        assert_eq!(mean[1], 2.);
        assert_eq!(mean[2], 3.);
        // isolated node
        assert_eq!(mean[3], 0.);
        let var = out.get_moment(&MomentSelector::new(2, MomentKind::Sm).unwrap());
        assert_eq!(var[1], 1.);
    } // end of network_level_output

    #[test]
    fn node_out_of_catalog() {
        log_init_test();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.txt");
        std::fs::write(&path, "0 7 1.0\n").unwrap();
        let context = EmbedContext {
            network_files: vec![path],
            average_type: 0,
            ngene: 4,
            level: AggregationLevel::Network,
            intra_threads: 1,
        };
        let err = EdgeMomentEmbedder::new().embed(&context, 0).unwrap_err();
        assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::DataFormat(_))));
    } // end of node_out_of_catalog
} // end of mod tests
