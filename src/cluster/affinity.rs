//! Precomputed distance matrix between networks for the app and acp strategies.
//!
//! Two networks are compared on the genes they share : the distance is the euclidean distance
//! between their embedding rows restricted to the columns of the genes present in both.
//! Pairs sharing no gene are imputed afterwards with the mean of the computed (positive) cells.
//! The diagonal is 0.

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, ArrayView1};

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::errors::StudyError;
use crate::io::csv::{get_node_set, read_edge_list};

/// the set of nodes appearing in each network file
pub fn load_node_sets(files: &[PathBuf]) -> anyhow::Result<Vec<BTreeSet<usize>>> {
    files
        .iter()
        .map(|f| read_edge_list(f).map(|edges| get_node_set(&edges)))
        .collect()
}

/// distance between two rows restricted to common indexes
pub fn restricted_distance(row1: &ArrayView1<f64>, row2: &ArrayView1<f64>, common: &[usize]) -> f64 {
    common
        .iter()
        .map(|i| (row1[*i] - row2[*i]) * (row1[*i] - row2[*i]))
        .sum::<f64>()
        .sqrt()
}

/// builds the matrix of restricted distances between the first node_sets.len() rows of embedding.
pub fn build_precomputed_affinity(node_sets: &[BTreeSet<usize>], embedding: &Array2<f64>) -> anyhow::Result<Array2<f64>> {
    let nb_net = node_sets.len();
    if embedding.nrows() < nb_net {
        return Err(StudyError::data_format(format!(
            "embedding has {} rows for {} networks",
            embedding.nrows(),
            nb_net
        )).into());
    }
    let ncols = embedding.ncols();
    let mut dist = Array2::<f64>::zeros((nb_net, nb_net));
    let nb_pairs = (nb_net * nb_net.saturating_sub(1) / 2) as u64;
    let pb = ProgressBar::new(nb_pairs);
    pb.set_style(ProgressStyle::default_bar().template("{msg} {bar:40} {pos}/{len}")?);
    pb.set_message("affinity");
    for g1 in 0..nb_net {
        for g2 in (g1 + 1)..nb_net {
            let common: Vec<usize> = node_sets[g1].intersection(&node_sets[g2]).cloned().collect();
            if let Some(last) = common.last() {
                if *last >= ncols {
                    pb.finish_and_clear();
                    return Err(StudyError::data_format(format!(
                        "node {} shared by networks {} and {} beyond embedding width {}",
                        last, g1, g2, ncols
                    )).into());
                }
                let d = restricted_distance(&embedding.row(g1), &embedding.row(g2), &common);
                dist[[g1, g2]] = d;
                dist[[g2, g1]] = d;
            }
            pb.inc(1);
        }
    }
    pb.finish_and_clear();
    // imputation of pairs without distance
    let computed: Vec<f64> = dist.iter().filter(|v| **v > 0.).cloned().collect();
    if computed.is_empty() && nb_net > 1 {
        return Err(StudyError::clustering("no pair of networks with a positive distance, cannot impute").into());
    }
    let mean = computed.iter().sum::<f64>() / computed.len().max(1) as f64;
    let mut nb_imputed = 0;
    for g1 in 0..nb_net {
        for g2 in 0..nb_net {
            if g1 != g2 && dist[[g1, g2]] == 0. {
                dist[[g1, g2]] = mean;
                nb_imputed += 1;
            }
        }
    }
    dist.diag_mut().fill(0.);
    log::info!("precomputed affinity {} x {}, {} cells imputed with {:.3e}", nb_net, nb_net, nb_imputed, mean);
    Ok(dist)
} // end of build_precomputed_affinity

#[cfg(test)]
mod tests {

    use super::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn set(v: &[usize]) -> BTreeSet<usize> {
        v.iter().cloned().collect()
    }

    #[test]
    fn four_networks() {
        log_init_test();
        // nodes {0,1} {1,2} {0,1,2} {3}
        let node_sets = vec![set(&[0, 1]), set(&[1, 2]), set(&[0, 1, 2]), set(&[3])];
        let embedding = ndarray::arr2(&[
            [1., 2., 0., 0.],
            [0., 5., 3., 0.],
            [4., 2., 7., 0.],
            [0., 0., 0., 9.],
        ]);
        let dist = build_precomputed_affinity(&node_sets, &embedding).unwrap();
        // 0-1 share node 1
        assert!((dist[[0, 1]] - 3.).abs() < 1.0E-12);
        // 0-2 share 0 and 1
        assert!((dist[[0, 2]] - 3.).abs() < 1.0E-12);
        // 1-2 share 1 and 2 : sqrt(9 + 16)
        assert!((dist[[1, 2]] - 5.).abs() < 1.0E-12);
        // network 3 shares nothing, imputed with mean of positive cells
        let mean = (2. * 3. + 2. * 3. + 2. * 5.) / 6.;
        for g in 0..3 {
            assert!((dist[[g, 3]] - mean).abs() < 1.0E-12);
            assert!((dist[[3, g]] - mean).abs() < 1.0E-12);
        }
        for g1 in 0..4 {
            assert_eq!(dist[[g1, g1]], 0.);
            for g2 in 0..4 {
                assert_eq!(dist[[g1, g2]], dist[[g2, g1]]);
            }
        }
    } // end of four_networks

    #[test]
    fn disjoint_pairs_imputed() {
        log_init_test();
        // A and B overlap, C and D overlap, nothing between {A,B} and {C,D}
        let node_sets = vec![set(&[0, 1]), set(&[1, 2]), set(&[3, 4]), set(&[4, 5])];
        let embedding = ndarray::arr2(&[
            [0., 1., 0., 0., 0., 0.],
            [0., 3., 0., 0., 0., 0.],
            [0., 0., 0., 0., 2., 0.],
            [0., 0., 0., 0., 8., 0.],
        ]);
        let dist = build_precomputed_affinity(&node_sets, &embedding).unwrap();
        assert_eq!(dist[[0, 1]], 2.);
        assert_eq!(dist[[2, 3]], 6.);
        for (g1, g2) in [(0, 2), (0, 3), (1, 2), (1, 3)] {
            assert_eq!(dist[[g1, g2]], 4.);
            assert_eq!(dist[[g2, g1]], 4.);
        }
    } // end of disjoint_pairs_imputed

    #[test]
    fn nothing_to_impute_from() {
        log_init_test();
        let node_sets = vec![set(&[0]), set(&[1])];
        let embedding = Array2::<f64>::zeros((2, 2));
        let err = build_precomputed_affinity(&node_sets, &embedding).unwrap_err();
        assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::ClusteringAlgorithm(_))));
    }

    #[test]
    fn node_beyond_width() {
        log_init_test();
        let node_sets = vec![set(&[0, 5]), set(&[5])];
        let embedding = Array2::<f64>::zeros((2, 3));
        let err = build_precomputed_affinity(&node_sets, &embedding).unwrap_err();
        assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::DataFormat(_))));
    }

    #[test]
    fn node_sets_from_files() {
        log_init_test();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.txt");
        std::fs::write(&path, "0\t3\t1.0\n3\t2\t0.5\n").unwrap();
        let sets = load_node_sets(&[path]).unwrap();
        assert_eq!(sets[0], set(&[0, 2, 3]));
    }
} // end of mod tests
