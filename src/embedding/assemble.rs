//! From worker outputs to embedding matrices, with a cache on disk.
//!
//! For each of the 8 selectors, in the order of [MOMENT_SELECTORS], the component of every
//! output is stacked as a row (row i comes from unit of work i) and the matrix is dumped under
//! a name keyed by the configuration (see [EmbedCacheKey]).
//!
//! Cache policy : computation is skipped and the artifact loaded directly when the target path
//! exists, **or when the path contains the substring "all"**. The substring rule can match
//! unrelated names (a data directory called `install` is enough) and then loads whatever is,
//! or is not, at that path. It is kept as the established behaviour and reported as
//! [CacheDecision::Bypass] with a warning.

use ndarray::{Array2, Axis};

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use cpu_time::ProcessTime;

use crate::config::StudyConfig;
use crate::embedding::batch::BatchRunner;
use crate::embedding::*;
use crate::errors::StudyError;
use crate::io::arraybson::{dump_matrix, load_matrix};
use crate::io::catalog::NetworkCatalog;
use crate::io::output::EmbedCacheKey;

/// substring of a path forcing the load of an artifact
pub const BYPASS_SUBSTRING: &str = "all";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheDecision {
    /// the artifact exists, load it
    Hit,
    /// the artifact does not exist but its path matches the bypass rule, load it anyway
    Bypass,
    /// compute and persist
    Miss,
}

impl CacheDecision {
    /// true if computation is skipped
    pub fn skips_computation(&self) -> bool {
        !matches!(self, CacheDecision::Miss)
    }
}

/// decides what to do for the artifact at path
pub fn cache_decision(path: &Path) -> CacheDecision {
    if path.exists() {
        CacheDecision::Hit
    } else if path.to_string_lossy().contains(BYPASS_SUBSTRING) {
        CacheDecision::Bypass
    } else {
        CacheDecision::Miss
    }
} // end of cache_decision

/// stacks the component of a selector of every output, in output order
pub fn assemble_matrix(outputs: &[EmbeddingOutput], selector: &MomentSelector) -> anyhow::Result<Array2<f64>> {
    let nbrow = outputs.len();
    let nbcol = match outputs.first() {
        Some(out) => out.get_moment(selector).len(),
        None => 0,
    };
    let mut matrix = Array2::<f64>::zeros((nbrow, nbcol));
    for (i, out) in outputs.iter().enumerate() {
        let v = out.get_moment(selector);
        if v.len() != nbcol {
            return Err(StudyError::data_format(format!(
                "output {} has a {} vector of length {}, expected {}",
                i, selector, v.len(), nbcol
            )).into());
        }
        matrix.row_mut(i).assign(v);
    }
    Ok(matrix)
} // end of assemble_matrix

/// the 8 matrices in [MOMENT_SELECTORS] order
pub fn assemble_all(outputs: &[EmbeddingOutput]) -> anyhow::Result<Vec<(MomentSelector, Array2<f64>)>> {
    MOMENT_SELECTORS
        .iter()
        .map(|s| assemble_matrix(outputs, s).map(|m| (*s, m)))
        .collect()
}

/// dumps all matrices. Each one is first written to a temporary name, they are renamed once all
/// are written so that a failure leaves no artifact of this configuration.
pub fn persist_all(key: &EmbedCacheKey, matrices: &[(MomentSelector, Array2<f64>)]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(key.get_embed_dir())?;
    let mut staged = Vec::<(PathBuf, PathBuf)>::with_capacity(matrices.len());
    for (selector, matrix) in matrices {
        let target = key.get_path(&selector.to_string(), MOMENT_AXIS);
        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        if let Err(e) = dump_matrix(&tmp, matrix) {
            for (t, _) in &staged {
                let _ = std::fs::remove_file(t);
            }
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        staged.push((tmp, target));
    }
    let mut written = Vec::<PathBuf>::with_capacity(staged.len());
    for (tmp, target) in staged {
        std::fs::rename(&tmp, &target)?;
        log::info!("embedding dumped in {}", target.display());
        written.push(target);
    }
    Ok(written)
} // end of persist_all

/// The embedding matrix a study clusters, and whether it had to be computed.
pub struct EmbeddingMatrix {
    pub matrix: Array2<f64>,
    pub path: PathBuf,
    pub decision: CacheDecision,
}

/// returns the matrix selected by the configuration, computing and persisting the 8 matrices
/// of the configuration first if the cache policy asks for it.
/// The matrix is restricted to its first rows, one by network of the catalog.
pub fn get_embedding_matrix(
    config: &StudyConfig,
    catalog: &NetworkCatalog,
    embedder: &dyn MomentEmbedderT,
    runner: &BatchRunner,
) -> anyhow::Result<EmbeddingMatrix> {
    let key = EmbedCacheKey::new(config);
    let path = key.get_path(&config.embed_type, config.axis);
    let decision = cache_decision(&path);
    match decision {
        CacheDecision::Hit => log::info!("embedding found in {}", path.display()),
        CacheDecision::Bypass => log::warn!(
            "path {} contains {:?}, embedding computation skipped without checking the artifact",
            path.display(),
            BYPASS_SUBSTRING
        ),
        CacheDecision::Miss => {
            println!("{}", path.display());
            println!("calculate embedding for each network");
            let cpu_start = ProcessTime::now();
            let sys_start = SystemTime::now();
            if config.run_mashup {
                log::info!("[Mashup] {}_{}_{}_{}", config.method, config.organism, config.network_set, config.ndim);
                log::warn!("mashup integration is delegated to an external tool, going on with moment embedding");
            }
            let level = AggregationLevel::parse(&config.level)?;
            let context = EmbedContext {
                network_files: catalog.get_network_files().to_vec(),
                average_type: config.average_type,
                ngene: catalog.get_ngene(),
                level,
                intra_threads: config.torch_thread,
            };
            log::debug!("workers may use {} threads each", context.intra_threads);
            let outputs = runner.run_embedder(embedder, &context)?;
            let matrices = assemble_all(&outputs)?;
            persist_all(&key, &matrices)?;
            log::info!(
                "embedding computation sys time(s) {:.2e} cpu time(s) {:.2e}",
                sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.),
                cpu_start.elapsed().as_secs_f64()
            );
            // the persisted selectors are the only ones we can reload
            MomentSelector::parse(&config.embed_type)?;
            if config.axis != MOMENT_AXIS {
                return Err(StudyError::configuration(format!("axis {} not computed, only axis {}", config.axis, MOMENT_AXIS)).into());
            }
        }
    }
    let matrix = load_matrix(&path).map_err(|e| {
        if decision == CacheDecision::Bypass {
            anyhow::Error::new(StudyError::cache(format!("artifact selected by bypass rule unusable : {}", e)))
        } else {
            e
        }
    })?;
    let nb_net = catalog.get_nb_networks().min(matrix.nrows());
    let matrix = matrix.slice_axis(Axis(0), (0..nb_net).into()).to_owned();
    log::info!("embedding matrix shape {:?}", matrix.dim());
    Ok(EmbeddingMatrix { matrix, path, decision })
} // end of get_embedding_matrix

#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::Array1;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn fake_output(i: usize, len: usize) -> EmbeddingOutput {
        let moments = (0..NB_MOMENTS)
            .map(|k| Array1::from_elem(len, (10 * i + k) as f64))
            .collect();
        EmbeddingOutput::new(moments).unwrap()
    }

    #[test]
    fn rows_follow_outputs() {
        log_init_test();
        let outputs: Vec<EmbeddingOutput> = (0..5).map(|i| fake_output(i, 3)).collect();
        let all = assemble_all(&outputs).unwrap();
        assert_eq!(all.len(), NB_MOMENTS);
        for (k, (selector, m)) in all.iter().enumerate() {
            assert_eq!(selector.get_position(), k);
            assert_eq!(m.dim(), (5, 3));
            for i in 0..5 {
                assert_eq!(m[[i, 2]], (10 * i + k) as f64);
            }
        }
    } // end of rows_follow_outputs

    #[test]
    fn ragged_outputs_rejected() {
        log_init_test();
        let outputs = vec![fake_output(0, 3), fake_output(1, 4)];
        assert!(assemble_all(&outputs).is_err());
    }

    #[test]
    fn decisions() {
        log_init_test();
        let dir = tempfile::Builder::new().prefix("cache").tempdir().unwrap();
        let present = dir.path().join("x_Qsm41_network.bson");
        std::fs::write(&present, b"x").unwrap();
        assert_eq!(cache_decision(&present), CacheDecision::Hit);
        let absent = dir.path().join("y_Qsm41_network.bson");
        if !absent.to_string_lossy().contains(BYPASS_SUBSTRING) {
            assert_eq!(cache_decision(&absent), CacheDecision::Miss);
        }
        let bypass = dir.path().join("10--all_yeast_type0_Qsm41_network.bson");
        assert_eq!(cache_decision(&bypass), CacheDecision::Bypass);
        assert!(cache_decision(&bypass).skips_computation());
    } // end of decisions
} // end of mod tests
