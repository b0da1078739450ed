//! Labels as returned by a strategy are arbitrary integers (noise is -1 for optics).
//! They are remapped to 0..k-1, k the number of distinct labels, in increasing order of raw label,
//! and dumped beside the embeddings.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::StudyConfig;
use crate::io::arraybson::dump_labels;
use crate::io::output::{get_assignment_path, get_separate_dir};

/// remaps raw labels to contiguous ids, the smallest raw label gets 0
pub fn normalize_labels(raw: &[i64]) -> Vec<usize> {
    let distinct: BTreeSet<i64> = raw.iter().cloned().collect();
    let sorted: Vec<i64> = distinct.into_iter().collect();
    raw.iter()
        .map(|l| sorted.binary_search(l).unwrap_or(0))
        .collect()
}

/// number of distinct labels
pub fn get_nb_clusters(labels: &[usize]) -> usize {
    labels.iter().collect::<BTreeSet<&usize>>().len()
}

/// dumps labels at path, creating its directory if needed
pub fn persist_labels(path: &Path, labels: &[usize]) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    dump_labels(path, labels)?;
    log::info!("cluster assignment ({} clusters) dumped in {}", get_nb_clusters(labels), path.display());
    Ok(())
}

/// dumps labels under the assignment name of a configuration, returns the path
pub fn persist_assignment(config: &StudyConfig, labels: &[usize]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(get_separate_dir(&config.datadir))?;
    let path = get_assignment_path(config);
    persist_labels(&path, labels)?;
    Ok(path)
}

// end of mod tests
