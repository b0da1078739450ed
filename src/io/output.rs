//! Names of the artifacts of a study.
//!
//! Every artifact is keyed by the run configuration so that two runs with the same
//! configuration address the same files :
//! - embedding matrices : `data/embed/{cap}--{net}_{org}_type{avg}_{embed_type}{axis}_{level}.bson`
//! - cluster assignment : `data/separate/{cap}--{net}_{org}_type{avg}_{embed_type}{axis}_{cluster}_{level}.bson`
//! - monitoring report : `{monitordir}/cluster:{method}_M={cap}_results.txt`

use std::path::{Path, PathBuf};

use crate::config::StudyConfig;

/// extension of the bson artifacts
pub const BSON_EXT: &str = "bson";

/// The part of the configuration keying embedding artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedCacheKey {
    /// cap on networks as rendered in names
    cap: String,
    network_set: String,
    organism: String,
    average_type: u8,
    level: String,
    /// directory data/embed
    embed_dir: PathBuf,
} // end of EmbedCacheKey

impl EmbedCacheKey {
    pub fn new(config: &StudyConfig) -> Self {
        EmbedCacheKey {
            cap: config.cap_label(),
            network_set: config.network_set.clone(),
            organism: config.organism.clone(),
            average_type: config.average_type,
            level: config.level.clone(),
            embed_dir: get_embed_dir(&config.datadir),
        }
    }

    /// the common prefix of the names of this configuration
    fn get_stem(&self) -> String {
        format!("{}--{}_{}_type{}_", self.cap, self.network_set, self.organism, self.average_type)
    }

    /// path of the matrix of an embed type and axis
    pub fn get_path(&self, embed_type: &str, axis: usize) -> PathBuf {
        let name = format!("{}{}{}_{}.{}", self.get_stem(), embed_type, axis, self.level, BSON_EXT);
        self.embed_dir.join(name)
    }

    /// directory holding the matrices
    pub fn get_embed_dir(&self) -> &Path {
        &self.embed_dir
    }
} // end of impl EmbedCacheKey

pub fn get_embed_dir(datadir: &Path) -> PathBuf {
    datadir.join("data").join("embed")
}

pub fn get_separate_dir(datadir: &Path) -> PathBuf {
    datadir.join("data").join("separate")
}

/// path of the cluster assignment of a run
pub fn get_assignment_path(config: &StudyConfig) -> PathBuf {
    let name = format!(
        "{}--{}_{}_type{}_{}{}_{}_{}.{}",
        config.cap_label(),
        config.network_set,
        config.organism,
        config.average_type,
        config.embed_type,
        config.axis,
        config.cluster_method,
        config.level,
        BSON_EXT
    );
    get_separate_dir(&config.datadir).join(name)
} // end of get_assignment_path

/// path of the monitoring report of a run
pub fn get_report_path(config: &StudyConfig) -> PathBuf {
    let name = format!("cluster:{}_M={}_results.txt", config.method, config.cap_label());
    config.monitordir.join(name)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn names_follow_configuration() {
        let mut config = StudyConfig::default();
        config.datadir = PathBuf::from("/data/root");
        config.num_nets = Some(20);
        let key = EmbedCacheKey::new(&config);
        assert_eq!(
            key.get_path("Qm3", 1),
            PathBuf::from("/data/root/data/embed/20--GeneMANIA_ex_yeast_type0_Qm31_network.bson")
        );
        assert_eq!(
            get_assignment_path(&config),
            PathBuf::from("/data/root/data/separate/20--GeneMANIA_ex_yeast_type0_Qsm41_app_network.bson")
        );
        assert_eq!(
            get_report_path(&config),
            PathBuf::from("monitoring_results/cluster:DCA_M=20_results.txt")
        );
        // another cap, another key
        config.num_nets = None;
        assert_ne!(EmbedCacheKey::new(&config), key);
    } // end of names_follow_configuration
} // end of mod tests
