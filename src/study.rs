//! A clustering study from configuration to report.
//!
//! catalog -> monitor start -> embedding (or cache) -> affinity (app, acp) -> clustering
//! -> labels -> monitor stop -> report

use std::path::PathBuf;

use crate::cluster::affinity::{build_precomputed_affinity, load_node_sets};
use crate::cluster::labels::{get_nb_clusters, normalize_labels, persist_assignment};
use crate::cluster::{ClusterInput, ClusterStrategy, ClustererT};
use crate::config::StudyConfig;
use crate::embedding::assemble::{get_embedding_matrix, CacheDecision};
use crate::embedding::batch::BatchRunner;
use crate::embedding::MomentEmbedderT;
use crate::io::catalog::load_catalog;
use crate::io::output::get_report_path;
use crate::monitor::device::DeviceMemoryProbe;
use crate::monitor::report::MonitoringReport;
use crate::monitor::ResourceMonitor;

/// what a study produced
#[derive(Clone, Debug)]
pub struct StudyResult {
    /// cluster id of each network
    pub labels: Vec<usize>,
    pub assignment_path: PathBuf,
    /// the embedding matrix used
    pub embedding_path: PathBuf,
    /// was the embedding computed or loaded
    pub decision: CacheDecision,
    pub report: MonitoringReport,
    pub report_path: PathBuf,
}

/// runs a study with a given worker and device probe
pub fn run_study(
    config: &StudyConfig,
    embedder: &dyn MomentEmbedderT,
    probe: &mut dyn DeviceMemoryProbe,
) -> anyhow::Result<StudyResult> {
    log::info!(
        "study : method {}, organism {}, network set {}, cluster method {}, level {}, embed type {}",
        config.method, config.organism, config.network_set, config.cluster_method, config.level, config.embed_type
    );
    let catalog = load_catalog(config)?;
    println!("number of networks : {}, number of genes : {}", catalog.get_nb_networks(), catalog.get_ngene());
    //
    let monitor = ResourceMonitor::start(probe)?;
    let runner = BatchRunner::new(config.num_thread).with_progress(true);
    let embedding = get_embedding_matrix(config, &catalog, embedder, &runner)?;
    //
    let strategy = ClusterStrategy::from_config(config)?;
    let raw_labels = match strategy.get_input() {
        ClusterInput::Embedding => strategy.cluster(&embedding.matrix.view())?,
        ClusterInput::Precomputed => {
            let node_sets = load_node_sets(catalog.get_network_files())?;
            let affinity = build_precomputed_affinity(&node_sets, &embedding.matrix)?;
            strategy.cluster(&affinity.view())?
        }
    };
    let labels = normalize_labels(&raw_labels);
    println!("{} networks in {} clusters", labels.len(), get_nb_clusters(&labels));
    let assignment_path = persist_assignment(config, &labels)?;
    //
    let report = monitor.stop()?;
    let report_path = get_report_path(config);
    report.dump(&report_path)?;
    println!("{}", report);
    Ok(StudyResult {
        labels,
        assignment_path,
        embedding_path: embedding.path,
        decision: embedding.decision,
        report,
        report_path,
    })
} // end of run_study
