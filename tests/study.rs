//! End to end runs on synthetic network collections.

use ndarray::Array1;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use netcluster::prelude::*;

fn log_init_test() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const NGENE: usize = 10;

/// a temporary data directory whose path does not trigger the bypass rule
fn make_datadir(prefix: &str) -> tempfile::TempDir {
    loop {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir().unwrap();
        if !dir.path().to_string_lossy().contains("all") {
            return dir;
        }
    }
}

/// nb_net networks of organism yeast in network set synth. Network i is a path over
/// genes i % 3 .. i % 3 + 6 with weights depending on i.
fn make_networks(datadir: &Path, nb_net: usize) {
    let orgdir = datadir.join("data").join("networks").join("yeast");
    std::fs::create_dir_all(&orgdir).unwrap();
    let genes: Vec<String> = (0..NGENE).map(|g| format!("YG{:03}", g)).collect();
    std::fs::write(orgdir.join("yeast_synth_genes.txt"), genes.join("\n")).unwrap();
    for i in 0..nb_net {
        let start = i % 3;
        let mut content = String::new();
        for g in start..(start + 6) {
            let w = 1. + ((i * 7 + g) % 5) as f64 * (1. + i as f64 / 2.);
            content.push_str(&format!("{}\t{}\t{}\n", g, g + 1, w));
        }
        let name = format!("yeast_string_v{}_adjacency.txt", i);
        std::fs::write(orgdir.join(name), content).unwrap();
    }
}

fn make_config(datadir: &Path, cluster_method: &str, separate: &str) -> StudyConfig {
    StudyConfig {
        network_set: String::from("synth"),
        num_thread: 3,
        torch_thread: 1,
        cluster_method: String::from(cluster_method),
        separate: String::from(separate),
        datadir: datadir.to_path_buf(),
        monitordir: datadir.join("monitoring_results"),
        ..Default::default()
    }
}

/// counts calls to the default embedder
struct CountingEmbedder {
    calls: AtomicUsize,
    inner: EdgeMomentEmbedder,
}

impl CountingEmbedder {
    fn new() -> Self {
        CountingEmbedder { calls: AtomicUsize::new(0), inner: EdgeMomentEmbedder::new() }
    }

    fn get_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MomentEmbedderT for CountingEmbedder {
    fn embed(&self, context: &EmbedContext, index: usize) -> anyhow::Result<EmbeddingOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(context, index)
    }
}

/// every component of output i is filled with i
struct EchoEmbedder;

impl MomentEmbedderT for EchoEmbedder {
    fn embed(&self, context: &EmbedContext, index: usize) -> anyhow::Result<EmbeddingOutput> {
        let moments = (0..NB_MOMENTS).map(|_| Array1::from_elem(context.ngene, index as f64)).collect();
        EmbeddingOutput::new(moments)
    }
}

fn embedding_files(config: &StudyConfig) -> Vec<PathBuf> {
    let key = EmbedCacheKey::new(config);
    MOMENT_SELECTORS.iter().map(|s| key.get_path(&s.to_string(), MOMENT_AXIS)).collect()
}

#[test]
fn second_run_hits_cache() {
    log_init_test();
    let dir = make_datadir("study");
    make_networks(dir.path(), 6);
    let config = make_config(dir.path(), "km", "2");
    let embedder = CountingEmbedder::new();
    //
    let first = run_study(&config, &embedder, &mut NoDevice).unwrap();
    assert_eq!(first.decision, CacheDecision::Miss);
    assert_eq!(embedder.get_calls(), 6);
    let files = embedding_files(&config);
    let before: Vec<Vec<u8>> = files.iter().map(|f| std::fs::read(f).unwrap()).collect();
    //
    let second = run_study(&config, &embedder, &mut NoDevice).unwrap();
    assert_eq!(second.decision, CacheDecision::Hit);
    assert_eq!(embedder.get_calls(), 6);
    let after: Vec<Vec<u8>> = files.iter().map(|f| std::fs::read(f).unwrap()).collect();
    assert_eq!(before, after);
    assert_eq!(first.labels, second.labels);
} // end of second_run_hits_cache

#[test]
fn rows_follow_network_order() {
    log_init_test();
    let dir = make_datadir("study");
    make_networks(dir.path(), 7);
    let config = make_config(dir.path(), "km", "2");
    let catalog = load_catalog(&config).unwrap();
    let runner = BatchRunner::new(3);
    let embedding = get_embedding_matrix(&config, &catalog, &EchoEmbedder, &runner).unwrap();
    assert_eq!(embedding.matrix.dim(), (7, NGENE));
    for i in 0..7 {
        assert!(embedding.matrix.row(i).iter().all(|x| *x == i as f64));
    }
    // the 8 matrices are written
    assert!(embedding_files(&config).iter().all(|f| f.exists()));
} // end of rows_follow_network_order

#[test]
fn precomputed_pipeline() {
    log_init_test();
    let dir = make_datadir("study");
    make_networks(dir.path(), 5);
    let mut config = make_config(dir.path(), "app", "20");
    config.num_nets = Some(4);
    let result = run_study(&config, &EdgeMomentEmbedder::new(), &mut NoDevice).unwrap();
    assert_eq!(result.labels.len(), 4);
    // contiguous ids
    let nb_clusters = result.labels.iter().max().unwrap() + 1;
    for c in 0..nb_clusters {
        assert!(result.labels.contains(&c));
    }
    assert_eq!(load_labels(&result.assignment_path).unwrap(), result.labels);
    assert!(result.assignment_path.to_string_lossy().contains("4--synth_yeast_type0_Qsm41_app_network"));
    // report
    assert!(result.report_path.ends_with("cluster:DCA_M=4_results.txt"));
    let content = std::fs::read_to_string(&result.report_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert!(value.get("time (hrs)").is_some());
    assert!(value.get("peak CPU memory (MiB)").is_some());
    assert_eq!(value["peak GPU memory (MiB)"], 0);
    // average linkage on the same embedding, reloaded
    config.cluster_method = String::from("acp");
    config.separate = String::from("2");
    let result = run_study(&config, &EdgeMomentEmbedder::new(), &mut NoDevice).unwrap();
    assert_eq!(result.decision, CacheDecision::Hit);
    assert_eq!(result.labels.iter().max(), Some(&1));
} // end of precomputed_pipeline

#[test]
fn unknown_cluster_method() {
    log_init_test();
    let dir = make_datadir("study");
    make_networks(dir.path(), 3);
    let config = make_config(dir.path(), "dbscan", "2");
    let err = run_study(&config, &EdgeMomentEmbedder::new(), &mut NoDevice).unwrap_err();
    assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::Configuration(_))));
    // embedding was computed before the tag was looked at
    assert!(embedding_files(&config).iter().all(|f| f.exists()));
} // end of unknown_cluster_method

#[test]
fn bypass_without_artifact() {
    log_init_test();
    // "install" contains "all" : the embedding is never computed
    let dir = tempfile::Builder::new().prefix("install").tempdir().unwrap();
    make_networks(dir.path(), 3);
    let config = make_config(dir.path(), "km", "2");
    let embedder = CountingEmbedder::new();
    let err = run_study(&config, &embedder, &mut NoDevice).unwrap_err();
    assert_eq!(embedder.get_calls(), 0);
    assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::CacheConsistency(_))));
} // end of bypass_without_artifact

#[test]
fn node_level_work() {
    log_init_test();
    let dir = make_datadir("study");
    make_networks(dir.path(), 4);
    let mut config = make_config(dir.path(), "km", "2");
    config.level = String::from("node");
    let embedder = CountingEmbedder::new();
    let catalog = load_catalog(&config).unwrap();
    let embedding = get_embedding_matrix(&config, &catalog, &embedder, &BatchRunner::new(3)).unwrap();
    // one call by gene, rows restricted to the number of networks
    assert_eq!(embedder.get_calls(), NGENE);
    assert_eq!(embedding.matrix.dim(), (4, 4));
} // end of node_level_work
