//! An executable running a clustering study on a network collection.
//! example usage:
//! cluster_study --org yeast --net GeneMANIA_ex --cluster_method app --separate 35 --num_thread 5
//! cluster_study --net bionic --cluster_method km --separate 4 --datadir /data/study
//!
//! The networks are embedded by moments (or the embedding is reloaded from data/embed),
//! clustered, labels dumped in data/separate and time and memory reported in
//! monitoring_results/cluster:{method}_M={num-nets}_results.txt

use netcluster::prelude::*;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

pub fn main() {
    //
    env_logger::Builder::from_default_env().init();
    log::info!("logger initialized");
    //
    let matches = study_command().get_matches();
    let config = match StudyConfig::from_matches(&matches) {
        Ok(config) => config,
        Err(e) => {
            log::error!("could not decode options : {}", e);
            std::process::exit(1);
        }
    };
    let nb_cpus = num_cpus::get();
    if config.num_thread > nb_cpus {
        log::warn!("num_thread {} exceeds the {} cpus available", config.num_thread, nb_cpus);
    }
    //
    let embedder = EdgeMomentEmbedder::new();
    let mut probe = get_default_probe();
    match run_study(&config, &embedder, probe.as_mut()) {
        Ok(result) => {
            log::info!("cluster assignment in {}", result.assignment_path.display());
            log::info!("monitoring report in {}", result.report_path.display());
        }
        Err(e) => {
            log::error!("study failed : {:#}", e);
            eprintln!("study failed : {:#}", e);
            std::process::exit(1);
        }
    }
} // end of main
