//! Run options of a clustering study.
//!
//! The options are decoded once at startup by [StudyConfig::from_matches] and the resulting
//! value is passed by reference to every stage of the pipeline.
//! Options are not checked against each other: a bad organism/network set combination,
//! an unknown clustering tag or level surfaces when the stage using it first parses it.

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};

use std::path::PathBuf;

use crate::errors::StudyError;

/// averaging mode used by the moment embedding. The study always runs with 0.
pub const DEFAULT_AVERAGE_TYPE: u8 = 0;

#[derive(Debug, Clone)]
pub struct StudyConfig {
    /// method name, used only to key the monitoring report
    pub method: String,
    /// organism, for example yeast or human
    pub organism: String,
    /// network set, for example GeneMANIA_ex or bionic
    pub network_set: String,
    /// embedding dimension (used by mashup integration)
    pub ndim: usize,
    /// number of workers in a chunk
    pub num_thread: usize,
    /// number of threads a worker may use internally
    pub torch_thread: usize,
    /// do we ask for mashup integration
    pub run_mashup: bool,
    /// cluster count or threshold parameter, kept as given
    pub separate: String,
    /// clustering strategy tag : gm, sc, km, op, ms, ap, app or acp
    pub cluster_method: String,
    /// aggregation level : network or node
    pub level: String,
    /// moment selector, for example Qsm4
    pub embed_type: String,
    /// axis selector
    pub axis: usize,
    /// optional cap on the number of networks
    pub num_nets: Option<usize>,
    /// averaging mode given to the embedder
    pub average_type: u8,
    /// root directory containing data/networks, data/embed and data/separate
    pub datadir: PathBuf,
    /// directory receiving the monitoring report
    pub monitordir: PathBuf,
} // end of StudyConfig

impl Default for StudyConfig {
    fn default() -> Self {
        StudyConfig {
            method: String::from("DCA"),
            organism: String::from("yeast"),
            network_set: String::from("GeneMANIA_ex"),
            ndim: 500,
            num_thread: 5,
            torch_thread: 4,
            run_mashup: false,
            separate: String::from("35"),
            cluster_method: String::from("app"),
            level: String::from("network"),
            embed_type: String::from("Qsm4"),
            axis: 1,
            num_nets: None,
            average_type: DEFAULT_AVERAGE_TYPE,
            datadir: PathBuf::from("."),
            monitordir: PathBuf::from("monitoring_results"),
        }
    }
} // end of impl Default for StudyConfig

/// the command line description of the study options
pub fn study_command() -> Command<'static> {
    Command::new("cluster_study")
        .about("moment embedding and clustering of a network collection with time and memory monitoring")
        .arg(Arg::new("method").long("method").takes_value(true).default_value("DCA")
            .help("method name, keys the monitoring report"))
        .arg(Arg::new("org").long("org").takes_value(true).default_value("yeast")
            .help("organism"))
        .arg(Arg::new("net").long("net").takes_value(true).default_value("GeneMANIA_ex")
            .help("network set, \"bionic\" selects the fixed dataset"))
        .arg(Arg::new("ndim").long("ndim").takes_value(true).default_value("500")
            .help("embedding dimension"))
        .arg(Arg::new("num_thread").long("num_thread").takes_value(true).default_value("5")
            .help("number of workers in a chunk"))
        .arg(Arg::new("torch_thread").long("torch_thread").takes_value(true).default_value("4")
            .help("number of threads inside a worker"))
        .arg(Arg::new("run_mashup").long("run_mashup").takes_value(true).default_value("0")
            .help("1 to ask for mashup integration"))
        .arg(Arg::new("separate").long("separate").takes_value(true).default_value("35")
            .help("cluster count or threshold parameter"))
        .arg(Arg::new("cluster_method").long("cluster_method").takes_value(true).default_value("app")
            .help("gm, sc, km, op, ms, ap, app or acp"))
        .arg(Arg::new("level").long("level").takes_value(true).default_value("network")
            .help("network or node"))
        .arg(Arg::new("embed_type").long("embed_type").takes_value(true).default_value("Qsm4")
            .help("moment selector : Q followed by sm or m and the order 1..4"))
        .arg(Arg::new("axis").long("axis").takes_value(true).default_value("1")
            .help("axis selector"))
        .arg(Arg::new("num-nets").long("num-nets").takes_value(true).required(false)
            .help("Number of networks to use."))
        .arg(Arg::new("datadir").long("datadir").takes_value(true).default_value(".")
            .help("directory containing data/networks"))
        .arg(Arg::new("monitordir").long("monitordir").takes_value(true).default_value("monitoring_results")
            .help("directory receiving monitoring results"))
} // end of study_command

fn parse_usize(matches: &ArgMatches, name: &str) -> anyhow::Result<usize> {
    let str = matches.value_of(name).ok_or_else(|| anyhow!("no value for {}", name))?;
    str.parse::<usize>()
        .map_err(|_| anyhow!("could not parse {} : {}", name, str))
} // end of parse_usize

fn get_string(matches: &ArgMatches, name: &str) -> anyhow::Result<String> {
    matches
        .value_of(name)
        .map(String::from)
        .ok_or_else(|| anyhow!("no value for {}", name))
}

impl StudyConfig {
    /// decode parsed arguments
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        log::debug!("in StudyConfig::from_matches");
        let num_nets = match matches.value_of("num-nets") {
            Some(str) => {
                let res = str.parse::<usize>();
                match res {
                    Ok(val) => Some(val),
                    _ => {
                        return Err(anyhow!("could not parse num-nets : {}", str));
                    }
                }
            }
            None => None,
        };
        let run_mashup = parse_usize(matches, "run_mashup")? == 1;
        //
        let config = StudyConfig {
            method: get_string(matches, "method")?,
            organism: get_string(matches, "org")?,
            network_set: get_string(matches, "net")?,
            ndim: parse_usize(matches, "ndim")?,
            num_thread: parse_usize(matches, "num_thread")?,
            torch_thread: parse_usize(matches, "torch_thread")?,
            run_mashup,
            separate: get_string(matches, "separate")?,
            cluster_method: get_string(matches, "cluster_method")?,
            level: get_string(matches, "level")?,
            embed_type: get_string(matches, "embed_type")?,
            axis: parse_usize(matches, "axis")?,
            num_nets,
            average_type: DEFAULT_AVERAGE_TYPE,
            datadir: PathBuf::from(get_string(matches, "datadir")?),
            monitordir: PathBuf::from(get_string(matches, "monitordir")?),
        };
        log::debug!("config : {:?}", config);
        Ok(config)
    } // end of from_matches

    /// the cap as it appears in artifact names
    pub fn cap_label(&self) -> String {
        match self.num_nets {
            Some(n) => n.to_string(),
            None => String::from("full"),
        }
    }

    /// the cluster count parameter, parsed at first use
    pub fn count_param(&self) -> anyhow::Result<usize> {
        self.separate.trim().parse::<usize>().map_err(|_| {
            StudyError::configuration(format!("separate must be an integer, got {:?}", self.separate)).into()
        })
    } // end of count_param
} // end of impl StudyConfig

#[cfg(test)]
mod tests {

    use super::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn defaults_match_command() {
        log_init_test();
        let matches = study_command().try_get_matches_from(vec!["cluster_study"]).unwrap();
        let config = StudyConfig::from_matches(&matches).unwrap();
        let default = StudyConfig::default();
        assert_eq!(config.method, default.method);
        assert_eq!(config.network_set, default.network_set);
        assert_eq!(config.num_thread, 5);
        assert_eq!(config.cluster_method, "app");
        assert!(config.num_nets.is_none());
        assert_eq!(config.cap_label(), "full");
        assert_eq!(config.count_param().unwrap(), 35);
    } // end of defaults_match_command

    #[test]
    fn parse_full_line() {
        log_init_test();
        let args = vec![
            "cluster_study", "--org", "human", "--net", "bionic", "--num_thread", "3",
            "--cluster_method", "km", "--separate", "4", "--num-nets", "12", "--run_mashup", "1",
        ];
        let matches = study_command().try_get_matches_from(args).unwrap();
        let config = StudyConfig::from_matches(&matches).unwrap();
        assert_eq!(config.organism, "human");
        assert_eq!(config.network_set, "bionic");
        assert_eq!(config.num_thread, 3);
        assert_eq!(config.num_nets, Some(12));
        assert!(config.run_mashup);
        assert_eq!(config.cap_label(), "12");
    } // end of parse_full_line

    #[test]
    fn bad_separate_surfaces_late() {
        log_init_test();
        let args = vec!["cluster_study", "--separate", "many"];
        let matches = study_command().try_get_matches_from(args).unwrap();
        // accepted at parse time
        let config = StudyConfig::from_matches(&matches).unwrap();
        let err = config.count_param().unwrap_err();
        assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::Configuration(_))));
    } // end of bad_separate_surfaces_late
} // end of mod tests
