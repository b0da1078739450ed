//! Resolution of the network files and gene catalog of a study.
//!
//! Two modes :
//! - the network set *bionic* is a fixed list of 3 datasets stored in data/networks/bionic
//!   with a gene ordering serialized as a json list of identifiers.
//! - any other network set is resolved from the organism : the gene catalog is read from
//!   `data/networks/{org}/{org}_{net}_genes.txt` (one identifier by line) and there is one
//!   edge list `data/networks/{org}/{org}_string_{variant}_adjacency.txt` by network variant.
//!
//! In both modes the file list is truncated to the requested cap, a cap larger than the
//! number of available networks is not an error.

use indexmap::IndexSet;

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::StudyConfig;
use crate::errors::StudyError;

/// the network set name selecting the fixed dataset mode
pub const BIONIC_SET: &str = "bionic";

/// datasets of the fixed mode, in this order.
pub const BIONIC_NETWORKS: [&str; 3] = ["Krogan-2006", "Costanzo-2016", "Hu-2007"];

/// ordered, deduplicated node identifiers. The rank of an identifier is the node index used in edge lists.
pub struct GeneCatalog {
    genes: IndexSet<String>,
}

impl GeneCatalog {
    pub fn new<I: IntoIterator<Item = String>>(ids: I) -> Self {
        let genes: IndexSet<String> = ids.into_iter().collect();
        GeneCatalog { genes }
    }

    /// number of genes, i.e. size of the global node index space
    pub fn get_ngene(&self) -> usize {
        self.genes.len()
    }

    /// rank of a gene identifier
    pub fn get_rank(&self, id: &str) -> Option<usize> {
        self.genes.get_index_of(id)
    }

    /// identifier of rank
    pub fn get_gene(&self, rank: usize) -> Option<&String> {
        self.genes.get_index(rank)
    }
} // end of impl GeneCatalog

/// what a study runs on.
pub struct NetworkCatalog {
    /// edge list files, in study order
    network_files: Vec<PathBuf>,
    ///
    genes: GeneCatalog,
}

impl NetworkCatalog {
    pub fn new(network_files: Vec<PathBuf>, genes: GeneCatalog) -> Self {
        NetworkCatalog { network_files, genes }
    }

    pub fn get_network_files(&self) -> &[PathBuf] {
        &self.network_files
    }

    pub fn get_nb_networks(&self) -> usize {
        self.network_files.len()
    }

    pub fn get_genes(&self) -> &GeneCatalog {
        &self.genes
    }

    pub fn get_ngene(&self) -> usize {
        self.genes.get_ngene()
    }

    /// keeps at most cap networks
    pub fn truncate(&mut self, cap: Option<usize>) {
        if let Some(cap) = cap {
            self.network_files.truncate(cap);
        }
    }
} // end of impl NetworkCatalog

fn networks_dir(datadir: &Path) -> PathBuf {
    datadir.join("data").join("networks")
}

/// reads a text file one identifier by line, skipping empty lines.
pub fn read_text_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let fileres = OpenOptions::new().read(true).open(path);
    if fileres.is_err() {
        log::error!("read_text_list : could not open file {:?}", path.as_os_str());
        return Err(StudyError::configuration(format!("could not open list file {}", path.display())).into());
    }
    let bufreader = BufReader::new(fileres?);
    let mut ids = Vec::<String>::new();
    for line in bufreader.lines() {
        let line = line?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(String::from(id));
        }
    }
    Ok(ids)
} // end of read_text_list

/// reads a json list of identifiers
pub fn read_json_ordering(path: &Path) -> anyhow::Result<Vec<String>> {
    let fileres = OpenOptions::new().read(true).open(path);
    if fileres.is_err() {
        log::error!("read_json_ordering : could not open file {:?}", path.as_os_str());
        return Err(StudyError::configuration(format!("could not open gene ordering {}", path.display())).into());
    }
    let ids: Vec<String> = serde_json::from_reader(BufReader::new(fileres?))
        .map_err(|e| StudyError::data_format(format!("bad gene ordering {} : {}", path.display(), e)))?;
    Ok(ids)
} // end of read_json_ordering

fn load_bionic(datadir: &Path) -> anyhow::Result<NetworkCatalog> {
    log::info!("running bionic networks");
    let dir = networks_dir(datadir).join(BIONIC_SET);
    let network_files: Vec<PathBuf> = BIONIC_NETWORKS
        .iter()
        .map(|name| dir.join(format!("{}.txt", name)))
        .collect();
    let genes = read_json_ordering(&dir.join("bionic_gene_ordering.txt"))?;
    Ok(NetworkCatalog::new(network_files, GeneCatalog::new(genes)))
} // end of load_bionic

/// names of the network variants of an organism for a network set.
/// They are listed in `{org}_{net}_networks.txt` if this file exists, otherwise
/// discovered from the adjacency files present in the organism directory (sorted by name).
pub fn get_network_variants(datadir: &Path, org: &str, net: &str) -> anyhow::Result<Vec<String>> {
    let orgdir = networks_dir(datadir).join(org);
    let listing = orgdir.join(format!("{}_{}_networks.txt", org, net));
    if listing.exists() {
        return read_text_list(&listing);
    }
    let prefix = format!("{}_string_", org);
    let suffix = "_adjacency.txt";
    let dir_iter = std::fs::read_dir(&orgdir).map_err(|e| {
        StudyError::configuration(format!("no network directory {} for organism {} : {}", orgdir.display(), org, e))
    })?;
    let mut variants = Vec::<String>::new();
    for entry in dir_iter {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if let Some(rest) = name.strip_prefix(&prefix) {
            if let Some(variant) = rest.strip_suffix(suffix) {
                variants.push(String::from(variant));
            }
        }
    }
    if variants.is_empty() {
        return Err(StudyError::configuration(format!("no network found for organism {} and set {}", org, net)).into());
    }
    variants.sort();
    Ok(variants)
} // end of get_network_variants

fn load_organism(datadir: &Path, org: &str, net: &str) -> anyhow::Result<NetworkCatalog> {
    let orgdir = networks_dir(datadir).join(org);
    let variants = get_network_variants(datadir, org, net)?;
    let gene_file = orgdir.join(format!("{}_{}_genes.txt", org, net));
    let genes = read_text_list(&gene_file)?;
    let network_files: Vec<PathBuf> = variants
        .iter()
        .map(|v| orgdir.join(format!("{}_string_{}_adjacency.txt", org, v)))
        .collect();
    Ok(NetworkCatalog::new(network_files, GeneCatalog::new(genes)))
} // end of load_organism

/// resolves network files and gene catalog of a study, truncated to the cap of the config.
pub fn load_catalog(config: &StudyConfig) -> anyhow::Result<NetworkCatalog> {
    let mut catalog = if config.network_set == BIONIC_SET {
        load_bionic(&config.datadir)?
    } else {
        load_organism(&config.datadir, &config.organism, &config.network_set)?
    };
    let available = catalog.get_nb_networks();
    catalog.truncate(config.num_nets);
    log::info!("RESTRICTED TO {} NETWORKS (available : {})", catalog.get_nb_networks(), available);
    if catalog.get_ngene() == 0 {
        return Err(StudyError::configuration(format!("empty gene catalog for {} {}", config.organism, config.network_set)).into());
    }
    Ok(catalog)
} // end of load_catalog

#[cfg(test)]
mod tests {

    use super::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn make_organism(datadir: &Path, nb_net: usize) {
        let orgdir = datadir.join("data").join("networks").join("yeast");
        std::fs::create_dir_all(&orgdir).unwrap();
        std::fs::write(orgdir.join("yeast_test_genes.txt"), "g0\ng1\ng1\ng2\n\n").unwrap();
        for i in 0..nb_net {
            let name = format!("yeast_string_v{}_adjacency.txt", i);
            std::fs::write(orgdir.join(name), "0 1 1.\n").unwrap();
        }
    }

    #[test]
    fn organism_mode_truncates() {
        log_init_test();
        let dir = tempfile::Builder::new().prefix("catalog").tempdir().unwrap();
        make_organism(dir.path(), 4);
        let mut config = StudyConfig::default();
        config.datadir = dir.path().to_path_buf();
        config.network_set = String::from("test");
        config.num_nets = Some(2);
        let catalog = load_catalog(&config).unwrap();
        assert_eq!(catalog.get_nb_networks(), 2);
        // dedup of g1
        assert_eq!(catalog.get_ngene(), 3);
        assert_eq!(catalog.get_genes().get_rank("g2"), Some(2));
        assert!(catalog.get_network_files()[0].ends_with("yeast_string_v0_adjacency.txt"));
        // a cap larger than available is not an error
        config.num_nets = Some(10);
        let catalog = load_catalog(&config).unwrap();
        assert_eq!(catalog.get_nb_networks(), 4);
    } // end of organism_mode_truncates

    #[test]
    fn bionic_mode() {
        log_init_test();
        let dir = tempfile::Builder::new().prefix("catalog").tempdir().unwrap();
        let bdir = dir.path().join("data").join("networks").join(BIONIC_SET);
        std::fs::create_dir_all(&bdir).unwrap();
        std::fs::write(bdir.join("bionic_gene_ordering.txt"), r#"["YAL001C", "YAL002W"]"#).unwrap();
        let mut config = StudyConfig::default();
        config.datadir = dir.path().to_path_buf();
        config.network_set = String::from(BIONIC_SET);
        let catalog = load_catalog(&config).unwrap();
        assert_eq!(catalog.get_nb_networks(), 3);
        assert_eq!(catalog.get_ngene(), 2);
        assert!(catalog.get_network_files()[1].ends_with("Costanzo-2016.txt"));
    } // end of bionic_mode

    #[test]
    fn unknown_organism() {
        log_init_test();
        let dir = tempfile::Builder::new().prefix("catalog").tempdir().unwrap();
        let mut config = StudyConfig::default();
        config.datadir = dir.path().to_path_buf();
        config.organism = String::from("martian");
        let err = load_catalog(&config).err().unwrap();
        assert!(matches!(err.downcast_ref::<StudyError>(), Some(StudyError::Configuration(_))));
    } // end of unknown_organism
} // end of mod tests
