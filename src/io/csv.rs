//! Load a network from an edge list file.
//!
//! One edge by line : `node_a node_b weight`. Nodes are ranks in the gene catalog of the
//! organism, the weight is taken in absolute value (some files carry signed scores).
//! Fields are separated by whitespace (blanks or tabs, possibly repeated), lines beginning with #
//! are skipped.

use anyhow::anyhow;

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::ReaderBuilder;

use crate::errors::StudyError;

/// an undirected weighted edge between 2 catalog ranks.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge {
    pub node_a: usize,
    pub node_b: usize,
    /// absolute value of the weight field
    pub weight: f64,
}

// decode a record of 3 fields
fn decode_record(record: &csv::StringRecord, nb_record: usize) -> Result<Edge, StudyError> {
    if record.len() != 3 {
        return Err(StudyError::data_format(format!(
            "record {} has {} fields, expected 3",
            nb_record + 1,
            record.len()
        )));
    }
    let mut nodes = [0usize; 2];
    for (i, node) in nodes.iter_mut().enumerate() {
        let field = record.get(i).unwrap_or("").trim();
        *node = field.parse::<usize>().map_err(|_| {
            StudyError::data_format(format!("error decoding field {} of record {} : {:?}", i + 1, nb_record + 1, field))
        })?;
    }
    let field = record.get(2).unwrap_or("").trim();
    let weight = field.parse::<f64>().map_err(|_| {
        StudyError::data_format(format!("error decoding weight of record {} : {:?}", nb_record + 1, field))
    })?;
    Ok(Edge {
        node_a: nodes[0],
        node_b: nodes[1],
        weight: weight.abs(),
    })
} // end of decode_record

// any run of blanks and tabs between fields becomes one tab, blank lines and comments are dropped
fn normalize_whitespace<R: BufRead>(reader: R) -> anyhow::Result<String> {
    let mut normalized = String::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        normalized.push_str(&fields.join("\t"));
        normalized.push('\n');
    }
    Ok(normalized)
} // end of normalize_whitespace

/// reads all edges of a network file. Fields are separated by any run of blanks or tabs.
pub fn read_edge_list(filepath: &Path) -> anyhow::Result<Vec<Edge>> {
    log::debug!("read_edge_list, loading file {:?}", filepath);
    let fileres = OpenOptions::new().read(true).open(filepath);
    if fileres.is_err() {
        log::error!("read_edge_list : could not open file {:?}", filepath.as_os_str());
        return Err(anyhow!("read_edge_list could not open file {}", filepath.display()));
    }
    let normalized = normalize_whitespace(BufReader::new(fileres?))?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .has_headers(false)
        .from_reader(normalized.as_bytes());
    //
    let mut edges = Vec::<Edge>::with_capacity(10_000);
    for (nb_record, result) in rdr.records().enumerate() {
        let record = result?;
        let edge = decode_record(&record, nb_record)?;
        edges.push(edge);
    }
    log::debug!("read {} edges from {:?}", edges.len(), filepath);
    Ok(edges)
} // end of read_edge_list

/// the set of ranks touched by either endpoint of an edge.
pub fn get_node_set(edges: &[Edge]) -> BTreeSet<usize> {
    let mut nodes = BTreeSet::new();
    for e in edges {
        nodes.insert(e.node_a);
        nodes.insert(e.node_b);
    }
    nodes
} // end of get_node_set

// end of mod tests
