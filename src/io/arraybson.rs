//! bson io for the flat arrays of a study : embedding matrices and cluster assignments.
//!
//!  The file is a sequence of bson documents (a bson document must not be larger than 16Mb!) :
//! 1. A header document with key "header", see [ArrayBsonHeader].
//! 2. For a matrix, one document by row, the key is the row index and the value the array of f64.
//!    For a label array, one document with key "labels" and the array of i64.
//!

use anyhow::anyhow;

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bson::{Bson, Document};
use ndarray::Array2;
use num_traits::cast::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::errors::StudyError;

/// version of dump format
pub const ARRAY_BSON_VERSION: i64 = 1;

/// kind of array dumped
pub const KIND_MATRIX: &str = "matrix";
pub const KIND_LABELS: &str = "labels";

/// This structure defines the header of the bson file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArrayBsonHeader {
    /// version of dump format
    pub version: i64,
    /// matrix or labels
    pub kind: String,
    /// type of values, f64 or i64
    pub type_name: String,
    /// number of rows (or of labels)
    pub nbrow: i64,
    /// number of columns, 1 for labels
    pub nbcol: i64,
} // end of ArrayBsonHeader

fn to_i64(n: usize) -> anyhow::Result<i64> {
    FromPrimitive::from_usize(n).ok_or_else(|| anyhow!("size {} does not fit in i64", n))
}

fn create_writer(path: &Path) -> anyhow::Result<BufWriter<std::fs::File>> {
    let fileres = OpenOptions::new().write(true).create(true).truncate(true).open(path);
    match fileres {
        Ok(file) => Ok(BufWriter::new(file)),
        Err(e) => {
            log::error!("could not open file {} for dump", path.display());
            Err(anyhow!("could not open file : {}, {}", path.display(), e))
        }
    }
}

fn write_header<W: Write>(writer: &mut W, header: &ArrayBsonHeader) -> anyhow::Result<()> {
    let mut doc = Document::new();
    doc.insert("header", bson::to_bson(header)?);
    doc.to_writer(writer)
        .map_err(|e| anyhow!("dump of bson header failed: {}", e))
}

/// dump a matrix, one document by row.
pub fn dump_matrix(path: &Path, matrix: &Array2<f64>) -> anyhow::Result<()> {
    log::debug!("dump_matrix in {}, dim {:?}", path.display(), matrix.dim());
    let mut bufwriter = create_writer(path)?;
    let (nbrow, nbcol) = matrix.dim();
    let header = ArrayBsonHeader {
        version: ARRAY_BSON_VERSION,
        kind: String::from(KIND_MATRIX),
        type_name: String::from("f64"),
        nbrow: to_i64(nbrow)?,
        nbcol: to_i64(nbcol)?,
    };
    write_header(&mut bufwriter, &header)?;
    for (i, row) in matrix.rows().into_iter().enumerate() {
        let mut doc = Document::new();
        let data: Vec<Bson> = row.iter().map(|x| Bson::Double(*x)).collect();
        doc.insert(i.to_string(), data);
        let res = doc.to_writer(&mut bufwriter);
        if let Err(e) = res {
            log::error!("bson dump error in row {i}");
            return Err(anyhow!("bson dump error for row {i} {}", e));
        }
    }
    bufwriter.flush()?;
    Ok(())
} // end of dump_matrix

/// dump a label array
pub fn dump_labels(path: &Path, labels: &[usize]) -> anyhow::Result<()> {
    log::debug!("dump_labels in {}, nb labels {}", path.display(), labels.len());
    let mut bufwriter = create_writer(path)?;
    let header = ArrayBsonHeader {
        version: ARRAY_BSON_VERSION,
        kind: String::from(KIND_LABELS),
        type_name: String::from("i64"),
        nbrow: to_i64(labels.len())?,
        nbcol: 1,
    };
    write_header(&mut bufwriter, &header)?;
    let mut data = Vec::<Bson>::with_capacity(labels.len());
    for l in labels {
        data.push(Bson::Int64(to_i64(*l)?));
    }
    let mut doc = Document::new();
    doc.insert(KIND_LABELS, data);
    doc.to_writer(&mut bufwriter)
        .map_err(|e| anyhow!("bson dump error for labels {}", e))?;
    bufwriter.flush()?;
    Ok(())
} // end of dump_labels

fn open_reader(path: &Path) -> anyhow::Result<BufReader<std::fs::File>> {
    let fileres = OpenOptions::new().read(true).open(path);
    match fileres {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) => {
            log::error!("reload of bson dump {} failed", path.display());
            Err(StudyError::cache(format!("could not open {} : {}", path.display(), e)).into())
        }
    }
}

fn read_header<R: std::io::Read>(reader: &mut R, path: &Path, kind: &str) -> anyhow::Result<ArrayBsonHeader> {
    let doc = Document::from_reader(reader)
        .map_err(|e| StudyError::cache(format!("could not load header document of {} : {}", path.display(), e)))?;
    let bson_header = doc
        .get("header")
        .ok_or_else(|| StudyError::cache(format!("could not find header in {}", path.display())))?
        .clone();
    let header: ArrayBsonHeader = bson::from_bson(bson_header)
        .map_err(|e| StudyError::cache(format!("bad header in {} : {}", path.display(), e)))?;
    if header.kind != kind || header.version != ARRAY_BSON_VERSION {
        return Err(StudyError::cache(format!(
            "{} holds {} version {}, expected {} version {}",
            path.display(), header.kind, header.version, kind, ARRAY_BSON_VERSION
        )).into());
    }
    Ok(header)
} // end of read_header

/// returns the header of a dump, checking it holds an array of the given kind
pub fn get_bson_header(path: &Path, kind: &str) -> anyhow::Result<ArrayBsonHeader> {
    let mut reader = open_reader(path)?;
    read_header(&mut reader, path, kind)
} // end of get_bson_header

/// reloads a matrix dumped by [dump_matrix]
pub fn load_matrix(path: &Path) -> anyhow::Result<Array2<f64>> {
    log::info!("load_matrix, file name : {:?}", path);
    let mut reader = open_reader(path)?;
    let header = read_header(&mut reader, path, KIND_MATRIX)?;
    let nbrow = header.nbrow as usize;
    let nbcol = header.nbcol as usize;
    let mut matrix = Array2::<f64>::zeros((nbrow, nbcol));
    for i in 0..nbrow {
        let doc = Document::from_reader(&mut reader)
            .map_err(|e| StudyError::cache(format!("could not read row {} of {} : {}", i, path.display(), e)))?;
        let row = doc
            .get_array(i.to_string())
            .map_err(|e| StudyError::cache(format!("row {} missing in {} : {}", i, path.display(), e)))?;
        if row.len() != nbcol {
            return Err(StudyError::cache(format!("row {} of {} has {} values, expected {}", i, path.display(), row.len(), nbcol)).into());
        }
        for (j, v) in row.iter().enumerate() {
            matrix[[i, j]] = v
                .as_f64()
                .ok_or_else(|| StudyError::cache(format!("non f64 value in row {} of {}", i, path.display())))?;
        }
    }
    log::debug!("load_matrix done, dim {:?}", matrix.dim());
    Ok(matrix)
} // end of load_matrix

/// reloads labels dumped by [dump_labels]
pub fn load_labels(path: &Path) -> anyhow::Result<Vec<usize>> {
    let mut reader = open_reader(path)?;
    let header = read_header(&mut reader, path, KIND_LABELS)?;
    let doc = Document::from_reader(&mut reader)
        .map_err(|e| StudyError::cache(format!("could not read labels of {} : {}", path.display(), e)))?;
    let data = doc.get_array(KIND_LABELS)?;
    let labels: Vec<usize> = data
        .iter()
        .map(|v| v.as_i64().map(|l| l as usize))
        .collect::<Option<Vec<usize>>>()
        .ok_or_else(|| StudyError::cache(format!("non integer label in {}", path.display())))?;
    if labels.len() != header.nbrow as usize {
        return Err(StudyError::cache(format!("{} holds {} labels, header says {}", path.display(), labels.len(), header.nbrow)).into());
    }
    Ok(labels)
} // end of load_labels

// end of mod tests
