//! io of a study : edge lists, gene catalogs, bson arrays and artifact names.

/// edge list reading
pub mod csv;

/// network files and gene catalog resolution
pub mod catalog;

/// bson dump and reload of matrices and labels
pub mod arraybson;

/// artifact names
pub mod output;
