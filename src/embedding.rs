//! Moment embedding of a collection of networks.
//!
//! Each network (or each node, at node level) is summarized by statistical moments of the
//! weights around every node. A worker call returns an [EmbeddingOutput] : 8 vectors, one
//! for each (order, type) combination, order in 1..4 and type
//! - *sm* : standardized moment, i.e mean, variance, skewness and kurtosis
//! - *m*  : raw moment E(x^order)
//!
//! The moments are always computed along axis 1.
//!
//! The embedding computation itself is hidden behind the trait [MomentEmbedderT], the
//! crate provides [EdgeMomentEmbedder](moments::EdgeMomentEmbedder) as default worker.
//! [batch] schedules worker calls by chunks and [assemble] turns outputs into one matrix by selector,
//! with a cache on disk.

use anyhow::anyhow;
use ndarray::Array1;

use std::fmt;
use std::path::PathBuf;

use crate::errors::StudyError;

pub mod assemble;
pub mod batch;
pub mod moments;

/// the axis along which moments are computed
pub const MOMENT_AXIS: usize = 1;

/// number of (order, type) combinations in an output
pub const NB_MOMENTS: usize = 8;

/// tag of the moment embedding in selector names
const SELECTOR_PREFIX: &str = "Q";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MomentKind {
    /// standardized moment
    Sm,
    /// raw moment
    M,
}

impl MomentKind {
    fn as_str(&self) -> &'static str {
        match self {
            MomentKind::Sm => "sm",
            MomentKind::M => "m",
        }
    }
}

/// selects one component of an [EmbeddingOutput]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MomentSelector {
    order: u8,
    kind: MomentKind,
}

/// the selectors in the order of components in an [EmbeddingOutput] : order 1..4, then sm before m.
pub const MOMENT_SELECTORS: [MomentSelector; NB_MOMENTS] = [
    MomentSelector { order: 1, kind: MomentKind::Sm },
    MomentSelector { order: 1, kind: MomentKind::M },
    MomentSelector { order: 2, kind: MomentKind::Sm },
    MomentSelector { order: 2, kind: MomentKind::M },
    MomentSelector { order: 3, kind: MomentKind::Sm },
    MomentSelector { order: 3, kind: MomentKind::M },
    MomentSelector { order: 4, kind: MomentKind::Sm },
    MomentSelector { order: 4, kind: MomentKind::M },
];

impl MomentSelector {
    pub fn new(order: u8, kind: MomentKind) -> anyhow::Result<Self> {
        if !(1..=4).contains(&order) {
            return Err(anyhow!("moment order must be in 1..4, got {}", order));
        }
        Ok(MomentSelector { order, kind })
    }

    pub fn get_order(&self) -> u8 {
        self.order
    }

    pub fn get_kind(&self) -> MomentKind {
        self.kind
    }

    /// rank of the component in an [EmbeddingOutput]
    pub fn get_position(&self) -> usize {
        let kind = match self.kind {
            MomentKind::Sm => 0,
            MomentKind::M => 1,
        };
        2 * (self.order as usize - 1) + kind
    }

    /// decodes names such as Qsm4 or Qm1
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        let bad = || StudyError::configuration(format!("bad embed type {:?}, expected Q(sm|m)(1..4)", name));
        let rest = name.strip_prefix(SELECTOR_PREFIX).ok_or_else(bad)?;
        let (kind, order) = if let Some(order) = rest.strip_prefix("sm") {
            (MomentKind::Sm, order)
        } else if let Some(order) = rest.strip_prefix('m') {
            (MomentKind::M, order)
        } else {
            return Err(bad().into());
        };
        let order = order.parse::<u8>().map_err(|_| bad())?;
        MomentSelector::new(order, kind).map_err(|_| bad().into())
    } // end of parse
} // end of impl MomentSelector

impl fmt::Display for MomentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", SELECTOR_PREFIX, self.kind.as_str(), self.order)
    }
}

/// network : one unit of work is a network, node : one unit of work is a gene
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AggregationLevel {
    Network,
    Node,
}

impl AggregationLevel {
    pub fn parse(level: &str) -> anyhow::Result<Self> {
        match level {
            "network" => Ok(AggregationLevel::Network),
            "node" => Ok(AggregationLevel::Node),
            _ => Err(StudyError::configuration(format!("unknown level {:?}, expected network or node", level)).into()),
        }
    }
}

/// The result of one worker call, one vector by moment selector in the order of [MOMENT_SELECTORS].
#[derive(Clone, Debug)]
pub struct EmbeddingOutput {
    moments: Vec<Array1<f64>>,
}

impl EmbeddingOutput {
    pub fn new(moments: Vec<Array1<f64>>) -> anyhow::Result<Self> {
        if moments.len() != NB_MOMENTS {
            return Err(StudyError::data_format(format!(
                "an embedding output has {} moment vectors, got {}",
                NB_MOMENTS,
                moments.len()
            )).into());
        }
        Ok(EmbeddingOutput { moments })
    }

    /// the vector of a selector
    pub fn get_moment(&self, selector: &MomentSelector) -> &Array1<f64> {
        &self.moments[selector.get_position()]
    }

    /// vector at rank i
    pub fn get_component(&self, i: usize) -> &Array1<f64> {
        &self.moments[i]
    }
} // end of impl EmbeddingOutput

/// Everything a worker sees besides its index. It is shared read only by all workers.
pub struct EmbedContext {
    /// the full list of network files of the study
    pub network_files: Vec<PathBuf>,
    /// averaging mode, 0 : moments of log(1+w), 1 : moments of w
    pub average_type: u8,
    /// size of the gene catalog
    pub ngene: usize,
    ///
    pub level: AggregationLevel,
    /// threads a worker may use internally
    pub intra_threads: usize,
} // end of EmbedContext

impl EmbedContext {
    /// number of worker calls for the level : networks or genes
    pub fn get_work_size(&self) -> usize {
        match self.level {
            AggregationLevel::Network => self.network_files.len(),
            AggregationLevel::Node => self.ngene,
        }
    }
}

/// Something computing the moment embedding of one unit of work (a network or a node).
/// Calls must be pure : same context and index give the same output.
pub trait MomentEmbedderT: Sync {
    fn embed(&self, context: &EmbedContext, index: usize) -> anyhow::Result<EmbeddingOutput>;
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn selector_names() {
        let names: Vec<String> = MOMENT_SELECTORS.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["Qsm1", "Qm1", "Qsm2", "Qm2", "Qsm3", "Qm3", "Qsm4", "Qm4"]);
        for (i, s) in MOMENT_SELECTORS.iter().enumerate() {
            assert_eq!(s.get_position(), i);
            assert_eq!(MomentSelector::parse(&s.to_string()).unwrap(), *s);
        }
        assert!(MomentSelector::parse("Qsm5").is_err());
        assert!(MomentSelector::parse("sm4").is_err());
        assert!(MomentSelector::parse("Qx2").is_err());
    } // end of selector_names

    #[test]
    fn output_needs_eight_vectors() {
        let v = vec![Array1::<f64>::zeros(3); 7];
        assert!(EmbeddingOutput::new(v).is_err());
        let v = vec![Array1::<f64>::zeros(3); 8];
        assert!(EmbeddingOutput::new(v).is_ok());
    }
} // end of mod tests
