//! To ease access to most frequently used items

pub use crate::config::{study_command, StudyConfig};
pub use crate::errors::StudyError;

pub use crate::io::{arraybson::*, catalog::*, csv::*, output::*};

pub use crate::embedding::assemble::{get_embedding_matrix, CacheDecision, EmbeddingMatrix};
pub use crate::embedding::batch::BatchRunner;
pub use crate::embedding::moments::EdgeMomentEmbedder;
pub use crate::embedding::*;

pub use crate::cluster::labels::{normalize_labels, persist_assignment};
pub use crate::cluster::{ClusterInput, ClusterStrategy, ClustererT};

pub use crate::monitor::alloc::TrackingAllocator;
pub use crate::monitor::device::{get_default_probe, DeviceMemoryProbe, NoDevice};
pub use crate::monitor::report::MonitoringReport;
pub use crate::monitor::ResourceMonitor;

pub use crate::study::{run_study, StudyResult};
