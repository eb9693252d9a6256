// Ingestion and publication pipeline

pub mod chain;
pub mod context;
pub mod descriptor;
pub mod ingestion;
pub mod logo;
pub mod queue;
pub mod resource;
pub mod stages;
pub mod status;
pub mod upload;

pub use chain::{ChainBuilder, PublicationChain};
pub use context::PipelineContext;
pub use ingestion::{create_data_package, create_dataset};
pub use queue::{Task, TaskHandle, TaskOutput, TaskQueue};
pub use status::{PipelineStatus, StageKind, StageOutcome, StageResult};
pub use upload::upload_data_package;
