//! Batch pipeline
//!
//! Queues images as tasks, renders them one at a time with the current
//! watermark spec and tracks progress:
//! - `task`: task identity, state machine and summaries
//! - `stats`: aggregate progress derived from task states
//! - `editor`: shared, validated watermark spec
//! - `pipeline`: the run loop and its published snapshots
//! - `writer`: write-back of completed outputs

pub mod config;
pub mod editor;
pub mod pipeline;
pub mod stats;
pub mod task;
pub mod writer;

pub use config::{PipelineConfig, DEFAULT_OUTPUT_PREFIX};
pub use editor::SpecEditor;
pub use pipeline::{BatchPipeline, BatchReport, BatchSnapshot, NamedOutput, TaskOutput};
pub use stats::BatchStats;
pub use task::{
    ImageSource, ProcessedImage, Task, TaskId, TaskState, TaskStatus, TaskSummary,
};
pub use writer::{DirectoryWriter, WriteBackError, Writer};
