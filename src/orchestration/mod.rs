//! # Orchestration
//!
//! The batch pipeline itself, leaves first:
//!
//! - [`partitioner`]: dataset → contiguous batch ranges
//! - [`row_stream`]: chunked, constant-memory reads of a batch's rows
//! - [`batch_processor`]: one batch → bounded-concurrency classification → artifacts
//! - [`task_queue`]: inter-batch fan-out (in-process or HTTP)
//! - [`merge_coordinator`]: notification-driven, lock-guarded, at-most-once merge
//! - [`notifications`]: concurrent dispatch of storage notifications
//! - [`analysis`]: the outward operations tying the above together
//! - [`settings`]: runtime-tunable batch size and concurrency

pub mod analysis;
pub mod batch_processor;
pub mod memory;
pub mod merge_coordinator;
pub mod notifications;
pub mod partitioner;
pub mod row_stream;
pub mod settings;
pub mod task_queue;

pub use analysis::{AnalysisService, AnalysisStarted};
pub use batch_processor::{effective_concurrency, BatchOutcome, BatchProcessor, BatchRunner, BatchState};
pub use merge_coordinator::{BatchResultsStatus, LockState, MergeCoordinator, MergeOutcome, RunState};
pub use notifications::NotificationDispatcher;
pub use partitioner::{partition, PartitionPlan, Partitioner};
pub use row_stream::{profile_dataset, DatasetProfile, RowStream};
pub use settings::{ProcessingSettings, ReloadNotifier, SettingsHandle};
pub use task_queue::{HttpTaskQueue, LocalTaskQueue, TaskQueue};
