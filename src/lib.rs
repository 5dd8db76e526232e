//! jjtask: task tracking on top of a jj revision graph.
//!
//! Tasks are ordinary revisions whose description starts with a lifecycle
//! tag such as `[task:todo]`. The working-copy revision `@` is a merge of the
//! tasks currently in progress.
//!
//! # Example
//!
//! ```no_run
//! use jjtask::{CreateOptions, Engine, JjConfig, JjStore};
//!
//! let mut engine = Engine::new(JjStore::new(&JjConfig::default()));
//!
//! // Plan a task and start it
//! let task = engine.create("Implement login", None, &CreateOptions::default()).unwrap();
//! let report = engine.wip(&[task.change_id.to_string()]);
//! assert!(report.is_success());
//!
//! // Finish it; @'s merge collapses into a line
//! let report = engine.done(&[task.change_id.to_string()]);
//! for advisory in &report.advisories {
//!     eprintln!("warning: {}", advisory);
//! }
//! ```

mod chain;
mod linearize;
mod merge;
mod squash;

pub mod config;
pub mod engine;
pub mod graph;
pub mod jj;
pub mod revset;
pub mod tag;
pub mod types;

// Re-export public API
pub use config::{Config, JjConfig, LoadedConfig};
pub use engine::{Checkpoint, CreateOptions, CreatedTask, Engine, EngineError, ShownDescription};
pub use graph::{GraphStore, WORKING_COPY};
pub use jj::JjStore;
pub use linearize::{DoneTask, Linearization, ParentPartition};
pub use merge::{DropMode, DroppedTask, WipTask};
pub use revset::{Revset, TaskStatus};
pub use squash::{SQUASH_HEADER, SquashOutcome, combined_message};
pub use tag::TaskDescription;
pub use types::{Advisory, BatchReport, ChangeId, Flag, Revision};
