//! Download task execution -- one run of a task from chapter list to final state.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state, status transitions, output artifact
//! - [`orchestration`] - Top-level run lifecycle
//! - [`chunking`] - Chunked concurrent fetch and ordered append
//! - [`finalization`] - Final task state

mod chunking;
mod context;
mod finalization;
mod orchestration;


pub(crate) use context::{DownloadTaskContext, find_text_file};
pub(crate) use orchestration::run_download_task;
