//! Storage module for persisted run state
//!
//! This module handles everything the pipeline writes to disk:
//! - The run directory layout (artifacts, ledger, reports, index)
//! - Atomic temp-file-and-replace writes shared by the ledger, the index
//!   and retrieved artifacts

mod atomic;
mod layout;

pub use atomic::{write_atomic, write_atomic_with_timeout};
pub use layout::RunLayout;
