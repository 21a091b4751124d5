//! Subject persistence and the explicit authentication context.
//!
//! # Architecture
//!
//! * [`storage`]: Durable local key/value storage (checksummed JSON file or memory).
//! * [`subject`]: The [`Subject`] model and the [`AuthContext`] handed to the guard.
//!
//! The context is read from storage once per navigation and passed down
//! explicitly; nothing in the crate reads the current subject from ambient state.

pub mod storage;
pub mod subject;

pub use storage::{DurableStorage, FileStorage, MemoryStorage, StorageError};
pub use subject::{AuthContext, Subject, SubjectId, SUBJECT_KEY};
