//! Attendance records and the time-in / time-out session manager.
//!
//! - [`record`]: the attendance record and its query/patch types
//! - [`store`]: the record store contract and an in-memory implementation
//! - [`sqlite`]: SQLite-backed store enforcing one open record per day
//! - [`boundary`]: timeout and shutdown cancellation around any store
//! - [`manager`]: the session state machine

pub mod boundary;
pub mod manager;
pub mod record;
pub mod sqlite;
pub mod store;

pub use boundary::{BoundedStore, DEFAULT_STORE_TIMEOUT};
pub use manager::{AttendanceError, AttendanceManager, ConsistencyMode};
pub use record::{
    AttendancePatch, AttendanceRecord, NewAttendanceRecord, RecordFilter, RecordId, RecordOrder,
    SessionState,
};
pub use sqlite::{SqliteRecordStore, SCHEMA_VERSION};
pub use store::{MemoryRecordStore, RecordStore, StoreError, StoreResult};
