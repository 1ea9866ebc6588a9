//! Thin re-export of the lock types used throughout the workspace: one place
//! to swap the implementation (e.g. for lock-contention tracing) without
//! touching every call site.

pub use parking_lot::{Mutex, RwLock};
