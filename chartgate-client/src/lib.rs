//! Connection pool, request coordinator, and orchestrator for the vendor
//! chart gateway (C1, C2, C3, C5, C6, C7, C8, C9): stateful session
//! management built on top of the wire-protocol crate (`chartgate-core`).

pub mod auth;
pub mod batch;
pub mod builder;
pub mod cache;
pub mod coordinator;
pub mod kv;
pub mod orchestrator;
pub mod pool;
pub mod retry;
pub mod session;
pub mod study_config;
pub mod transport;

pub use auth::SessionResolver;
pub use batch::{run_batch, BatchProgress, BatchResult, ChartOutcome};
pub use builder::GatewayBuilder;
pub use kv::{InMemorySessionStore, SessionStats, SessionStore};
pub use orchestrator::Gateway;
pub use pool::ConnectionPool;
pub use study_config::{CvdStudyDescriptor, StudyConfig};
