//! Ports: narrow trait interfaces the services layer depends on, satisfied
//! by in-memory, SQLite, or HTTP adapters depending on deployment.

pub mod cell_adapter;
pub mod message_store;
pub mod policy_store;
pub mod rate_limit_backend;
pub mod reservation_store;
pub mod worker_runtime;

pub use cell_adapter::CellAdapter;
pub use message_store::MessageStore;
pub use policy_store::PolicyStore;
pub use rate_limit_backend::RateLimitBackend;
pub use reservation_store::ReservationStore;
pub use worker_runtime::{ReviewJudge, WorkerOutcome, WorkerRuntime};
