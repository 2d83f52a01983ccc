//! The coordination core's service layer: each module wraps a narrow port
//! (or a pair of ports) with the domain logic and tracing instrumentation a
//! caller needs, without owning storage itself.

pub mod compaction_hook;
pub mod decomposition_planner;
pub mod message_bus;
pub mod orchestrator;
pub mod policy_engine;
pub mod rate_limiter;
pub mod reservation_registry;
pub mod worktree_manager;

pub use compaction_hook::CompactionHook;
pub use decomposition_planner::{DecompositionPlanner, Strategy, StrategyAlternative, StrategyRecommendation};
pub use message_bus::MessageBus;
pub use orchestrator::{CommandWorkerRuntime, Orchestrator, RunOptions};
pub use policy_engine::PolicyEngine;
pub use rate_limiter::RateLimiter;
pub use reservation_registry::ReservationRegistry;
pub use worktree_manager::WorktreeManager;
