//! Coordination core for multi-agent orchestration.
//!
//! Provides the substrate a swarm of agents runs on top of, independent of
//! any particular LLM provider or issue tracker:
//! - a cell store tracking epics and subtasks through their lifecycle
//! - an inter-agent message bus
//! - a dual sliding-window rate limiter
//! - an advisory file reservation registry
//! - a git worktree-per-subtask manager
//! - a mandate/pattern policy engine
//! - a decomposition planner and DAG orchestrator
//! - a compaction hook for resuming interrupted sessions

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod ports;
pub mod services;

pub use error::{CoreError, StorageError};
