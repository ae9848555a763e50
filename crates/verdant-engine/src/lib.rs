//! # Verdant Engine
//!
//! Single-writer lending engine tying together the ledger, the offset
//! registry, and the leaderboard.
//!
//! ## Data Flow
//!
//! ```text
//! credential intake ─► OffsetRegistry ─► Leaderboard
//!                            │
//!                            ▼ discount
//! deposit/borrow/... ─► Ledger (accrue, then mutate)
//!                            │
//!                            ▼ after commit
//!                      event queue ─► EventDispatcher ─► NotificationSink*
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: [`LendingEngine`] and committed-state snapshots
//! - [`config`]: Layered configuration (`.env`, file, `VERDANT__*` env)
//! - [`notify`]: Post-commit event delivery
//! - [`metrics`]: Prometheus counters and pool gauges
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod engine;
pub mod metrics;
pub mod notify;
pub mod telemetry;

pub use crate::config::EngineConfig;
pub use engine::{Bootstrap, EngineSnapshot, EngineState, LendingEngine};
pub use metrics::EngineMetrics;
pub use notify::{BroadcastSink, EventDispatcher, NotificationSink, TracingSink};
pub use telemetry::init_tracing;
