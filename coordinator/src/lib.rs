//! TCC Coordinator
//!
//! The coordinator drives an ordered set of participants through the
//! Try-Confirm-Cancel protocol. Try runs on every participant in order,
//! Confirm follows once all of them reserved, and any failure triggers a
//! concurrent Cancel across the whole set before control returns.

pub mod compensation;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod state;

pub use compensation::{cancel_all, CancelFailure, CancelFailureKind, CompensationReport};
pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, CoordinatorBuilder, ExecutionReport};
pub use error::{Result, TccError};
pub use metrics::{ActiveTransaction, Metrics, MetricsSnapshot, SharedMetrics};
pub use observer::{
    CallbackObserver, ChannelObserver, CompensationObserver, LoggingObserver, SharedObserver,
};
pub use state::Outcome;
pub use tcc_common::{Participant, ParticipantError, Phase, SharedParticipant, TxContext};
