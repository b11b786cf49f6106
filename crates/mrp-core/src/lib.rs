//! MRP Core - response enforcement
//!
//! Tracks every high-risk signal from intake to exactly one terminal state:
//! - [`SignalStore`]: per-signal state machine, every transition audited
//! - [`EscalationScheduler`]: earliest-deadline-first escalation to tier 2
//! - [`MrpService`]: the boundary routers call into
//!
//! # Example
//!
//! ```rust,no_run
//! use mrp_core::{MrpConfig, MrpService, SubmitSignalRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = MrpService::builder(MrpConfig::default()).start()?;
//! let receipt = service.submit_signal(SubmitSignalRequest {
//!     subject_id: "S1".into(),
//!     risk_type: "self-harm".into(),
//!     severity: "CRITICAL".into(),
//!     description: "flagged message".into(),
//!     detected_by: "keywords".into(),
//!     ..Default::default()
//! })?;
//! println!("signal {} due by {}", receipt.id, receipt.deadline);
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod boundary;
pub mod clock;
pub mod config;
pub mod deadline;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod service;
pub mod store;

pub use boundary::{
    parse_signal_id, AuditEntryView, BoundaryError, InterventionReceipt, LogInterventionRequest,
    SignalView, SubmitReceipt, SubmitSignalRequest,
};
pub use clock::{AnchoredClock, Clock, SystemClock};
pub use config::{ConfigError, MrpConfig, DEFAULT_ESCALATION_TIMEOUT_MS};
pub use deadline::DeadlineQueue;
pub use error::{ErrorKind, MrpError, Result};
pub use notify::{ChannelNotifier, LoggingNotifier, NotifyError, Tier2Alert, Tier2Notifier};
pub use scheduler::{EscalationScheduler, SchedulerHandle};
pub use service::{HealthReport, MrpService, MrpServiceBuilder};
pub use store::SignalStore;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
