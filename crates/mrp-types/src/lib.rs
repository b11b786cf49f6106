//! MRP Types - shared vocabulary of the Mandatory Response Protocol core
//!
//! Defines the data that flows between the audit chain, the signal store
//! and the intake boundary:
//! - [`SignalId`] and the risk report submitted at intake
//! - [`Signal`] with its lifecycle state
//! - [`AuditEvent`], the tagged payload of every audit entry
//! - [`ValidationError`] for malformed input
//!
//! # Example
//!
//! ```rust
//! use mrp_types::{RiskReport, Severity};
//!
//! let report = RiskReport::new("S1", "self-harm", Severity::Critical, "flagged message", "classifier");
//! assert!(report.validate().is_ok());
//! ```

pub mod error;
pub mod event;
pub mod id;
pub mod report;
pub mod signal;

pub use error::ValidationError;
pub use event::{AuditEvent, EscalatedToTier2, EventType, InterventionLogged, SignalReceived};
pub use id::SignalId;
pub use report::{RiskReport, Severity};
pub use signal::{Escalation, EscalationTier, Resolution, Signal, SignalState, SignalStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
