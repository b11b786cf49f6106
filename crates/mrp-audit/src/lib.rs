//! MRP Audit - tamper-evident audit chain
//!
//! Records every signal lifecycle event in one global, append-only sequence
//! where each entry's hash covers its predecessor's hash:
//! - [`AuditChain`]: serialized append, per-signal and recent views
//! - [`verify_entries`]: offline recomputation of hashes and links
//! - [`EntrySigner`]: optional signing capability (no-op or ed25519)
//! - [`ChainStorage`]: memory or JSON-lines journal backends
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use mrp_audit::AuditChain;
//! use mrp_types::{AuditEvent, RiskReport, SignalId, SignalReceived, Severity};
//!
//! let chain = AuditChain::in_memory();
//! let event = AuditEvent::SignalReceived(SignalReceived {
//!     report: RiskReport::new("S1", "bullying", Severity::High, "text", "keywords"),
//!     deadline: Utc::now(),
//! });
//! let entry = chain.append(SignalId::new(), &event, Utc::now()).unwrap();
//! assert_eq!(entry.sequence, 0);
//! assert!(chain.verify().valid);
//! ```

pub mod chain;
pub mod entry;
pub mod error;
pub mod hash;
pub mod signer;
pub mod storage;
pub mod verify;

pub use chain::{AuditChain, ChainStatistics, SignalTrail};
pub use entry::AuditEntry;
pub use error::{ChainIntegrityViolation, PersistenceError};
pub use hash::{ChainHash, HashError};
pub use signer::{Ed25519Attestor, Ed25519Signer, EntrySignature, EntrySigner, NoopSigner};
pub use storage::{ChainStorage, JournalStorage, MemoryStorage};
pub use verify::{verify_entries, ChainVerification, IntegrityFailure};
