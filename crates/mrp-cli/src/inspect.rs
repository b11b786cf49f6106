//! Offline journal inspection
//!
//! Reads a journal without opening it for writing, so a live service's file
//! can be checked in place.

use anyhow::Context;
use mrp_audit::{
    verify_entries, AuditEntry, ChainStatistics, ChainVerification, Ed25519Attestor,
    EntrySigner, JournalStorage, NoopSigner,
};
use mrp_core::{parse_signal_id, AuditEntryView};
use std::path::Path;

/// Every entry of the journal at `path`
///
/// # Errors
/// Returns an error if the file is unreadable or corrupt mid-file
pub fn load_journal(path: &Path) -> anyhow::Result<Vec<AuditEntry>> {
    JournalStorage::read_entries(path)
        .with_context(|| format!("failed to read journal {}", path.display()))
}

/// Verify hashes and links, and signatures when a public key is given
///
/// # Errors
/// Returns an error if the journal cannot be read or the key is malformed
pub fn verify_journal(path: &Path, public_key: Option<&str>) -> anyhow::Result<ChainVerification> {
    let entries = load_journal(path)?;
    let signer: Box<dyn EntrySigner> = match public_key {
        Some(hex) => Box::new(
            Ed25519Attestor::from_hex(hex)
                .map_err(|e| anyhow::anyhow!("invalid public key: {e}"))?,
        ),
        None => Box::new(NoopSigner),
    };
    Ok(verify_entries(&entries, signer.as_ref()))
}

/// Counts and validity of a journal
///
/// # Errors
/// Returns an error if the journal cannot be read
pub fn journal_statistics(path: &Path) -> anyhow::Result<ChainStatistics> {
    let entries = load_journal(path)?;
    let valid = verify_entries(&entries, &NoopSigner).valid;
    Ok(ChainStatistics::collect(&entries, valid))
}

/// Entries of one signal in commit order
///
/// # Errors
/// Returns an error if the id is malformed or the journal cannot be read
pub fn signal_trail(path: &Path, signal: &str) -> anyhow::Result<Vec<AuditEntryView>> {
    let id = parse_signal_id(signal)?;
    let entries = load_journal(path)?;
    Ok(entries
        .iter()
        .filter(|e| e.signal_id == id)
        .map(AuditEntryView::from)
        .collect())
}
