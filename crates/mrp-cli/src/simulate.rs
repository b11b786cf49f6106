//! End-to-end protocol simulation
//!
//! Drives a real service with short deadlines and seeded random
//! interventions, waits until every deadline has passed, then checks the
//! protocol held: every signal terminal, one transition each, chain intact.

use anyhow::Context;
use ed25519_dalek::SigningKey;
use mrp_audit::{Ed25519Signer, EntrySigner};
use mrp_core::{ErrorKind, LogInterventionRequest, MrpConfig, MrpService, SubmitSignalRequest};
use mrp_types::{EventType, SignalId, SignalStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const RISK_TYPES: [&str; 4] = ["self-harm", "bullying", "abuse", "grooming"];
const ACTIONS: [&str; 3] = ["Parent Contacted", "Counselor Meeting", "Safety Plan Created"];

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Signals to submit
    pub signals: usize,
    /// Share of signals that receive an intervention attempt
    pub intervene_ratio: f64,
    /// Escalation timeout for this run
    pub timeout: Duration,
    /// RNG seed
    pub seed: u64,
    /// Journal file; in-memory when absent
    pub journal: Option<PathBuf>,
    /// Sign entries with a key derived from the seed
    pub sign: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            signals: 100,
            intervene_ratio: 0.6,
            timeout: Duration::from_millis(200),
            seed: 42,
            journal: None,
            sign: false,
        }
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub signals: usize,
    pub interventions_attempted: usize,
    pub interventions_rejected: usize,
    pub resolved: usize,
    pub escalated: usize,
    pub still_pending: usize,
    pub chain_length: usize,
    pub chain_valid: bool,
    pub broken_at: Option<u64>,
    /// Hex public key when entries were signed
    pub public_key: Option<String>,
    pub violations: Vec<String>,
}

impl SimulationReport {
    /// Whether every protocol check held
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty() && self.chain_valid && self.still_pending == 0
    }

    /// Human-readable summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        out.push_str("MRP Simulation Report\n");
        out.push_str("=====================\n");
        out.push_str(&format!("Seed:                    {}\n", self.seed));
        out.push_str(&format!("Signals:                 {}\n", self.signals));
        out.push_str(&format!(
            "Interventions attempted: {}\n",
            self.interventions_attempted
        ));
        out.push_str(&format!(
            "Interventions rejected:  {}\n",
            self.interventions_rejected
        ));
        out.push_str(&format!("Resolved:                {}\n", self.resolved));
        out.push_str(&format!("Escalated:               {}\n", self.escalated));
        out.push_str(&format!("Still pending:           {}\n", self.still_pending));
        out.push_str(&format!("Chain length:            {}\n", self.chain_length));
        out.push_str(&format!(
            "Chain valid:             {}\n",
            if self.chain_valid { "YES" } else { "NO" }
        ));
        if let Some(key) = &self.public_key {
            out.push_str(&format!("Public key:              {key}\n"));
        }
        if self.violations.is_empty() {
            out.push_str("\nPASSED\n");
        } else {
            out.push_str(&format!("\nFAILED ({} violations)\n", self.violations.len()));
            for v in &self.violations {
                out.push_str(&format!("  - {v}\n"));
            }
        }
        out
    }
}

/// Run one simulation
///
/// # Errors
/// Returns an error if the service cannot start or a submission fails
pub async fn run_simulation(
    sim: SimulationConfig,
    base: MrpConfig,
) -> anyhow::Result<SimulationReport> {
    let mut rng = StdRng::seed_from_u64(sim.seed);

    let mut config = base.with_escalation_timeout(sim.timeout);
    if let Some(journal) = &sim.journal {
        config = config.with_journal_path(journal);
    }

    let mut builder = MrpService::builder(config);
    let mut public_key = None;
    if sim.sign {
        let signer = Ed25519Signer::new(SigningKey::generate(&mut rng));
        public_key = Some(hex::encode(signer.verifying_key().as_bytes()));
        builder = builder.signer(Arc::new(signer) as Arc<dyn EntrySigner>);
    }
    let service = Arc::new(builder.start().context("failed to start service")?);

    tracing::info!(signals = sim.signals, seed = sim.seed, "simulation started");

    let mut ids: Vec<SignalId> = Vec::with_capacity(sim.signals);
    let mut attempts = Vec::new();
    for n in 0..sim.signals {
        let request = SubmitSignalRequest {
            subject_id: format!("SUBJ-{n:04}"),
            risk_type: RISK_TYPES[rng.gen_range(0..RISK_TYPES.len())].to_string(),
            severity: if rng.gen_bool(0.3) { "CRITICAL" } else { "HIGH" }.to_string(),
            description: format!("simulated report {n}"),
            detected_by: "simulator".to_string(),
            ..Default::default()
        };
        let receipt = service
            .submit_signal(request)
            .with_context(|| format!("submission {n} failed"))?;
        ids.push(receipt.id);

        if rng.gen_bool(sim.intervene_ratio.clamp(0.0, 1.0)) {
            // up to twice the timeout, so some attempts lose the race
            let max_delay = u64::try_from(sim.timeout.as_millis() * 2).unwrap_or(u64::MAX).max(1);
            let delay = Duration::from_millis(rng.gen_range(0..max_delay));
            let request = LogInterventionRequest {
                action: ACTIONS[rng.gen_range(0..ACTIONS.len())].to_string(),
                staff_id: format!("STAFF-{}", rng.gen_range(1..=20)),
                notes: None,
            };
            let service = Arc::clone(&service);
            let id = receipt.id.to_string();
            attempts.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                service.log_intervention(&id, request)
            }));
        }
    }

    let mut report = SimulationReport {
        seed: sim.seed,
        signals: sim.signals,
        interventions_attempted: attempts.len(),
        public_key,
        ..SimulationReport::default()
    };

    for attempt in attempts {
        match attempt.await.context("intervention task panicked")? {
            Ok(_) => {}
            Err(err) if err.kind == ErrorKind::AlreadyTerminal => {
                report.interventions_rejected += 1;
            }
            Err(err) => report
                .violations
                .push(format!("unexpected intervention error: {err}")),
        }
    }

    wait_for_deadlines(&service, sim.timeout).await;
    service.shutdown().await;

    check_outcome(&service, &ids, &mut report);
    tracing::info!(
        passed = report.passed(),
        violations = report.violations.len(),
        "simulation finished"
    );
    Ok(report)
}

async fn wait_for_deadlines(service: &MrpService, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    // the scheduler may still be working through a burst of deadlines
    for _ in 0..200 {
        if service.list_pending().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn check_outcome(service: &MrpService, ids: &[SignalId], report: &mut SimulationReport) {
    for id in ids {
        let Ok(signal) = service.store().get(*id) else {
            report.violations.push(format!("signal {id} missing from store"));
            continue;
        };
        match signal.status() {
            SignalStatus::Resolved => report.resolved += 1,
            SignalStatus::Escalated => report.escalated += 1,
            SignalStatus::Pending => {
                report.still_pending += 1;
                report
                    .violations
                    .push(format!("signal {id} still pending after its deadline"));
            }
        }

        let trail: Vec<EventType> = service.chain().entries_for(*id).map(|e| e.event_type).collect();
        let transitions = trail
            .iter()
            .filter(|t| **t != EventType::SignalReceived)
            .count();
        if trail.first() != Some(&EventType::SignalReceived) {
            report
                .violations
                .push(format!("signal {id} trail does not start with SIGNAL_RECEIVED"));
        }
        if transitions > 1 {
            report
                .violations
                .push(format!("signal {id} has {transitions} terminal transitions"));
        }
    }

    let verification = service.verify_chain();
    report.chain_length = service.chain().len();
    report.chain_valid = verification.valid;
    report.broken_at = verification.broken_at;
    if !verification.valid {
        report.violations.push(format!(
            "chain verification failed at sequence {:?}",
            verification.broken_at
        ));
    }
}
