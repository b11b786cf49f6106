//! Signal lifecycle through the service boundary
//!
//! Runs under paused tokio time: sleeping auto-advances the clock, so the
//! escalation scheduler fires exactly at the armed deadlines.

use mrp_core::*;
use mrp_test_utils::{anchor, config, intervention, report, settle, start, submit_request};
use mrp_types::{EventType, SignalStatus};
use pretty_assertions::assert_eq;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(600);

#[tokio::test(start_paused = true)]
async fn intervention_before_deadline_resolves() {
    let mut h = start(config(TIMEOUT));
    let receipt = h.service.submit_signal(submit_request("S1")).unwrap();
    assert_eq!(receipt.status, SignalStatus::Pending);
    assert_eq!(receipt.deadline, anchor() + chrono::Duration::minutes(10));

    tokio::time::sleep(Duration::from_secs(120)).await;
    let done = h
        .service
        .log_intervention(&receipt.id.to_string(), intervention("ST1"))
        .unwrap();
    assert_eq!(done.status, SignalStatus::Resolved);

    // well past the original deadline: nothing fires
    tokio::time::sleep(TIMEOUT * 2).await;
    settle().await;
    assert!(h.alerts.try_recv().is_err());

    let view = h.service.get_signal(&receipt.id.to_string()).unwrap();
    assert_eq!(view.status, SignalStatus::Resolved);
    let resolution = view.resolution.unwrap();
    assert_eq!(resolution.staff_id, "ST1");
    assert_eq!(resolution.resolved_at, anchor() + chrono::Duration::seconds(120));

    let trail = h.service.audit_trail(&receipt.id.to_string()).unwrap();
    let types: Vec<_> = trail.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![EventType::SignalReceived, EventType::InterventionLogged]);
    assert_eq!(trail[1].payload["elapsed_ms"], 120_000);
    assert!(h.service.verify_chain().valid);
}

#[tokio::test(start_paused = true)]
async fn missed_deadline_escalates_to_tier2() {
    let mut h = start(config(TIMEOUT));
    let receipt = h.service.submit_signal(submit_request("S2")).unwrap();

    let alert = h.alerts.recv().await.unwrap();
    assert_eq!(alert.signal_id, receipt.id);
    assert!(alert.escalation.escalated_at >= receipt.deadline);
    assert!(alert.escalation.escalated_at < receipt.deadline + chrono::Duration::seconds(1));
    assert_eq!(
        alert.escalation.reason,
        "No intervention logged within 600 seconds"
    );

    let view = h.service.get_signal(&receipt.id.to_string()).unwrap();
    assert_eq!(view.status, SignalStatus::Escalated);
    assert!(view.resolution.is_none());

    let trail = h.service.audit_trail(&receipt.id.to_string()).unwrap();
    let types: Vec<_> = trail.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![EventType::SignalReceived, EventType::EscalatedToTier2]);
    assert_eq!(trail[1].payload["target"], "TIER_2");
}

#[tokio::test(start_paused = true)]
async fn late_intervention_is_rejected() {
    let mut h = start(config(TIMEOUT));
    let receipt = h.service.submit_signal(submit_request("S3")).unwrap();
    h.alerts.recv().await.unwrap();
    let length = h.service.chain().len();

    let err = h
        .service
        .log_intervention(&receipt.id.to_string(), intervention("ST1"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyTerminal);
    assert_eq!(err.status_code(), 409);
    assert_eq!(h.service.chain().len(), length);

    let view = h.service.get_signal(&receipt.id.to_string()).unwrap();
    assert_eq!(view.status, SignalStatus::Escalated);
}

#[tokio::test(start_paused = true)]
async fn second_intervention_changes_nothing() {
    let h = start(config(TIMEOUT));
    let id = h.service.submit_signal(submit_request("S4")).unwrap().id.to_string();
    h.service.log_intervention(&id, intervention("ST1")).unwrap();
    let head = h.service.chain().head();

    let err = h.service.log_intervention(&id, intervention("ST2")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyTerminal);
    assert_eq!(h.service.chain().head(), head);
    let view = h.service.get_signal(&id).unwrap();
    assert_eq!(view.resolution.unwrap().staff_id, "ST1");
}

#[tokio::test(start_paused = true)]
async fn race_intervention_first_wins() {
    let h = start(config(TIMEOUT));
    let receipt = h.service.submit_signal(submit_request("S5")).unwrap();
    let store = h.service.store();

    store
        .record_intervention(receipt.id, "Counselor Meeting", "ST1", None)
        .unwrap();
    let err = store.escalate(receipt.id).unwrap_err();
    assert!(matches!(err, MrpError::AlreadyTerminal { status: SignalStatus::Resolved, .. }));
    assert_eq!(store.get(receipt.id).unwrap().status(), SignalStatus::Resolved);
    assert_eq!(h.service.chain().entries_for(receipt.id).count(), 2);
}

#[tokio::test(start_paused = true)]
async fn race_escalation_first_wins() {
    let h = start(config(TIMEOUT));
    let receipt = h.service.submit_signal(submit_request("S6")).unwrap();
    let store = h.service.store();

    store.escalate(receipt.id).unwrap();
    let err = store
        .record_intervention(receipt.id, "Counselor Meeting", "ST1", None)
        .unwrap_err();
    assert!(matches!(err, MrpError::AlreadyTerminal { status: SignalStatus::Escalated, .. }));
    assert_eq!(h.service.chain().entries_for(receipt.id).count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_races_produce_one_transition_each() {
    let service = std::sync::Arc::new(
        MrpService::builder(MrpConfig::default()).start().unwrap(),
    );
    let ids: Vec<_> = (0..64)
        .map(|i| service.submit_signal(submit_request(&format!("S{i}"))).unwrap().id)
        .collect();

    let mut races = Vec::new();
    for id in &ids {
        let id = *id;
        let store = std::sync::Arc::clone(service.store());
        let escalation = tokio::spawn(async move { store.escalate(id).map(|s| s.status()) });
        let store = std::sync::Arc::clone(service.store());
        let intervention = tokio::spawn(async move {
            store
                .record_intervention(id, "Parent Contacted", "ST1", None)
                .map(|s| s.status())
        });
        races.push((id, escalation, intervention));
    }

    for (id, escalation, intervention) in races {
        let outcomes = [escalation.await.unwrap(), intervention.await.unwrap()];
        let winners: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "signal {id}: {outcomes:?}");
        let loser = outcomes.iter().find_map(|o| o.as_ref().err()).unwrap();
        assert!(
            matches!(loser, MrpError::AlreadyTerminal { status, .. } if status == winners[0]),
            "signal {id}: {loser:?}"
        );
        assert_eq!(service.store().get(id).unwrap().status(), *winners[0]);
    }

    for id in &ids {
        let trail: Vec<_> = service.chain().entries_for(*id).collect();
        assert_eq!(trail.len(), 2, "signal {id} has {} entries", trail.len());
        assert!(service.store().get(*id).unwrap().status().is_terminal());
    }
    assert!(service.verify_chain().valid);
    assert_eq!(service.chain().len(), ids.len() * 2);
    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn boundary_maps_errors_to_status_codes() {
    let h = start(config(TIMEOUT));

    let mut bad = submit_request("S7");
    bad.severity = "LOW".into();
    assert_eq!(h.service.submit_signal(bad).unwrap_err().status_code(), 400);

    let mut blank = submit_request("");
    blank.subject_id = "   ".into();
    assert_eq!(h.service.submit_signal(blank).unwrap_err().status_code(), 400);

    let err = h.service.get_signal("nope").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let unknown = mrp_types::SignalId::new().to_string();
    assert_eq!(h.service.get_signal(&unknown).unwrap_err().status_code(), 404);
    assert_eq!(
        h.service
            .log_intervention(&unknown, intervention("ST1"))
            .unwrap_err()
            .status_code(),
        404
    );

    let id = h.service.submit_signal(submit_request("S7")).unwrap().id.to_string();
    let mut no_staff = intervention("");
    no_staff.staff_id = String::new();
    let err = h.service.log_intervention(&id, no_staff).unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(h.service.get_signal(&id).unwrap().status, SignalStatus::Pending);
    // rejected input leaves only the intake entry
    assert_eq!(h.service.chain().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn listings_health_and_statistics() {
    let mut h = start(config(Duration::from_secs(60)));
    let a = h.service.submit_signal(submit_request("A")).unwrap().id;
    tokio::time::sleep(Duration::from_secs(10)).await;
    let b = h.service.submit_signal(submit_request("B")).unwrap().id;
    let c = h.service.submit_signal(submit_request("C")).unwrap().id;
    h.service.log_intervention(&b.to_string(), intervention("ST1")).unwrap();

    let all: Vec<_> = h.service.list_signals().into_iter().map(|s| s.id).collect();
    assert_eq!(all, vec![a, b, c]);
    let pending: Vec<_> = h.service.list_pending().into_iter().map(|s| s.id).collect();
    assert_eq!(pending, vec![a, c]);

    // a escalates at t=60s
    let alert = h.alerts.recv().await.unwrap();
    assert_eq!(alert.signal_id, a);

    let health = h.service.health();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.total_signals, 3);
    assert_eq!(health.pending_signals, 1);
    assert_eq!(health.chain_length, 5);
    assert!(health.scheduler_running);

    let stats = h.service.audit_statistics();
    assert_eq!(stats.total_entries, 5);
    assert_eq!(stats.unique_signals, 3);
    assert_eq!(stats.events_by_type[&EventType::SignalReceived], 3);
    assert_eq!(stats.events_by_type[&EventType::InterventionLogged], 1);
    assert_eq!(stats.events_by_type[&EventType::EscalatedToTier2], 1);

    let recent = h.service.recent_audit(Some(2));
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].event_type, EventType::EscalatedToTier2);
    assert_eq!(h.service.recent_audit(None).len(), 5);

    h.service.shutdown().await;
    assert!(!h.service.health().scheduler_running);
}

#[tokio::test(start_paused = true)]
async fn shutdown_leaves_pending_signals_alone() {
    let mut h = start(config(Duration::from_secs(30)));
    let id = h.service.submit_signal(submit_request("S8")).unwrap().id;
    h.service.shutdown().await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(h.alerts.try_recv().is_err());
    assert_eq!(h.service.store().get(id).unwrap().status(), SignalStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn metadata_is_kept_in_view_and_audit() {
    let h = start(config(TIMEOUT));
    let signal = h
        .service
        .store()
        .intake(report("S9").with_metadata("channel", "chat"))
        .unwrap();

    let view = h.service.get_signal(&signal.id.to_string()).unwrap();
    assert_eq!(view.metadata.get("channel").map(String::as_str), Some("chat"));

    let trail = h.service.audit_trail(&signal.id.to_string()).unwrap();
    assert_eq!(trail[0].payload["report"]["metadata"]["channel"], "chat");
    assert_eq!(trail[0].payload["report"]["severity"], "CRITICAL");
}
