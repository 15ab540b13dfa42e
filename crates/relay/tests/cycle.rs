//! End-to-end cycle scenarios over the scripted transport.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use secrecy::Secret;

use {
    parley_common::RelayPayload,
    parley_config::{RelayConfig, Timing},
    parley_relay::{
        CycleOutcome, Forwarder,
        cycle,
        recovery::FAILURE_THRESHOLD,
        store::CounterStore,
        store_memory::InMemoryCounterStore,
    },
    parley_transport::scripted::{Script, ScriptMessage, ScriptedTransport},
};

fn fast_timing() -> Timing {
    Timing {
        fetch_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(5),
        exchange_ceiling: Duration::from_millis(400),
        settle: Duration::from_millis(1),
        nav_retry_wait: Duration::from_millis(1),
        nav_retries: 1,
        prompt_buffer: Duration::from_millis(1),
        max_corrections: 3,
        recent_window: 5,
    }
}

fn config(payload: &str, telemetry_url: Option<String>, relay_url: Option<String>) -> RelayConfig {
    RelayConfig {
        node_id: 1,
        node_secret: Secret::new("secret".into()),
        session_credential: Secret::new("AQAB".into()),
        peer: "@agent".into(),
        telemetry_url,
        relay_url,
        payload: RelayPayload::parse(payload),
        state_dir: None,
        timing: fast_timing(),
    }
}

fn reply(text: &str) -> ScriptMessage {
    ScriptMessage {
        text: text.into(),
        ..Default::default()
    }
}

fn menu(labels: &[&str]) -> ScriptMessage {
    ScriptMessage {
        text: "choose an option".into(),
        choices: labels.iter().map(ToString::to_string).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn scenario_a_fenced_packet_without_publish() {
    let mut server = mockito::Server::new_async().await;
    let heartbeat = server
        .mock("POST", "/telemetry")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "type": "UPDATE_TIMER",
            "minutes": 20,
            "status": "OK"
        })))
        .with_status(200)
        .create_async()
        .await;
    let downstream = server
        .mock("POST", "/relay")
        .expect(0)
        .create_async()
        .await;

    let transport = ScriptedTransport::new(Script {
        replies: vec![vec![reply(
            "```json\n{\"action\":\"NONE\",\"next_scan_minutes\":20}\n```",
        )]],
        ..Script::default()
    });
    let store = InMemoryCounterStore::new();
    let cfg = config(
        r#"{"content":"abc","mode":"DATA"}"#,
        Some(format!("{}/telemetry", server.url())),
        Some(format!("{}/relay", server.url())),
    );
    let forwarder = Forwarder::new(cfg.telemetry_url.clone(), cfg.relay_url.clone());

    let report = cycle::run(&cfg, &transport, &store, &forwarder).await;

    assert!(report.outcome.is_success());
    assert_eq!(report.minutes, 20);
    assert!(!report.forwarded);
    // DATA mode skips navigation entirely: the only outgoing text is the payload.
    assert_eq!(transport.sent_texts(), vec!["abc".to_string()]);
    assert_eq!(store.get().await.unwrap(), 0);
    heartbeat.assert_async().await;
    downstream.assert_async().await;
}

#[tokio::test]
async fn scenario_b_correction_then_publish() {
    let mut server = mockito::Server::new_async().await;
    let heartbeat = server
        .mock("POST", "/telemetry")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "type": "UPDATE_TIMER",
            "minutes": 5,
            "status": "OK"
        })))
        .with_status(200)
        .create_async()
        .await;
    let downstream = server
        .mock("POST", "/relay")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "type": "PUBLISH_CONTENT",
            "text": "hi",
            "source_id": 1,
            "reply_to_source_id": null
        })))
        .with_status(200)
        .create_async()
        .await;

    let prose = "I have considered your message at length and here are my thoughts in prose.";
    assert!(prose.len() >= 40, "prose must look like a failed attempt");
    let transport = ScriptedTransport::new(Script {
        replies: vec![
            vec![reply(prose)],
            vec![reply(
                r#"{"action":"PUBLISH","final_text":"hi","source_id":1,"reply_to_source_id":null,"next_scan_minutes":5}"#,
            )],
        ],
        ..Script::default()
    });
    let store = InMemoryCounterStore::new();
    let cfg = config(
        r#"{"content":"publish the morning update","mode":"DATA"}"#,
        Some(format!("{}/telemetry", server.url())),
        Some(format!("{}/relay", server.url())),
    );
    let forwarder = Forwarder::new(cfg.telemetry_url.clone(), cfg.relay_url.clone());

    let report = cycle::run(&cfg, &transport, &store, &forwarder).await;

    assert!(report.outcome.is_success());
    assert_eq!(report.minutes, 5);
    assert!(report.forwarded);
    // Payload then one corrective instruction.
    assert_eq!(transport.sent_texts().len(), 2);
    heartbeat.assert_async().await;
    downstream.assert_async().await;
}

#[tokio::test]
async fn scenario_c_silence_increments_failure_counter() {
    let mut server = mockito::Server::new_async().await;
    let heartbeat = server
        .mock("POST", "/telemetry")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "type": "UPDATE_TIMER",
            "minutes": 10,
            "status": "FAIL"
        })))
        .with_status(200)
        .create_async()
        .await;

    let transport = ScriptedTransport::new(Script::default());
    let store = InMemoryCounterStore::new();
    let cfg = config(
        r#"{"content":"anyone listening?","mode":"DATA"}"#,
        Some(format!("{}/telemetry", server.url())),
        None,
    );
    let forwarder = Forwarder::new(cfg.telemetry_url.clone(), cfg.relay_url.clone());

    let report = cycle::run(&cfg, &transport, &store, &forwarder).await;

    assert_eq!(report.outcome, CycleOutcome::NoResult);
    assert_eq!(report.minutes, 10);
    assert_eq!(store.get().await.unwrap(), 1);
    heartbeat.assert_async().await;
}

#[tokio::test]
async fn init_mode_walks_the_menu_before_transfer() {
    let transport = ScriptedTransport::new(Script {
        replies: vec![
            // Reset command answered with the level-1 menu.
            vec![menu(&["🤖 AI Assistant", "Settings"])],
            // Each click opens the next level.
            vec![menu(&["Structured output mode", "Plain chat"])],
            vec![menu(&["JSON", "YAML"])],
            vec![],
            // Prompt acknowledgment, discarded by the buffer delay.
            vec![reply("Understood, I will reply in JSON from now on.")],
            // Payload answered with the packet.
            vec![reply(r#"{"action":"NONE","next_scan_minutes":30}"#)],
        ],
        ..Script::default()
    });
    let store = InMemoryCounterStore::new();
    let cfg = config(r#"{"content":"first sync","mode":"INIT"}"#, None, None);
    let forwarder = Forwarder::new(None, None);

    let report = cycle::run(&cfg, &transport, &store, &forwarder).await;

    assert!(report.outcome.is_success());
    let clicked: Vec<String> = transport.clicks().into_iter().map(|(_, l)| l).collect();
    assert_eq!(
        clicked,
        vec!["🤖 AI Assistant", "Structured output mode", "JSON"]
    );
    // Reset, system prompt, payload — in that order.
    let sent = transport.sent_texts();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], "/reset");
    assert!(sent[1].contains("action"));
    assert_eq!(sent[2], "first sync");
}

#[tokio::test]
async fn failure_threshold_forces_reset_in_data_mode() {
    let transport = ScriptedTransport::new(Script {
        replies: vec![
            vec![menu(&["AI Assistant"])],
            vec![menu(&["Structured Output"])],
            vec![menu(&["json please"])],
            vec![],
            vec![reply("Understood.")],
            vec![reply(r#"{"action":"NONE"}"#)],
        ],
        ..Script::default()
    });
    let store = InMemoryCounterStore::with_count(FAILURE_THRESHOLD);
    let cfg = config(r#"{"content":"routine delivery","mode":"DATA"}"#, None, None);
    let forwarder = Forwarder::new(None, None);

    let report = cycle::run(&cfg, &transport, &store, &forwarder).await;

    assert!(report.outcome.is_success());
    // DATA mode would normally skip navigation; the forced reset ran it.
    assert_eq!(transport.sent_texts()[0], "/reset");
    assert_eq!(transport.clicks().len(), 3);
    assert_eq!(store.get().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_menu_buttons_soft_fail_and_cycle_continues() {
    let transport = ScriptedTransport::new(Script {
        // The reset yields no menus at all: every step soft-fails.
        replies: vec![
            vec![reply("menu is gone today")],
            vec![reply("Understood.")],
            vec![reply(r#"{"action":"NONE","next_scan_minutes":25}"#)],
        ],
        ..Script::default()
    });
    let store = InMemoryCounterStore::new();
    let cfg = config(r#"{"content":"still works","mode":"INIT"}"#, None, None);
    let forwarder = Forwarder::new(None, None);

    let report = cycle::run(&cfg, &transport, &store, &forwarder).await;

    assert!(report.outcome.is_success());
    assert!(transport.clicks().is_empty());
    assert_eq!(report.minutes, 25);
}

#[tokio::test]
async fn auth_failure_counts_as_cycle_failure() {
    let transport = ScriptedTransport::new(Script {
        accept: vec!["some-other-credential".into()],
        ..Script::default()
    });
    let store = InMemoryCounterStore::with_count(1);
    let cfg = config(r#"{"content":"will not connect"}"#, None, None);
    let forwarder = Forwarder::new(None, None);

    let report = cycle::run(&cfg, &transport, &store, &forwarder).await;

    assert!(matches!(report.outcome, CycleOutcome::Failed(_)));
    assert_eq!(report.minutes, 10);
    assert_eq!(store.get().await.unwrap(), 2);
}

#[tokio::test]
async fn empty_payload_skips_without_touching_counter() {
    let transport = ScriptedTransport::new(Script::default());
    let store = InMemoryCounterStore::with_count(2);
    let cfg = config("", None, None);
    let forwarder = Forwarder::new(None, None);

    let report = cycle::run(&cfg, &transport, &store, &forwarder).await;

    assert_eq!(report.outcome, CycleOutcome::Skipped);
    assert!(transport.connect_attempts().is_empty());
    assert_eq!(store.get().await.unwrap(), 2);
}
