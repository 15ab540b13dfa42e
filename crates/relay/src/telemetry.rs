//! Heartbeat emission and downstream forwarding.
//!
//! Both POSTs are best-effort: the cycle's outcome is already decided by
//! the time they run, and an unreachable endpoint only earns a warning.

use std::time::Duration;

use {
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::packet::ResponsePacket;

/// Interval reported when a cycle produced no packet.
pub const FALLBACK_INTERVAL_MINUTES: i64 = 10;

const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);
const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Clamp a requested interval into the scheduler's accepted range.
#[must_use]
pub fn clamp_minutes(minutes: i64) -> i64 {
    minutes.clamp(1, 60)
}

/// Cycle status tag carried by the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CycleStatus {
    Ok,
    Fail,
}

#[derive(Serialize)]
struct HeartbeatBody {
    #[serde(rename = "type")]
    kind: &'static str,
    minutes: i64,
    status: CycleStatus,
}

#[derive(Serialize)]
struct PublishBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: Option<&'a str>,
    source_id: &'a serde_json::Value,
    reply_to_source_id: &'a serde_json::Value,
}

/// Posts heartbeats and forwards published packets downstream.
pub struct Forwarder {
    client: reqwest::Client,
    telemetry_url: Option<String>,
    relay_url: Option<String>,
}

impl Forwarder {
    #[must_use]
    pub fn new(telemetry_url: Option<String>, relay_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            telemetry_url,
            relay_url,
        }
    }

    /// Emit the cycle's single heartbeat. The interval is clamped here so
    /// callers can pass whatever the packet asked for.
    pub async fn heartbeat(&self, minutes: i64, status: CycleStatus) {
        let Some(url) = self.telemetry_url.as_deref() else {
            debug!("no telemetry endpoint configured, skipping heartbeat");
            return;
        };
        let body = HeartbeatBody {
            kind: "UPDATE_TIMER",
            minutes: clamp_minutes(minutes),
            status,
        };
        let result = self
            .client
            .post(url)
            .timeout(HEARTBEAT_TIMEOUT)
            .json(&body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(minutes = body.minutes, ?status, "heartbeat delivered");
            },
            Ok(response) => {
                warn!(status = %response.status(), "heartbeat rejected");
            },
            Err(e) => {
                warn!(error = %e, "heartbeat unreachable");
            },
        }
    }

    /// Forward a published packet downstream in the canonical shape.
    /// Returns whether delivery succeeded; failure is logged, never retried.
    pub async fn forward_publish(&self, packet: &ResponsePacket) -> bool {
        let Some(url) = self.relay_url.as_deref() else {
            debug!("no relay endpoint configured, skipping forward");
            return false;
        };
        let null = serde_json::Value::Null;
        let body = PublishBody {
            kind: "PUBLISH_CONTENT",
            text: packet.final_text.as_deref(),
            source_id: packet.source_id.as_ref().unwrap_or(&null),
            reply_to_source_id: packet.reply_to_source_id.as_ref().unwrap_or(&null),
        };
        let result = self
            .client
            .post(url)
            .timeout(FORWARD_TIMEOUT)
            .json(&body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!("published content forwarded downstream");
                true
            },
            Ok(response) => {
                warn!(status = %response.status(), "downstream rejected publish");
                false
            },
            Err(e) => {
                warn!(error = %e, "downstream unreachable");
                false
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 1)]
    #[case(-5, 1)]
    #[case(61, 60)]
    #[case(1000, 60)]
    #[case(1, 1)]
    #[case(15, 15)]
    #[case(60, 60)]
    fn clamp_table(#[case] input: i64, #[case] expected: i64) {
        assert_eq!(clamp_minutes(input), expected);
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&CycleStatus::Ok).unwrap(), "\"OK\"");
        assert_eq!(serde_json::to_string(&CycleStatus::Fail).unwrap(), "\"FAIL\"");
    }

    #[tokio::test]
    async fn heartbeat_posts_clamped_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/beat")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "type": "UPDATE_TIMER",
                "minutes": 60,
                "status": "OK"
            })))
            .with_status(200)
            .create_async()
            .await;

        let forwarder = Forwarder::new(Some(format!("{}/beat", server.url())), None);
        forwarder.heartbeat(1000, CycleStatus::Ok).await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forward_sends_canonical_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "type": "PUBLISH_CONTENT",
                "text": "hi",
                "source_id": 1,
                "reply_to_source_id": null
            })))
            .with_status(200)
            .create_async()
            .await;

        let packet = ResponsePacket {
            action: "PUBLISH".into(),
            next_scan_minutes: 5,
            final_text: Some("hi".into()),
            source_id: Some(serde_json::json!(1)),
            reply_to_source_id: None,
        };
        let forwarder = Forwarder::new(None, Some(format!("{}/hook", server.url())));
        assert!(forwarder.forward_publish(&packet).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forward_failure_is_reported_not_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let packet = ResponsePacket {
            action: "PUBLISH".into(),
            next_scan_minutes: 5,
            final_text: None,
            source_id: None,
            reply_to_source_id: None,
        };
        let forwarder = Forwarder::new(None, Some(format!("{}/hook", server.url())));
        assert!(!forwarder.forward_publish(&packet).await);
    }

    #[tokio::test]
    async fn unset_endpoints_are_noops() {
        let forwarder = Forwarder::new(None, None);
        forwarder.heartbeat(5, CycleStatus::Fail).await;
        let packet = ResponsePacket {
            action: "PUBLISH".into(),
            next_scan_minutes: 5,
            final_text: None,
            source_id: None,
            reply_to_source_id: None,
        };
        assert!(!forwarder.forward_publish(&packet).await);
    }
}
