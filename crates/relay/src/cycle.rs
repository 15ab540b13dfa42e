//! One end-to-end relay cycle.

use {secrecy::ExposeSecret, tracing::{error, info, warn}};

use {
    parley_config::RelayConfig,
    parley_transport::{ChatTransport, PeerRef, SessionGuard},
};

use crate::{
    error::{Error, Result},
    exchange,
    navigation::{self, NavigationPlan},
    packet::ResponsePacket,
    recovery::{FAILURE_THRESHOLD, RecoveryController},
    store::CounterStore,
    telemetry::{CycleStatus, FALLBACK_INTERVAL_MINUTES, Forwarder, clamp_minutes},
};

/// How the cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A structured packet was extracted.
    Delivered(ResponsePacket),
    /// The exchange ceiling expired with no valid packet.
    NoResult,
    /// The payload was empty; nothing was attempted.
    Skipped,
    /// Session, navigation, or exchange failed outright.
    Failed(String),
}

impl CycleOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered(_) => "delivered",
            Self::NoResult => "no-result",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// Summary of one cycle, after telemetry and bookkeeping have run.
#[derive(Debug)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Interval reported to the scheduler, already clamped.
    pub minutes: i64,
    /// Whether a published packet reached the downstream endpoint.
    pub forwarded: bool,
}

/// Run exactly one cycle. Never returns an error: every failure path is
/// folded into the report, the failure counter, and the FAIL heartbeat.
pub async fn run(
    config: &RelayConfig,
    transport: &dyn ChatTransport,
    store: &dyn CounterStore,
    forwarder: &Forwarder,
) -> CycleReport {
    if !config.payload.is_substantive() {
        warn!("payload buffer empty, skipping cycle");
        forwarder
            .heartbeat(FALLBACK_INTERVAL_MINUTES, CycleStatus::Fail)
            .await;
        return CycleReport {
            outcome: CycleOutcome::Skipped,
            minutes: FALLBACK_INTERVAL_MINUTES,
            forwarded: false,
        };
    }

    let mut controller = RecoveryController::start(store, FAILURE_THRESHOLD).await;
    let result = drive(config, transport, &mut controller).await;

    match result {
        Ok(packet) => {
            controller.finish(true).await;
            forwarder
                .heartbeat(packet.next_scan_minutes, CycleStatus::Ok)
                .await;
            let forwarded = packet.is_publish() && forwarder.forward_publish(&packet).await;
            let minutes = clamp_minutes(packet.next_scan_minutes);
            info!(minutes, forwarded, "cycle complete");
            CycleReport {
                outcome: CycleOutcome::Delivered(packet),
                minutes,
                forwarded,
            }
        },
        Err(Error::ExchangeTimeout) => {
            controller.finish(false).await;
            forwarder
                .heartbeat(FALLBACK_INTERVAL_MINUTES, CycleStatus::Fail)
                .await;
            CycleReport {
                outcome: CycleOutcome::NoResult,
                minutes: FALLBACK_INTERVAL_MINUTES,
                forwarded: false,
            }
        },
        Err(e) => {
            error!(error = %e, "cycle failed");
            controller.finish(false).await;
            forwarder
                .heartbeat(FALLBACK_INTERVAL_MINUTES, CycleStatus::Fail)
                .await;
            CycleReport {
                outcome: CycleOutcome::Failed(e.to_string()),
                minutes: FALLBACK_INTERVAL_MINUTES,
                forwarded: false,
            }
        },
    }
}

/// Session + navigation + exchange, with the session released on every path.
async fn drive(
    config: &RelayConfig,
    transport: &dyn ChatTransport,
    controller: &mut RecoveryController<'_>,
) -> Result<ResponsePacket> {
    let reference = PeerRef::parse(&config.peer);
    let mut session = SessionGuard::establish(
        transport,
        config.session_credential.expose_secret(),
        &reference,
    )
    .await?;

    let result = relay_over(&session, config, controller).await;
    session.close().await;
    result
}

async fn relay_over(
    session: &SessionGuard,
    config: &RelayConfig,
    controller: &mut RecoveryController<'_>,
) -> Result<ResponsePacket> {
    let forced = controller.needs_forced_reset();
    if forced || config.payload.wants_navigation() {
        if forced {
            warn!(
                failures = controller.count(),
                "failure threshold reached, forcing full reset"
            );
        }
        let plan = NavigationPlan::standard(&config.timing, config.payload.prompt.as_deref());
        navigation::run(session, &plan, &config.timing).await?;
        if forced {
            controller.note_recovered().await;
        }
    }

    exchange::run(session, &config.payload.rendered(), &config.timing).await
}
