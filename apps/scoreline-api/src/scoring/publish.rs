//! Publication of committed results to the hub and the relay.

use crate::hub::{HubEvent, Published};
use crate::AppState;

use super::coordinator::{Outcome, SettleReport};
use super::event::ScoreEvent;
use super::ScoringError;

/// Submits an event and, once it has committed, publishes the result.
pub async fn process(state: &AppState, event: ScoreEvent) -> Result<Outcome, ScoringError> {
    event.validate()?;
    let _turn = state.coordinator.turn(event.match_id()).await;
    let outcome = state.coordinator.submit(&event).await?;
    publish_outcome(state, &outcome).await;
    Ok(outcome)
}

/// Runs a manual settlement and publishes the new table if one was written.
pub async fn settle_and_publish(state: &AppState, match_id: &str) -> Result<SettleReport, ScoringError> {
    let _turn = state.coordinator.turn(match_id).await;
    let report = state.coordinator.settle(match_id).await?;
    if let Some(standings) = &report.standings {
        match standings.hub_event() {
            Ok(event) => publish_event(state, event).await,
            Err(e) => tracing::error!(match_id = %match_id, error = %e, "standings not serializable"),
        }
    }
    Ok(report)
}

/// Must only be called after the outcome's transaction committed.
pub async fn publish_outcome(state: &AppState, outcome: &Outcome) {
    let events = match outcome.events() {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(match_id = %outcome.update.match_id(), error = %e, "score update not serializable");
            return;
        }
    };
    for event in events {
        publish_event(state, event).await;
    }
}

/// Other processes first, then the local hub. Failures here never reach the
/// submitter: the event is already committed.
pub async fn publish_event(state: &AppState, event: HubEvent) {
    if let Some(relay) = &state.relay {
        if let Err(e) = relay.forward(&event).await {
            tracing::warn!(
                category = %event.category,
                event_type = %event.event_type,
                error = %e,
                "relay publish failed"
            );
        }
    }
    match state.hub.publish(event).await {
        Ok(Published::Queued) | Ok(Published::Dropped) => {}
        Err(e) => tracing::warn!(error = %e, "hub unavailable, update not broadcast"),
    }
}
