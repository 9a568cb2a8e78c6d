//! Logging subscriber for coordinator events.

use humanloop_types::event::CoordinatorEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::EventBus;

/// Spawn a task that writes every coordinator event to the tracing log
/// until `cancel` fires or the bus is dropped.
pub fn spawn_event_logger(bus: &EventBus, cancel: CancellationToken) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Some(event) => log_event(&event),
                None => break,
            }
        }
    })
}

fn log_event(event: &CoordinatorEvent) {
    match event {
        CoordinatorEvent::InputRequested {
            execution_id,
            request_id,
            step,
            workflow_name,
            timeout_at,
            priority,
            requires_immediate,
        } => {
            tracing::info!(
                %execution_id,
                %request_id,
                step,
                workflow = %workflow_name,
                %timeout_at,
                ?priority,
                requires_immediate,
                "human input requested"
            );
        }
        CoordinatorEvent::InputReceived {
            execution_id,
            request_id,
            step,
        } => {
            tracing::info!(%execution_id, %request_id, step, "human input received");
        }
        CoordinatorEvent::InputCancelled {
            execution_id,
            request_id,
            step,
        } => {
            tracing::info!(%execution_id, %request_id, step, "input request cancelled");
        }
        CoordinatorEvent::InputExpired {
            execution_id,
            request_id,
            step,
        } => {
            tracing::warn!(%execution_id, %request_id, step, "input request expired");
        }
        CoordinatorEvent::ExecutionCompleted {
            execution_id,
            duration_ms,
        } => {
            tracing::info!(%execution_id, duration_ms, "execution completed");
        }
        CoordinatorEvent::ExecutionFailed {
            execution_id,
            reason,
        } => {
            tracing::warn!(%execution_id, %reason, "execution failed");
        }
    }
}
