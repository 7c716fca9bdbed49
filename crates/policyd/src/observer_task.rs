use policy_lifecycle::ShutdownSubscription;
use policy_store::{DecisionEvent, Observer, UPDATES_CHANNEL};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Drains the bounded Decision Pipeline -> Observer channel on a single
/// dedicated task, so a slow or unavailable Observer cannot stall the
/// connection tasks producing events.
pub async fn run(
    mut events: mpsc::Receiver<DecisionEvent>,
    observer: Arc<dyn Observer>,
    mut shutdown: ShutdownSubscription,
) {
    loop {
        tokio::select! {
            _ = shutdown.shutting_down() => {
                // Drain whatever is already queued before exiting so a
                // shutdown doesn't silently drop events that are already
                // sitting in the channel.
                while let Ok(event) = events.try_recv() {
                    observer.emit(UPDATES_CHANNEL, event).await;
                }
                return;
            }
            event = events.recv() => {
                match event {
                    Some(event) => observer.emit(UPDATES_CHANNEL, event).await,
                    None => return,
                }
            }
        }
    }
}
