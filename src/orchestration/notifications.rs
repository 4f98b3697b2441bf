//! Storage-notification dispatch: every notification gets its own coordinator
//! invocation, run concurrently, mirroring an event-triggered function.

use super::merge_coordinator::{MergeCoordinator, MergeOutcome};
use crate::logging::log_error;
use crate::storage::StorageNotification;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

pub struct NotificationDispatcher;

impl NotificationDispatcher {
    /// Drain `receiver` until it closes, then wait for in-flight invocations.
    ///
    /// The handle resolves to the number of notifications that produced a merge.
    pub fn spawn(
        coordinator: Arc<MergeCoordinator>,
        mut receiver: mpsc::UnboundedReceiver<StorageNotification>,
    ) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut invocations = JoinSet::new();
            let mut merges = 0;

            while let Some(notification) = receiver.recv().await {
                while let Some(done) = invocations.try_join_next() {
                    merges += usize::from(matches!(done, Ok(true)));
                }

                let coordinator = coordinator.clone();
                invocations.spawn(async move {
                    match coordinator.handle_notification(&notification).await {
                        Ok(MergeOutcome::Merged { .. }) => true,
                        Ok(outcome) => {
                            debug!(object = %notification.object_name, outcome = outcome.label(), "Notification handled");
                            false
                        }
                        Err(e) => {
                            log_error(
                                "notification_dispatcher",
                                "handle_notification",
                                &e.to_string(),
                                Some(&notification.object_name),
                            );
                            false
                        }
                    }
                });
            }

            while let Some(done) = invocations.join_next().await {
                merges += usize::from(matches!(done, Ok(true)));
            }
            info!(merges, "Notification dispatcher stopped");
            merges
        })
    }
}
