//! Per-record forwarding to the event logger
//!
//! Every canonical event is an independent call. A failure is logged and
//! counted; it never cancels or blocks the other records.

use futures::stream::{self, StreamExt};
use pulse_common::CanonicalEvent;
use serde::Serialize;
use tracing::{debug, error};

use crate::logger_client::EventLoggerClient;

/// Outcome counts for one forwarding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForwardReport {
    pub attempted: usize,
    pub forwarded: usize,
    pub failed: usize,
}

/// Submits canonical events with bounded concurrency
///
/// Calls are issued in sanitized order; with a concurrency of 1 they also
/// complete in that order.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: EventLoggerClient,
    concurrency: usize,
}

impl Forwarder {
    pub fn new(client: EventLoggerClient, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub fn client(&self) -> &EventLoggerClient {
        &self.client
    }

    /// Forward every event, returning exact success/failure counts
    pub async fn forward_all(&self, events: &[CanonicalEvent]) -> ForwardReport {
        // Each in-flight call owns its event and a client handle
        let attempted = events.len();
        let client = self.client.clone();
        let outcomes = stream::iter(events.to_vec())
            .map(move |event| {
                let client = client.clone();
                async move {
                    match client.post_event(&event).await {
                        Ok(()) => {
                            debug!(timestamp = %event.timestamp(), signal = %event.signal(), "Event forwarded");
                            true
                        }
                        Err(e) => {
                            error!(
                                timestamp = %event.timestamp(),
                                signal = %event.signal(),
                                error = %e,
                                "Failed to forward event"
                            );
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency);

        outcomes
            .fold(
                ForwardReport {
                    attempted,
                    ..Default::default()
                },
                |mut report, ok| async move {
                    if ok {
                        report.forwarded += 1;
                    } else {
                        report.failed += 1;
                    }
                    report
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulse_common::events::{Meta, Signal};
    use std::time::Duration;

    fn event(second: u32) -> CanonicalEvent {
        CanonicalEvent::new(
            Utc.with_ymd_and_hms(2025, 8, 17, 17, 0, second).unwrap(),
            Signal::Ecg,
            Some(0.5),
            None,
            Meta::new(),
        )
    }

    #[tokio::test]
    async fn test_forwarding_runs_on_spawned_task_and_counts_failures() {
        // Nothing listens on port 9 locally
        let client =
            EventLoggerClient::new("http://127.0.0.1:9", "token", Duration::from_secs(2)).unwrap();
        let forwarder = Forwarder::new(client, 2);
        let events = vec![event(0), event(1), event(2)];

        let report = tokio::spawn(async move { forwarder.forward_all(&events).await })
            .await
            .unwrap();

        assert_eq!(
            report,
            ForwardReport {
                attempted: 3,
                forwarded: 0,
                failed: 3,
            }
        );
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let client =
            EventLoggerClient::new("http://127.0.0.1:9", "token", Duration::from_secs(1)).unwrap();
        assert_eq!(Forwarder::new(client, 0).concurrency, 1);
    }
}
