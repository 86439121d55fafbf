use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{AppointmentError, AppointmentEvent};
use crate::services::store::EventOutbox;

/// A consumer of appointment state changes. Delivery is at-least-once, so
/// implementations must tolerate seeing the same event more than once.
#[async_trait]
pub trait AppointmentEventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &AppointmentEvent) -> Result<(), AppError>;
}

/// Moves events from the outbox to the registered handlers. An event is
/// acknowledged only once every handler has accepted it.
pub struct OutboxRelay {
    outbox: Arc<dyn EventOutbox>,
    handlers: Vec<Arc<dyn AppointmentEventHandler>>,
    batch_size: usize,
    poll_interval: Duration,
}

impl OutboxRelay {
    pub fn new(outbox: Arc<dyn EventOutbox>, batch_size: usize, poll_interval: Duration) -> Self {
        Self {
            outbox,
            handlers: Vec::new(),
            batch_size: batch_size.max(1),
            poll_interval,
        }
    }

    pub fn from_config(outbox: Arc<dyn EventOutbox>, config: &AppConfig) -> Self {
        Self::new(outbox, config.outbox_batch_size, config.outbox_poll_interval())
    }

    pub fn with_handler(mut self, handler: Arc<dyn AppointmentEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Delivers everything currently pending. Events whose delivery fails stay
    /// in the outbox for the next pass. Returns the number acknowledged.
    #[instrument(skip(self))]
    pub async fn drain(&self) -> Result<usize, AppointmentError> {
        let mut acknowledged = 0;

        loop {
            let batch = self.outbox.pending(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }

            let mut delivered_in_batch = 0;
            for event in &batch {
                if self.deliver(event).await {
                    self.outbox.acknowledge(event.id).await?;
                    delivered_in_batch += 1;
                }
            }

            acknowledged += delivered_in_batch;
            if delivered_in_batch < batch.len() {
                // Failed events would come straight back; leave them for the next tick.
                break;
            }
        }

        if acknowledged > 0 {
            debug!("Relayed {} appointment event(s)", acknowledged);
        }
        Ok(acknowledged)
    }

    /// Polls until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Outbox relay started ({} handler(s), every {:?})",
            self.handlers.len(),
            self.poll_interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.drain().await {
                error!("Outbox relay pass failed: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Outbox relay stopped");
    }

    async fn deliver(&self, event: &AppointmentEvent) -> bool {
        let mut all_ok = true;
        for handler in &self.handlers {
            if let Err(e) = handler.handle(event).await {
                warn!(
                    "Handler {} failed on {:?} event {} for appointment {}: {}",
                    handler.name(),
                    event.kind,
                    event.id,
                    event.appointment_id,
                    e
                );
                all_ok = false;
            }
        }
        all_ok
    }
}
