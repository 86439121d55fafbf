use async_trait::async_trait;
use tracing::info;

use crate::models::{Channel, Contact, Report, ReportError};

/// Delivers a report to a recipient over an external channel.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, report: &Report, channel: Channel, recipient: &Contact) -> Result<(), ReportError>;
}

/// Records the delivery in the log. Stands in until an email or WhatsApp provider is wired.
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn dispatch(&self, report: &Report, channel: Channel, recipient: &Contact) -> Result<(), ReportError> {
        let address = recipient.address_for(channel).ok_or_else(|| {
            ReportError::Validation(format!("Recipient has no {} address on file", channel))
        })?;

        info!("Sending report {} via {} to {}", report.id, channel, address);
        Ok(())
    }
}
