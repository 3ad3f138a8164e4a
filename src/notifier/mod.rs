pub mod format;
pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;
use crate::pacing::FixedDelay;
use crate::types::Deal;

// ---------------------------------------------------------------------------
// Message model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Informational button; pressing it does nothing.
    Noop,
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), action: ButtonAction::Noop }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self { text: text.into(), action: ButtonAction::Url(url.into()) }
    }
}

/// One formatted notification: HTML text, optional photo, button rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub image: Option<String>,
    pub buttons: Vec<Vec<Button>>,
}

// ---------------------------------------------------------------------------
// DeliveryChannel
// ---------------------------------------------------------------------------

/// Sends one message to one recipient.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, recipient: i64, message: &OutgoingMessage) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans a deal out to every recipient, best effort.
pub struct Notifier {
    channel: Arc<dyn DeliveryChannel>,
    recipients: Vec<i64>,
    pacer: FixedDelay,
}

impl Notifier {
    pub fn new(channel: Arc<dyn DeliveryChannel>, recipients: Vec<i64>, pacer: FixedDelay) -> Self {
        Self { channel, recipients, pacer }
    }

    /// A failed recipient is logged and skipped; the rest still get the deal.
    pub async fn notify(&self, deal: &Deal) -> DeliveryReport {
        let message = format::deal_message(deal);
        let mut report = DeliveryReport::default();

        for (i, &recipient) in self.recipients.iter().enumerate() {
            if i > 0 {
                self.pacer.wait().await;
            }
            match self.channel.deliver(recipient, &message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        recipient,
                        identity = %deal.summary.identity,
                        "Delivery to {recipient} failed: {e}"
                    );
                }
            }
        }

        info!(
            identity = %deal.summary.identity,
            delivered = report.delivered,
            failed = report.failed,
            "Deal delivered to {}/{} recipients",
            report.delivered,
            self.recipients.len(),
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;
    use crate::error::AppError;

    /// Records every delivery; recipients in `failing` get an error.
    #[derive(Default)]
    pub struct RecordingChannel {
        pub failing: Vec<i64>,
        pub sent: Mutex<Vec<(i64, OutgoingMessage)>>,
    }

    impl RecordingChannel {
        pub fn failing_for(failing: Vec<i64>) -> Self {
            Self { failing, sent: Mutex::new(Vec::new()) }
        }

        pub fn recipients(&self) -> Vec<i64> {
            self.sent.lock().unwrap().iter().map(|(r, _)| *r).collect()
        }
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        async fn deliver(&self, recipient: i64, message: &OutgoingMessage) -> Result<()> {
            if self.failing.contains(&recipient) {
                return Err(AppError::Delivery(format!("chat {recipient} blocked the bot")));
            }
            self.sent.lock().unwrap().push((recipient, message.clone()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::RecordingChannel;
    use super::*;
    use crate::types::{Generation, ListingDetail, ListingSummary, Tier};

    fn deal() -> Deal {
        Deal {
            summary: ListingSummary {
                identity: "https://www.olx.pl/d/oferta/a".to_string(),
                title: "iPhone 12 Pro Max 128GB".to_string(),
                list_price: 550,
                thumbnail: None,
            },
            detail: ListingDetail::default(),
            generation: Generation::new(12).unwrap(),
            tier: Tier::ProMax,
            storage_gb: 128,
            market_price: 600,
            profit: 50,
        }
    }

    #[tokio::test]
    async fn failed_recipient_does_not_stop_the_rest() {
        let channel = Arc::new(RecordingChannel::failing_for(vec![2]));
        let notifier = Notifier::new(channel.clone(), vec![1, 2, 3], FixedDelay::none());

        let report = notifier.notify(&deal()).await;

        assert_eq!(report, DeliveryReport { delivered: 2, failed: 1 });
        assert_eq!(channel.recipients(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn recipients_are_paced_apart() {
        let channel = Arc::new(RecordingChannel::default());
        let notifier = Notifier::new(channel.clone(), vec![1, 2, 3], FixedDelay::from_millis(300));

        let started = tokio::time::Instant::now();
        let report = notifier.notify(&deal()).await;
        let elapsed = started.elapsed();

        assert_eq!(report.delivered, 3);
        assert!(elapsed >= Duration::from_millis(600), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(900), "{elapsed:?}");
    }
}
