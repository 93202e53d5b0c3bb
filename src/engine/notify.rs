use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use crate::clients::{bounded, CollaboratorError, IdentityStore, NotificationGateway};
use crate::models::id::RecordId;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    EmailAndSms,
    SmsOnly,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub recipient: RecordId,
    pub subject: String,
    pub body: String,
    pub kind: &'static str,
    pub payload: Value,
    pub channels: Channels,
}

/// Best-effort fan-out. Nothing here returns an error to the caller: a
/// failed lookup or send is logged and counted, then dropped.
#[derive(Clone)]
pub struct Notifier {
    gateway: Arc<dyn NotificationGateway>,
    identities: Arc<dyn IdentityStore>,
    timeout: Duration,
    metrics: Metrics,
}

impl Notifier {
    pub fn new(
        gateway: Arc<dyn NotificationGateway>,
        identities: Arc<dyn IdentityStore>,
        timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            gateway,
            identities,
            timeout,
            metrics,
        }
    }

    /// Sends every notice concurrently on a background task.
    pub fn spawn(&self, notices: Vec<Notice>) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            join_all(notices.iter().map(|notice| notifier.deliver(notice))).await;
        })
    }

    pub async fn deliver(&self, notice: &Notice) {
        let person = match bounded(
            self.timeout,
            "recipient lookup",
            self.identities.get_person(&notice.recipient),
        )
        .await
        {
            Ok(person) => person,
            Err(err) => {
                warn!(recipient = %notice.recipient, kind = notice.kind, error = %err, "notification skipped: recipient unresolved");
                self.metrics
                    .notification_failures_total
                    .with_label_values(&["lookup"])
                    .inc();
                return;
            }
        };

        if notice.channels == Channels::EmailAndSms && !person.email.is_empty() {
            let sent = bounded(
                self.timeout,
                "email notification",
                self.gateway.send_email(
                    &person.email,
                    &notice.subject,
                    &notice.body,
                    notice.kind,
                    notice.payload.clone(),
                ),
            )
            .await;
            self.record("email", notice, sent.err());
        }

        match person.phone_number.as_deref().filter(|phone| !phone.is_empty()) {
            Some(phone) => {
                let sent = bounded(
                    self.timeout,
                    "sms notification",
                    self.gateway
                        .send_sms(phone, &notice.body, notice.kind, notice.payload.clone()),
                )
                .await;
                self.record("sms", notice, sent.err());
            }
            None => {
                debug!(recipient = %notice.recipient, kind = notice.kind, "no phone number, sms skipped");
            }
        }
    }

    fn record(&self, channel: &str, notice: &Notice, failure: Option<CollaboratorError>) {
        if let Some(err) = failure {
            warn!(recipient = %notice.recipient, kind = notice.kind, channel, error = %err, "notification failed");
            self.metrics
                .notification_failures_total
                .with_label_values(&[channel])
                .inc();
        }
    }
}
