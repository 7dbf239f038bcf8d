//! Notification routing.
//!
//! [`NotificationRouter`] subscribes to the event bus and tells requesters
//! about terminal job transitions. Delivery is best-effort: when SMTP is
//! configured the notice goes out by email, otherwise it is logged; a
//! delivery failure never touches the job record.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use synthpop_events::{EmailConfig, EmailDelivery, JobEvent};

/// Background service that delivers job completion notices.
pub struct NotificationRouter {
    mailer: Option<EmailDelivery>,
}

impl NotificationRouter {
    /// Create a router with an explicit mailer (or none, to log only).
    pub fn new(mailer: Option<EmailDelivery>) -> Self {
        Self { mailer }
    }

    /// Create a router from the environment: email delivery when
    /// `SMTP_HOST` is set, log-only otherwise.
    pub fn from_env() -> Self {
        let mailer = EmailConfig::from_env().map(EmailDelivery::new);
        if mailer.is_none() {
            tracing::info!("SMTP not configured; job notifications will be logged only");
        }
        Self::new(mailer)
    }

    /// Run the delivery loop.
    ///
    /// Consumes job lifecycle events until the bus closes or `cancel` is
    /// triggered. Lagged receivers skip ahead and keep going.
    pub async fn run(self, mut events: broadcast::Receiver<JobEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification router stopping");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) if event.is_terminal() => self.deliver(&event).await,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification router lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    /// Deliver one notice, best-effort.
    async fn deliver(&self, event: &JobEvent) {
        match &self.mailer {
            Some(mailer) => {
                if let Err(error) = mailer.deliver(event).await {
                    tracing::warn!(
                        fingerprint = %event.fingerprint,
                        to = %event.contact_address,
                        error = %error,
                        "Notification email delivery failed"
                    );
                }
            }
            None => {
                tracing::info!(
                    fingerprint = %event.fingerprint,
                    to = %event.contact_address,
                    event_type = %event.event_type,
                    "Dataset notification (email delivery not configured)"
                );
            }
        }
    }
}
