//! Contact form

use crate::contact::{dispatch, ContactMessage, EmailService};
use crate::forms::state::VALIDATION_TITLE;
use crate::views::{Notification, Outcome};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct ContactView {
    email: Arc<dyn EmailService>,
    pub message: ContactMessage,
    sending: bool,
    results: mpsc::UnboundedReceiver<Outcome>,
    results_tx: mpsc::UnboundedSender<Outcome>,
}

impl ContactView {
    pub fn new(email: Arc<dyn EmailService>) -> Self {
        let (results_tx, results) = mpsc::unbounded_channel();
        Self {
            email,
            message: ContactMessage::default(),
            sending: false,
            results,
            results_tx,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Validates and hands the message off. The delivery result arrives
    /// through [`ContactView::next_result`].
    pub fn submit(&mut self) -> Option<Outcome> {
        if self.sending {
            return None;
        }
        if let Err(errors) = self.message.validate() {
            return Some(Outcome::show(Notification::error(
                VALIDATION_TITLE,
                errors.join(", "),
            )));
        }

        self.sending = true;
        let tx = self.results_tx.clone();
        dispatch(Arc::clone(&self.email), self.message.clone(), move |result| {
            let outcome = match result {
                Ok(()) => Outcome::show(Notification::success(
                    "Message Sent",
                    "Message sent successfully! We'll get back to you soon.",
                )),
                Err(e) => Outcome::show(Notification::error(
                    "Message Failed",
                    format!("Failed to send message: {}", e.friendly_message()),
                )),
            };
            let _ = tx.send(outcome);
        });
        None
    }

    /// Waits for the outcome of the last dispatched message. The form is
    /// cleared after a successful send.
    pub async fn next_result(&mut self) -> Option<Outcome> {
        let outcome = self.results.recv().await?;
        self.sending = false;
        if outcome.is_success() {
            self.message = ContactMessage::default();
        }
        Some(outcome)
    }
}
