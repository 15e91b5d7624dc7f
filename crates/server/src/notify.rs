use tracing::info;

use quotedesk_core::notifications::{CustomerStatusEvent, NotificationDispatcher};

/// Structured-log delivery for status-change events. Email/webhook delivery
/// hangs off the same event record later; today the one-line log entry is
/// the notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn notify(&self, event: CustomerStatusEvent) {
        info!(
            event_name = "customer.notification",
            action = event.action.as_str(),
            customer_id = %event.customer_id,
            customer_name = %event.customer_name,
            customer_status = event.customer_status.as_str(),
            actor_user_id = %event.actor_user_id,
            actor_login = %event.actor_login,
            comment_len = event.comment_len,
            "customer status changed"
        );
    }
}
