use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::{Customer, CustomerId, CustomerStatus};
use crate::domain::user::{User, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerAction {
    Approve,
    Reject,
}

impl CustomerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// Event record built after a committed status transition, delivered to the
/// configured dispatcher. Dispatch is side-effect-only; no caller depends on
/// a return value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerStatusEvent {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub customer_status: CustomerStatus,
    pub requested_by_user_id: Option<UserId>,
    pub action: CustomerAction,
    pub actor_user_id: UserId,
    pub actor_login: String,
    pub comment: Option<String>,
    pub comment_len: usize,
    pub occurred_at: DateTime<Utc>,
}

impl CustomerStatusEvent {
    pub fn new(
        customer: &Customer,
        action: CustomerAction,
        actor: &User,
        comment: Option<&str>,
    ) -> Self {
        Self {
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            customer_status: customer.status,
            requested_by_user_id: customer.requested_by_user_id,
            action,
            actor_user_id: actor.id,
            actor_login: actor.login_id.clone(),
            comment: comment.map(str::to_owned),
            comment_len: comment.map(str::len).unwrap_or(0),
            occurred_at: Utc::now(),
        }
    }
}

/// Best-effort delivery channel for status-change events.
///
/// Implementations must never surface a failure to the caller: the
/// transition is already committed when `notify` runs, and nothing that
/// happens here may roll it back or turn into a workflow error.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, event: CustomerStatusEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryDispatcher {
    events: Arc<Mutex<Vec<CustomerStatusEvent>>>,
}

impl InMemoryDispatcher {
    pub fn events(&self) -> Vec<CustomerStatusEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationDispatcher for InMemoryDispatcher {
    fn notify(&self, event: CustomerStatusEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::customer::{Customer, CustomerId, CustomerStatus};
    use crate::domain::user::{User, UserId, UserRole};
    use crate::notifications::{
        CustomerAction, CustomerStatusEvent, InMemoryDispatcher, NotificationDispatcher,
    };

    fn approved_customer() -> Customer {
        Customer {
            id: CustomerId(42),
            customer_code: None,
            name: "Globex Industries".to_string(),
            name_kana: None,
            address: None,
            phone: None,
            note: None,
            status: CustomerStatus::Approved,
            requested_by_user_id: Some(UserId(7)),
            approved_by_user_id: Some(UserId(1)),
            approved_at: Some(Utc::now()),
            rejected_at: None,
            approval_comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn admin() -> User {
        User {
            id: UserId(1),
            login_id: "admin".to_string(),
            display_name: "Administrator".to_string(),
            role: UserRole::Admin,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn in_memory_dispatcher_records_the_event_payload() {
        let dispatcher = InMemoryDispatcher::default();
        dispatcher.notify(CustomerStatusEvent::new(
            &approved_customer(),
            CustomerAction::Approve,
            &admin(),
            None,
        ));

        let events = dispatcher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].customer_id, CustomerId(42));
        assert_eq!(events[0].action, CustomerAction::Approve);
        assert_eq!(events[0].actor_login, "admin");
        assert_eq!(events[0].requested_by_user_id, Some(UserId(7)));
        assert_eq!(events[0].comment_len, 0);
    }

    #[test]
    fn comment_length_tracks_the_verbatim_comment() {
        let event = CustomerStatusEvent::new(
            &approved_customer(),
            CustomerAction::Reject,
            &admin(),
            Some("insufficient credit data"),
        );

        assert_eq!(event.comment.as_deref(), Some("insufficient credit data"));
        assert_eq!(event.comment_len, "insufficient credit data".len());
    }
}
