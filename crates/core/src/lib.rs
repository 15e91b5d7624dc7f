pub mod config;
pub mod domain;
pub mod errors;
pub mod notifications;

pub use domain::approval::{ApprovalLogEntry, TransitionOutcome};
pub use domain::customer::{Customer, CustomerId, CustomerStatus, NewCustomer};
pub use domain::quotation::{NewQuotation, Quotation, QuotationId};
pub use domain::user::{NewUser, User, UserId, UserRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notifications::{
    CustomerAction, CustomerStatusEvent, InMemoryDispatcher, NotificationDispatcher,
};
