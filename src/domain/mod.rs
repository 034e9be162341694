//! Core domain layer. No external I/O dependencies.
//!
//! Normalized records from every provider. Each carries a `SourceRef` back to its
//! system of record; optional upstream fields stay `Option`.

pub mod billing;
pub mod crm;
pub mod docs;
pub mod errors;
pub mod events;
pub mod portfolio;
pub mod source;
pub mod warehouse;
pub mod workflow;

pub use billing::{
    BillingScope, Charge, Customer, CustomerUpdate, Invoice, NewCustomer, Subscription,
};
pub use crm::{Company, Contact, Deal, DealFilter, DealUpdate, Engagement, NewDeal, NewNote};
pub use docs::{
    Comment, DatabaseQuery, DatabaseQueryParams, NewPage, NewTask, Page, PageUpdate,
    PropertyInput, PropertyValue, Task,
};
pub use errors::IntegrationError;
pub use events::PortfolioEvent;
pub use portfolio::{
    AccountHealth, AccountSearch, ExpansionOpportunities, ExpansionSummary, HealthStatus,
    PortfolioStats, win_rate,
};
pub use source::{SourceKind, SourceRef, SourceSystem};
pub use warehouse::{
    Column, NativeQuery, QueryParam, QueryResult, Row, escape_like, quote_literal,
};
pub use workflow::{IdempotencyKey, WebhookAck, WorkflowAction, WriteStatus};
