//! Outbound ports. Application calls into provider systems.
//!
//! Implemented by adapters. Every operation checks its own configuration first
//! and fails with `IntegrationError::MissingConfig` before touching the network.

use crate::domain::{
    BillingScope, Charge, Company, Contact, Customer, CustomerUpdate, Deal, DealFilter,
    DealUpdate, Engagement, IdempotencyKey, IntegrationError, Invoice, NativeQuery, NewCustomer,
    NewDeal, NewNote, QueryResult, Subscription, WebhookAck, WorkflowAction,
};

/// CRM: companies, contacts, deals, note engagements.
#[async_trait::async_trait]
pub trait CrmPort: Send + Sync {
    async fn get_company(&self, id: &str) -> Result<Company, IntegrationError>;

    /// Free-text search over company name and domain.
    async fn search_companies(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Company>, IntegrationError>;

    /// Contacts associated with a company.
    async fn company_contacts(
        &self,
        company_id: &str,
        limit: u32,
    ) -> Result<Vec<Contact>, IntegrationError>;

    async fn get_contact(&self, id: &str) -> Result<Contact, IntegrationError>;

    async fn search_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, IntegrationError>;

    async fn create_deal(&self, deal: &NewDeal) -> Result<Deal, IntegrationError>;

    async fn update_deal(&self, id: &str, update: &DealUpdate) -> Result<Deal, IntegrationError>;

    /// Log a note engagement against a company.
    async fn create_note(&self, note: &NewNote) -> Result<Engagement, IntegrationError>;
}

/// Billing: customers, subscriptions, invoices, charges.
///
/// Every call names its credential scope (platform or a connected sub-account).
#[async_trait::async_trait]
pub trait BillingPort: Send + Sync {
    async fn get_customer(
        &self,
        scope: &BillingScope,
        id: &str,
    ) -> Result<Customer, IntegrationError>;

    /// Search by email or name.
    async fn search_customers(
        &self,
        scope: &BillingScope,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Customer>, IntegrationError>;

    async fn list_subscriptions(
        &self,
        scope: &BillingScope,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<Subscription>, IntegrationError>;

    async fn list_invoices(
        &self,
        scope: &BillingScope,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<Invoice>, IntegrationError>;

    async fn list_charges(
        &self,
        scope: &BillingScope,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<Charge>, IntegrationError>;

    async fn create_customer(
        &self,
        scope: &BillingScope,
        customer: &NewCustomer,
    ) -> Result<Customer, IntegrationError>;

    async fn update_customer(
        &self,
        scope: &BillingScope,
        id: &str,
        update: &CustomerUpdate,
    ) -> Result<Customer, IntegrationError>;
}

/// Analytics warehouse. Runs native SQL with values bound through template tags.
#[async_trait::async_trait]
pub trait WarehousePort: Send + Sync {
    async fn run(&self, query: &NativeQuery) -> Result<QueryResult, IntegrationError>;
}

/// Workflow-automation webhook proxy.
///
/// A successful return is an acknowledgement only. Downstream state is not confirmed.
#[async_trait::async_trait]
pub trait WorkflowPort: Send + Sync {
    /// Dispatch with a freshly generated idempotency key.
    async fn dispatch(&self, action: &WorkflowAction) -> Result<WebhookAck, IntegrationError> {
        self.dispatch_with_key(action, IdempotencyKey::generate())
            .await
    }

    /// Dispatch reusing `key`. Callers retrying a failed write pass the original key.
    async fn dispatch_with_key(
        &self,
        action: &WorkflowAction,
        key: IdempotencyKey,
    ) -> Result<WebhookAck, IntegrationError>;
}
