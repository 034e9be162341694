//! Stripe adapter. Implements BillingPort over the v1 REST API.
//!
//! Two credential scopes: the platform key for the platform account, and a
//! connect key plus a `Stripe-Account` header for connected sub-accounts.

use super::http::{from_unix_secs, join_url, null_as_default, path_id, send_json};
use crate::domain::{
    BillingScope, Charge, Customer, CustomerUpdate, IntegrationError, Invoice, NewCustomer,
    SourceKind, SourceRef, SourceSystem, Subscription,
};
use crate::ports::BillingPort;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

const PROVIDER: SourceSystem = SourceSystem::Stripe;
const PLATFORM_KEY: &str = "STRIPE_SECRET_KEY";
const CONNECT_KEY: &str = "STRIPE_CONNECT_SECRET_KEY";
const ACCOUNT_HEADER: &str = "Stripe-Account";

/// Stripe billing client.
pub struct StripeAdapter {
    client: Client,
    base_url: String,
    platform_key: Option<String>,
    connect_key: Option<String>,
}

impl StripeAdapter {
    pub fn new(
        client: Client,
        base_url: String,
        platform_key: Option<String>,
        connect_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url,
            platform_key: platform_key.filter(|k| !k.trim().is_empty()),
            connect_key: connect_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Build an authenticated request for `scope`. Fails if that scope's key is absent.
    fn request(
        &self,
        scope: &BillingScope,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, IntegrationError> {
        let (key, key_name) = match scope {
            BillingScope::Platform => (self.platform_key.as_deref(), PLATFORM_KEY),
            BillingScope::Connected(_) => (self.connect_key.as_deref(), CONNECT_KEY),
        };
        let key = key.ok_or(IntegrationError::MissingConfig {
            provider: PROVIDER,
            key: key_name,
        })?;
        let mut req = self
            .client
            .request(method, join_url(&self.base_url, path))
            .bearer_auth(key);
        if let Some(account) = scope.account_id() {
            req = req.header(ACCOUNT_HEADER, account);
        }
        Ok(req)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        scope: &BillingScope,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, IntegrationError> {
        let req = self.request(scope, Method::GET, path)?.query(query);
        let page: StripeList<T> = send_json(PROVIDER, req, stripe_error).await?;
        debug!(path, count = page.data.len(), has_more = page.has_more, "stripe list");
        Ok(page.data)
    }
}

fn clamp(limit: u32) -> String {
    limit.clamp(1, 100).to_string()
}

/// Error envelope: `{error: {message, code, type}}`. `code` falls back to `type`.
fn stripe_error(v: &Value) -> Option<(String, Option<String>)> {
    let err = v.get("error")?;
    let message = err.get("message")?.as_str()?.to_string();
    let code = err
        .get("code")
        .and_then(Value::as_str)
        .or_else(|| err.get("type").and_then(Value::as_str))
        .map(str::to_string);
    Some((message, code))
}

/// Quote a term for the search query language (`'` and `\` are backslash-escaped).
fn search_literal(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('\'');
    for c in term.chars() {
        if matches!(c, '\'' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Flatten customer fields into form pairs (`metadata[key]=value`).
fn customer_form(
    email: &Option<String>,
    name: &Option<String>,
    phone: &Option<String>,
    description: &Option<String>,
    metadata: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    let mut form = Vec::new();
    for (k, v) in [
        ("email", email),
        ("name", name),
        ("phone", phone),
        ("description", description),
    ] {
        if let Some(v) = v {
            form.push((k.to_string(), v.clone()));
        }
    }
    for (k, v) in metadata {
        form.push((format!("metadata[{}]", k), v.clone()));
    }
    form
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct StripeList<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    email: Option<String>,
    name: Option<String>,
    phone: Option<String>,
    currency: Option<String>,
    balance: Option<i64>,
    delinquent: Option<bool>,
    created: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    metadata: BTreeMap<String, String>,
}

impl From<StripeCustomer> for Customer {
    fn from(c: StripeCustomer) -> Self {
        Self {
            source: SourceRef::new(PROVIDER, SourceKind::Customer, c.id),
            email: c.email,
            name: c.name,
            phone: c.phone,
            currency: c.currency,
            balance: c.balance,
            delinquent: c.delinquent,
            created_at: from_unix_secs(c.created),
            metadata: c.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    customer: Option<Value>,
    status: Option<String>,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    cancel_at_period_end: Option<bool>,
    canceled_at: Option<i64>,
    currency: Option<String>,
    items: Option<StripeList<StripeSubscriptionItem>>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscriptionItem {
    quantity: Option<i64>,
    price: Option<StripePrice>,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    unit_amount: Option<i64>,
    nickname: Option<String>,
    product: Option<Value>,
}

/// Expandable reference: either the id string or the expanded object.
fn expandable_id(v: Option<Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

impl From<StripeSubscription> for Subscription {
    fn from(s: StripeSubscription) -> Self {
        let items = s.items.map(|l| l.data).unwrap_or_default();
        let amount = if items.is_empty() {
            None
        } else {
            items
                .iter()
                .map(|i| {
                    let unit = i.price.as_ref().and_then(|p| p.unit_amount)?;
                    Some(unit * i.quantity.unwrap_or(1))
                })
                .sum::<Option<i64>>()
        };
        let plan_names = items
            .iter()
            .filter_map(|i| {
                let p = i.price.as_ref()?;
                p.nickname.clone().or_else(|| expandable_id(p.product.clone()))
            })
            .collect();
        // Newer API versions report the period on items only.
        let period_start = s
            .current_period_start
            .or_else(|| items.iter().find_map(|i| i.current_period_start));
        let period_end = s
            .current_period_end
            .or_else(|| items.iter().find_map(|i| i.current_period_end));
        Self {
            source: SourceRef::new(PROVIDER, SourceKind::Subscription, s.id),
            customer_id: expandable_id(s.customer),
            status: s.status,
            current_period_start: from_unix_secs(period_start),
            current_period_end: from_unix_secs(period_end),
            cancel_at_period_end: s.cancel_at_period_end,
            canceled_at: from_unix_secs(s.canceled_at),
            amount,
            currency: s.currency,
            plan_names,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeInvoice {
    id: String,
    customer: Option<Value>,
    number: Option<String>,
    status: Option<String>,
    amount_due: Option<i64>,
    amount_paid: Option<i64>,
    currency: Option<String>,
    due_date: Option<i64>,
    hosted_invoice_url: Option<String>,
    created: Option<i64>,
}

impl From<StripeInvoice> for Invoice {
    fn from(i: StripeInvoice) -> Self {
        Self {
            source: SourceRef::new(PROVIDER, SourceKind::Invoice, i.id),
            customer_id: expandable_id(i.customer),
            number: i.number,
            status: i.status,
            amount_due: i.amount_due,
            amount_paid: i.amount_paid,
            currency: i.currency,
            due_date: from_unix_secs(i.due_date),
            hosted_invoice_url: i.hosted_invoice_url,
            created_at: from_unix_secs(i.created),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeCharge {
    id: String,
    customer: Option<Value>,
    amount: Option<i64>,
    amount_refunded: Option<i64>,
    currency: Option<String>,
    status: Option<String>,
    paid: Option<bool>,
    disputed: Option<bool>,
    failure_message: Option<String>,
    description: Option<String>,
    created: Option<i64>,
}

impl From<StripeCharge> for Charge {
    fn from(c: StripeCharge) -> Self {
        Self {
            source: SourceRef::new(PROVIDER, SourceKind::Charge, c.id),
            customer_id: expandable_id(c.customer),
            amount: c.amount,
            amount_refunded: c.amount_refunded,
            currency: c.currency,
            status: c.status,
            paid: c.paid,
            disputed: c.disputed,
            failure_message: c.failure_message,
            description: c.description,
            created_at: from_unix_secs(c.created),
        }
    }
}

#[async_trait::async_trait]
impl BillingPort for StripeAdapter {
    async fn get_customer(
        &self,
        scope: &BillingScope,
        id: &str,
    ) -> Result<Customer, IntegrationError> {
        let path = format!("/v1/customers/{}", path_id(PROVIDER, id)?);
        let req = self.request(scope, Method::GET, &path)?;
        let c: StripeCustomer = send_json(PROVIDER, req, stripe_error).await?;
        Ok(c.into())
    }

    async fn search_customers(
        &self,
        scope: &BillingScope,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Customer>, IntegrationError> {
        let lit = search_literal(term);
        let query = format!("email:{} OR name~{}", lit, lit);
        let found: Vec<StripeCustomer> = self
            .list(
                scope,
                "/v1/customers/search",
                &[("query", query), ("limit", clamp(limit))],
            )
            .await?;
        Ok(found.into_iter().map(Customer::from).collect())
    }

    async fn list_subscriptions(
        &self,
        scope: &BillingScope,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<Subscription>, IntegrationError> {
        let subs: Vec<StripeSubscription> = self
            .list(
                scope,
                "/v1/subscriptions",
                &[
                    ("customer", customer_id.to_string()),
                    ("status", "all".to_string()),
                    ("limit", clamp(limit)),
                ],
            )
            .await?;
        Ok(subs.into_iter().map(Subscription::from).collect())
    }

    async fn list_invoices(
        &self,
        scope: &BillingScope,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<Invoice>, IntegrationError> {
        let invoices: Vec<StripeInvoice> = self
            .list(
                scope,
                "/v1/invoices",
                &[
                    ("customer", customer_id.to_string()),
                    ("limit", clamp(limit)),
                ],
            )
            .await?;
        Ok(invoices.into_iter().map(Invoice::from).collect())
    }

    async fn list_charges(
        &self,
        scope: &BillingScope,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<Charge>, IntegrationError> {
        let charges: Vec<StripeCharge> = self
            .list(
                scope,
                "/v1/charges",
                &[
                    ("customer", customer_id.to_string()),
                    ("limit", clamp(limit)),
                ],
            )
            .await?;
        Ok(charges.into_iter().map(Charge::from).collect())
    }

    async fn create_customer(
        &self,
        scope: &BillingScope,
        customer: &NewCustomer,
    ) -> Result<Customer, IntegrationError> {
        let form = customer_form(
            &customer.email,
            &customer.name,
            &customer.phone,
            &customer.description,
            &customer.metadata,
        );
        let req = self
            .request(scope, Method::POST, "/v1/customers")?
            .form(&form);
        let c: StripeCustomer = send_json(PROVIDER, req, stripe_error).await?;
        info!(customer_id = %c.id, account = ?scope.account_id(), "created customer");
        Ok(c.into())
    }

    async fn update_customer(
        &self,
        scope: &BillingScope,
        id: &str,
        update: &CustomerUpdate,
    ) -> Result<Customer, IntegrationError> {
        let form = customer_form(
            &update.email,
            &update.name,
            &update.phone,
            &update.description,
            &update.metadata,
        );
        if form.is_empty() {
            return Err(IntegrationError::InvalidInput {
                provider: PROVIDER,
                message: "customer update has no fields".to_string(),
            });
        }
        let req = self
            .request(
                scope,
                Method::POST,
                &format!("/v1/customers/{}", path_id(PROVIDER, id)?),
            )?
            .form(&form);
        let c: StripeCustomer = send_json(PROVIDER, req, stripe_error).await?;
        Ok(c.into())
    }
}
