//! JSON and CSV endpoints over the portfolio service.

use super::AppState;
use crate::domain::{
    AccountSearch, BillingScope, Company, Contact, Customer, IntegrationError, Invoice, NewTask,
    Subscription, WorkflowAction,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

const DEFAULT_EXPANSION_LIMIT: u32 = 50;
const DEFAULT_LIST_LIMIT: u32 = 20;

/// `IntegrationError` as an HTTP response.
pub struct ApiError(pub IntegrationError);

impl From<IntegrationError> for ApiError {
    fn from(e: IntegrationError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IntegrationError::MissingConfig { .. } => StatusCode::SERVICE_UNAVAILABLE,
            IntegrationError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            IntegrationError::Upstream { status: 404, .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_GATEWAY,
        };
        warn!(status = status.as_u16(), error = %self.0, "request failed");
        let body = json!({
            "error": self.0.to_string(),
            "provider": self.0.provider(),
            "code": self.0.upstream_code(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn integration_status(State(state): State<AppState>) -> impl IntoResponse {
    let integrations = state.service.integrations();
    Json(json!({
        "configured": integrations.configured(),
        "missing": integrations.missing_config(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

pub async fn search_accounts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<AccountSearch> {
    let term = query.q.trim();
    if term.is_empty() {
        return Json(AccountSearch::default());
    }
    Json(state.service.search_accounts(term).await)
}

pub async fn search_operators(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .service
        .search_operators(&query.q, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

pub async fn expansion(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_EXPANSION_LIMIT);
    Ok(Json(state.service.expansion_opportunities(limit).await?))
}

pub async fn health_scores(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_EXPANSION_LIMIT);
    Json(state.service.propensity_scores(limit).await)
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(task): Json<NewTask>,
) -> ApiResult<impl IntoResponse> {
    let task = state.service.create_task(task).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn roi_report(
    State(state): State<AppState>,
    Path(operator_id): Path<String>,
) -> ApiResult<Response> {
    let result = state.service.roi_report(&operator_id).await?;
    let mut csv = Vec::new();
    result
        .write_csv(&mut csv)
        .map_err(|e| IntegrationError::Parse {
            provider: crate::domain::SourceSystem::Metabase,
            message: format!("csv export: {}", e),
        })?;
    let disposition = format!(
        "attachment; filename=\"roi-{}.csv\"",
        operator_id.replace(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '_', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct CompanyView {
    pub company: Company,
    pub contacts: Vec<Contact>,
}

pub async fn company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CompanyView>> {
    let crm = state.service.integrations().crm();
    let (company, contacts) =
        tokio::try_join!(crm.get_company(&id), crm.company_contacts(&id, DEFAULT_LIST_LIMIT))?;
    Ok(Json(CompanyView { company, contacts }))
}

#[derive(Debug, Deserialize)]
pub struct BillingQuery {
    /// Connected account id; absent means the platform account.
    pub account: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BillingView {
    pub customer: Customer,
    pub subscriptions: Vec<Subscription>,
    pub invoices: Vec<Invoice>,
}

pub async fn customer_billing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<BillingQuery>,
) -> ApiResult<Json<BillingView>> {
    let scope = match query.account.filter(|a| !a.trim().is_empty()) {
        Some(account) => BillingScope::Connected(account),
        None => BillingScope::Platform,
    };
    let billing = state.service.integrations().billing();
    let (customer, subscriptions, invoices) = tokio::try_join!(
        billing.get_customer(&scope, &id),
        billing.list_subscriptions(&scope, &id, DEFAULT_LIST_LIMIT),
        billing.list_invoices(&scope, &id, DEFAULT_LIST_LIMIT),
    )?;
    Ok(Json(BillingView {
        customer,
        subscriptions,
        invoices,
    }))
}

/// Forward a write to the workflow webhooks. 202: accepted, not confirmed.
pub async fn dispatch_workflow(
    State(state): State<AppState>,
    Json(action): Json<WorkflowAction>,
) -> ApiResult<impl IntoResponse> {
    let ack = state
        .service
        .integrations()
        .workflow()
        .dispatch(&action)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}
