//! In-memory port implementations shared by the integration tests.
#![allow(dead_code)]

use portfolio_gateway::adapters::integrations::{N8nAdapter, StripeAdapter};
use portfolio_gateway::domain::{
    Column, Company, Contact, DatabaseQuery, DatabaseQueryParams, Deal, DealFilter, DealUpdate,
    Engagement, IntegrationError, NativeQuery, NewDeal, NewNote, NewPage, Page, PageUpdate,
    PropertyInput, PropertyValue, QueryParam, QueryResult, SourceKind, SourceRef, SourceSystem,
    Comment,
};
use portfolio_gateway::ports::{CrmPort, DocsPort, WarehousePort};
use portfolio_gateway::shared::config::AppConfig;
use portfolio_gateway::usecases::Integrations;
use reqwest::Client;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

fn unsupported(provider: SourceSystem) -> IntegrationError {
    IntegrationError::InvalidInput {
        provider,
        message: "not supported by test double".to_string(),
    }
}

pub fn deal(id: &str, stage: &str, amount: Option<f64>) -> Deal {
    Deal {
        source: SourceRef::new(SourceSystem::Hubspot, SourceKind::Deal, id),
        name: Some(format!("Expansion {}", id)),
        stage: Some(stage.to_string()),
        pipeline: Some("expansion".to_string()),
        amount,
        close_date: None,
        owner_id: None,
        deal_type: None,
        updated_at: None,
    }
}

/// CRM with a fixed deal list. Company search fails when `fail_search` is set.
#[derive(Default)]
pub struct FakeCrm {
    pub deals: Vec<Deal>,
    pub fail_search: bool,
    pub last_filter: Mutex<Option<DealFilter>>,
}

#[async_trait::async_trait]
impl CrmPort for FakeCrm {
    async fn get_company(&self, _id: &str) -> Result<Company, IntegrationError> {
        Err(unsupported(SourceSystem::Hubspot))
    }

    async fn search_companies(
        &self,
        term: &str,
        _limit: u32,
    ) -> Result<Vec<Company>, IntegrationError> {
        if self.fail_search {
            return Err(IntegrationError::Upstream {
                provider: SourceSystem::Hubspot,
                status: 500,
                message: "boom".to_string(),
                code: None,
            });
        }
        Ok(vec![Company {
            source: SourceRef::new(SourceSystem::Hubspot, SourceKind::Company, "c1"),
            name: Some(format!("{} Limo", term)),
            domain: None,
            industry: None,
            lifecycle_stage: None,
            owner_id: None,
            annual_revenue: None,
            num_employees: None,
            created_at: None,
            updated_at: None,
        }])
    }

    async fn company_contacts(
        &self,
        _company_id: &str,
        _limit: u32,
    ) -> Result<Vec<Contact>, IntegrationError> {
        Ok(Vec::new())
    }

    async fn get_contact(&self, _id: &str) -> Result<Contact, IntegrationError> {
        Err(unsupported(SourceSystem::Hubspot))
    }

    async fn search_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, IntegrationError> {
        *self.last_filter.lock().unwrap() = Some(filter.clone());
        Ok(self.deals.clone())
    }

    async fn create_deal(&self, _deal: &NewDeal) -> Result<Deal, IntegrationError> {
        Err(unsupported(SourceSystem::Hubspot))
    }

    async fn update_deal(&self, _id: &str, _u: &DealUpdate) -> Result<Deal, IntegrationError> {
        Err(unsupported(SourceSystem::Hubspot))
    }

    async fn create_note(&self, _note: &NewNote) -> Result<Engagement, IntegrationError> {
        Err(unsupported(SourceSystem::Hubspot))
    }
}

/// Docs workspace that keeps created pages in memory.
#[derive(Default)]
pub struct FakeDocs {
    pub pages: Mutex<Vec<Page>>,
}

fn page_from(new: &NewPage, id: usize) -> Page {
    let properties: BTreeMap<String, PropertyValue> = new
        .properties
        .iter()
        .map(|(k, v)| {
            let value = match v {
                PropertyInput::Title(t) => PropertyValue::Title(t.clone()),
                PropertyInput::RichText(t) => PropertyValue::RichText(t.clone()),
                PropertyInput::Select(s) => PropertyValue::Select(Some(s.clone())),
                PropertyInput::Status(s) => PropertyValue::Status(Some(s.clone())),
                PropertyInput::Date { start, end } => PropertyValue::Date {
                    start: Some(start.clone()),
                    end: end.clone(),
                },
                _ => PropertyValue::Unsupported("other".to_string()),
            };
            (k.clone(), value)
        })
        .collect();
    let title = properties.values().find_map(|v| match v {
        PropertyValue::Title(t) => Some(t.clone()),
        _ => None,
    });
    Page {
        source: SourceRef::new(SourceSystem::Notion, SourceKind::Page, format!("page-{}", id)),
        title,
        parent_database_id: Some(new.database_id.clone()),
        properties,
        archived: false,
        created_at: None,
        last_edited_at: None,
    }
}

#[async_trait::async_trait]
impl DocsPort for FakeDocs {
    async fn get_page(&self, id: &str) -> Result<Page, IntegrationError> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.source.id == id)
            .cloned()
            .ok_or(IntegrationError::Upstream {
                provider: SourceSystem::Notion,
                status: 404,
                message: "not found".to_string(),
                code: Some("object_not_found".to_string()),
            })
    }

    async fn query_database(
        &self,
        database_id: &str,
        _params: &DatabaseQueryParams,
    ) -> Result<DatabaseQuery, IntegrationError> {
        let pages = self
            .pages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.parent_database_id.as_deref() == Some(database_id))
            .cloned()
            .collect();
        Ok(DatabaseQuery {
            pages,
            next_cursor: None,
            has_more: false,
        })
    }

    async fn get_page_property(
        &self,
        _page_id: &str,
        _property_id: &str,
    ) -> Result<PropertyValue, IntegrationError> {
        Err(unsupported(SourceSystem::Notion))
    }

    async fn list_comments(&self, _block_id: &str) -> Result<Vec<Comment>, IntegrationError> {
        Ok(Vec::new())
    }

    async fn create_comment(&self, _page_id: &str, _text: &str) -> Result<Comment, IntegrationError> {
        Err(unsupported(SourceSystem::Notion))
    }

    async fn create_page(&self, page: &NewPage) -> Result<Page, IntegrationError> {
        let mut pages = self.pages.lock().unwrap();
        let created = page_from(page, pages.len() + 1);
        pages.push(created.clone());
        Ok(created)
    }

    async fn update_page(&self, id: &str, _u: &PageUpdate) -> Result<Page, IntegrationError> {
        self.get_page(id).await
    }

    async fn find_page_by_title(
        &self,
        _database_id: &str,
        title: &str,
    ) -> Result<Option<Page>, IntegrationError> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.title.as_deref() == Some(title))
            .cloned())
    }
}

fn columns(names: &[&str]) -> Vec<Column> {
    names
        .iter()
        .map(|n| Column {
            name: n.to_string(),
            display_name: None,
            base_type: None,
        })
        .collect()
}

/// Warehouse answering stats, health and report queries from mutable state.
#[derive(Default)]
pub struct FakeWarehouse {
    /// `(operator id, name, score)` rows for health queries.
    pub health: Mutex<Vec<(String, String, Option<f64>)>>,
    pub fail: Mutex<bool>,
    pub queries: Mutex<Vec<NativeQuery>>,
}

impl FakeWarehouse {
    pub fn set_health(&self, rows: &[(&str, &str, Option<f64>)]) {
        *self.health.lock().unwrap() = rows
            .iter()
            .map(|(id, name, score)| (id.to_string(), name.to_string(), *score))
            .collect();
    }
}

#[async_trait::async_trait]
impl WarehousePort for FakeWarehouse {
    async fn run(&self, query: &NativeQuery) -> Result<QueryResult, IntegrationError> {
        self.queries.lock().unwrap().push(query.clone());
        if *self.fail.lock().unwrap() {
            return Err(IntegrationError::Request {
                provider: SourceSystem::Metabase,
                message: "connection refused".to_string(),
            });
        }
        if query.sql.contains("AS total_accounts") {
            let health = self.health.lock().unwrap();
            return Ok(QueryResult::from_columns_and_rows(
                Some(1),
                columns(&["total_accounts", "healthy", "at_risk", "critical", "mrr"]),
                vec![vec![
                    json!(health.len()),
                    json!(0),
                    json!(0),
                    json!(0),
                    json!(1250.5),
                ]],
            ));
        }
        if query.sql.contains("health_score") {
            let mut health = self.health.lock().unwrap().clone();
            // LIMIT queries return the lowest scores, nulls last
            if let Some(QueryParam::Integer(limit)) = query.params.get("limit") {
                health.sort_by(|a, b| match (a.2, b.2) {
                    (Some(x), Some(y)) => x.total_cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                });
                health.truncate(*limit as usize);
            }
            let rows = health
                .iter()
                .map(|(id, name, score)| vec![json!(id), json!(name), json!(score)])
                .collect();
            return Ok(QueryResult::from_columns_and_rows(
                Some(1),
                columns(&["id", "name", "health_score"]),
                rows,
            ));
        }
        Ok(QueryResult::from_columns_and_rows(
            Some(1),
            columns(&["month", "bookings", "gross_volume"]),
            vec![vec![json!("2026-01-01"), json!(12), json!(4800)]],
        ))
    }
}

/// Facade over the given doubles. Billing and workflow use real adapters with no
/// credentials, so any call to them fails with `MissingConfig`.
pub fn integrations(
    cfg: &AppConfig,
    crm: Arc<FakeCrm>,
    docs: Arc<FakeDocs>,
    warehouse: Arc<FakeWarehouse>,
) -> Integrations {
    Integrations::new(
        cfg,
        crm,
        Arc::new(StripeAdapter::new(
            Client::new(),
            "http://127.0.0.1:9".to_string(),
            None,
            None,
        )),
        docs,
        warehouse,
        Arc::new(N8nAdapter::new(Client::new(), None, None)),
    )
}
