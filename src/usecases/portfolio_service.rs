//! Portfolio views assembled from several providers.
//!
//! Read paths that feed dashboards degrade to empty results on provider failure
//! (logged at warn). Writes and single-record reads propagate the error.

use crate::adapters::integrations::metabase::queries;
use crate::domain::{
    AccountHealth, AccountSearch, DatabaseQueryParams, DealFilter, ExpansionOpportunities,
    IntegrationError, NewTask, PortfolioEvent, QueryResult, SourceSystem, Task,
};
use crate::usecases::event_hub::EventHub;
use crate::usecases::facade::Integrations;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

const SEARCH_LIMIT: u32 = 10;

pub struct PortfolioService {
    integrations: Integrations,
    hub: EventHub,
    tasks_database_id: Option<String>,
    expansion_pipeline: String,
}

impl PortfolioService {
    pub fn new(
        integrations: Integrations,
        hub: EventHub,
        tasks_database_id: Option<String>,
        expansion_pipeline: String,
    ) -> Self {
        Self {
            integrations,
            hub,
            tasks_database_id: tasks_database_id.filter(|s| !s.trim().is_empty()),
            expansion_pipeline,
        }
    }

    pub fn integrations(&self) -> &Integrations {
        &self.integrations
    }

    fn tasks_database(&self) -> Result<&str, IntegrationError> {
        self.tasks_database_id
            .as_deref()
            .ok_or(IntegrationError::MissingConfig {
                provider: SourceSystem::Notion,
                key: "NOTION_TASKS_DATABASE_ID",
            })
    }

    /// Deals in the expansion pipeline with a summary. No deals, no summary.
    pub async fn expansion_opportunities(
        &self,
        limit: u32,
    ) -> Result<ExpansionOpportunities, IntegrationError> {
        let filter = DealFilter {
            pipeline: Some(self.expansion_pipeline.clone()),
            limit,
            ..Default::default()
        };
        let deals = self.integrations.crm().search_deals(&filter).await?;
        Ok(ExpansionOpportunities::from_deals(deals))
    }

    /// Companies and tasks matching `term`, fetched concurrently. A failing side
    /// comes back empty.
    pub async fn search_accounts(&self, term: &str) -> AccountSearch {
        let companies = self
            .integrations
            .crm()
            .search_companies(term, SEARCH_LIMIT);
        let tasks = self.search_tasks(term);
        let (companies, tasks) = tokio::join!(companies, tasks);

        let companies = companies.unwrap_or_else(|e| {
            warn!(error = %e, "company search failed; returning no companies");
            Vec::new()
        });
        let tasks = tasks.unwrap_or_else(|e| {
            warn!(error = %e, "task search failed; returning no tasks");
            Vec::new()
        });
        AccountSearch { companies, tasks }
    }

    async fn search_tasks(&self, term: &str) -> Result<Vec<Task>, IntegrationError> {
        let database = self.tasks_database()?;
        let params = DatabaseQueryParams {
            filter: Some(json!({ "property": "Task Name", "title": { "contains": term } })),
            page_size: Some(SEARCH_LIMIT),
            ..Default::default()
        };
        let result = self
            .integrations
            .docs()
            .query_database(database, &params)
            .await?;
        Ok(result.pages.into_iter().map(Task::from).collect())
    }

    /// Create a task page and announce it on the event stream.
    pub async fn create_task(&self, task: NewTask) -> Result<Task, IntegrationError> {
        let database = self.tasks_database()?;
        let page = self
            .integrations
            .docs()
            .create_page(&task.into_page(database))
            .await?;
        let task = Task::from(page);
        info!(task_id = %task.source.id, "task created");
        self.hub.publish(PortfolioEvent::TaskCreated {
            task: task.clone(),
            at: Utc::now(),
        });
        Ok(task)
    }

    /// Warehouse health scores, riskiest first. Empty on failure.
    pub async fn propensity_scores(&self, limit: u32) -> Vec<AccountHealth> {
        match self
            .integrations
            .warehouse()
            .run(&queries::account_health_scores(limit))
            .await
        {
            Ok(result) => queries::health_from_result(&result),
            Err(e) => {
                warn!(error = %e, "health scores unavailable");
                Vec::new()
            }
        }
    }

    pub async fn search_operators(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<QueryResult, IntegrationError> {
        self.integrations
            .warehouse()
            .run(&queries::search_operators(term, limit))
            .await
    }

    pub async fn roi_report(&self, operator_id: &str) -> Result<QueryResult, IntegrationError> {
        self.integrations
            .warehouse()
            .run(&queries::roi_report(operator_id))
            .await
    }
}
