//! Metabase adapter. Implements WarehousePort through `POST /api/dataset`.
//!
//! Queries always travel as native queries with template tags: the SQL text holds
//! `{{name}}` placeholders and the values ride separately in `parameters`.

pub mod queries;

use super::http::{join_url, null_as_default, send_json};
use crate::domain::{
    Column, IntegrationError, NativeQuery, QueryParam, QueryResult, SourceSystem,
};
use crate::ports::WarehousePort;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

const PROVIDER: SourceSystem = SourceSystem::Metabase;

pub struct MetabaseAdapter {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    default_database: Option<i64>,
}

impl MetabaseAdapter {
    pub fn new(
        client: Client,
        base_url: Option<String>,
        api_key: Option<String>,
        default_database: Option<i64>,
    ) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            client,
            base_url: present(base_url),
            api_key: present(api_key),
            default_database,
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, IntegrationError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(IntegrationError::MissingConfig {
                provider: PROVIDER,
                key: "METABASE_URL",
            })?;
        let key = self
            .api_key
            .as_deref()
            .ok_or(IntegrationError::MissingConfig {
                provider: PROVIDER,
                key: "METABASE_API_KEY",
            })?;
        Ok(self
            .client
            .request(method, join_url(base, path))
            .header("x-api-key", key))
    }
}

/// Error bodies are `{message}` or a bare string; both surface as the message.
fn metabase_error(v: &Value) -> Option<(String, Option<String>)> {
    if let Some(s) = v.as_str() {
        return Some((s.to_string(), None));
    }
    let message = v
        .get("message")
        .or_else(|| v.get("error"))
        .and_then(Value::as_str)?
        .to_string();
    Some((message, None))
}

fn tag_type(param: &QueryParam) -> (&'static str, &'static str) {
    match param {
        QueryParam::Text(_) => ("text", "category"),
        QueryParam::Integer(_) | QueryParam::Number(_) => ("number", "number/="),
        QueryParam::Date(_) => ("date", "date/single"),
    }
}

fn param_value(param: &QueryParam) -> Value {
    match param {
        QueryParam::Text(s) | QueryParam::Date(s) => json!(s),
        QueryParam::Integer(n) => json!(n),
        QueryParam::Number(n) => json!(n),
    }
}

/// Request body for a native dataset query.
pub fn dataset_body(query: &NativeQuery, database: i64) -> Value {
    let mut tags = Map::new();
    let mut parameters = Vec::new();
    for (name, param) in &query.params {
        let (kind, param_type) = tag_type(param);
        tags.insert(
            name.clone(),
            json!({
                "id": name,
                "name": name,
                "display-name": name,
                "type": kind,
            }),
        );
        parameters.push(json!({
            "type": param_type,
            "target": ["variable", ["template-tag", name]],
            "value": param_value(param),
        }));
    }
    json!({
        "database": database,
        "type": "native",
        "native": { "query": query.sql, "template-tags": tags },
        "parameters": parameters,
    })
}

#[derive(Debug, Deserialize)]
struct DatasetResponse {
    status: Option<String>,
    error: Option<Value>,
    data: Option<DatasetData>,
}

#[derive(Debug, Deserialize)]
struct DatasetData {
    #[serde(default, deserialize_with = "null_as_default")]
    cols: Vec<DatasetColumn>,
    #[serde(default, deserialize_with = "null_as_default")]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct DatasetColumn {
    name: String,
    display_name: Option<String>,
    base_type: Option<String>,
}

#[async_trait::async_trait]
impl WarehousePort for MetabaseAdapter {
    async fn run(&self, query: &NativeQuery) -> Result<QueryResult, IntegrationError> {
        let req = self.request(Method::POST, "/api/dataset")?;
        let database =
            query
                .database
                .or(self.default_database)
                .ok_or(IntegrationError::MissingConfig {
                    provider: PROVIDER,
                    key: "METABASE_DATABASE_ID",
                })?;

        let unbound = query.unbound();
        if !unbound.is_empty() {
            return Err(IntegrationError::InvalidInput {
                provider: PROVIDER,
                message: format!("unbound template tags: {}", unbound.join(", ")),
            });
        }

        debug!(database, sql = %query.inline_sql(), "running native query");
        let req = req.json(&dataset_body(query, database));
        let res: DatasetResponse = send_json(PROVIDER, req, metabase_error).await?;

        let failed = res.status.as_deref() == Some("failed");
        if failed || res.error.as_ref().is_some_and(|e| !e.is_null()) {
            let message = match res.error {
                Some(Value::String(s)) => s,
                Some(other) if !other.is_null() => other.to_string(),
                _ => "query failed".to_string(),
            };
            return Err(IntegrationError::Upstream {
                provider: PROVIDER,
                status: 202,
                message,
                code: res.status,
            });
        }

        let data = res.data.ok_or(IntegrationError::Parse {
            provider: PROVIDER,
            message: "response has no data".to_string(),
        })?;
        let columns = data
            .cols
            .into_iter()
            .map(|c| Column {
                name: c.name,
                display_name: c.display_name,
                base_type: c.base_type,
            })
            .collect();
        Ok(QueryResult::from_columns_and_rows(
            Some(database),
            columns,
            data.rows,
        ))
    }
}
