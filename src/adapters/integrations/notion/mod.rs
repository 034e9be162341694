//! Notion adapter. Implements DocsPort over the public REST API.
//!
//! Pages double as tasks: the tasks database is just a Notion database whose
//! pages carry `Task Name`, `Status`, `Priority`, `Summary` and `Due`.

mod blocks;
mod properties;

pub use blocks::{markdown_to_blocks, parse_inline};

use super::http::{join_url, null_as_default, parse_rfc3339, path_id, send_json};
use crate::domain::{
    Comment, DatabaseQuery, DatabaseQueryParams, IntegrationError, NewPage, Page, PageUpdate,
    PropertyValue, SourceKind, SourceRef, SourceSystem,
};
use crate::ports::DocsPort;
use blocks::MAX_BLOCKS_PER_REQUEST;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

const PROVIDER: SourceSystem = SourceSystem::Notion;
const TOKEN_KEY: &str = "NOTION_API_KEY";
const NOTION_VERSION: &str = "2022-06-28";
/// Upper bound on list-then-delete rounds when clearing a page body.
const MAX_CLEAR_ROUNDS: usize = 50;

pub struct NotionAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NotionAdapter {
    pub fn new(client: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, IntegrationError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(IntegrationError::MissingConfig {
                provider: PROVIDER,
                key: TOKEN_KEY,
            })?;
        Ok(self
            .client
            .request(method, join_url(&self.base_url, path))
            .bearer_auth(key)
            .header("Notion-Version", NOTION_VERSION))
    }

    async fn append_blocks(&self, block_id: &str, blocks: &[Value]) -> Result<(), IntegrationError> {
        for chunk in blocks.chunks(MAX_BLOCKS_PER_REQUEST) {
            let req = self
                .request(
                    Method::PATCH,
                    &format!("/v1/blocks/{}/children", path_id(PROVIDER, block_id)?),
                )?
                .json(&json!({ "children": chunk }));
            let _: Value = send_json(PROVIDER, req, notion_error).await?;
            debug!(block_id, count = chunk.len(), "appended blocks");
        }
        Ok(())
    }

    async fn clear_children(&self, block_id: &str) -> Result<usize, IntegrationError> {
        let mut removed = 0;
        for _ in 0..MAX_CLEAR_ROUNDS {
            let req = self
                .request(
                    Method::GET,
                    &format!("/v1/blocks/{}/children", path_id(PROVIDER, block_id)?),
                )?
                .query(&[("page_size", MAX_BLOCKS_PER_REQUEST.to_string())]);
            let page: NotionList<NotionBlockRef> = send_json(PROVIDER, req, notion_error).await?;
            if page.results.is_empty() {
                return Ok(removed);
            }
            for block in &page.results {
                let req = self.request(
                    Method::DELETE,
                    &format!("/v1/blocks/{}", path_id(PROVIDER, &block.id)?),
                )?;
                let _: Value = send_json(PROVIDER, req, notion_error).await?;
                removed += 1;
            }
            if !page.has_more {
                return Ok(removed);
            }
        }
        warn!(block_id, removed, "gave up clearing page body");
        Ok(removed)
    }
}

/// Error envelope: `{object: "error", status, code, message}`.
fn notion_error(v: &Value) -> Option<(String, Option<String>)> {
    let message = v.get("message")?.as_str()?.to_string();
    let code = v.get("code").and_then(Value::as_str).map(str::to_string);
    Some((message, code))
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct NotionList<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    results: Vec<T>,
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct NotionBlockRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NotionPage {
    id: String,
    url: Option<String>,
    #[serde(default)]
    archived: bool,
    created_time: Option<String>,
    last_edited_time: Option<String>,
    parent: Option<Value>,
    properties: Option<Value>,
}

impl From<NotionPage> for Page {
    fn from(p: NotionPage) -> Self {
        let properties = properties::parse_properties(p.properties.as_ref());
        let title = properties::page_title(&properties);
        let parent_database_id = p
            .parent
            .as_ref()
            .and_then(|v| v.get("database_id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            source: SourceRef::new(PROVIDER, SourceKind::Page, p.id).with_url(p.url),
            title,
            parent_database_id,
            properties,
            archived: p.archived,
            created_at: parse_rfc3339(p.created_time.as_deref()),
            last_edited_at: parse_rfc3339(p.last_edited_time.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotionComment {
    id: String,
    parent: Option<Value>,
    created_by: Option<Value>,
    created_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    rich_text: Vec<Value>,
}

impl From<NotionComment> for Comment {
    fn from(c: NotionComment) -> Self {
        let text = c
            .rich_text
            .iter()
            .filter_map(|r| r.get("plain_text").and_then(Value::as_str))
            .collect();
        let field = |v: &Option<Value>, k: &str| {
            v.as_ref()
                .and_then(|o| o.get(k))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            page_id: field(&c.parent, "page_id"),
            author_id: field(&c.created_by, "id"),
            created_at: parse_rfc3339(c.created_time.as_deref()),
            source: SourceRef::new(PROVIDER, SourceKind::Comment, c.id),
            text,
        }
    }
}

#[async_trait::async_trait]
impl DocsPort for NotionAdapter {
    async fn get_page(&self, id: &str) -> Result<Page, IntegrationError> {
        let req = self.request(Method::GET, &format!("/v1/pages/{}", path_id(PROVIDER, id)?))?;
        let page: NotionPage = send_json(PROVIDER, req, notion_error).await?;
        Ok(page.into())
    }

    async fn query_database(
        &self,
        database_id: &str,
        params: &DatabaseQueryParams,
    ) -> Result<DatabaseQuery, IntegrationError> {
        let mut body = Map::new();
        if let Some(filter) = &params.filter {
            body.insert("filter".into(), filter.clone());
        }
        if let Some(sorts) = &params.sorts {
            body.insert("sorts".into(), sorts.clone());
        }
        if let Some(size) = params.page_size {
            body.insert("page_size".into(), json!(size.clamp(1, 100)));
        }
        if let Some(cursor) = &params.start_cursor {
            body.insert("start_cursor".into(), json!(cursor));
        }
        let req = self
            .request(
                Method::POST,
                &format!("/v1/databases/{}/query", path_id(PROVIDER, database_id)?),
            )?
            .json(&Value::Object(body));
        let list: NotionList<NotionPage> = send_json(PROVIDER, req, notion_error).await?;
        Ok(DatabaseQuery {
            pages: list.results.into_iter().map(Page::from).collect(),
            next_cursor: list.next_cursor,
            has_more: list.has_more,
        })
    }

    async fn get_page_property(
        &self,
        page_id: &str,
        property_id: &str,
    ) -> Result<PropertyValue, IntegrationError> {
        let req = self.request(
            Method::GET,
            &format!(
                "/v1/pages/{}/properties/{}",
                path_id(PROVIDER, page_id)?,
                path_id(PROVIDER, property_id)?
            ),
        )?;
        let item: Value = send_json(PROVIDER, req, notion_error).await?;
        Ok(properties::parse_property_item(&item))
    }

    async fn list_comments(&self, block_id: &str) -> Result<Vec<Comment>, IntegrationError> {
        let req = self
            .request(Method::GET, "/v1/comments")?
            .query(&[("block_id", block_id)]);
        let list: NotionList<NotionComment> = send_json(PROVIDER, req, notion_error).await?;
        Ok(list.results.into_iter().map(Comment::from).collect())
    }

    async fn create_comment(
        &self,
        page_id: &str,
        text: &str,
    ) -> Result<Comment, IntegrationError> {
        if text.trim().is_empty() {
            return Err(IntegrationError::InvalidInput {
                provider: PROVIDER,
                message: "comment text is empty".to_string(),
            });
        }
        let req = self.request(Method::POST, "/v1/comments")?.json(&json!({
            "parent": { "page_id": page_id },
            "rich_text": [{ "type": "text", "text": { "content": blocks::truncate(text) } }],
        }));
        let comment: NotionComment = send_json(PROVIDER, req, notion_error).await?;
        Ok(comment.into())
    }

    async fn create_page(&self, page: &NewPage) -> Result<Page, IntegrationError> {
        let children = page
            .markdown
            .as_deref()
            .map(markdown_to_blocks)
            .unwrap_or_default();
        let (first, rest) = children.split_at(children.len().min(MAX_BLOCKS_PER_REQUEST));

        let req = self.request(Method::POST, "/v1/pages")?.json(&json!({
            "parent": { "database_id": page.database_id },
            "properties": properties::input_map(&page.properties),
            "children": first,
        }));
        let created: NotionPage = send_json(PROVIDER, req, notion_error).await?;

        if !rest.is_empty() {
            self.append_blocks(&created.id, rest).await?;
        }
        info!(page_id = %created.id, blocks = children.len(), "created notion page");
        Ok(created.into())
    }

    async fn update_page(&self, id: &str, update: &PageUpdate) -> Result<Page, IntegrationError> {
        if !update.properties.is_empty() || update.archived.is_some() {
            let mut body = Map::new();
            if !update.properties.is_empty() {
                body.insert(
                    "properties".into(),
                    properties::input_map(&update.properties),
                );
            }
            if let Some(archived) = update.archived {
                body.insert("archived".into(), json!(archived));
            }
            let req = self
                .request(Method::PATCH, &format!("/v1/pages/{}", path_id(PROVIDER, id)?))?
                .json(&Value::Object(body));
            let _: NotionPage = send_json(PROVIDER, req, notion_error).await?;
        }

        if update.replace_body {
            let removed = self.clear_children(id).await?;
            debug!(page_id = id, removed, "cleared page body");
        }
        if let Some(md) = &update.markdown {
            self.append_blocks(id, &markdown_to_blocks(md)).await?;
        }

        self.get_page(id).await
    }

    async fn find_page_by_title(
        &self,
        database_id: &str,
        title: &str,
    ) -> Result<Option<Page>, IntegrationError> {
        let params = DatabaseQueryParams {
            filter: Some(json!({ "property": "title", "title": { "equals": title } })),
            page_size: Some(1),
            ..Default::default()
        };
        let result = self.query_database(database_id, &params).await?;
        Ok(result.pages.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_from_wire() {
        let wire: NotionPage = serde_json::from_value(json!({
            "object": "page",
            "id": "p1",
            "url": "https://www.notion.so/p1",
            "archived": false,
            "created_time": "2026-01-20T09:00:00.000Z",
            "parent": { "type": "database_id", "database_id": "db1" },
            "properties": {
                "Task Name": { "type": "title", "title": [{ "plain_text": "Call Acme" }] }
            }
        }))
        .unwrap();
        let page = Page::from(wire);
        assert_eq!(page.title.as_deref(), Some("Call Acme"));
        assert_eq!(page.parent_database_id.as_deref(), Some("db1"));
        assert_eq!(page.source.url.as_deref(), Some("https://www.notion.so/p1"));
        assert!(page.created_at.is_some());
    }

    #[test]
    fn test_error_envelope() {
        let v = json!({
            "object": "error",
            "status": 404,
            "code": "object_not_found",
            "message": "Could not find page"
        });
        assert_eq!(
            notion_error(&v),
            Some((
                "Could not find page".to_string(),
                Some("object_not_found".to_string())
            ))
        );
    }

    #[test]
    fn test_missing_key_fails_before_request() {
        let adapter = NotionAdapter::new(Client::new(), "http://localhost".into(), Some(" ".into()));
        let err = adapter.request(Method::GET, "/v1/pages/x").unwrap_err();
        assert!(err.is_missing_config());
    }
}
