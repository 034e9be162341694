//! Docs / task-tracker records: pages, property values, comments.

use crate::domain::SourceRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A property value read from a page. Nullable upstream values stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Number(Option<f64>),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Status(Option<String>),
    Date {
        start: Option<String>,
        end: Option<String>,
    },
    People(Vec<String>),
    Url(Option<String>),
    Email(Option<String>),
    Checkbox(bool),
    Relation(Vec<String>),
    /// Property type we do not map; the raw type name is kept.
    Unsupported(String),
}

impl PropertyValue {
    /// Plain-text view for titles, rich text, select and status.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Title(s) | Self::RichText(s) => Some(s),
            Self::Select(s) | Self::Status(s) | Self::Url(s) | Self::Email(s) => s.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub source: SourceRef,
    pub title: Option<String>,
    pub parent_database_id: Option<String>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub archived: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_edited_at: Option<DateTime<Utc>>,
}

impl Page {
    pub fn property_text(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub source: SourceRef,
    pub page_id: Option<String>,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One page of a database query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseQuery {
    pub pages: Vec<Page>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseQueryParams {
    /// Provider filter object, passed through unchanged.
    pub filter: Option<serde_json::Value>,
    pub sorts: Option<serde_json::Value>,
    pub page_size: Option<u32>,
    pub start_cursor: Option<String>,
}

/// A property value to write.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyInput {
    Title(String),
    RichText(String),
    Select(String),
    MultiSelect(Vec<String>),
    Status(String),
    Date { start: String, end: Option<String> },
    People(Vec<String>),
    Url(String),
    Number(f64),
    Checkbox(bool),
}

#[derive(Debug, Clone)]
pub struct NewPage {
    pub database_id: String,
    pub properties: BTreeMap<String, PropertyInput>,
    /// Markdown body, converted to blocks by the adapter.
    pub markdown: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PageUpdate {
    pub properties: BTreeMap<String, PropertyInput>,
    pub markdown: Option<String>,
    /// Delete existing body blocks before appending `markdown`.
    pub replace_body: bool,
    pub archived: Option<bool>,
}

/// Task tracked in the tasks database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub source: SourceRef,
    pub name: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    pub summary: Option<String>,
}

impl From<Page> for Task {
    fn from(page: Page) -> Self {
        let text = |k: &str| page.property_text(k).map(str::to_string);
        let due = match page.properties.get("Due") {
            Some(PropertyValue::Date { start, .. }) => start.clone(),
            _ => None,
        };
        Self {
            name: page.title.clone().or_else(|| text("Task Name")),
            status: text("Status"),
            priority: text("Priority"),
            summary: text("Summary"),
            due,
            source: page.source,
        }
    }
}

pub const TASK_PRIORITIES: &[&str] = &["Low", "Medium", "High"];
pub const TASK_STATUSES: &[&str] = &["Not Started", "In Progress", "Completed", "Done", "Archived"];

/// Input for creating a task page.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl NewTask {
    /// Builds the page for the tasks database. Unknown priorities are dropped.
    pub fn into_page(self, database_id: &str) -> NewPage {
        let mut properties = BTreeMap::new();
        properties.insert("Task Name".to_string(), PropertyInput::Title(self.name));
        properties.insert(
            "Status".to_string(),
            PropertyInput::Status(self.status.unwrap_or_else(|| "Not Started".to_string())),
        );
        if let Some(summary) = self.summary {
            properties.insert("Summary".to_string(), PropertyInput::RichText(summary));
        }
        if let Some(p) = self.priority.filter(|p| TASK_PRIORITIES.contains(&p.as_str())) {
            properties.insert("Priority".to_string(), PropertyInput::Select(p));
        }
        if let Some(due) = self.due {
            properties.insert(
                "Due".to_string(),
                PropertyInput::Date {
                    start: due,
                    end: None,
                },
            );
        }
        NewPage {
            database_id: database_id.to_string(),
            properties,
            markdown: self.body,
        }
    }
}
