//! Docs / task-tracker outbound port. Pages, database queries, comments.

use crate::domain::{
    Comment, DatabaseQuery, DatabaseQueryParams, IntegrationError, NewPage, Page, PageUpdate,
    PropertyValue,
};

/// Port for the docs workspace that also serves as the task tracker.
///
/// Writes are visible to an immediate re-read: the provider has no async
/// processing boundary between `create_page` and `get_page`.
#[async_trait::async_trait]
pub trait DocsPort: Send + Sync {
    async fn get_page(&self, id: &str) -> Result<Page, IntegrationError>;

    /// Query one page of a database.
    ///
    /// An empty database yields `DatabaseQuery { pages: [], .. }`.
    async fn query_database(
        &self,
        database_id: &str,
        params: &DatabaseQueryParams,
    ) -> Result<DatabaseQuery, IntegrationError>;

    /// Single property, for properties the page object truncates (relations, long rich text).
    async fn get_page_property(
        &self,
        page_id: &str,
        property_id: &str,
    ) -> Result<PropertyValue, IntegrationError>;

    async fn list_comments(&self, block_id: &str) -> Result<Vec<Comment>, IntegrationError>;

    async fn create_comment(&self, page_id: &str, text: &str)
        -> Result<Comment, IntegrationError>;

    /// Create a page in a database. A Markdown body is converted into blocks.
    async fn create_page(&self, page: &NewPage) -> Result<Page, IntegrationError>;

    async fn update_page(&self, id: &str, update: &PageUpdate) -> Result<Page, IntegrationError>;

    /// First page in `database_id` whose title equals `title`.
    async fn find_page_by_title(
        &self,
        database_id: &str,
        title: &str,
    ) -> Result<Option<Page>, IntegrationError>;
}
