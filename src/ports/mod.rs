//! Port traits. API boundaries for the hexagon.
//!
//! - Outbound: called by the application into provider systems
//! - Task tracker: the docs workspace
//! - Stream: live event transport and notifications

pub mod outbound;
pub mod stream;
pub mod task_tracker;

pub use outbound::{BillingPort, CrmPort, WarehousePort, WorkflowPort};
pub use stream::{EventSource, EventStream, Notifier};
pub use task_tracker::DocsPort;
