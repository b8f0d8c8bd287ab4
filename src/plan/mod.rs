//! Query plan assembly and the link write path.

mod assembler;
mod link_sync;
mod request;

pub use assembler::{ColumnSource, PlanColumn, PlanOrder, QueryPlan, QueryPlanner};
pub use link_sync::{reconcile, ExistingLink, LinkInsert, LinkStorage, LinkSync, LinkUpdate};
pub use request::{FindRequest, OrderTerm, SortDirection};
