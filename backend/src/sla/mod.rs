// SLA engine - deadline policies and the breach/warning evaluator
//
// Seven document kinds share one algorithm: resolve the deadline either from an
// explicit field or from a reference timestamp plus a fixed budget, skip
// documents already notified inside the dedup window, and notify admins plus
// the responsible role.

pub mod deadline;
pub mod evaluator;
pub mod policy;
pub mod store;

pub use deadline::{due_filters, DeadlinePath, DueFilter, Window};
pub use evaluator::{format_duration, SlaCheckResult, SlaEvaluator};
pub use policy::{BreachFlag, RecipientPolicy, SlaMode, SlaPolicy, ADMIN_ROLE};
pub use store::{DocumentStore, MonitoredDocument, PgDocumentStore};
