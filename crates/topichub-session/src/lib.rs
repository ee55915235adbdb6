pub mod audit;
pub mod checkpoint;
pub mod lifecycle;
pub mod poller;
pub mod repository;
pub mod service;
pub mod suggestions;

pub use audit::TracingAuditLog;
pub use checkpoint::InMemoryCheckpointStore;
pub use lifecycle::{JobTracker, PROGRESS_CAP};
pub use poller::{PollHandle, StatusPoller, StatusSource};
pub use repository::InMemorySessionRepository;
pub use service::{Edited, RefineOutcome, RenameOutcome, SessionService};
