//! HTTP surface over [`topichub_session::SessionService`].
//!
//! Every edit endpoint answers with the updated result plus an info block
//! and the session `version`; errors come back as `{code, message}`.

pub mod dto;
pub mod error;
pub mod routes;

pub use error::{status_for, ApiError, ErrorBody};
pub use routes::{router, AppState};
