//! Local stand-ins for the external collaborators: a compute backend that
//! clusters texts in-process, a rule-based suggestion analyzer and a
//! keyword-based topic labeler.

pub mod analyzer;
pub mod embed;
mod keywords;
mod kmeans;
pub mod labeler;
pub mod local;

pub use analyzer::{DisabledAnalyzer, HeuristicAnalyzer};
pub use embed::{Embedder, HashEmbedder};
pub use labeler::KeywordLabeler;
pub use local::LocalCompute;
