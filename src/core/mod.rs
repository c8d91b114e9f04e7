//! Core Module - Tracing Pipeline
//!
//! Graph crawl, path search, graph analytics, behavior classification and
//! risk scoring, tied together by the analysis orchestrator.

pub mod behavior;
pub mod centrality;
pub mod crawler;
pub mod graph;
pub mod orchestrator;
pub mod path_finder;
pub mod risk_score;

pub use behavior::*;
pub use centrality::*;
pub use crawler::*;
pub use graph::*;
pub use orchestrator::*;
pub use path_finder::*;
pub use risk_score::*;
