pub mod engine;
pub mod service;

pub use engine::AnalysisEngine;
pub use service::{AnalysisService, ServiceError};
