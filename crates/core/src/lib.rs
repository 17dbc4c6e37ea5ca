pub mod config;
pub mod error;
pub mod field_value;
pub mod form;
pub mod ids;
pub mod report;
pub mod request;
pub mod submission;
pub mod timestamp;

pub use config::EngineConfig;
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
