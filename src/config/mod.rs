pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError, LoadedRequest};
pub use schema::{RequestConfig, ValidationError, ValidationIssue};
