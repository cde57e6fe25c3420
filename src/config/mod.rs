pub mod loader;
pub mod schema;

pub use loader::{discover, load_for_document, load_from_path, load_from_str, ConfigError, CONFIG_FILE};
pub use schema::{
    EngineConfig, EscalationConfig, ParserConfig, PatchSettings, UpstreamConfig, ValidationError,
    ValidationIssue,
};
