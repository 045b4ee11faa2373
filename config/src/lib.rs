mod loader;
mod pipeline;
mod vars;

pub use loader::*;
pub use pipeline::*;
pub use vars::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required variable `{0}` is not set")]
    Missing(&'static str),

    #[error("variable `{0}` is not valid JSON: {1}")]
    Json(&'static str, #[source] serde_json::Error),
}
