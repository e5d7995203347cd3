//! Rendering error types.

/// A value could not be turned into YAML.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to encode value as YAML")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to quote string value")]
    Quote(#[from] serde_json::Error),

    #[error("failed to write rendered output")]
    Format(#[from] std::fmt::Error),

    /// An entity payload did not serialize to a mapping.
    #[error("{domain} entity {name:?} is not a mapping")]
    NotAMapping { domain: String, name: String },
}
