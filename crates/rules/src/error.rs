use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("no plugin registered under '{0}'")]
    UnknownPlugin(String),

    #[error("a plugin is already registered under '{0}'")]
    DuplicatePlugin(String),

    #[error("required context '{0}' is missing")]
    MissingContext(String),

    #[error("context '{name}' has the wrong type, expected {expected}")]
    InvalidContext { name: String, expected: &'static str },

    #[error("'{0}' is not a valid IP address")]
    InvalidIp(String),

    #[error("no IP address given and the request has no client address")]
    NoClientIp,

    #[error("ban list error: {0}")]
    Ban(String),
}
