use std::path::PathBuf;

#[derive(Debug)]
pub enum EngineError {
    Io { path: PathBuf, message: String },
    Decode { path: PathBuf, message: String },
    InvalidTenant(&'static str),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Io { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            EngineError::Decode { path, message } => {
                write!(f, "malformed JSON in {}: {message}", path.display())
            }
            EngineError::InvalidTenant(msg) => write!(f, "invalid tenant: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
