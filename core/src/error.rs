use std::path::PathBuf;

use crate::target::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The identifier could not be mapped to a fetchable source.
    #[error("unable to resolve \"{identifier}\"")]
    Resolution { identifier: String },

    /// The fetched artifact does not have the required layout.
    #[error("invalid {subject}: {reason}")]
    Validation { subject: String, reason: String },

    #[error("failed to fetch {source_url}: {message}")]
    Fetch { source_url: String, message: String },

    /// Writing marketplace or settings state failed after files were moved into place.
    #[error("failed to register {name}: {reason}")]
    Registration { name: String, reason: String },

    #[error("plugin \"{0}\" is not installed")]
    NotInstalled(String),

    #[error("Unknown client: {client}\nAvailable: {available}")]
    UnknownClient { client: String, available: String },

    #[error("refusing to use unsafe name \"{0}\"")]
    UnsafeName(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn validation(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(source_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_url: source_url.into(),
            message: message.into(),
        }
    }

    pub fn registration(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Registration {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn resolution(identifier: impl Into<String>) -> Self {
        Self::Resolution {
            identifier: identifier.into(),
        }
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Directory names must stay inside their parent and must not be hidden,
/// which also keeps them off `.claude-plugin` and `.temp-*` working dirs.
pub fn is_unsafe_name(name: &str) -> bool {
    name.starts_with('.')
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.trim().is_empty()
}

pub fn ensure_safe_name(name: &str) -> Result<&str> {
    if is_unsafe_name(name) {
        return Err(Error::UnsafeName(name.to_string()));
    }
    Ok(name)
}
