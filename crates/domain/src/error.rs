/// Shared error type used across all ragchat crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// A downstream service answered, but not with something usable.
    #[error("{service}: {message}")]
    Gateway { service: String, message: String },

    #[error("auth: {0}")]
    Auth(String),

    #[error("storage: {0}")]
    Storage(String),

    /// The client socket went away or refused a frame.
    #[error("connection: {0}")]
    Connection(String),

    /// Internal pipeline failure (not a downstream-service failure).
    #[error("pipeline: {0}")]
    Pipeline(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transport-class failures are the ones pipeline stages absorb.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::Gateway { .. } | Self::Auth(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_display_names_service() {
        let e = Error::Gateway {
            service: "retrieval".into(),
            message: "POST /search returned 500".into(),
        };
        assert_eq!(e.to_string(), "retrieval: POST /search returned 500");
        assert!(e.is_transport());
    }

    #[test]
    fn pipeline_error_is_not_transport() {
        assert!(!Error::Pipeline("bad state".into()).is_transport());
        assert!(!Error::Storage("locked".into()).is_transport());
    }
}
