use oxmon_common::types::InstanceKind;

/// Maximum number of characters of a response body kept in an error.
const MAX_BODY_CHARS: usize = 200;

/// Errors raised while talking to the monitoring backends.
///
/// Not-found on removal and conflict-with-same-address on registration are
/// not errors; they are reported through the outcome enums of the
/// individual protocols.
///
/// # Examples
///
/// ```rust
/// use oxmon_api::error::AdminError;
/// use oxmon_common::types::InstanceKind;
///
/// let err = AdminError::HostConflict {
///     name: "db1".to_string(),
///     kind: InstanceKind::Mysql,
///     existing: "10.0.0.5".to_string(),
///     requested: "10.0.0.6".to_string(),
/// };
/// assert!(err.is_host_conflict());
/// assert!(err.to_string().contains("10.0.0.5"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Connection, timeout or body-read failure. Always fatal to the current step.
    #[error("{method} {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a status outside the documented success set.
    #[error("{method} {url}: got status code {status}, expected {expected}: {body}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
        expected: u16,
        body: String,
    },

    /// The name is already registered under a different address.
    #[error("{kind} host '{name}' is already registered with address {existing}, not {requested}")]
    HostConflict {
        name: String,
        kind: InstanceKind,
        existing: String,
        requested: String,
    },

    /// A create/conflict response did not say where the resource lives.
    #[error("POST {url}: response has no Location header")]
    MissingLocation { url: String },

    /// A gzip-encoded body could not be inflated.
    #[error("{method} {url}: cannot decode gzip body: {source}")]
    Decode {
        method: String,
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("OS not set: add the OS instance first")]
    OsNotSet,

    #[error("server address is not set")]
    ServerNotSet,

    #[error("client address is not set")]
    ClientNotSet,

    /// The local agent must report exactly one OS instance.
    #[error("local agent reported {count} OS instances, expected exactly 1")]
    OsInstanceCount { count: usize },

    /// More than one record matched where at most one may exist.
    #[error("found {count} {kind} entries named '{name}', expected at most 1")]
    Ambiguous {
        kind: InstanceKind,
        name: String,
        count: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl AdminError {
    pub fn unexpected(method: &str, url: &str, status: u16, expected: u16, body: &[u8]) -> Self {
        AdminError::UnexpectedStatus {
            method: method.to_string(),
            url: url.to_string(),
            status,
            expected,
            body: truncate_body(body, MAX_BODY_CHARS),
        }
    }

    pub fn is_host_conflict(&self) -> bool {
        matches!(self, AdminError::HostConflict { .. })
    }

    /// Status code of an [`AdminError::UnexpectedStatus`], if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            AdminError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Truncate a UTF-8 body to at most `max` bytes on a char boundary.
fn truncate_body(bytes: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Convenience `Result` alias for backend operations.
pub type Result<T> = std::result::Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_truncates_long_bodies() {
        let body = "x".repeat(500);
        let err = AdminError::unexpected("GET", "http://localhost:9000/id", 500, 200, body.as_bytes());
        match err {
            AdminError::UnexpectedStatus { body, .. } => {
                assert_eq!(body.len(), MAX_BODY_CHARS + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unexpected_status_message_names_method_url_and_codes() {
        let err = AdminError::unexpected("(2) POST", "http://localhost:9002/", 409, 201, b"busy");
        let msg = err.to_string();
        assert!(msg.contains("(2) POST"));
        assert!(msg.contains("409"));
        assert!(msg.contains("201"));
        assert_eq!(err.status(), Some(409));
        assert!(!err.is_host_conflict());
    }
}
