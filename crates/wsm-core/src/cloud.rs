use std::fmt;

/// How a cloud call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudErrorKind {
    /// The service answered with an HTTP-like status.
    Http,
    /// The request never got an answer (connection reset, DNS, TLS).
    Transport,
    /// The request or a long-running operation timed out.
    Timeout,
}

/// Error reported by any cloud client: Azure, Kubernetes or Google Cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudError {
    kind: CloudErrorKind,
    status: Option<u16>,
    message: String,
}

impl CloudError {
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: CloudErrorKind::Http,
            status: Some(status),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: CloudErrorKind::Transport,
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: CloudErrorKind::Timeout,
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(404, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::http(409, message)
    }

    #[must_use]
    pub fn kind(&self) -> CloudErrorKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        self.status == Some(400)
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status == Some(403)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status == Some(409)
    }

    #[must_use]
    pub fn is_throttled(&self) -> bool {
        self.status == Some(429)
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status.is_some_and(|status| (400..500).contains(&status))
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status.is_some_and(|status| status >= 500)
    }

    /// Server errors, throttling, transport failures and timeouts may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self.kind {
            CloudErrorKind::Transport | CloudErrorKind::Timeout => true,
            CloudErrorKind::Http => self.is_server_error() || self.is_throttled(),
        }
    }
}

impl fmt::Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.status) {
            (CloudErrorKind::Http, Some(status)) => write!(f, "HTTP {status}: {}", self.message),
            (CloudErrorKind::Http, None) => write!(f, "HTTP error: {}", self.message),
            (CloudErrorKind::Transport, _) => write!(f, "transport error: {}", self.message),
            (CloudErrorKind::Timeout, _) => write!(f, "timed out: {}", self.message),
        }
    }
}

impl std::error::Error for CloudError {}
