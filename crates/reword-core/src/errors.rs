use std::time::Duration;

/// Typed error taxonomy for the transformation pipeline.
/// Classifies failures as retryable or terminal for the retry policy.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransformError {
    // Terminal — don't retry
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("chunk too long: {actual} > {limit}")]
    TextTooLong { limit: usize, actual: usize },
    #[error("unrecognized response envelope: {0}")]
    Parse(String),
    #[error("original text not found in document")]
    NotFound,

    // Retryable
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
}

impl TransformError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_)
        )
    }

    pub fn suggested_delay(&self) -> Option<Duration> {
        if let Self::RateLimited { retry_after } = self {
            *retry_after
        } else {
            None
        }
    }

    /// Short classification string for logging/events.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::TextTooLong { .. } => "text_too_long",
            Self::Parse(_) => "parse",
            Self::NotFound => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Server { .. } => "server",
            Self::Network(_) => "network",
        }
    }

    /// Human-readable label for partial-success summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Auth(_) => "authentication failed",
            Self::QuotaExceeded(_) => "quota exceeded",
            Self::TextTooLong { .. } => "section too long",
            Self::Parse(_) => "unreadable response",
            Self::NotFound => "text not found",
            Self::RateLimited { .. } => "rate limited",
            Self::Server { .. } => "service error",
            Self::Network(_) => "network error",
        }
    }

    /// Classify an HTTP failure. Status code decides first; body wording
    /// disambiguates 429 quota ceilings and 400 length rejections.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        let lower = body.to_lowercase();
        match status {
            401 | 403 => Self::Auth(body),
            402 => Self::QuotaExceeded(body),
            429 => {
                if lower.contains("quota") || lower.contains("billing") {
                    Self::QuotaExceeded(body)
                } else {
                    Self::RateLimited { retry_after }
                }
            }
            400 => {
                if lower.contains("too long")
                    || lower.contains("maximum context")
                    || lower.contains("token limit")
                {
                    // Length unknown from the body alone
                    Self::TextTooLong { limit: 0, actual: 0 }
                } else {
                    Self::Parse(format!("rejected request: {body}"))
                }
            }
            408 => Self::Network(format!("request timeout: {body}")),
            500..=599 => Self::Server { status, body },
            _ => Self::Parse(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(TransformError::RateLimited { retry_after: None }.is_retryable());
        assert!(TransformError::Server { status: 500, body: "err".into() }.is_retryable());
        assert!(TransformError::Network("tcp reset".into()).is_retryable());
    }

    #[test]
    fn terminal_classification() {
        assert!(!TransformError::Auth("bad key".into()).is_retryable());
        assert!(!TransformError::QuotaExceeded("monthly cap".into()).is_retryable());
        assert!(!TransformError::TextTooLong { limit: 600, actual: 900 }.is_retryable());
        assert!(!TransformError::Parse("??".into()).is_retryable());
        assert!(!TransformError::NotFound.is_retryable());
    }

    #[test]
    fn suggested_delay_only_for_rate_limit() {
        let rl = TransformError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(rl.suggested_delay(), Some(Duration::from_secs(5)));

        let se = TransformError::Server { status: 500, body: "err".into() };
        assert_eq!(se.suggested_delay(), None);
    }

    #[test]
    fn from_status_mapping() {
        assert!(matches!(
            TransformError::from_status(401, "unauthorized".into(), None),
            TransformError::Auth(_)
        ));
        assert!(matches!(
            TransformError::from_status(429, "slow down".into(), None),
            TransformError::RateLimited { .. }
        ));
        assert!(matches!(
            TransformError::from_status(500, "internal".into(), None),
            TransformError::Server { status: 500, .. }
        ));
        assert!(matches!(
            TransformError::from_status(502, "bad gateway".into(), None),
            TransformError::Server { .. }
        ));
    }

    #[test]
    fn status_408_is_a_retryable_timeout() {
        let err = TransformError::from_status(408, "request timeout".into(), None);
        assert!(matches!(err, TransformError::Network(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn status_429_with_quota_wording_is_quota() {
        let err = TransformError::from_status(429, "monthly quota exhausted".into(), None);
        assert!(matches!(err, TransformError::QuotaExceeded(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_400_with_length_wording_is_too_long() {
        let err =
            TransformError::from_status(400, "prompt exceeds maximum context length".into(), None);
        assert!(matches!(err, TransformError::TextTooLong { .. }));
    }

    #[test]
    fn retry_after_survives_classification() {
        let err = TransformError::from_status(
            429,
            "rate limited".into(),
            Some(Duration::from_secs(7)),
        );
        assert_eq!(err.suggested_delay(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(TransformError::NotFound.error_kind(), "not_found");
        assert_eq!(
            TransformError::RateLimited { retry_after: None }.error_kind(),
            "rate_limited"
        );
        assert_eq!(TransformError::Network("dns".into()).error_kind(), "network");
    }
}
