use provar_domain::ProviderTarget;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The desired-state payload is invalid; rejected before any call.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Name collision or invalid state transition (HTTP 409).
    #[error("conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    /// Network failure, timeout, throttling, or a 5xx — safe to retry.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Auth, quota, or a provider-rejected payload — surfaced immediately.
    #[error("fatal provider error: {0}")]
    Fatal(String),

    #[error("no provider registered for target {0}")]
    NotConfigured(ProviderTarget),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classify an HTTP status into the taxonomy. A 404 never reaches this:
    /// reads treat it as a legitimately absent resource and deletes as a
    /// completed no-op.
    pub fn from_status(status: u16, resource: &str, detail: String) -> ProviderError {
        match status {
            409 => ProviderError::Conflict {
                resource: resource.to_string(),
                message: detail,
            },
            408 | 429 => {
                ProviderError::Transient(format!("{}: status {}: {}", resource, status, detail))
            }
            s if s >= 500 => {
                ProviderError::Transient(format!("{}: status {}: {}", resource, status, detail))
            }
            401 | 403 => {
                ProviderError::Fatal(format!("{}: auth rejected ({}): {}", resource, status, detail))
            }
            s => ProviderError::Fatal(format!("{}: status {}: {}", resource, s, detail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_409() {
        let err = ProviderError::from_status(409, "lb1", "already exists".into());
        assert!(matches!(err, ProviderError::Conflict { .. }));
    }

    #[test]
    fn throttling_and_5xx_are_transient() {
        assert!(ProviderError::from_status(429, "r", "slow down".into()).is_transient());
        assert!(ProviderError::from_status(503, "r", "unavailable".into()).is_transient());
        assert!(ProviderError::from_status(408, "r", "timeout".into()).is_transient());
    }

    #[test]
    fn auth_and_bad_request_are_fatal() {
        assert!(!ProviderError::from_status(401, "r", "no".into()).is_transient());
        assert!(!ProviderError::from_status(400, "r", "bad sku".into()).is_transient());
    }
}
