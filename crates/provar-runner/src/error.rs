use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("provider error during {phase} of '{resource}': {source}")]
    Provider {
        phase: &'static str,
        resource: String,
        #[source]
        source: provar_provider::ProviderError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl RunError {
    pub fn provider(
        phase: &'static str,
        resource: impl Into<String>,
        source: provar_provider::ProviderError,
    ) -> Self {
        RunError::Provider {
            phase,
            resource: resource.into(),
            source,
        }
    }
}
