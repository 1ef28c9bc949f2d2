use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ProviderError;

/// Backoff applied to transient provider errors, plus the hard timeout put
/// around every external call. A timed-out call classifies as transient.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before each retry; the slice length bounds the retry count.
    pub delays: Vec<Duration>,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            delays: [1u64, 2, 4, 8].iter().map(|&s| Duration::from_secs(s)).collect(),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Zero delays, short timeout. Test use only.
    pub fn immediate() -> Self {
        RetryPolicy {
            delays: vec![Duration::ZERO; 4],
            call_timeout: Duration::from_secs(5),
        }
    }
}

/// Run `f` until it succeeds, fails non-transiently, or exhausts the policy.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut f: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.call_timeout, f()).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Transient(format!(
                "{}: timed out after {:?}",
                what, policy.call_timeout
            ))),
        };

        match result {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.delays.len() => {
                warn!(what, attempt, error = %e, "transient provider error, retrying");
                tokio::time::sleep(policy.delays[attempt]).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
