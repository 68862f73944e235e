//! Timeout enforcement for collaborator calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::sources::SourceError;

/// Run a collaborator call under a deadline.
///
/// An elapsed deadline becomes `SourceError::Timeout` so callers handle it
/// the same way as any other collaborator failure.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    match timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(deadline.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_elapses() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, SourceError>(1)
        };
        let result = with_deadline(Duration::from_millis(20), slow).await;
        assert!(matches!(result, Err(SourceError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result = with_deadline(Duration::from_secs(1), async { Ok::<_, SourceError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
