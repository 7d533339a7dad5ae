//! Primary / secondary fallback chains

use crate::error::{EngineError, EngineResult};
use std::future::Future;
use tracing::warn;

/// Which path produced the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackOutcome<T> {
    pub value: T,
    pub source: FallbackSource,
}

/// Try `primary`; on failure try `secondary`. Fails only if both fail.
pub async fn with_fallback<T, P, PFut, S, SFut>(
    operation: &str,
    primary: P,
    secondary: S,
) -> EngineResult<FallbackOutcome<T>>
where
    P: FnOnce() -> PFut,
    PFut: Future<Output = EngineResult<T>>,
    S: FnOnce() -> SFut,
    SFut: Future<Output = EngineResult<T>>,
{
    let primary_err = match primary().await {
        Ok(value) => {
            return Ok(FallbackOutcome {
                value,
                source: FallbackSource::Primary,
            });
        }
        Err(e) => e,
    };

    warn!(operation = %operation, error = %primary_err, "Primary path failed, trying fallback");
    match secondary().await {
        Ok(value) => Ok(FallbackOutcome {
            value,
            source: FallbackSource::Secondary,
        }),
        Err(secondary_err) => Err(EngineError::FallbackExhausted {
            operation: operation.to_string(),
            primary: Box::new(primary_err),
            secondary: Box::new(secondary_err),
        }),
    }
}
