//! Session liveness probe.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::{ConnectorError, ConnectorResult};
use crate::protocol::SearchRequest;
use crate::traits::{SearchTransport, SessionValidator};

/// Validates a session with a base-scope read of the root DSE requesting no
/// attributes.
///
/// Any transport error, timeout or non-success result code marks the
/// session dead.
#[derive(Debug, Clone)]
pub struct RootDseProbe {
    timeout: Duration,
}

impl RootDseProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for RootDseProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl<S> SessionValidator<S> for RootDseProbe
where
    S: SearchTransport + Send + 'static,
{
    async fn validate(&self, session: &mut S) -> ConnectorResult<()> {
        let probe = SearchRequest::root_probe();

        let response = tokio::time::timeout(self.timeout, session.search(&probe))
            .await
            .map_err(|_| {
                ConnectorError::session_invalid(format!(
                    "root DSE probe timed out after {} ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| ConnectorError::session_invalid_with_source("root DSE probe failed", e))?;

        if !response.result_code.is_success() {
            return Err(ConnectorError::session_invalid(format!(
                "root DSE probe returned {}: {}",
                response.result_code, response.message
            )));
        }

        debug!("Session passed root DSE probe");
        Ok(())
    }
}
