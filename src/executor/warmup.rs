//! Warm-up traffic before sampling
//!
//! Every request goes over its own connection so that as many server
//! workers and caches as possible see traffic. Individual failures are
//! tolerated; an unreachable target stops the run.

use super::ProbeTarget;
use crate::{
    client::Transport,
    error::{AppError, Result},
    logging::Logger,
    token::Token,
};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of a warm-up run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    /// Requests attempted
    pub sent: u64,
    /// Requests that failed without aborting the run
    pub failed: u64,
}

/// Sends the warm-up requests
pub struct WarmupDriver {
    transport: Arc<dyn Transport>,
    target: ProbeTarget,
    logger: Logger,
}

impl WarmupDriver {
    pub fn new(transport: Arc<dyn Transport>, target: ProbeTarget, logger: Logger) -> Self {
        Self {
            transport,
            target,
            logger: logger.named("WARMUP"),
        }
    }

    /// `iterations` requests with the fail token, then as many with the
    /// success token
    pub async fn run(
        &self,
        prefix: &str,
        success_char: &str,
        fail_char: &str,
        missing_length: usize,
        iterations: u32,
    ) -> Result<WarmupReport> {
        let fail_token = self.target.forge.forge(prefix, fail_char, missing_length)?;
        let success_token = self.target.forge.forge(prefix, success_char, missing_length)?;

        self.logger.info("Warm-up started")
            .field("iterations", iterations)
            .field("fail_token", fail_token.as_str())
            .field("success_token", success_token.as_str())
            .log();

        let mut report = WarmupReport::default();
        for token in [&fail_token, &success_token] {
            for _ in 0..iterations {
                self.send_one(token, &mut report).await?;
            }
        }

        self.logger.info("Warm-up finished")
            .field("sent", report.sent)
            .field("failed", report.failed)
            .log();

        Ok(report)
    }

    async fn send_one(&self, token: &Token, report: &mut WarmupReport) -> Result<()> {
        report.sent += 1;
        match self.transport.send_fresh(&self.target.request(token)).await {
            Ok(_) => Ok(()),
            Err(e @ AppError::Network(_)) => {
                self.logger.error("Target unreachable during warm-up")
                    .field("sent", report.sent)
                    .error_info(&e)
                    .log();
                Err(e)
            }
            Err(e) => {
                report.failed += 1;
                self.logger.debug("Warm-up request failed")
                    .field("token", token.as_str())
                    .error_info(&e)
                    .log();
                Ok(())
            }
        }
    }
}
