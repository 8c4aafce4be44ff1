//! Guarded remote generation calls.
//!
//! Every call checks the cancellation token before it is issued and after it
//! returns, and is bounded by a timeout. A late result from an aborted run is
//! dropped.

use std::time::Duration;

use tracing::debug;

use crate::adapters::{GenerateRequest, GenerateResponse, GenerativeService};
use crate::domain::Stage;

use super::cancel::CancellationToken;
use super::error::PipelineError;

/// Issue one generation request on behalf of `stage`
pub async fn generate(
    service: &dyn GenerativeService,
    model: &str,
    request: &GenerateRequest,
    stage: Stage,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<GenerateResponse, PipelineError> {
    cancel.check(stage)?;
    debug!(%stage, model, service = service.name(), "Issuing generation request");

    let result = tokio::time::timeout(timeout, service.generate(model, request)).await;

    // Results that arrive after an abort are discarded
    cancel.check(stage)?;

    match result {
        Err(_) => Err(PipelineError::request_failed(
            stage,
            format!("timed out after {}s", timeout.as_secs()),
        )),
        Ok(Err(e)) => Err(PipelineError::request_failed(stage, e.to_string())),
        Ok(Ok(response)) => Ok(response),
    }
}

/// Issue a request and return its text, or `GenerationEmpty`
pub async fn generate_text(
    service: &dyn GenerativeService,
    model: &str,
    request: &GenerateRequest,
    stage: Stage,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String, PipelineError> {
    generate(service, model, request, stage, timeout, cancel)
        .await?
        .text()
        .ok_or(PipelineError::GenerationEmpty { stage })
}
