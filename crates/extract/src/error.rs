use thiserror::Error;

/// Errors raised by the external capabilities the pipeline calls.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The span extractor failed. Fatal for the job.
    #[error("Span extraction failed: {0}")]
    Recognition(String),

    /// The completion service failed. Isolated to one entity or pair by the stages.
    #[error("Completion failed: {0}")]
    Completion(String),
}

pub type ExtractResult<T> = Result<T, ExtractError>;
