use socialetl_core::Platform;
use socialetl_db::DbError;
use socialetl_extract::ExtractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid run request: {0}")]
    InvalidRequest(String),

    #[error("no extractor registered for {0}")]
    UnsupportedPlatform(Platform),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("storage failed: {0}")]
    Db(#[from] DbError),
}
