use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("customer not found: {0}")]
    NotFound(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::InvalidUpdate(err.to_string())
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
