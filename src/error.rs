use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaskError>;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("{0}")]
    Validation(String),

    #[error("task not found: {0}")]
    NotFound(i64),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("http error: {0}")]
    Http(String),
}

impl TaskError {
    /// Status the endpoint layer answers with. Everything in the taxonomy is
    /// recovered at that boundary; nothing propagates as an unhandled fault.
    pub fn status_code(&self) -> u16 {
        match self {
            TaskError::InvalidId(_) | TaskError::Validation(_) => 400,
            TaskError::NotFound(_) => 404,
            TaskError::Storage(_) | TaskError::Http(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for TaskError {
    fn from(err: rusqlite::Error) -> Self {
        TaskError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::Http(err.to_string())
    }
}
