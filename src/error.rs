use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::money::MoneyError;

#[derive(Debug, Error)]
pub enum BillError {
    #[error("no bill is currently open")]
    NoCurrentBill,
    #[error("couldn't find bill `{0}`")]
    BillNotFound(String),
    #[error("couldn't find person `{0}` in the bill")]
    PersonNotFound(String),
    #[error("couldn't find expense `{0}` in the bill")]
    ExpenseNotFound(String),
    #[error("{0} must not be empty")]
    EmptyName(&'static str),
    #[error("an expense needs at least one participant")]
    NoParticipants,
    #[error("`{0}` is not a person of this bill")]
    UnknownParticipant(String),
    #[error("person `{0}` is listed more than once")]
    DuplicateParticipant(String),
    #[error("the bill has no bank account to transfer to")]
    MissingBankInfo,
    #[error("person `{0}` doesn't owe anything")]
    NotADebtor(String),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error(transparent)]
    Share(#[from] ShareError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResponseError for BillError {
    fn status_code(&self) -> StatusCode {
        match self {
            BillError::NoCurrentBill
            | BillError::BillNotFound(_)
            | BillError::PersonNotFound(_)
            | BillError::ExpenseNotFound(_) => StatusCode::NOT_FOUND,
            BillError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("couldn't access the bill storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("the stored bills are malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported storage version {0}")]
    UnsupportedVersion(u32),
    #[error("the bill storage lock was poisoned")]
    Poisoned,
    #[error("the storage write didn't finish: {0}")]
    Interrupted(#[from] actix_web::error::BlockingError),
}

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("the shared link doesn't decompress to text")]
    Encoding,
    #[error("the shared link doesn't contain a bill: {0}")]
    Json(#[from] serde_json::Error),
    #[error("the shared bill is missing its id or name")]
    Incomplete,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("SPLITBILL_PORT must be a port number, got `{0}`")]
    InvalidPort(String),
}
