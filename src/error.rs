use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZoneError>;

#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    #[error("Record not found")]
    RecordNotFound,

    #[error("SOA record not found in zone file. Cannot update serial.")]
    MissingSoa,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("{command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl ZoneError {
    /// True for every "absent" flavour: missing file, undeclared zone, unmatched record.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ZoneError::FileNotFound(_) | ZoneError::ZoneNotFound(_) | ZoneError::RecordNotFound
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ZoneError::FileNotFound(_) | ZoneError::ZoneNotFound(_) | ZoneError::RecordNotFound => {
                "not_found"
            }
            ZoneError::MissingSoa => "missing_soa",
            ZoneError::Parse(_) => "parse_error",
            ZoneError::Validation(_) => "validation_error",
            ZoneError::AlreadyExists(_) => "already_exists",
            ZoneError::Process(_) => "process_error",
            ZoneError::Timeout { .. } => "timeout",
            ZoneError::Unauthorized => "unauthorized",
            ZoneError::BadRequest(_) => "bad_request",
            ZoneError::Io(_) => "io_error",
            ZoneError::Http(_) => "http_error",
        }
    }
}

impl ResponseError for ZoneError {
    fn status_code(&self) -> StatusCode {
        match self {
            ZoneError::Unauthorized => StatusCode::UNAUTHORIZED,
            ZoneError::BadRequest(_) | ZoneError::Validation(_) => StatusCode::BAD_REQUEST,
            ZoneError::FileNotFound(_) | ZoneError::ZoneNotFound(_) | ZoneError::RecordNotFound => {
                StatusCode::NOT_FOUND
            }
            ZoneError::AlreadyExists(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}
