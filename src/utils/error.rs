use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

use crate::models::ImportIssue;
use crate::services::cadastro::CadastroError;
use crate::services::cobranca::CobrancaError;
use crate::services::export::ExportError;
use crate::services::import::ImportError;
use crate::services::lifecycle::LifecycleError;
use crate::services::storage::StorageError;
use crate::services::store::StoreError;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
    Forbidden(String),
    ConfigError(String),
    JsonError(serde_json::Error),
    HttpError(reqwest::Error),
    ValidationError(String),
    /// Erros por linha/campo da importação, devolvidos ao operador
    ImportRejected { message: String, issues: Vec<ImportIssue> },
    ExternalError(String),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::JsonError(err) => write!(f, "JSON error: {}", err),
            AppError::HttpError(err) => write!(f, "HTTP error: {}", err),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ImportRejected { message, issues } => {
                write!(f, "Import rejected: {} ({} issues)", message, issues.len())
            }
            AppError::ExternalError(msg) => write!(f, "External service error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpError(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::Duplicate { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::EmptyRoster | ExportError::NothingToExport => {
                AppError::ValidationError(err.to_string())
            }
            _ => AppError::InternalError(err.to_string()),
        }
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::ColumnsNotFound | ImportError::EmptyWorkbook => {
                AppError::ValidationError(err.to_string())
            }
            ImportError::Unreadable(_) => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound(_)
            | LifecycleError::EmpresaNotFound(_)
            | LifecycleError::ObraNotFound(_)
            | LifecycleError::NoTargetFound { .. }
            | LifecycleError::UnknownMember { .. } => AppError::NotFound(err.to_string()),
            LifecycleError::InvalidTransition { .. }
            | LifecycleError::AmbiguousTarget { .. }
            | LifecycleError::SlotBusy { .. }
            | LifecycleError::DuplicateMember { .. } => AppError::Conflict(err.to_string()),
            LifecycleError::EmptyRoster(_)
            | LifecycleError::NoRecords
            | LifecycleError::InvalidTaxId(_)
            | LifecycleError::UnknownDecisions { .. } => AppError::ValidationError(err.to_string()),
            LifecycleError::Store(e) => e.into(),
            LifecycleError::Export(e) => e.into(),
            LifecycleError::Storage(e) => e.into(),
        }
    }
}

impl From<CadastroError> for AppError {
    fn from(err: CadastroError) -> Self {
        match err {
            CadastroError::EmpresaNotFound(_) => AppError::NotFound(err.to_string()),
            CadastroError::ClienteSemEmpresa | CadastroError::NomeObraVazio => {
                AppError::ValidationError(err.to_string())
            }
            CadastroError::ObraDuplicada(_) => AppError::Conflict(err.to_string()),
            CadastroError::Store(e) => e.into(),
        }
    }
}

impl From<CobrancaError> for AppError {
    fn from(err: CobrancaError) -> Self {
        match err {
            CobrancaError::NoRecipients => AppError::ValidationError(err.to_string()),
            CobrancaError::NotConfigured(_) => AppError::ConfigError(err.to_string()),
            CobrancaError::Store(e) => e.into(),
            _ => AppError::ExternalError(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, issues) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            AppError::JsonError(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::HttpError(err) => (StatusCode::BAD_GATEWAY, err.to_string(), None),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::ImportRejected { message, issues } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, Some(issues))
            }
            AppError::ExternalError(msg) => (StatusCode::BAD_GATEWAY, msg, None),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16()
        });
        if let Some(issues) = issues {
            body["issues"] = json!(issues);
        }

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
