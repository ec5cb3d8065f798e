use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::curve_service::CurveError;

// Erro único da aplicação; cada variante sabe virar uma resposta HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("A data de início não pode ser posterior à data de término")]
    InvalidDateRange,

    #[error("A quantidade consumida não pode ser negativa")]
    InvalidQuantity,

    #[error("Data inválida: {0}")]
    InvalidDate(String),

    #[error("Imagem inválida: {0}")]
    InvalidImage(String),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Sessão inválida ou expirada")]
    Unauthorized,

    #[error("Acesso negado a este projeto")]
    Forbidden,

    #[error("Projeto não encontrado")]
    ProjectNotFound,

    #[error("Tarefa não encontrada")]
    TaskNotFound,

    #[error("Validação não encontrada")]
    ValidationNotFound,

    // Falhas do ERP (fault XML-RPC ou transporte)
    #[error("Erro no ERP: {0}")]
    ErpError(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de armazenamento: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl From<CurveError> for AppError {
    fn from(err: CurveError) -> Self {
        match err {
            CurveError::InvalidRange { .. } => AppError::InvalidDateRange,
            CurveError::OutOfBounds { .. } => AppError::BadRequest(err.to_string()),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidDateRange
            | AppError::InvalidQuantity
            | AppError::InvalidDate(_)
            | AppError::InvalidImage(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::ProjectNotFound | AppError::TaskNotFound | AppError::ValidationNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::ErpError(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_)
            | AppError::StorageError(_)
            | AppError::SerializationError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_message = match self {
            // Devolve todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (status, body).into_response();
            }
            ref e if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                "Ocorreu um erro inesperado.".to_string()
            }
            AppError::ErpError(ref msg) => {
                tracing::warn!("🔌 Falha na comunicação com o ERP: {}", msg);
                self.to_string()
            }
            e => e.to_string(),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
