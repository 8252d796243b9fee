//! Erreurs applicatives partagées par les services et les routes.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sea_orm::DbErr;
use thiserror::Error;

use crate::utils::password::PasswordError;

/// Message affiché à l'utilisateur quand l'erreur ne doit pas être détaillée.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

#[derive(Debug, Error)]
pub enum AppError {
    /// Erreurs de saisie, dans l'ordre des validateurs.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Action refusée sur cet enregistrement (ex: supprimer un admin).
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Clé unique déjà prise (email, identifiant étudiant, ordre).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("password hashing error: {0}")]
    Password(#[from] PasswordError),

    /// Tâche du pool bloquant interrompue (hachage des mots de passe).
    #[error("background task failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }

    /// Messages présentables à l'utilisateur; jamais de détail interne.
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            AppError::Validation(messages) => messages.clone(),
            AppError::NotFound(what) => vec![format!("{} not found.", capitalize(what))],
            AppError::Forbidden(message) => vec![message.to_string()],
            AppError::Conflict(message) => vec![message.clone()],
            _ => vec![GENERIC_ERROR_MESSAGE.to_string()],
        }
    }

    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Storage(_)
                | AppError::Password(_)
                | AppError::Background(_)
        )
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Corps JSON des requêtes asynchrones: `message` joint les `errors`.
    fn error_response(&self) -> HttpResponse {
        let messages = self.user_messages();
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "status": "error",
            "message": messages.join(" "),
            "errors": messages,
        }))
    }
}

pub type AppResult<T> = Result<T, AppError>;
