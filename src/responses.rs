//! Rendu des pages et réponses communes aux routes.
//!
//! Les handlers ne produisent jamais de HTML eux-mêmes: ils choisissent un
//! gabarit et un contexte, et le [`Renderer`] enregistré dans l'application
//! fabrique la réponse.

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::error;

use crate::errors::AppError;
use crate::middleware::Session;

pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, status: StatusCode, context: Value) -> HttpResponse;
}

/// Renvoie le nom du gabarit et son contexte en JSON.
/// Sert tant qu'aucun moteur de gabarits n'est branché, et dans les tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextRenderer;

impl Renderer for ContextRenderer {
    fn render(&self, template: &str, status: StatusCode, context: Value) -> HttpResponse {
        HttpResponse::build(status).json(json!({
            "template": template,
            "context": context,
        }))
    }
}

/// Page à rendre: gabarit, statut et contexte.
/// Le rendu ajoute toujours `messages` (vidés de la session) et `user_email`.
pub struct Page {
    template: &'static str,
    status: StatusCode,
    context: Map<String, Value>,
}

impl Page {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            status: StatusCode::OK,
            context: Map::new(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to serialize '{}' for {}: {}", key, self.template, e);
                Value::Null
            }
        };
        self.context.insert(key.to_string(), value);
        self
    }

    pub fn render(self, renderer: &dyn Renderer, session: &Session) -> HttpResponse {
        let mut context = self.context;
        context.insert("messages".to_string(), json!(session.take_messages()));
        context.insert("user_email".to_string(), json!(session.user_email()));
        renderer.render(self.template, self.status, Value::Object(context))
    }
}

pub fn not_found(renderer: &dyn Renderer, session: &Session) -> HttpResponse {
    Page::new("not_found.html")
        .status(StatusCode::NOT_FOUND)
        .render(renderer, session)
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub fn json_success() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "success" }))
}

/// Réponse JSON d'erreur pour les appels asynchrones.
pub fn json_error(err: &AppError) -> HttpResponse {
    if err.is_unexpected() {
        error!("Asynchronous request failed: {}", err);
    }
    err.error_response()
}

/// Ajoute en session les messages d'une erreur. Les erreurs inattendues sont
/// loguées et remplacées par un message générique sur l'action en cours.
pub fn flash_error(session: &Session, err: &AppError, action: &str) {
    if err.is_unexpected() {
        error!("Error while {}: {}", action, err);
        session.error(format!("An error occurred while {}. Please try again.", action));
        return;
    }
    for message in err.user_messages() {
        session.error(message);
    }
}

pub fn flash_all(session: &Session, messages: Vec<String>) {
    for message in messages {
        session.error(message);
    }
}
