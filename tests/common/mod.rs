//! Utilitaires des tests d'intégration HTTP.
//!
//! Chaque test a sa propre base SQLite en mémoire et son répertoire média temporaire.

#![allow(dead_code)]

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::test::TestRequest;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

use student_management::config::SessionConfig;
use student_management::db::{create_schema, establish_connection};
use student_management::models::students::{self, StudentLevel};
use student_management::models::users;
use student_management::responses::ContextRenderer;
use student_management::services::session_store::SessionData;
use student_management::state::AppState;
use student_management::utils::password::hash_password_with_iterations;

pub const PASSWORD: &str = "Abcdef1!";

const BOUNDARY: &str = "student-form-boundary";

/// Service de test avec la même pile de middlewares que le binaire.
macro_rules! test_app {
    ($state:expr) => {{
        let state = $state.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(actix_web::middleware::from_fn(
                    student_management::middleware::session_middleware,
                ))
                .configure(move |cfg| state.configure(cfg)),
        )
        .await
    }};
}

pub struct TestContext {
    pub state: AppState,
    pub media: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = establish_connection("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        create_schema(&db).await.expect("Failed to create schema");

        let media = TempDir::new().expect("Failed to create media root");
        let state = AppState::new(
            db,
            SessionConfig::default(),
            media.path(),
            Arc::new(ContextRenderer),
        );
        Self { state, media }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.state.db.get_ref()
    }

    /// Enregistre une session pour `user_id` et retourne son cookie.
    pub async fn session_for(&self, user_id: &str) -> Cookie<'static> {
        let data = SessionData {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        };
        let key = self
            .state
            .sessions
            .save(None, &data)
            .await
            .expect("Failed to save session");
        Cookie::new("sessionid", key)
    }

    pub async fn admin_cookie(&self) -> (users::Model, Cookie<'static>) {
        let admin = insert_user(self.db(), "admin@school.test", PASSWORD, true).await;
        let cookie = self.session_for(&admin.id.to_string()).await;
        (admin, cookie)
    }
}

/// Utilisateur avec un hachage peu coûteux; la vérification lit le nombre d'itérations dans le hash.
pub async fn insert_user(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    is_admin: bool,
) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password: Set(hash_password_with_iterations(password, 1_000).expect("hash")),
        first_name: Set(None),
        last_name: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        is_active: Set(true),
        is_admin: Set(is_admin),
        last_login: Set(None),
        last_logout: Set(None),
        failed_login_attempts: Set(0),
        is_locked: Set(false),
    }
    .insert(db)
    .await
    .expect("Failed to insert user")
}

pub async fn insert_student(db: &DatabaseConnection, student_id: &str) -> students::Model {
    students::ActiveModel {
        id: Set(Uuid::new_v4()),
        student_id: Set(student_id.to_string()),
        first_name: Set("Grace".to_string()),
        last_name: Set("Hopper".to_string()),
        photo: Set(None),
        created_at: Set(Utc::now()),
        level: Set(StudentLevel::Kidemli),
    }
    .insert(db)
    .await
    .expect("Failed to insert student")
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == "sessionid")
        .map(|cookie| cookie.into_owned())
}

/// Textes des messages flash rendus dans une page.
pub fn messages(body: &Value) -> Vec<String> {
    body["context"]["messages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .filter_map(|message| message["text"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// POST multipart/form-data: champs texte puis, éventuellement, la photo
/// `(nom de fichier, contenu)`.
pub fn multipart_post(uri: &str, fields: &[(&str, &str)], photo: Option<(&str, &[u8])>) -> TestRequest {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content)) = photo {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    TestRequest::post()
        .uri(uri)
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}
