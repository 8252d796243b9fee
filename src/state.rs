//! État partagé par les workers: connexion BD, sessions, photos et rendu.

use std::path::PathBuf;
use std::sync::Arc;

use actix_multipart::form::MultipartFormConfig;
use actix_web::web;
use sea_orm::DatabaseConnection;

use crate::config::SessionConfig;
use crate::responses::Renderer;
use crate::routes;
use crate::services::photo_storage::PhotoStorage;
use crate::services::session_store::SessionStore;

// Taille maximale d'un formulaire étudiant, photo comprise
pub const UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: web::Data<DatabaseConnection>,
    pub sessions: web::Data<SessionStore>,
    pub photos: web::Data<PhotoStorage>,
    pub renderer: web::Data<dyn Renderer>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        session: SessionConfig,
        media_root: impl Into<PathBuf>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            sessions: web::Data::new(SessionStore::new(db.clone(), session)),
            db: web::Data::new(db),
            photos: web::Data::new(PhotoStorage::new(media_root)),
            renderer: web::Data::from(renderer),
        }
    }

    /// Enregistre l'état et les routes dans l'application.
    /// Le middleware de session se monte à part (`App::wrap`).
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.db.clone())
            .app_data(self.sessions.clone())
            .app_data(self.photos.clone())
            .app_data(self.renderer.clone())
            .app_data(MultipartFormConfig::default().total_limit(UPLOAD_LIMIT_BYTES));
        routes::configure_routes(cfg);
    }
}
