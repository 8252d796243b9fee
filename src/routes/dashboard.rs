use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;
use tracing::error;

use crate::errors::GENERIC_ERROR_MESSAGE;
use crate::middleware::auth::LOGIN_PATH;
use crate::middleware::Session;
use crate::responses::{Page, Renderer, redirect};
use crate::services::identity_service::{IdentityService, Resolution};
use crate::services::student_service::StudentService;

/// GET /dashboard/ - Tableau de bord de l'utilisateur connecté.
/// Les admins y voient en plus les étudiants par niveau avec leurs étapes.
#[get("/dashboard/")]
pub async fn dashboard(
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let user = match IdentityService::resolve(db.get_ref(), &session).await {
        Ok(Resolution::Resolved(user)) => user,
        Ok(Resolution::Anonymous) => {
            session.error("Please log in to access the dashboard.");
            return redirect(LOGIN_PATH);
        }
        Ok(Resolution::Invalid) => {
            session.error("User not found. Please log in again.");
            return redirect(LOGIN_PATH);
        }
        Err(e) => {
            error!("Failed to resolve session user: {}", e);
            session.error(GENERIC_ERROR_MESSAGE);
            return redirect(LOGIN_PATH);
        }
    };

    let mut page = Page::new("dashboard.html")
        .with("user", &user)
        .with("show_user_info", true);

    if user.is_admin {
        match StudentService::by_level(db.get_ref()).await {
            Ok(grouped) => {
                page = page
                    .with("cozmaz_students", &grouped.cozmaz_students)
                    .with("kidemli_students", &grouped.kidemli_students);
            }
            Err(e) => {
                error!("Failed to load students for dashboard: {}", e);
                session.error("An error occurred while loading students. Please try again.");
            }
        }
    }

    page.render(renderer.get_ref(), &session)
}

pub fn dashboard_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(dashboard);
}
