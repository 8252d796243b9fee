use actix_web::error::InternalError;
use actix_web::{dev::Payload, Error, FromRequest, HttpRequest, web};
use futures::future::LocalBoxFuture;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::error;

use crate::errors::GENERIC_ERROR_MESSAGE;
use crate::middleware::Session;
use crate::models::users;
use crate::responses::redirect;
use crate::services::identity_service::{IdentityService, Resolution};

pub const LOGIN_REQUIRED: &str = "Please log in to access this page";
pub const INVALID_SESSION: &str = "Invalid session. Please log in again.";
pub const PERMISSION_DENIED: &str = "You do not have permission to access this page";

pub const LOGIN_PATH: &str = "/login/";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized/";

/// Décision de la garde admin.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Allow(users::Model),
    /// Retour à la page de login avec ce message.
    DenyLogin(&'static str),
    /// Utilisateur connu mais non-admin.
    DenyUnauthorized,
}

/// Exige une session admin valide. Évalué dans l'ordre: session vide,
/// session invalide (vidée par le résolveur), erreur de base, non-admin.
pub async fn require_admin<C>(db: &C, session: &Session) -> Admission
where
    C: ConnectionTrait,
{
    match IdentityService::resolve(db, session).await {
        Ok(Resolution::Anonymous) => Admission::DenyLogin(LOGIN_REQUIRED),
        Ok(Resolution::Invalid) => Admission::DenyLogin(INVALID_SESSION),
        Err(e) => {
            error!("Failed to resolve session user: {}", e);
            Admission::DenyLogin(GENERIC_ERROR_MESSAGE)
        }
        Ok(Resolution::Resolved(user)) if !user.is_admin => Admission::DenyUnauthorized,
        Ok(Resolution::Resolved(user)) => Admission::Allow(user),
    }
}

/// Administrateur authentifié.
/// Utilisé comme extracteur dans les routes protégées: un refus ajoute le
/// message en session et répond par une redirection 302.
#[derive(Debug, Clone)]
pub struct AdminUser(pub users::Model);

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let session = Session::from_req(&req);

            let Some(db) = req.app_data::<web::Data<DatabaseConnection>>().cloned() else {
                error!("DatabaseConnection is not registered as app data");
                session.error(GENERIC_ERROR_MESSAGE);
                return Err(InternalError::from_response("", redirect(LOGIN_PATH)).into());
            };

            match require_admin(db.get_ref(), &session).await {
                Admission::Allow(user) => Ok(AdminUser(user)),
                Admission::DenyLogin(message) => {
                    session.error(message);
                    Err(InternalError::from_response("", redirect(LOGIN_PATH)).into())
                }
                Admission::DenyUnauthorized => {
                    session.error(PERMISSION_DENIED);
                    Err(InternalError::from_response("", redirect(UNAUTHORIZED_PATH)).into())
                }
            }
        })
    }
}
