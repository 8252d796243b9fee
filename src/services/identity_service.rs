use chrono::Utc;
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::middleware::Session;
use crate::models::users::{self, Entity as Users};

/// Résultat de la résolution d'une session en utilisateur.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Aucun identifiant dans la session.
    Anonymous,
    /// Identifiant illisible ou utilisateur disparu: la session a été vidée.
    Invalid,
    Resolved(users::Model),
}

pub struct IdentityService;

impl IdentityService {
    /// Résout la session courante. La ligne `users` fait foi; l'email gardé
    /// en session n'est qu'un cache d'affichage, resynchronisé au besoin.
    pub async fn resolve<C>(db: &C, session: &Session) -> Result<Resolution, DbErr>
    where
        C: ConnectionTrait,
    {
        let Some(raw_id) = session.user_id() else {
            return Ok(Resolution::Anonymous);
        };

        let Ok(user_id) = Uuid::parse_str(&raw_id) else {
            warn!("Malformed user_id in session: {}", raw_id);
            session.flush();
            return Ok(Resolution::Invalid);
        };

        match Users::find_by_id(user_id).one(db).await? {
            Some(user) => {
                session.set_user_email(&user.email);
                Ok(Resolution::Resolved(user))
            }
            None => {
                warn!("Invalid user_id in session: {}", raw_id);
                session.flush();
                Ok(Resolution::Invalid)
            }
        }
    }

    /// Attache l'utilisateur à la session après un login réussi.
    pub fn login(session: &Session, user: &users::Model) {
        session.set_identity(&user.id.to_string(), &user.email);
    }

    /// Enregistre l'heure de déconnexion si l'utilisateur existe encore,
    /// puis vide la session dans tous les cas.
    pub async fn logout<C>(db: &C, session: &Session) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let outcome = Self::record_logout(db, session).await;
        session.flush();
        outcome
    }

    async fn record_logout<C>(db: &C, session: &Session) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let Some(raw_id) = session.user_id() else {
            return Ok(());
        };

        let user = match Uuid::parse_str(&raw_id) {
            Ok(user_id) => Users::find_by_id(user_id).one(db).await?,
            Err(_) => None,
        };

        match user {
            Some(user) => {
                let email = user.email.clone();
                let mut active_model: users::ActiveModel = user.into();
                active_model.last_logout = Set(Some(Utc::now()));
                active_model.update(db).await?;
                info!("User {} logged out.", email);
            }
            None => warn!("User ID {} not found during logout.", raw_id),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session_store::SessionData;
    use crate::test_support::{insert_user, test_connection};

    fn session_with_id(raw_id: &str) -> Session {
        Session::new(
            Some("key".into()),
            SessionData {
                user_id: Some(raw_id.to_string()),
                user_email: Some("stale@example.com".into()),
                messages: vec![],
            },
        )
    }

    #[tokio::test]
    async fn test_empty_session_is_anonymous() {
        let db = test_connection().await;
        let session = Session::default();

        let resolution = IdentityService::resolve(&db, &session).await.unwrap();
        assert_eq!(resolution, Resolution::Anonymous);
    }

    #[tokio::test]
    async fn test_malformed_id_is_invalid_then_anonymous() {
        let db = test_connection().await;
        let session = session_with_id("not-a-uuid");

        let first = IdentityService::resolve(&db, &session).await.unwrap();
        assert_eq!(first, Resolution::Invalid);
        assert!(session.is_empty());
        assert_eq!(session.changes().purge.as_deref(), Some("key"));

        let second = IdentityService::resolve(&db, &session).await.unwrap();
        assert_eq!(second, Resolution::Anonymous);
    }

    #[tokio::test]
    async fn test_unknown_user_is_invalid() {
        let db = test_connection().await;
        let session = session_with_id(&Uuid::new_v4().to_string());

        let resolution = IdentityService::resolve(&db, &session).await.unwrap();
        assert_eq!(resolution, Resolution::Invalid);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_resolved_user_refreshes_cached_email() {
        let db = test_connection().await;
        let user = insert_user(&db, "a@b.com", "Abcdef1!", false).await;
        let session = session_with_id(&user.id.to_string());

        let resolution = IdentityService::resolve(&db, &session).await.unwrap();
        match resolution {
            Resolution::Resolved(resolved) => assert_eq!(resolved.id, user.id),
            other => panic!("expected a resolved user, got {:?}", other),
        }
        assert_eq!(session.user_email().as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_logout_records_timestamp_and_flushes() {
        let db = test_connection().await;
        let user = insert_user(&db, "a@b.com", "Abcdef1!", false).await;
        let session = session_with_id(&user.id.to_string());

        IdentityService::logout(&db, &session).await.unwrap();

        assert!(session.is_empty());
        let reloaded = Users::find_by_id(user.id).one(&db).await.unwrap().unwrap();
        assert!(reloaded.last_logout.is_some());
    }

    #[tokio::test]
    async fn test_logout_flushes_even_for_vanished_user() {
        let db = test_connection().await;
        let session = session_with_id(&Uuid::new_v4().to_string());

        IdentityService::logout(&db, &session).await.unwrap();
        assert!(session.is_empty());
    }
}
