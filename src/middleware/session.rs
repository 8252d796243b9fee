use std::cell::RefCell;
use std::rc::Rc;

use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, web};
use futures::future::{Ready, ready};
use tracing::error;

use crate::config::SessionConfig;
use crate::services::session_store::{FlashMessage, MessageLevel, SessionData, SessionStore};

#[derive(Debug, Default)]
struct SessionState {
    key: Option<String>,
    data: SessionData,
    changed: bool,
    // Clé à supprimer du stockage (flush ou rotation)
    purged_key: Option<String>,
}

/// Session de la requête courante.
///
/// Le middleware [`session_middleware`] la charge depuis le cookie avant le handler
/// et enregistre les modifications après. Elle est passée explicitement aux
/// services qui en ont besoin (résolution d'identité, garde admin).
#[derive(Clone, Default)]
pub struct Session(Rc<RefCell<SessionState>>);

/// Ce que le middleware doit faire du stockage après la requête.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionChanges {
    pub purge: Option<String>,
    pub save: Option<(Option<String>, SessionData)>,
}

impl Session {
    pub fn new(key: Option<String>, data: SessionData) -> Self {
        Self(Rc::new(RefCell::new(SessionState {
            key,
            data,
            ..Default::default()
        })))
    }

    /// Session attachée à la requête (vide si le middleware n'est pas monté).
    pub fn from_req(req: &HttpRequest) -> Session {
        req.extensions()
            .get::<Session>()
            .cloned()
            .unwrap_or_default()
    }

    pub fn user_id(&self) -> Option<String> {
        self.0.borrow().data.user_id.clone()
    }

    pub fn user_email(&self) -> Option<String> {
        self.0.borrow().data.user_email.clone()
    }

    pub fn set_user_email(&self, email: &str) {
        let mut state = self.0.borrow_mut();
        if state.data.user_email.as_deref() != Some(email) {
            state.data.user_email = Some(email.to_string());
            state.changed = true;
        }
    }

    /// Établit l'identité après un login. La clé est renouvelée.
    pub fn set_identity(&self, user_id: &str, email: &str) {
        let mut state = self.0.borrow_mut();
        if let Some(old) = state.key.take() {
            state.purged_key.get_or_insert(old);
        }
        state.data.user_id = Some(user_id.to_string());
        state.data.user_email = Some(email.to_string());
        state.changed = true;
    }

    /// Vide la session et abandonne sa clé.
    pub fn flush(&self) {
        let mut state = self.0.borrow_mut();
        if let Some(old) = state.key.take() {
            state.purged_key.get_or_insert(old);
        }
        state.data = SessionData::default();
        state.changed = false;
    }

    pub fn add_message(&self, level: MessageLevel, text: impl Into<String>) {
        let mut state = self.0.borrow_mut();
        state.data.messages.push(FlashMessage {
            level,
            text: text.into(),
        });
        state.changed = true;
    }

    pub fn success(&self, text: impl Into<String>) {
        self.add_message(MessageLevel::Success, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.add_message(MessageLevel::Error, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.add_message(MessageLevel::Warning, text);
    }

    /// Retire les messages en attente (consommés par le rendu d'une page).
    pub fn take_messages(&self) -> Vec<FlashMessage> {
        let mut state = self.0.borrow_mut();
        if state.data.messages.is_empty() {
            return Vec::new();
        }
        state.changed = true;
        std::mem::take(&mut state.data.messages)
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().data == SessionData::default()
    }

    pub fn changes(&self) -> SessionChanges {
        let state = self.0.borrow();
        let save = if state.changed {
            Some((state.key.clone(), state.data.clone()))
        } else {
            None
        };
        SessionChanges {
            purge: state.purged_key.clone(),
            save,
        }
    }
}

impl FromRequest for Session {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Session::from_req(req)))
    }
}

/// Charge la session depuis le cookie, exécute le handler puis persiste les changements.
/// Une erreur de stockage est loguée: la réponse du handler est conservée.
pub async fn session_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let Some(store) = req.app_data::<web::Data<SessionStore>>().cloned() else {
        return next.call(req).await;
    };

    let cookie_value = req
        .cookie(&store.config().cookie_name)
        .map(|cookie| cookie.value().to_string());

    let session = match cookie_value {
        Some(key) => match store.load(&key).await {
            Ok(Some(data)) => Session::new(Some(key), data),
            Ok(None) => Session::default(),
            Err(e) => {
                error!("Failed to load session: {}", e);
                Session::default()
            }
        },
        None => Session::default(),
    };

    req.extensions_mut().insert(session.clone());

    let mut res = next.call(req).await?;

    let changes = session.changes();

    if let Some(old_key) = &changes.purge {
        if let Err(e) = store.delete(old_key).await {
            error!("Failed to delete session: {}", e);
        }
    }

    match changes.save {
        // Session vidée (messages consommés): la ligne est supprimée
        Some((key, data)) if data == SessionData::default() => {
            if let Some(key) = &key {
                if let Err(e) = store.delete(key).await {
                    error!("Failed to delete session: {}", e);
                }
            }
            if key.is_some() || changes.purge.is_some() {
                res.response_mut()
                    .add_removal_cookie(&session_cookie(store.config(), String::new()))
                    .map_err(actix_web::error::ErrorInternalServerError)?;
            }
        }
        Some((key, data)) => match store.save(key.as_deref(), &data).await {
            Ok(key) => {
                res.response_mut()
                    .add_cookie(&session_cookie(store.config(), key))
                    .map_err(actix_web::error::ErrorInternalServerError)?;
            }
            Err(e) => error!("Failed to save session: {}", e),
        },
        None if changes.purge.is_some() => {
            res.response_mut()
                .add_removal_cookie(&session_cookie(store.config(), String::new()))
                .map_err(actix_web::error::ErrorInternalServerError)?;
        }
        None => {}
    }

    Ok(res)
}

fn session_cookie(config: &SessionConfig, value: String) -> Cookie<'static> {
    Cookie::build(config.cookie_name.clone(), value)
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(config.cookie_age_secs))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_session_has_no_changes() {
        let session = Session::new(Some("k".into()), SessionData::default());
        assert_eq!(
            session.changes(),
            SessionChanges {
                purge: None,
                save: None
            }
        );
    }

    #[test]
    fn test_flush_purges_key_and_clears_data() {
        let session = Session::new(
            Some("k".into()),
            SessionData {
                user_id: Some("id".into()),
                user_email: Some("a@b.com".into()),
                messages: vec![],
            },
        );

        session.flush();

        assert!(session.is_empty());
        assert_eq!(session.user_id(), None);
        assert_eq!(session.changes().purge.as_deref(), Some("k"));
        assert_eq!(session.changes().save, None);
    }

    #[test]
    fn test_message_after_flush_lands_in_a_fresh_session() {
        let session = Session::new(Some("k".into()), SessionData::default());
        session.flush();
        session.error("Invalid session. Please log in again.");

        let changes = session.changes();
        assert_eq!(changes.purge.as_deref(), Some("k"));
        let (key, data) = changes.save.unwrap();
        assert_eq!(key, None);
        assert_eq!(data.user_id, None);
        assert_eq!(data.messages.len(), 1);
    }

    #[test]
    fn test_login_rotates_key() {
        let session = Session::new(Some("anonymous-key".into()), SessionData::default());
        session.set_identity("4f9c3f3e-6a43-4b59-9a39-1f6f0f6c8c11", "a@b.com");

        let changes = session.changes();
        assert_eq!(changes.purge.as_deref(), Some("anonymous-key"));
        let (key, data) = changes.save.unwrap();
        assert_eq!(key, None);
        assert_eq!(data.user_email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_take_messages_drains() {
        let session = Session::default();
        session.success("Login successful!");
        session.warning("Careful");

        let messages = session.take_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].level, MessageLevel::Success);
        assert!(session.take_messages().is_empty());
    }
}
