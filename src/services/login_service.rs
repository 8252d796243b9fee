use chrono::Utc;
use sea_orm::*;
use tokio::task;
use tracing::{info, warn};

use crate::errors::AppResult;
use crate::models::users::{self, Entity as Users, Column as UserColumn};
use crate::services::lockout::{AccountState, LoginDecision};
use crate::utils::password;

/// Résultat d'une tentative de login.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(users::Model),
    /// Email inconnu: même message qu'un mauvais mot de passe.
    UnknownEmail,
    Refused(LoginDecision),
}

impl LoginOutcome {
    pub fn message(&self) -> String {
        match self {
            LoginOutcome::Authenticated(_) => LoginDecision::Accept.message(),
            LoginOutcome::UnknownEmail => LoginDecision::FailExempt.message(),
            LoginOutcome::Refused(decision) => decision.message(),
        }
    }
}

impl From<&users::Model> for AccountState {
    fn from(user: &users::Model) -> Self {
        AccountState {
            is_admin: user.is_admin,
            is_locked: user.is_locked,
            failed_login_attempts: user.failed_login_attempts,
        }
    }
}

pub struct LoginService;

impl LoginService {
    /// Vérifie les identifiants et applique la politique de verrouillage.
    ///
    /// Le hachage PBKDF2 est vérifié hors transaction, sur le pool bloquant.
    /// Le compteur est ensuite lu et écrit sous verrou (`SELECT ... FOR UPDATE`):
    /// deux tentatives concurrentes sur le même compte ne perdent pas d'incrément.
    pub async fn authenticate(
        db: &DatabaseConnection,
        email: &str,
        password_input: &str,
    ) -> AppResult<LoginOutcome> {
        let Some(user) = Users::find()
            .filter(UserColumn::Email.eq(email))
            .one(db)
            .await?
        else {
            return Ok(LoginOutcome::UnknownEmail);
        };

        let mut password_ok = AccountState::from(&user).can_attempt()
            && verify_in_background(password_input, &user.password).await?;
        let checked_hash = user.password;
        let mut new_hash = if password_ok && password::needs_rehash(&checked_hash) {
            Some(hash_in_background(password_input).await?)
        } else {
            None
        };

        let txn = db.begin().await?;

        let Some(user) = Users::find_by_id(user.id)
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            txn.commit().await?;
            return Ok(LoginOutcome::UnknownEmail);
        };

        let state = AccountState::from(&user);
        // Mot de passe changé entre la vérification et le verrou
        if user.password != checked_hash {
            password_ok = state.can_attempt() && verify_in_background(password_input, &user.password).await?;
            new_hash = None;
        }
        let decision = state.decide(password_ok);

        let outcome = match decision {
            LoginDecision::RejectLocked | LoginDecision::FailExempt => {
                LoginOutcome::Refused(decision)
            }
            LoginDecision::Accept => {
                let next = state.apply(decision);

                let mut active_model: users::ActiveModel = user.into();
                active_model.failed_login_attempts = Set(next.failed_login_attempts);
                active_model.last_login = Set(Some(Utc::now()));
                if let Some(hash) = new_hash {
                    active_model.password = Set(hash);
                }

                let updated = active_model.update(&txn).await?;
                info!("User {} logged in successfully.", updated.email);
                LoginOutcome::Authenticated(updated)
            }
            LoginDecision::Fail { locked, .. } => {
                let next = state.apply(decision);

                let mut active_model: users::ActiveModel = user.into();
                active_model.failed_login_attempts = Set(next.failed_login_attempts);
                active_model.is_locked = Set(next.is_locked);
                active_model.update(&txn).await?;

                if locked {
                    warn!("Account {} locked due to too many failed login attempts.", email);
                }
                LoginOutcome::Refused(decision)
            }
        };

        txn.commit().await?;
        Ok(outcome)
    }
}

async fn verify_in_background(password_input: &str, hash: &str) -> AppResult<bool> {
    let (password_input, hash) = (password_input.to_string(), hash.to_string());
    let ok = task::spawn_blocking(move || password::verify_password(&password_input, &hash)).await?;
    Ok(ok)
}

async fn hash_in_background(password_input: &str) -> AppResult<String> {
    let password_input = password_input.to_string();
    let hash = task::spawn_blocking(move || password::hash_password(&password_input)).await??;
    Ok(hash)
}
