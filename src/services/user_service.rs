use chrono::Utc;
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BootstrapAdmin;
use crate::db::is_unique_violation;
use crate::errors::{AppError, AppResult};
use crate::models::dto::{NewUser, UserChanges};
use crate::models::users::{self, Column as UserColumn, Entity as Users};
use crate::services::lockout::AccountState;
use crate::utils::password;

pub const DUPLICATE_EMAIL: &str = "This email is already registered.";

pub struct UserService;

impl UserService {
    pub async fn list(db: &DatabaseConnection) -> AppResult<Vec<users::Model>> {
        let users = Users::find()
            .order_by_asc(UserColumn::CreatedAt)
            .all(db)
            .await?;
        Ok(users)
    }

    pub async fn find(db: &DatabaseConnection, id: Uuid) -> AppResult<users::Model> {
        Users::find_by_id(id)
            .one(db)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    async fn email_taken(
        db: &DatabaseConnection,
        email: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, DbErr> {
        let mut query = Users::find().filter(UserColumn::Email.eq(email));
        if let Some(id) = exclude {
            query = query.filter(UserColumn::Id.ne(id));
        }
        Ok(query.one(db).await?.is_some())
    }

    /// Crée un compte actif. L'inscription passe toujours `is_admin = false`.
    pub async fn create(db: &DatabaseConnection, new_user: NewUser) -> AppResult<users::Model> {
        if Self::email_taken(db, &new_user.email, None).await? {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        let password_hash = password::hash_password(&new_user.password)?;
        let now = Utc::now();

        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(new_user.email),
            password: Set(password_hash),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            created_at: Set(now),
            updated_at: Set(now),
            is_active: Set(true),
            is_admin: Set(new_user.is_admin),
            last_login: Set(None),
            last_logout: Set(None),
            failed_login_attempts: Set(0),
            is_locked: Set(false),
        }
        .insert(db)
        .await
        .map_err(email_conflict_or)?;

        info!("New user created: {} (admin: {})", user.email, user.is_admin);
        Ok(user)
    }

    /// Modifie email, noms et drapeau admin. Un changement de mot de passe
    /// exige le mot de passe actuel.
    pub async fn update(
        db: &DatabaseConnection,
        id: Uuid,
        changes: UserChanges,
    ) -> AppResult<users::Model> {
        let user = Self::find(db, id).await?;

        if Self::email_taken(db, &changes.email, Some(id)).await? {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        let new_hash = match &changes.password_change {
            Some(change) => {
                if !password::verify_password(&change.current, &user.password) {
                    return Err(AppError::validation("Current password is incorrect."));
                }
                Some(password::hash_password(&change.new)?)
            }
            None => None,
        };

        let mut active_model: users::ActiveModel = user.into();
        active_model.email = Set(changes.email);
        active_model.first_name = Set(changes.first_name);
        active_model.last_name = Set(changes.last_name);
        active_model.is_admin = Set(changes.is_admin);
        if let Some(hash) = new_hash {
            active_model.password = Set(hash);
        }

        let user = active_model.update(db).await.map_err(email_conflict_or)?;
        info!("User updated: {}", user.email);
        Ok(user)
    }

    /// Supprime un compte non-admin. Les comptes admin ne sont jamais supprimés.
    pub async fn delete(db: &DatabaseConnection, id: Uuid) -> AppResult<users::Model> {
        let user = Self::find(db, id).await?;
        if user.is_admin {
            return Err(AppError::Forbidden("Admin users cannot be deleted."));
        }

        Users::delete_by_id(id).exec(db).await?;
        info!("User deleted: {}", user.email);
        Ok(user)
    }

    /// Verrouille ou déverrouille un compte (admin compris); le compteur d'échecs repart de 0.
    pub async fn set_lock(db: &DatabaseConnection, id: Uuid, lock: bool) -> AppResult<users::Model> {
        let user = Self::find(db, id).await?;
        let next = AccountState::from(&user).toggle(lock);

        let mut active_model: users::ActiveModel = user.into();
        active_model.is_locked = Set(next.is_locked);
        active_model.failed_login_attempts = Set(next.failed_login_attempts);
        let user = active_model.update(db).await?;

        info!(
            "User {} {} by admin.",
            user.email,
            if lock { "locked" } else { "unlocked" }
        );
        Ok(user)
    }

    /// Crée le compte admin de démarrage s'il n'existe pas. Retourne `true` si créé.
    pub async fn ensure_bootstrap_admin(
        db: &DatabaseConnection,
        admin: &BootstrapAdmin,
    ) -> AppResult<bool> {
        if let Some(existing) = Users::find()
            .filter(UserColumn::Email.eq(admin.email.as_str()))
            .one(db)
            .await?
        {
            if !existing.is_admin {
                warn!(
                    "Bootstrap admin {} exists but is not an admin; leaving it unchanged.",
                    existing.email
                );
            }
            return Ok(false);
        }

        Self::create(
            db,
            NewUser {
                email: admin.email.clone(),
                password: admin.password.clone(),
                first_name: None,
                last_name: None,
                is_admin: true,
            },
        )
        .await?;
        Ok(true)
    }
}

fn email_conflict_or(err: DbErr) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(DUPLICATE_EMAIL.to_string())
    } else {
        AppError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dto::PasswordChange;
    use crate::test_support::{insert_user, test_connection};

    fn new_user(email: &str, is_admin: bool) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: "Abcdef1!".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            is_admin,
        }
    }

    fn changes(email: &str) -> UserChanges {
        UserChanges {
            email: email.to_string(),
            password_change: None,
            first_name: Some("Grace".to_string()),
            last_name: Some("Hopper".to_string()),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_hashes_password() {
        let db = test_connection().await;

        let user = UserService::create(&db, new_user("a@b.com", false)).await.unwrap();

        assert!(user.password.starts_with("pbkdf2_sha256$"));
        assert!(password::verify_password("Abcdef1!", &user.password));
        assert!(user.is_active);
        assert!(!user.is_locked);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let db = test_connection().await;
        insert_user(&db, "a@b.com", "Abcdef1!", false).await;

        let err = UserService::create(&db, new_user("a@b.com", false)).await.unwrap_err();
        assert_eq!(err.user_messages(), vec![DUPLICATE_EMAIL]);
    }

    #[tokio::test]
    async fn test_update_keeps_own_email_and_rejects_taken_one() {
        let db = test_connection().await;
        let user = insert_user(&db, "a@b.com", "Abcdef1!", false).await;
        insert_user(&db, "taken@b.com", "Abcdef1!", false).await;

        let updated = UserService::update(&db, user.id, changes("a@b.com")).await.unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Grace"));

        let err = UserService::update(&db, user.id, changes("taken@b.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_password_change_requires_correct_current_password() {
        let db = test_connection().await;
        let user = insert_user(&db, "a@b.com", "Abcdef1!", false).await;

        let mut wrong = changes("a@b.com");
        wrong.password_change = Some(PasswordChange {
            current: "Nope-123".to_string(),
            new: "Zyxwvu9?".to_string(),
        });
        let err = UserService::update(&db, user.id, wrong).await.unwrap_err();
        assert_eq!(err.user_messages(), vec!["Current password is incorrect."]);

        let mut right = changes("a@b.com");
        right.password_change = Some(PasswordChange {
            current: "Abcdef1!".to_string(),
            new: "Zyxwvu9?".to_string(),
        });
        let updated = UserService::update(&db, user.id, right).await.unwrap();
        assert!(password::verify_password("Zyxwvu9?", &updated.password));
    }

    #[tokio::test]
    async fn test_admins_cannot_be_deleted() {
        let db = test_connection().await;
        let admin = insert_user(&db, "admin@b.com", "Abcdef1!", true).await;
        let user = insert_user(&db, "a@b.com", "Abcdef1!", false).await;

        let err = UserService::delete(&db, admin.id).await.unwrap_err();
        assert_eq!(err.user_messages(), vec!["Admin users cannot be deleted."]);

        UserService::delete(&db, user.id).await.unwrap();
        assert!(matches!(
            UserService::find(&db, user.id).await,
            Err(AppError::NotFound("user"))
        ));
    }

    #[tokio::test]
    async fn test_set_lock_resets_counter() {
        let db = test_connection().await;
        let user = insert_user(&db, "a@b.com", "Abcdef1!", false).await;
        let mut active_model: users::ActiveModel = user.clone().into();
        active_model.failed_login_attempts = Set(3);
        active_model.update(&db).await.unwrap();

        let locked = UserService::set_lock(&db, user.id, true).await.unwrap();
        assert!(locked.is_locked);
        assert_eq!(locked.failed_login_attempts, 0);

        let unlocked = UserService::set_lock(&db, user.id, false).await.unwrap();
        assert!(!unlocked.is_locked);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_created_once() {
        let db = test_connection().await;
        let admin = BootstrapAdmin {
            email: "root@school.test".to_string(),
            password: "Abcdef1!".to_string(),
        };

        assert!(UserService::ensure_bootstrap_admin(&db, &admin).await.unwrap());
        assert!(!UserService::ensure_bootstrap_admin(&db, &admin).await.unwrap());

        let users = UserService::list(&db).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin);
    }
}
