use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::{AdminUser, Session};
use crate::models::dto::{ToggleLockForm, UpdateUserForm, UserForm};
use crate::responses::{Page, Renderer, flash_all, flash_error, not_found, redirect};
use crate::services::user_service::UserService;
use crate::services::validation::{validate_new_user, validate_user_update};

pub const LIST_USERS_PATH: &str = "/list-users/";

/// GET /add-user/ - Formulaire d'ajout (ADMIN)
#[get("/add-user/")]
pub async fn add_user_page(
    _admin: AdminUser,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    Page::new("add_user.html").render(renderer.get_ref(), &session)
}

/// POST /add-user/ - Créer un compte, admin ou non (ADMIN)
#[post("/add-user/")]
pub async fn add_user(
    _admin: AdminUser,
    form: web::Form<UserForm>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let form = form.into_inner();
    let page = || Page::new("add_user.html").with("form", &form);

    let new_user = match validate_new_user(&form, true) {
        Ok(new_user) => new_user,
        Err(messages) => {
            flash_all(&session, messages);
            return page().render(renderer.get_ref(), &session);
        }
    };

    match UserService::create(db.get_ref(), new_user).await {
        Ok(_) => {
            session.success("User added successfully!");
            redirect(LIST_USERS_PATH)
        }
        Err(err) => {
            flash_error(&session, &err, "adding the user");
            page().render(renderer.get_ref(), &session)
        }
    }
}

/// GET /list-users/ - Tous les comptes (ADMIN)
#[get("/list-users/")]
pub async fn list_users(
    _admin: AdminUser,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let users = match UserService::list(db.get_ref()).await {
        Ok(users) => users,
        Err(err) => {
            flash_error(&session, &err, "loading users");
            Vec::new()
        }
    };

    Page::new("list_users.html")
        .with("users", &users)
        .render(renderer.get_ref(), &session)
}

/// POST /delete-user/{id}/ - Supprimer un compte non-admin (ADMIN)
#[post("/delete-user/{id}/")]
pub async fn delete_user(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match UserService::delete(db.get_ref(), path.into_inner()).await {
        Ok(_) => session.success("User deleted successfully!"),
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => flash_error(&session, &err, "deleting the user"),
    }
    redirect(LIST_USERS_PATH)
}

#[get("/delete-user/{id}/")]
pub async fn delete_user_wrong_method(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match UserService::find(db.get_ref(), path.into_inner()).await {
        Ok(user) if user.is_admin => session.error("Admin users cannot be deleted."),
        Ok(_) => session.warning("Invalid request method for deleting a user."),
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => flash_error(&session, &err, "deleting the user"),
    }
    redirect(LIST_USERS_PATH)
}

/// GET /update-user/{id}/ - Formulaire d'édition (ADMIN)
#[get("/update-user/{id}/")]
pub async fn update_user_page(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match UserService::find(db.get_ref(), path.into_inner()).await {
        Ok(user) => Page::new("update_user.html")
            .with("user", &user)
            .render(renderer.get_ref(), &session),
        Err(AppError::NotFound(_)) => not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "loading the user");
            redirect(LIST_USERS_PATH)
        }
    }
}

/// POST /update-user/{id}/ - Modifier email, noms, drapeau admin et mot de passe (ADMIN)
#[post("/update-user/{id}/")]
pub async fn update_user(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    form: web::Form<UpdateUserForm>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let id = path.into_inner();
    let form = form.into_inner();

    let user = match UserService::find(db.get_ref(), id).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "updating the user");
            return redirect(LIST_USERS_PATH);
        }
    };
    let page = || {
        Page::new("update_user.html")
            .with("user", &user)
            .with("form", &form)
    };

    let changes = match validate_user_update(&form) {
        Ok(changes) => changes,
        Err(messages) => {
            flash_all(&session, messages);
            return page().render(renderer.get_ref(), &session);
        }
    };

    match UserService::update(db.get_ref(), id, changes).await {
        Ok(_) => {
            session.success("User updated successfully!");
            redirect(LIST_USERS_PATH)
        }
        Err(AppError::NotFound(_)) => not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "updating the user");
            page().render(renderer.get_ref(), &session)
        }
    }
}

/// POST /toggle-lock-user/{id}/ - Verrouiller ou déverrouiller un compte (ADMIN)
#[post("/toggle-lock-user/{id}/")]
pub async fn toggle_lock_user(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    form: web::Form<ToggleLockForm>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let lock = form.lock();
    match UserService::set_lock(db.get_ref(), path.into_inner(), lock).await {
        Ok(user) => session.success(format!(
            "User {} has been {}.",
            user.email,
            if lock { "locked" } else { "unlocked" }
        )),
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => flash_error(&session, &err, "updating the lock status"),
    }
    redirect(LIST_USERS_PATH)
}

#[get("/toggle-lock-user/{id}/")]
pub async fn toggle_lock_user_wrong_method(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match UserService::find(db.get_ref(), path.into_inner()).await {
        Ok(_) => session.warning("Invalid request method for toggling user lock status."),
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => flash_error(&session, &err, "updating the lock status"),
    }
    redirect(LIST_USERS_PATH)
}

pub fn users_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(add_user_page)
        .service(add_user)
        .service(list_users)
        .service(delete_user)
        .service(delete_user_wrong_method)
        .service(update_user_page)
        .service(update_user)
        .service(toggle_lock_user)
        .service(toggle_lock_user_wrong_method);
}
