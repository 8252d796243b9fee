use actix_web::{get, post, route, web, HttpResponse};
use sea_orm::DatabaseConnection;
use tracing::error;

use crate::middleware::auth::LOGIN_PATH;
use crate::middleware::Session;
use crate::models::dto::{LoginForm, UserForm};
use crate::responses::{Page, Renderer, flash_all, flash_error, redirect};
use crate::services::identity_service::IdentityService;
use crate::services::login_service::{LoginOutcome, LoginService};
use crate::services::user_service::UserService;
use crate::services::validation::validate_new_user;

pub const DASHBOARD_PATH: &str = "/dashboard/";

/// GET / - Redirige vers le tableau de bord ou la page de login
#[get("/")]
pub async fn index(session: Session) -> HttpResponse {
    if session.user_id().is_some() {
        redirect(DASHBOARD_PATH)
    } else {
        redirect(LOGIN_PATH)
    }
}

/// GET /login/ - Formulaire de connexion (PUBLIC)
#[get("/login/")]
pub async fn login_page(renderer: web::Data<dyn Renderer>, session: Session) -> HttpResponse {
    Page::new("login.html").render(renderer.get_ref(), &session)
}

/// POST /login/ - Se connecter (PUBLIC)
#[post("/login/")]
pub async fn login(
    form: web::Form<LoginForm>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let form = form.into_inner();
    let page = || Page::new("login.html").with("form", &form);

    if form.email.is_empty() || form.password.is_empty() {
        session.error("Please provide both email and password.");
        return page().render(renderer.get_ref(), &session);
    }

    match LoginService::authenticate(db.get_ref(), &form.email, &form.password).await {
        Ok(LoginOutcome::Authenticated(user)) => {
            IdentityService::login(&session, &user);
            session.success("Login successful!");
            redirect(DASHBOARD_PATH)
        }
        Ok(outcome) => {
            session.error(outcome.message());
            page().render(renderer.get_ref(), &session)
        }
        Err(err) => {
            flash_error(&session, &err, "logging in");
            page().render(renderer.get_ref(), &session)
        }
    }
}

/// GET /register/ - Formulaire d'inscription (PUBLIC)
#[get("/register/")]
pub async fn register_page(renderer: web::Data<dyn Renderer>, session: Session) -> HttpResponse {
    Page::new("register.html").render(renderer.get_ref(), &session)
}

/// POST /register/ - Créer un compte non-admin (PUBLIC)
#[post("/register/")]
pub async fn register(
    form: web::Form<UserForm>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let form = form.into_inner();
    let page = || Page::new("register.html").with("form", &form);

    // Le drapeau admin n'est jamais accepté à l'inscription
    let new_user = match validate_new_user(&form, false) {
        Ok(new_user) => new_user,
        Err(messages) => {
            flash_all(&session, messages);
            return page().render(renderer.get_ref(), &session);
        }
    };

    match UserService::create(db.get_ref(), new_user).await {
        Ok(_) => {
            session.success("Registration successful! Please log in.");
            redirect(LOGIN_PATH)
        }
        Err(err) => {
            flash_error(&session, &err, "registering");
            page().render(renderer.get_ref(), &session)
        }
    }
}

/// GET|POST /logout/ - Se déconnecter
#[route("/logout/", method = "GET", method = "POST")]
pub async fn logout(db: web::Data<DatabaseConnection>, session: Session) -> HttpResponse {
    if let Err(e) = IdentityService::logout(db.get_ref(), &session).await {
        error!("Failed to record logout: {}", e);
    }
    session.success("Logout successful!");
    redirect(LOGIN_PATH)
}

/// GET /unauthorized/ - Accès refusé
#[get("/unauthorized/")]
pub async fn unauthorized(renderer: web::Data<dyn Renderer>, session: Session) -> HttpResponse {
    Page::new("unauthorized.html").render(renderer.get_ref(), &session)
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(login_page)
        .service(login)
        .service(register_page)
        .service(register)
        .service(logout)
        .service(unauthorized);
}
