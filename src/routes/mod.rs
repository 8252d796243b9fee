pub mod auth;
pub mod dashboard;
pub mod health;
pub mod learning_paths;
pub mod students;
pub mod users;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").service(health::health_check))
        .configure(auth::auth_routes)
        .configure(dashboard::dashboard_routes)
        .configure(users::users_routes)
        .configure(students::students_routes)
        .configure(learning_paths::learning_paths_routes);
}
