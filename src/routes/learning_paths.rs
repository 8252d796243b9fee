use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::{AdminUser, Session};
use crate::models::dto::LearningPathForm;
use crate::responses::{
    Page, Renderer, flash_all, flash_error, json_error, json_success, not_found, redirect,
};
use crate::routes::auth::DASHBOARD_PATH;
use crate::services::learning_path_service::LearningPathService;
use crate::services::student_service::StudentService;
use crate::services::validation::{PathMode, validate_learning_path};

/// GET /manage-learning-paths/ - Étudiants par niveau avec leurs étapes (ADMIN)
#[get("/manage-learning-paths/")]
pub async fn manage_learning_paths(
    _admin: AdminUser,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let grouped = match StudentService::by_level(db.get_ref()).await {
        Ok(grouped) => grouped,
        Err(err) => {
            flash_error(&session, &err, "loading learning paths");
            Default::default()
        }
    };

    Page::new("manage_learning_paths.html")
        .with("cozmaz_students", &grouped.cozmaz_students)
        .with("kidemli_students", &grouped.kidemli_students)
        .render(renderer.get_ref(), &session)
}

/// GET /add-learning-path/{student}/ - Formulaire d'ajout d'étape (ADMIN)
#[get("/add-learning-path/{student}/")]
pub async fn add_learning_path_page(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match StudentService::find(db.get_ref(), path.into_inner()).await {
        Ok(student) => Page::new("add_learning_path.html")
            .with("form", LearningPathForm::default())
            .with("student", &student)
            .render(renderer.get_ref(), &session),
        Err(AppError::NotFound(_)) => not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "loading the student");
            redirect(DASHBOARD_PATH)
        }
    }
}

/// POST /add-learning-path/{student}/ - Ajouter une étape en fin de parcours (ADMIN)
#[post("/add-learning-path/{student}/")]
pub async fn add_learning_path(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    form: web::Form<LearningPathForm>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let student_id = path.into_inner();
    let form = form.into_inner();

    let student = match StudentService::find(db.get_ref(), student_id).await {
        Ok(student) => student,
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "adding the learning path");
            return redirect(DASHBOARD_PATH);
        }
    };
    let page = || {
        Page::new("add_learning_path.html")
            .with("form", &form)
            .with("student", &student)
    };

    let mode = PathMode::Create {
        today: Utc::now().date_naive(),
    };
    let input = match validate_learning_path(&form, mode) {
        Ok(input) => input,
        Err(messages) => {
            flash_all(&session, messages);
            return page().render(renderer.get_ref(), &session);
        }
    };

    match LearningPathService::add_stage(db.get_ref(), student.id, input).await {
        Ok(_) => {
            session.success(format!(
                "New learning path stage added to {} {}!",
                student.first_name, student.last_name
            ));
            redirect(DASHBOARD_PATH)
        }
        Err(AppError::NotFound(_)) => not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "adding the learning path");
            page().render(renderer.get_ref(), &session)
        }
    }
}

/// POST /complete-learning-path/{id}/ - Marquer une étape comme terminée (ADMIN)
#[post("/complete-learning-path/{id}/")]
pub async fn complete_learning_path(
    _admin: AdminUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match LearningPathService::mark_completed(db.get_ref(), path.into_inner()).await {
        Ok(_) => session.success("Learning path marked as completed!"),
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => flash_error(&session, &err, "completing the learning path"),
    }
    redirect(DASHBOARD_PATH)
}

#[get("/complete-learning-path/{id}/")]
pub async fn complete_learning_path_wrong_method(
    _admin: AdminUser,
    session: Session,
) -> HttpResponse {
    session.warning("Invalid request method for completing a learning path.");
    redirect(DASHBOARD_PATH)
}

/// POST /delete-learning-path/{id}/ - Supprimer une étape (ADMIN, appel asynchrone)
#[post("/delete-learning-path/{id}/")]
pub async fn delete_learning_path(
    _admin: AdminUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    session: Session,
) -> HttpResponse {
    match LearningPathService::delete(db.get_ref(), path.into_inner()).await {
        Ok(()) => {
            session.success("Learning path stage deleted successfully.");
            json_success()
        }
        Err(err) => {
            if err.is_unexpected() {
                flash_error(&session, &err, "deleting the learning path stage");
            } else {
                for message in err.user_messages() {
                    session.error(format!("Error deleting learning path stage: {}", message));
                }
            }
            json_error(&err)
        }
    }
}

/// GET /update-learning-path/{id}/ - Formulaire d'édition pré-rempli (ADMIN)
#[get("/update-learning-path/{id}/")]
pub async fn update_learning_path_page(
    _admin: AdminUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match LearningPathService::find(db.get_ref(), path.into_inner()).await {
        Ok(stage) => Page::new("update_learning_path.html")
            .with("form", LearningPathForm::from(&stage))
            .with("path_id", stage.id)
            .render(renderer.get_ref(), &session),
        Err(AppError::NotFound(_)) => not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "loading the learning path");
            redirect(DASHBOARD_PATH)
        }
    }
}

/// POST /update-learning-path/{id}/ - Modifier une étape (ADMIN, appel asynchrone)
#[post("/update-learning-path/{id}/")]
pub async fn update_learning_path(
    _admin: AdminUser,
    path: web::Path<i32>,
    form: web::Form<LearningPathForm>,
    db: web::Data<DatabaseConnection>,
    session: Session,
) -> HttpResponse {
    let path_id = path.into_inner();

    if let Err(err) = LearningPathService::find(db.get_ref(), path_id).await {
        return json_error(&err);
    }

    let input = match validate_learning_path(&form, PathMode::Edit) {
        Ok(input) => input,
        Err(messages) => return json_error(&AppError::Validation(messages)),
    };

    match LearningPathService::update(db.get_ref(), path_id, input).await {
        Ok(_) => {
            session.success("Learning path stage updated successfully.");
            json_success()
        }
        Err(err) => json_error(&err),
    }
}

pub fn learning_paths_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(manage_learning_paths)
        .service(add_learning_path_page)
        .service(add_learning_path)
        .service(complete_learning_path)
        .service(complete_learning_path_wrong_method)
        .service(delete_learning_path)
        .service(update_learning_path_page)
        .service(update_learning_path);
}
