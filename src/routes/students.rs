use actix_multipart::form::MultipartForm;
use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::{AdminUser, Session};
use crate::models::dto::{StudentForm, StudentUpload};
use crate::responses::{Page, Renderer, flash_all, flash_error, not_found, redirect};
use crate::services::photo_storage::PhotoStorage;
use crate::services::student_service::StudentService;
use crate::services::validation::validate_student;

pub const LIST_STUDENT_PATH: &str = "/list-student/";

/// GET /add-student/ - Formulaire d'ajout (ADMIN)
#[get("/add-student/")]
pub async fn add_student_page(
    _admin: AdminUser,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    Page::new("add_student.html")
        .with("form", StudentForm::default())
        .render(renderer.get_ref(), &session)
}

/// POST /add-student/ - Créer un étudiant, photo optionnelle (ADMIN)
#[post("/add-student/")]
pub async fn add_student(
    _admin: AdminUser,
    MultipartForm(upload): MultipartForm<StudentUpload>,
    db: web::Data<DatabaseConnection>,
    storage: web::Data<PhotoStorage>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let form = match upload.into_form().await {
        Ok(form) => form,
        Err(err) => {
            flash_error(&session, &AppError::Storage(err), "adding the student");
            return Page::new("add_student.html")
                .with("form", StudentForm::default())
                .render(renderer.get_ref(), &session);
        }
    };
    let page = || Page::new("add_student.html").with("form", &form);

    let input = match validate_student(&form) {
        Ok(input) => input,
        Err(messages) => {
            flash_all(&session, messages);
            return page().render(renderer.get_ref(), &session);
        }
    };

    match StudentService::create(db.get_ref(), storage.get_ref(), input).await {
        Ok(_) => {
            session.success("Student added successfully!");
            redirect(LIST_STUDENT_PATH)
        }
        Err(err) => {
            flash_error(&session, &err, "adding the student");
            page().render(renderer.get_ref(), &session)
        }
    }
}

/// GET /list-student/ - Tous les étudiants, du plus récent au plus ancien (ADMIN)
#[get("/list-student/")]
pub async fn list_student(
    _admin: AdminUser,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let students = match StudentService::list(db.get_ref()).await {
        Ok(students) => students,
        Err(err) => {
            flash_error(&session, &err, "loading students");
            Vec::new()
        }
    };

    Page::new("list_student.html")
        .with("students", &students)
        .render(renderer.get_ref(), &session)
}

/// POST /delete-student/{id}/ - Supprimer un étudiant et son parcours (ADMIN)
#[post("/delete-student/{id}/")]
pub async fn delete_student(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
    storage: web::Data<PhotoStorage>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match StudentService::delete(db.get_ref(), storage.get_ref(), path.into_inner()).await {
        Ok(_) => session.success("Student deleted successfully!"),
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => flash_error(&session, &err, "deleting the student"),
    }
    redirect(LIST_STUDENT_PATH)
}

#[get("/delete-student/{id}/")]
pub async fn delete_student_wrong_method(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match StudentService::find(db.get_ref(), path.into_inner()).await {
        Ok(_) => session.warning("Invalid request method for deleting a student."),
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => flash_error(&session, &err, "deleting the student"),
    }
    redirect(LIST_STUDENT_PATH)
}

/// GET /update-student/{id}/ - Formulaire d'édition pré-rempli (ADMIN)
#[get("/update-student/{id}/")]
pub async fn update_student_page(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    match StudentService::find(db.get_ref(), path.into_inner()).await {
        Ok(student) => Page::new("update_student.html")
            .with("form", StudentForm::from(&student))
            .with("student", &student)
            .render(renderer.get_ref(), &session),
        Err(AppError::NotFound(_)) => not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "loading the student");
            redirect(LIST_STUDENT_PATH)
        }
    }
}

/// POST /update-student/{id}/ - Modifier un étudiant, remplacer sa photo (ADMIN)
#[post("/update-student/{id}/")]
pub async fn update_student(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    MultipartForm(upload): MultipartForm<StudentUpload>,
    db: web::Data<DatabaseConnection>,
    storage: web::Data<PhotoStorage>,
    renderer: web::Data<dyn Renderer>,
    session: Session,
) -> HttpResponse {
    let id = path.into_inner();

    let student = match StudentService::find(db.get_ref(), id).await {
        Ok(student) => student,
        Err(AppError::NotFound(_)) => return not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "updating the student");
            return redirect(LIST_STUDENT_PATH);
        }
    };
    let form = match upload.into_form().await {
        Ok(form) => form,
        Err(err) => {
            flash_error(&session, &AppError::Storage(err), "updating the student");
            return redirect(LIST_STUDENT_PATH);
        }
    };
    let page = || {
        Page::new("update_student.html")
            .with("form", &form)
            .with("student", &student)
    };

    let input = match validate_student(&form) {
        Ok(input) => input,
        Err(messages) => {
            flash_all(&session, messages);
            return page().render(renderer.get_ref(), &session);
        }
    };

    match StudentService::update(db.get_ref(), storage.get_ref(), id, input).await {
        Ok(_) => {
            session.success("Student updated successfully!");
            redirect(LIST_STUDENT_PATH)
        }
        Err(AppError::NotFound(_)) => not_found(renderer.get_ref(), &session),
        Err(err) => {
            flash_error(&session, &err, "updating the student");
            page().render(renderer.get_ref(), &session)
        }
    }
}

pub fn students_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(add_student_page)
        .service(add_student)
        .service(list_student)
        .service(delete_student)
        .service(delete_student_wrong_method)
        .service(update_student_page)
        .service(update_student);
}
