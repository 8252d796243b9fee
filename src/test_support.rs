// Utilitaires partagés par les tests unitaires (compilés uniquement en test)

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::db::{create_schema, establish_connection};
use crate::models::students::{self, StudentLevel};
use crate::models::{learning_paths, users};
use crate::utils::password::hash_password;

/// Base SQLite en mémoire avec le schéma complet.
pub async fn test_connection() -> DatabaseConnection {
    let db = establish_connection("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    create_schema(&db)
        .await
        .expect("Failed to create test schema");
    db
}

pub async fn insert_user(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    is_admin: bool,
) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password: Set(hash_password(password).expect("hash")),
        first_name: Set(None),
        last_name: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        is_active: Set(true),
        is_admin: Set(is_admin),
        last_login: Set(None),
        last_logout: Set(None),
        failed_login_attempts: Set(0),
        is_locked: Set(false),
    }
    .insert(db)
    .await
    .expect("Failed to insert user")
}

pub async fn insert_student(db: &DatabaseConnection, student_id: &str) -> students::Model {
    students::ActiveModel {
        id: Set(Uuid::new_v4()),
        student_id: Set(student_id.to_string()),
        first_name: Set("Ada".to_string()),
        last_name: Set("Lovelace".to_string()),
        photo: Set(None),
        created_at: Set(Utc::now()),
        level: Set(StudentLevel::default()),
    }
    .insert(db)
    .await
    .expect("Failed to insert student")
}

/// Insère une étape directement, sans passer par le moteur d'ordre.
pub async fn insert_stage(
    db: &DatabaseConnection,
    student: &students::Model,
    order: i32,
) -> learning_paths::Model {
    let start = Utc::now() - Duration::days(3);
    learning_paths::ActiveModel {
        student_id: Set(student.id),
        task_name: Set(format!("Stage {}", order)),
        start_date: Set(start),
        estimated_end_date: Set(start + Duration::days(7)),
        used_leave: Set(None),
        notes: Set(None),
        required_duration: Set("1 week".to_string()),
        is_completed: Set(false),
        order: Set(order),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert learning path")
}
