use chrono::Utc;
use sea_orm::*;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::errors::{AppError, AppResult};
use crate::models::dto::StudentInput;
use crate::models::learning_paths::{self, Column as PathColumn, Entity as LearningPaths};
use crate::models::students::{self, Column as StudentColumn, Entity as Students, StudentLevel};
use crate::services::photo_storage::PhotoStorage;

pub const DUPLICATE_STUDENT_ID: &str = "Student ID already exists.";

/// Étudiant avec ses étapes, triées par ordre.
#[derive(Debug, Clone, Serialize)]
pub struct StudentWithPaths {
    #[serde(flatten)]
    pub student: students::Model,
    pub learning_paths: Vec<learning_paths::Model>,
}

/// Étudiants répartis par niveau, pour le tableau de bord.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentsByLevel {
    pub cozmaz_students: Vec<StudentWithPaths>,
    pub kidemli_students: Vec<StudentWithPaths>,
}

pub struct StudentService;

impl StudentService {
    /// Tous les étudiants, du plus récent au plus ancien.
    pub async fn list(db: &DatabaseConnection) -> AppResult<Vec<students::Model>> {
        let students = Students::find()
            .order_by_desc(StudentColumn::CreatedAt)
            .all(db)
            .await?;
        Ok(students)
    }

    pub async fn find(db: &DatabaseConnection, id: Uuid) -> AppResult<students::Model> {
        Students::find_by_id(id)
            .one(db)
            .await?
            .ok_or(AppError::NotFound("student"))
    }

    pub async fn by_level(db: &DatabaseConnection) -> AppResult<StudentsByLevel> {
        let students = Self::list(db).await?;
        let paths = students
            .load_many(LearningPaths::find().order_by_asc(PathColumn::Order), db)
            .await?;

        let mut grouped = StudentsByLevel::default();
        for (student, learning_paths) in students.into_iter().zip(paths) {
            let entry = StudentWithPaths {
                student,
                learning_paths,
            };
            match entry.student.level {
                StudentLevel::Cozmez => grouped.cozmaz_students.push(entry),
                StudentLevel::Kidemli => grouped.kidemli_students.push(entry),
            }
        }
        Ok(grouped)
    }

    async fn student_id_taken(
        db: &DatabaseConnection,
        student_id: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, DbErr> {
        let mut query = Students::find().filter(StudentColumn::StudentId.eq(student_id));
        if let Some(id) = exclude {
            query = query.filter(StudentColumn::Id.ne(id));
        }
        Ok(query.one(db).await?.is_some())
    }

    pub async fn create(
        db: &DatabaseConnection,
        storage: &PhotoStorage,
        input: StudentInput,
    ) -> AppResult<students::Model> {
        if Self::student_id_taken(db, &input.student_id, None).await? {
            return Err(AppError::Conflict(DUPLICATE_STUDENT_ID.to_string()));
        }

        let photo = match &input.photo {
            Some(upload) => Some(
                storage
                    .store(&input.student_id, &upload.file_name, &upload.bytes)
                    .await?,
            ),
            None => None,
        };

        let result = students::ActiveModel {
            id: Set(Uuid::new_v4()),
            student_id: Set(input.student_id.clone()),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            photo: Set(photo.clone()),
            created_at: Set(Utc::now()),
            level: Set(input.level.unwrap_or_default()),
        }
        .insert(db)
        .await;

        match result {
            Ok(student) => {
                info!("Student added: {}", student.student_id);
                Ok(student)
            }
            Err(err) => {
                if let Some(path) = &photo {
                    discard_photo(storage, path).await;
                }
                Err(conflict_or(err))
            }
        }
    }

    /// Met à jour un étudiant. Une nouvelle photo est écrite avant la mise à
    /// jour de la ligne; l'ancienne n'est supprimée qu'après.
    pub async fn update(
        db: &DatabaseConnection,
        storage: &PhotoStorage,
        id: Uuid,
        input: StudentInput,
    ) -> AppResult<students::Model> {
        let student = Self::find(db, id).await?;
        if Self::student_id_taken(db, &input.student_id, Some(id)).await? {
            return Err(AppError::Conflict(DUPLICATE_STUDENT_ID.to_string()));
        }

        let old_photo = student.photo.clone();
        let new_photo = match &input.photo {
            Some(upload) => Some(
                storage
                    .store(&input.student_id, &upload.file_name, &upload.bytes)
                    .await?,
            ),
            None => None,
        };

        let mut active_model: students::ActiveModel = student.into();
        active_model.student_id = Set(input.student_id);
        active_model.first_name = Set(input.first_name);
        active_model.last_name = Set(input.last_name);
        if let Some(level) = input.level {
            active_model.level = Set(level);
        }
        if let Some(path) = &new_photo {
            active_model.photo = Set(Some(path.clone()));
        }

        match active_model.update(db).await {
            Ok(updated) => {
                if let (Some(new), Some(old)) = (&new_photo, &old_photo) {
                    if new != old {
                        discard_photo(storage, old).await;
                    }
                }
                info!("Student updated: {}", updated.student_id);
                Ok(updated)
            }
            Err(err) => {
                if let Some(new) = &new_photo {
                    if old_photo.as_ref() != Some(new) {
                        discard_photo(storage, new).await;
                    }
                }
                Err(conflict_or(err))
            }
        }
    }

    /// Supprime l'étudiant et ses étapes dans une même transaction.
    /// La photo est retirée après le commit.
    pub async fn delete(
        db: &DatabaseConnection,
        storage: &PhotoStorage,
        id: Uuid,
    ) -> AppResult<students::Model> {
        let txn = db.begin().await?;

        let student = Students::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("student"))?;

        let removed = LearningPaths::delete_many()
            .filter(PathColumn::StudentId.eq(id))
            .exec(&txn)
            .await?;
        Students::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        if let Some(path) = &student.photo {
            discard_photo(storage, path).await;
        }

        info!(
            "Student deleted: {} ({} learning paths)",
            student.student_id, removed.rows_affected
        );
        Ok(student)
    }
}

fn conflict_or(err: DbErr) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(DUPLICATE_STUDENT_ID.to_string())
    } else {
        AppError::Database(err)
    }
}

async fn discard_photo(storage: &PhotoStorage, path: &str) {
    if let Err(e) = storage.delete(path).await {
        warn!("Failed to remove photo {}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dto::PhotoUpload;
    use crate::test_support::{insert_stage, insert_student, test_connection};
    use tempfile::TempDir;

    fn input(student_id: &str) -> StudentInput {
        StudentInput {
            student_id: student_id.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            level: None,
            photo: None,
        }
    }

    fn with_photo(student_id: &str, file_name: &str, bytes: &[u8]) -> StudentInput {
        StudentInput {
            photo: Some(PhotoUpload {
                file_name: file_name.to_string(),
                bytes: bytes.to_vec(),
            }),
            ..input(student_id)
        }
    }

    fn storage() -> (TempDir, PhotoStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = PhotoStorage::new(temp_dir.path());
        (temp_dir, storage)
    }

    #[tokio::test]
    async fn test_create_with_default_level_and_photo() {
        let db = test_connection().await;
        let (_temp, storage) = storage();

        let student = StudentService::create(&db, &storage, with_photo("S-001", "me.png", b"img"))
            .await
            .unwrap();

        assert_eq!(student.level, StudentLevel::Cozmez);
        let photo = student.photo.unwrap();
        assert!(photo.starts_with("student_photos/S-001_"));
        assert!(storage.media_root().join(&photo).exists());
    }

    #[tokio::test]
    async fn test_duplicate_student_id_is_a_conflict() {
        let db = test_connection().await;
        let (_temp, storage) = storage();
        StudentService::create(&db, &storage, input("S-001")).await.unwrap();

        let err = StudentService::create(&db, &storage, input("S-001")).await.unwrap_err();
        assert_eq!(err.user_messages(), vec![DUPLICATE_STUDENT_ID]);
    }

    #[tokio::test]
    async fn test_update_excludes_self_from_uniqueness() {
        let db = test_connection().await;
        let (_temp, storage) = storage();
        let ada = StudentService::create(&db, &storage, input("S-001")).await.unwrap();
        StudentService::create(&db, &storage, input("S-002")).await.unwrap();

        let mut same_id = input("S-001");
        same_id.level = Some(StudentLevel::Kidemli);
        let updated = StudentService::update(&db, &storage, ada.id, same_id).await.unwrap();
        assert_eq!(updated.level, StudentLevel::Kidemli);

        let err = StudentService::update(&db, &storage, ada.id, input("S-002")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_replaces_photo() {
        let db = test_connection().await;
        let (_temp, storage) = storage();
        let student = StudentService::create(&db, &storage, with_photo("S-001", "old.png", b"old"))
            .await
            .unwrap();

        let updated = StudentService::update(&db, &storage, student.id, with_photo("S-001", "new.png", b"new"))
            .await
            .unwrap();

        let old = student.photo.unwrap();
        let new = updated.photo.unwrap();
        assert!(new.ends_with("_new.png"));
        assert!(!storage.media_root().join(&old).exists());
        assert!(storage.media_root().join(&new).exists());
    }

    #[tokio::test]
    async fn test_update_without_photo_keeps_existing() {
        let db = test_connection().await;
        let (_temp, storage) = storage();
        let student = StudentService::create(&db, &storage, with_photo("S-001", "me.png", b"img"))
            .await
            .unwrap();

        let updated = StudentService::update(&db, &storage, student.id, input("S-001")).await.unwrap();
        assert_eq!(updated.photo, student.photo);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_learning_paths() {
        let db = test_connection().await;
        let (_temp, storage) = storage();
        let student = insert_student(&db, "S-001").await;
        let other = insert_student(&db, "S-002").await;
        insert_stage(&db, &student, 1).await;
        insert_stage(&db, &student, 2).await;
        insert_stage(&db, &other, 1).await;

        StudentService::delete(&db, &storage, student.id).await.unwrap();

        assert!(Students::find_by_id(student.id).one(&db).await.unwrap().is_none());
        let orphans = LearningPaths::find()
            .filter(PathColumn::StudentId.eq(student.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
        assert_eq!(LearningPaths::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_photo() {
        let db = test_connection().await;
        let (_temp, storage) = storage();
        let student = StudentService::create(&db, &storage, with_photo("S-001", "me.png", b"img"))
            .await
            .unwrap();

        StudentService::delete(&db, &storage, student.id).await.unwrap();
        assert!(!storage.media_root().join(student.photo.unwrap()).exists());

        let missing = StudentService::delete(&db, &storage, student.id).await;
        assert!(matches!(missing, Err(AppError::NotFound("student"))));
    }

    #[tokio::test]
    async fn test_reused_student_id_keeps_photos_apart() {
        let db = test_connection().await;
        let (_temp, storage) = storage();
        let first = StudentService::create(&db, &storage, with_photo("S-001", "a.jpg", b"first-face"))
            .await
            .unwrap();
        // L'identifiant S-001 est libéré puis repris avec le même nom de fichier
        let first = StudentService::update(&db, &storage, first.id, input("S-009")).await.unwrap();
        let second = StudentService::create(&db, &storage, with_photo("S-001", "a.jpg", b"second-face"))
            .await
            .unwrap();

        let first_photo = storage.media_root().join(first.photo.clone().unwrap());
        assert_ne!(first.photo, second.photo);
        assert_eq!(std::fs::read(&first_photo).unwrap(), b"first-face");

        StudentService::delete(&db, &storage, second.id).await.unwrap();
        assert_eq!(std::fs::read(&first_photo).unwrap(), b"first-face");
    }

    #[tokio::test]
    async fn test_by_level_groups_students_with_ordered_paths() {
        let db = test_connection().await;
        let (_temp, storage) = storage();
        let ada = insert_student(&db, "S-001").await;
        let mut senior = input("S-002");
        senior.level = Some(StudentLevel::Kidemli);
        StudentService::create(&db, &storage, senior).await.unwrap();
        insert_stage(&db, &ada, 2).await;
        insert_stage(&db, &ada, 1).await;

        let grouped = StudentService::by_level(&db).await.unwrap();

        assert_eq!(grouped.cozmaz_students.len(), 1);
        assert_eq!(grouped.kidemli_students.len(), 1);
        let orders: Vec<i32> = grouped.cozmaz_students[0]
            .learning_paths
            .iter()
            .map(|p| p.order)
            .collect();
        assert_eq!(orders, vec![1, 2]);
    }
}
