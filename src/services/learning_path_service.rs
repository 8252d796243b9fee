use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::errors::{AppError, AppResult};
use crate::models::dto::LearningPathInput;
use crate::models::learning_paths::{self, Column as PathColumn, Entity as LearningPaths};
use crate::models::students::Entity as Students;

/// Nombre de tentatives d'insertion quand l'index unique (student_id, order)
/// refuse l'ordre calculé.
pub const MAX_ORDER_ATTEMPTS: usize = 3;

pub const ORDER_CONFLICT_MESSAGE: &str =
    "Could not assign a position to the new stage. Please try again.";

pub struct LearningPathService;

impl LearningPathService {
    /// Ajoute une étape en fin de parcours: `order = max(order) + 1`, 1 pour la première.
    ///
    /// Le calcul et l'insertion se font dans une transaction qui verrouille la
    /// ligne de l'étudiant; les ajouts concurrents pour un même étudiant sont
    /// donc sérialisés. L'index unique reste le filet de sécurité (SQLite ne
    /// verrouille pas les lignes): un conflit relance la transaction.
    pub async fn add_stage(
        db: &DatabaseConnection,
        student_id: Uuid,
        input: LearningPathInput,
    ) -> AppResult<learning_paths::Model> {
        let input = &input;
        retry_on_order_conflict(student_id, move || Self::try_add_stage(db, student_id, input)).await
    }

    async fn try_add_stage(
        db: &DatabaseConnection,
        student_id: Uuid,
        input: &LearningPathInput,
    ) -> AppResult<learning_paths::Model> {
        let txn = db.begin().await?;

        let student = Students::find_by_id(student_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("student"))?;

        let max_order: Option<i32> = LearningPaths::find()
            .select_only()
            .column_as(PathColumn::Order.max(), "max_order")
            .filter(PathColumn::StudentId.eq(student.id))
            .into_tuple::<Option<i32>>()
            .one(&txn)
            .await?
            .flatten();
        let next_order = max_order.unwrap_or(0) + 1;

        let stage = learning_paths::ActiveModel {
            student_id: Set(student.id),
            task_name: Set(input.task_name.clone()),
            start_date: Set(input.start_date),
            estimated_end_date: Set(input.estimated_end_date),
            used_leave: Set(input.used_leave.clone()),
            notes: Set(input.notes.clone()),
            required_duration: Set(input.required_duration.clone()),
            is_completed: Set(false),
            order: Set(next_order),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            "Learning path added for student {}: {} (order {})",
            student.student_id, stage.task_name, stage.order
        );
        Ok(stage)
    }

    pub async fn find(db: &DatabaseConnection, path_id: i32) -> AppResult<learning_paths::Model> {
        LearningPaths::find_by_id(path_id)
            .one(db)
            .await?
            .ok_or(AppError::NotFound("learning path"))
    }

    /// Marque l'étape comme terminée. Sans effet si elle l'est déjà.
    pub async fn mark_completed(
        db: &DatabaseConnection,
        path_id: i32,
    ) -> AppResult<learning_paths::Model> {
        let stage = Self::find(db, path_id).await?;
        if stage.is_completed {
            return Ok(stage);
        }

        let mut active_model: learning_paths::ActiveModel = stage.into();
        active_model.is_completed = Set(true);
        let stage = active_model.update(db).await?;

        info!("Learning path completed: {}", stage.id);
        Ok(stage)
    }

    /// Remplace les champs modifiables. `order` et `student_id` ne changent jamais ici.
    pub async fn update(
        db: &DatabaseConnection,
        path_id: i32,
        input: LearningPathInput,
    ) -> AppResult<learning_paths::Model> {
        let stage = Self::find(db, path_id).await?;

        let mut active_model: learning_paths::ActiveModel = stage.into();
        active_model.task_name = Set(input.task_name);
        active_model.start_date = Set(input.start_date);
        active_model.estimated_end_date = Set(input.estimated_end_date);
        active_model.required_duration = Set(input.required_duration);
        active_model.used_leave = Set(input.used_leave);
        active_model.notes = Set(input.notes);
        let stage = active_model.update(db).await?;

        info!("Learning path updated: {}", stage.id);
        Ok(stage)
    }

    /// Supprime l'étape. Les autres étapes gardent leur ordre (les trous sont permis).
    pub async fn delete(db: &DatabaseConnection, path_id: i32) -> AppResult<()> {
        let result = LearningPaths::delete_by_id(path_id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("learning path"));
        }

        info!("Learning path deleted: {}", path_id);
        Ok(())
    }

    pub async fn list_for_student<C>(db: &C, student_id: Uuid) -> AppResult<Vec<learning_paths::Model>>
    where
        C: ConnectionTrait,
    {
        let stages = LearningPaths::find()
            .filter(PathColumn::StudentId.eq(student_id))
            .order_by_asc(PathColumn::Order)
            .all(db)
            .await?;
        Ok(stages)
    }
}

/// Relance `attempt` tant que l'index unique (student_id, order) la refuse,
/// au plus `MAX_ORDER_ATTEMPTS` fois; au-delà, le conflit est remonté.
async fn retry_on_order_conflict<T, F, Fut>(student_id: Uuid, mut attempt: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(AppError::Database(err)) if tries < MAX_ORDER_ATTEMPTS && is_unique_violation(&err) => {
                warn!(
                    "Order conflict for student {} (attempt {}/{}), retrying",
                    student_id, tries, MAX_ORDER_ATTEMPTS
                );
                tries += 1;
            }
            Err(AppError::Database(err)) if is_unique_violation(&err) => {
                return Err(AppError::Conflict(ORDER_CONFLICT_MESSAGE.to_string()));
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::test_support::{insert_stage, insert_student, test_connection};
    use chrono::{Duration, Utc};
    use futures::future::join_all;

    fn input(task_name: &str) -> LearningPathInput {
        let start = Utc::now() + Duration::days(1);
        LearningPathInput {
            task_name: task_name.to_string(),
            start_date: start,
            estimated_end_date: start + Duration::days(14),
            required_duration: "2 weeks".to_string(),
            used_leave: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_first_stage_gets_order_one() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;

        let stage = LearningPathService::add_stage(&db, student.id, input("Intro")).await.unwrap();

        assert_eq!(stage.order, 1);
        assert!(!stage.is_completed);
        assert_eq!(stage.student_id, student.id);
    }

    #[tokio::test]
    async fn test_next_order_follows_max_even_with_gaps() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;
        let first = insert_stage(&db, &student, 1).await;
        insert_stage(&db, &student, 4).await;

        LearningPathService::delete(&db, first.id).await.unwrap();
        let stage = LearningPathService::add_stage(&db, student.id, input("Next")).await.unwrap();

        assert_eq!(stage.order, 5);
    }

    #[tokio::test]
    async fn test_orders_are_per_student() {
        let db = test_connection().await;
        let ada = insert_student(&db, "S-001").await;
        let alan = insert_student(&db, "S-002").await;
        insert_stage(&db, &ada, 7).await;

        let stage = LearningPathService::add_stage(&db, alan.id, input("Intro")).await.unwrap();
        assert_eq!(stage.order, 1);
    }

    #[tokio::test]
    async fn test_concurrent_additions_get_distinct_orders() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;

        let results = join_all(
            (0..8).map(|i| LearningPathService::add_stage(&db, student.id, input(&format!("Task {}", i)))),
        )
        .await;

        let mut orders: Vec<i32> = results.into_iter().map(|r| r.unwrap().order).collect();
        orders.sort();
        assert_eq!(orders, (1..=8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_add_stage_for_unknown_student() {
        let db = test_connection().await;
        let result = LearningPathService::add_stage(&db, Uuid::new_v4(), input("Intro")).await;
        assert!(matches!(result, Err(AppError::NotFound("student"))));
    }

    #[tokio::test]
    async fn test_mark_completed_is_idempotent() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;
        let stage = insert_stage(&db, &student, 3).await;

        let done = LearningPathService::mark_completed(&db, stage.id).await.unwrap();
        let again = LearningPathService::mark_completed(&db, stage.id).await.unwrap();

        assert!(done.is_completed);
        assert!(again.is_completed);
        assert_eq!(again.order, 3);
    }

    #[tokio::test]
    async fn test_update_keeps_order_and_owner() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;
        let stage = insert_stage(&db, &student, 2).await;

        let mut changes = input("Renamed");
        changes.notes = Some("moved".to_string());
        let updated = LearningPathService::update(&db, stage.id, changes).await.unwrap();

        assert_eq!(updated.task_name, "Renamed");
        assert_eq!(updated.notes.as_deref(), Some("moved"));
        assert_eq!(updated.order, 2);
        assert_eq!(updated.student_id, student.id);
    }

    #[tokio::test]
    async fn test_delete_keeps_student_and_siblings() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;
        let first = insert_stage(&db, &student, 1).await;
        insert_stage(&db, &student, 2).await;
        insert_stage(&db, &student, 3).await;

        LearningPathService::delete(&db, first.id).await.unwrap();

        let remaining = LearningPathService::list_for_student(&db, student.id).await.unwrap();
        let orders: Vec<i32> = remaining.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![2, 3]);
        assert!(Students::find_by_id(student.id).one(&db).await.unwrap().is_some());

        let missing = LearningPathService::delete(&db, first.id).await;
        assert!(matches!(missing, Err(AppError::NotFound("learning path"))));
    }

    #[tokio::test]
    async fn test_duplicate_order_is_rejected_by_index() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;
        let stage = insert_stage(&db, &student, 1).await;

        let mut duplicate: learning_paths::ActiveModel = stage.into();
        duplicate.id = NotSet;
        let err = duplicate.insert(&db).await.unwrap_err();

        assert!(is_unique_violation(&err));
    }

    /// Copie de `stage` à la position `order`.
    async fn insert_copy(
        db: &DatabaseConnection,
        stage: &learning_paths::Model,
        order: i32,
    ) -> AppResult<learning_paths::Model> {
        let mut copy: learning_paths::ActiveModel = stage.clone().into();
        copy.id = NotSet;
        copy.order = Set(order);
        Ok(copy.insert(db).await?)
    }

    #[tokio::test]
    async fn test_order_conflict_is_retried() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;
        let stage = insert_stage(&db, &student, 1).await;
        let calls = AtomicUsize::new(0);

        // Premier essai sur une position déjà prise, le second passe
        let (db_ref, stage_ref, calls_ref) = (&db, &stage, &calls);
        let inserted = retry_on_order_conflict(student.id, move || {
            let order = if calls_ref.fetch_add(1, Ordering::SeqCst) == 0 { 1 } else { 2 };
            insert_copy(db_ref, stage_ref, order)
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(inserted.order, 2);
    }

    #[tokio::test]
    async fn test_order_conflict_gives_up_after_max_attempts() {
        let db = test_connection().await;
        let student = insert_student(&db, "S-001").await;
        let stage = insert_stage(&db, &student, 1).await;
        let calls = AtomicUsize::new(0);

        let (db_ref, stage_ref, calls_ref) = (&db, &stage, &calls);
        let err = retry_on_order_conflict(student.id, move || {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            insert_copy(db_ref, stage_ref, 1)
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), MAX_ORDER_ATTEMPTS);
        assert_eq!(err.user_messages(), vec![ORDER_CONFLICT_MESSAGE]);
        assert_eq!(LearningPaths::find().count(&db).await.unwrap(), 1);
    }
}
