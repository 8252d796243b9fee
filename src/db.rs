// connexion BD + création du schéma

use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema, SqlErr,
};

use crate::models::{learning_paths, sessions, students, users};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options.sqlx_logging(false);

    // Chaque connexion SQLite en mémoire est une base distincte
    if database_url.starts_with("sqlite::memory:") {
        options.max_connections(1).min_connections(1);
    }

    Database::connect(options).await
}

/// Crée les tables manquantes à partir des entités, ainsi que l'index
/// unique (student_id, order) sur lequel repose l'attribution des ordres.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, users::Entity).await?;
    create_table(db, &schema, students::Entity).await?;
    create_table(db, &schema, learning_paths::Entity).await?;
    create_table(db, &schema, sessions::Entity).await?;

    let unique_order = Index::create()
        .if_not_exists()
        .name("uq_learning_paths_student_order")
        .table(learning_paths::Entity)
        .col(learning_paths::Column::StudentId)
        .col(learning_paths::Column::Order)
        .unique()
        .to_owned();
    db.execute(backend.build(&unique_order)).await?;

    let session_expiry = Index::create()
        .if_not_exists()
        .name("idx_sessions_expire_date")
        .table(sessions::Entity)
        .col(sessions::Column::ExpireDate)
        .to_owned();
    db.execute(backend.build(&session_expiry)).await?;

    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let statement = schema
        .create_table_from_entity(entity)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

/// Violation d'un index unique (email, student_id, (student_id, order)).
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
