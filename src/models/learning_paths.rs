use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "learning_paths")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub student_id: Uuid,
    pub task_name: String,
    pub start_date: DateTimeUtc,
    pub estimated_end_date: DateTimeUtc,
    pub used_leave: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub required_duration: String, // libellé libre, ex: "2 weeks"
    pub is_completed: bool,
    // Position dans le parcours: max + 1 à l'ajout, jamais renumérotée
    // (unique par étudiant, voir db::create_schema)
    pub order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::students::Entity",
        from = "Column::StudentId",
        to = "super::students::Column::Id",
        on_delete = "Cascade"
    )]
    Student,
}

impl Related<super::students::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
