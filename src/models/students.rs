use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

/// Niveau d'un étudiant. Les valeurs stockées sont celles de la base existante.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum StudentLevel {
    #[default]
    #[sea_orm(string_value = "çözmez")]
    #[serde(rename = "çözmez")]
    Cozmez,
    #[sea_orm(string_value = "kıdemli")]
    #[serde(rename = "kıdemli")]
    Kidemli,
}

impl StudentLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "çözmez" | "cozmez" => Some(Self::Cozmez),
            "kıdemli" | "kidemli" => Some(Self::Kidemli),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub student_id: String, // identifiant lisible, ex: "S-2024-001"
    pub first_name: String,
    pub last_name: String,
    pub photo: Option<String>, // chemin relatif sous MEDIA_ROOT
    pub created_at: DateTimeUtc,
    pub level: StudentLevel,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::learning_paths::Entity")]
    LearningPaths,
}

impl Related<super::learning_paths::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LearningPaths.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
