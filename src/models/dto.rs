use std::io;

use actix_multipart::form::{MultipartForm, tempfile::TempFile, text::Text};
use chrono::{DateTime, Utc};
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use tokio::fs;
use validator::Validate;

use super::learning_paths;
use super::students::{self, StudentLevel};

// ============================================================================
// Formulaires reçus (application/x-www-form-urlencoded, multipart pour les étudiants)
// ============================================================================
// Les champs absents valent "" pour que les validateurs produisent leurs
// propres messages. Les mots de passe ne sont jamais renvoyés au rendu.

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

// Inscription et ajout par un admin
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserForm {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Case à cocher: "on" quand cochée, absente sinon.
    #[serde(default)]
    pub is_admin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateUserForm {
    #[serde(default)]
    pub email: String,
    /// Mot de passe actuel, exigé seulement avec `new_password`.
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub new_password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_admin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggleLockForm {
    #[serde(default)]
    pub is_locked: Option<String>,
}

impl ToggleLockForm {
    pub fn lock(&self) -> bool {
        checkbox(&self.is_locked)
    }
}

/// Formulaire étudiant une fois le corps multipart lu.
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct StudentForm {
    #[validate(length(max = 20, message = "Ensure this value has at most 20 characters."))]
    pub student_id: String,
    #[validate(length(max = 50, message = "Ensure this value has at most 50 characters."))]
    pub first_name: String,
    #[validate(length(max = 50, message = "Ensure this value has at most 50 characters."))]
    pub last_name: String,
    pub level: Option<String>,
    #[serde(skip)]
    pub photo: Option<PhotoUpload>,
}

// Corps multipart/form-data des pages étudiant
#[derive(MultipartForm)]
pub struct StudentUpload {
    pub student_id: Option<Text<String>>,
    pub first_name: Option<Text<String>>,
    pub last_name: Option<Text<String>>,
    pub level: Option<Text<String>>,
    pub photo: Option<TempFile>,
}

impl StudentUpload {
    /// Lit la photo reçue. Un champ fichier laissé vide (sans nom ni contenu)
    /// vaut "pas de photo".
    pub async fn into_form(self) -> io::Result<StudentForm> {
        let photo = match self.photo {
            Some(file) if file.size > 0 || file.file_name.as_deref().is_some_and(|n| !n.is_empty()) => {
                let bytes = fs::read(file.file.path()).await?;
                Some(PhotoUpload {
                    file_name: file.file_name.unwrap_or_default(),
                    bytes,
                })
            }
            _ => None,
        };

        Ok(StudentForm {
            student_id: text(self.student_id),
            first_name: text(self.first_name),
            last_name: text(self.last_name),
            level: self.level.map(|level| level.0),
            photo,
        })
    }
}

fn text(value: Option<Text<String>>) -> String {
    value.map(|text| text.0).unwrap_or_default()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct LearningPathForm {
    #[serde(default)]
    #[validate(length(max = 100, message = "Ensure this value has at most 100 characters."))]
    pub task_name: String,
    /// Format `datetime-local` (YYYY-MM-DDTHH:MM[:SS]) ou date seule.
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub estimated_end_date: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "Ensure this value has at most 50 characters."))]
    pub required_duration: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "Ensure this value has at most 50 characters."))]
    pub used_leave: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub fn checkbox(value: &Option<String>) -> bool {
    value.as_deref() == Some("on")
}

// Pré-remplissage des formulaires d'édition

impl From<&students::Model> for StudentForm {
    fn from(student: &students::Model) -> Self {
        Self {
            student_id: student.student_id.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            level: Some(student.level.to_value()),
            photo: None,
        }
    }
}

impl From<&learning_paths::Model> for LearningPathForm {
    fn from(path: &learning_paths::Model) -> Self {
        Self {
            task_name: path.task_name.clone(),
            start_date: path.start_date.format(FORM_DATETIME_FORMAT).to_string(),
            estimated_end_date: path.estimated_end_date.format(FORM_DATETIME_FORMAT).to_string(),
            required_duration: path.required_duration.clone(),
            used_leave: path.used_leave.clone(),
            notes: path.notes.clone(),
        }
    }
}

/// Format des champs `datetime-local`.
pub const FORM_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

// ============================================================================
// Enregistrements validés, prêts pour les services
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PasswordChange {
    pub current: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserChanges {
    pub email: String,
    pub password_change: Option<PasswordChange>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentInput {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    /// `None` garde le niveau existant (ou le niveau par défaut à la création).
    pub level: Option<StudentLevel>,
    pub photo: Option<PhotoUpload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearningPathInput {
    pub task_name: String,
    pub start_date: DateTime<Utc>,
    pub estimated_end_date: DateTime<Utc>,
    pub required_duration: String,
    pub used_leave: Option<String>,
    pub notes: Option<String>,
}
