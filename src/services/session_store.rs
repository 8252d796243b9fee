use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::RngCore;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::SessionConfig;
use crate::models::sessions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Message affiché une seule fois, à la prochaine page rendue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub text: String,
}

/// Contenu d'une session: l'identité (user_id en chaîne UUID) et les messages en attente.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<FlashMessage>,
}

/// Stockage des sessions dans la table `sessions`.
pub struct SessionStore {
    db: DatabaseConnection,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(db: DatabaseConnection, config: SessionConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Charge une session. Une session expirée ou illisible est traitée comme absente.
    pub async fn load(&self, key: &str) -> Result<Option<SessionData>, DbErr> {
        let row = sessions::Entity::find_by_id(key.to_string())
            .filter(sessions::Column::ExpireDate.gt(Utc::now()))
            .one(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<SessionData>(&row.session_data) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                warn!("Discarding unreadable session data: {}", e);
                Ok(None)
            }
        }
    }

    /// Enregistre la session et repousse son expiration.
    /// Sans clé, une nouvelle clé aléatoire est créée. Retourne la clé utilisée.
    pub async fn save(&self, key: Option<&str>, data: &SessionData) -> Result<String, DbErr> {
        let key = match key {
            Some(key) => key.to_string(),
            None => generate_session_key(),
        };

        let payload = serde_json::to_string(data)
            .map_err(|e| DbErr::Custom(format!("Failed to serialize session: {}", e)))?;

        let row = sessions::ActiveModel {
            session_key: Set(key.clone()),
            session_data: Set(payload),
            expire_date: Set(Utc::now() + Duration::seconds(self.config.cookie_age_secs)),
        };

        sessions::Entity::insert(row)
            .on_conflict(
                OnConflict::column(sessions::Column::SessionKey)
                    .update_columns([sessions::Column::SessionData, sessions::Column::ExpireDate])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(key)
    }

    pub async fn delete(&self, key: &str) -> Result<(), DbErr> {
        sessions::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Supprime les sessions expirées. Retourne le nombre de lignes supprimées.
    pub async fn purge_expired(&self) -> Result<u64, DbErr> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::ExpireDate.lte(Utc::now()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

/// 32 octets aléatoires encodés en base64 URL-safe.
fn generate_session_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
