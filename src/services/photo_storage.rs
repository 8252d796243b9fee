//! Stockage des photos d'étudiants sous MEDIA_ROOT.
//!
//! Les fichiers sont rangés dans un seul répertoire:
//! ```text
//! {media_root}/
//! └── student_photos/
//!     └── {student_id}_{jeton}_{nom d'origine}
//! ```
//! Le jeton aléatoire rend chaque fichier propre à un envoi: un identifiant
//! d'étudiant réutilisé n'écrase jamais la photo d'un autre étudiant.
//! Le chemin enregistré en base est relatif à `media_root`.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::info;
use uuid::Uuid;

pub const PHOTO_DIR: &str = "student_photos";

#[derive(Debug, Clone)]
pub struct PhotoStorage {
    media_root: PathBuf,
}

impl PhotoStorage {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Chemin relatif d'une photo: `student_photos/{student_id}_{token}_{file_name}`.
    ///
    /// Seul le dernier composant du nom d'origine est gardé.
    pub fn relative_path(student_id: &str, token: &str, file_name: &str) -> String {
        let base_name = Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("photo");
        let safe_id: String = student_id
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        format!("{}/{}_{}_{}", PHOTO_DIR, safe_id, token, base_name)
    }

    /// Chemin absolu d'un chemin relatif enregistré. Refuse les chemins
    /// absolus et les `..`.
    fn resolve(&self, relative: &str) -> io::Result<PathBuf> {
        let path = Path::new(relative);
        let is_plain = path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if relative.is_empty() || !is_plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid media path: {}", relative),
            ));
        }
        Ok(self.media_root.join(path))
    }

    /// Écrit la photo et retourne son chemin relatif.
    ///
    /// Le contenu est écrit dans un fichier temporaire du même répertoire puis
    /// renommé: le fichier final est complet ou absent.
    pub async fn store(&self, student_id: &str, file_name: &str, content: &[u8]) -> io::Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        let relative = Self::relative_path(student_id, &token, file_name);
        let target = self.resolve(&relative)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp = target.with_file_name(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&temp, content).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }

        info!("Stored photo {}", relative);
        Ok(relative)
    }

    /// Supprime une photo. Retourne `false` si le fichier n'existait pas.
    pub async fn delete(&self, relative: &str) -> io::Result<bool> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
