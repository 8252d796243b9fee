// ============================================================================
// SERVICES
// ============================================================================
//
//   - identity_service : session -> utilisateur (Anonymous / Invalid / Resolved)
//   - lockout / login_service : verrouillage après 5 échecs, login transactionnel
//   - learning_path_service : ordre des étapes par étudiant (max + 1)
//   - student_service / user_service : CRUD des enregistrements
//   - photo_storage : fichiers sous MEDIA_ROOT
//   - session_store : table `sessions`
//   - validation : validateurs ordonnés des formulaires
//
// ============================================================================

pub mod identity_service;
pub mod learning_path_service;
pub mod lockout;
pub mod login_service;
pub mod photo_storage;
pub mod session_store;
pub mod student_service;
pub mod user_service;
pub mod validation;
