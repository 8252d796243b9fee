// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Comptes (admin ou non, verrouillage après 5 échecs)
//   - students : Étudiants (identifiant lisible unique, niveau, photo)
//   - learning_paths : Étapes du parcours d'un étudiant (ordre par étudiant)
//   - sessions : Sessions côté serveur (cookie "sessionid", 14 jours)
//
// Points d'attention:
//   - Un étudiant possède ses étapes: la suppression est faite en cascade
//     dans une transaction (services::student_service)
//   - (student_id, order) est unique dans learning_paths
//   - Aucune relation entre users et students
//
// ============================================================================

pub mod dto;
pub mod health;
pub mod users;
pub mod students;
pub mod learning_paths;
pub mod sessions;
