//! Politique de verrouillage des comptes, sans accès à la base.
//!
//! Les transitions ne dépendent que des tentatives de login et des actions
//! d'un admin. Les comptes admin ne sont jamais verrouillés ni comptés par
//! le chemin de login; seul un basculement explicite change leur drapeau.

pub const MAX_FAILED_ATTEMPTS: i32 = 5;

/// État d'un compte tel que vu par la politique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    pub is_admin: bool,
    pub is_locked: bool,
    pub failed_login_attempts: i32,
}

/// Décision prise pour une tentative de login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginDecision {
    /// Compte non-admin verrouillé: le mot de passe n'est pas vérifié.
    RejectLocked,
    /// Mot de passe correct: compteur remis à 0, last_login mis à jour.
    Accept,
    /// Mot de passe faux sur un compte non-admin.
    Fail { attempts: i32, locked: bool },
    /// Mot de passe faux sur un compte admin: aucun changement d'état.
    FailExempt,
}

impl AccountState {
    /// Le mot de passe doit-il être vérifié ?
    pub fn can_attempt(&self) -> bool {
        self.is_admin || !self.is_locked
    }

    pub fn decide(&self, password_ok: bool) -> LoginDecision {
        if !self.can_attempt() {
            return LoginDecision::RejectLocked;
        }
        if password_ok {
            return LoginDecision::Accept;
        }
        if self.is_admin {
            return LoginDecision::FailExempt;
        }

        let attempts = self.failed_login_attempts.saturating_add(1);
        LoginDecision::Fail {
            attempts,
            locked: attempts >= MAX_FAILED_ATTEMPTS,
        }
    }

    /// Applique la décision et retourne le nouvel état.
    pub fn apply(self, decision: LoginDecision) -> AccountState {
        match decision {
            LoginDecision::Accept => AccountState {
                failed_login_attempts: 0,
                ..self
            },
            LoginDecision::Fail { attempts, locked } => AccountState {
                failed_login_attempts: attempts,
                is_locked: self.is_locked || locked,
                ..self
            },
            LoginDecision::RejectLocked | LoginDecision::FailExempt => self,
        }
    }

    /// Basculement par un admin: seul moyen de déverrouiller, ou de verrouiller
    /// un compte à l'avance (admin compris). Le compteur repart de 0.
    pub fn toggle(self, lock: bool) -> AccountState {
        AccountState {
            is_locked: lock,
            failed_login_attempts: 0,
            ..self
        }
    }
}

impl LoginDecision {
    /// Message présenté à l'utilisateur. Ne révèle jamais si l'email existe.
    pub fn message(&self) -> String {
        match self {
            LoginDecision::RejectLocked => {
                "Your account is locked. Please contact an admin.".to_string()
            }
            LoginDecision::Accept => "Login successful!".to_string(),
            LoginDecision::Fail { locked: true, .. } => {
                "Your account has been locked due to too many failed login attempts. Please contact an admin."
                    .to_string()
            }
            LoginDecision::Fail { attempts, .. } => format!(
                "Invalid email or password. Attempt {}/{}.",
                attempts, MAX_FAILED_ATTEMPTS
            ),
            LoginDecision::FailExempt => "Invalid email or password.".to_string(),
        }
    }
}
