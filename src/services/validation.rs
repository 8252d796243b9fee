//! Validation des formulaires.
//!
//! Chaque formulaire est vérifié par une liste ordonnée de validateurs nommés.
//! Un validateur ne fait que lire l'enregistrement et retourne zéro ou plusieurs
//! messages. Les contrôles qui demandent la base (unicité, mot de passe actuel)
//! restent dans les services.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;
use validator::{Validate, ValidateEmail};

use crate::models::dto::{
    LearningPathForm, LearningPathInput, NewUser, PasswordChange, PhotoUpload, StudentForm,
    StudentInput, UpdateUserForm, UserChanges, UserForm, checkbox,
};
use crate::models::students::StudentLevel;

pub const MAX_EMAIL_LENGTH: usize = 255;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const PASSWORD_SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Validateur nommé sur un enregistrement `T`.
pub struct Check<T: ?Sized> {
    pub name: &'static str,
    pub run: fn(&T) -> Vec<String>,
}

/// Exécute tous les validateurs et agrège leurs messages, dans l'ordre.
pub fn collect<T: ?Sized>(record: &T, checks: &[Check<T>]) -> Vec<String> {
    let mut messages = Vec::new();
    for check in checks {
        let found = (check.run)(record);
        if !found.is_empty() {
            debug!(validator = check.name, "validation failed");
        }
        messages.extend(found);
    }
    messages
}

/// S'arrête au premier validateur qui échoue et retourne ses messages.
pub fn first_failure<T: ?Sized>(record: &T, checks: &[Check<T>]) -> Result<(), Vec<String>> {
    for check in checks {
        let messages = (check.run)(record);
        if !messages.is_empty() {
            debug!(validator = check.name, "validation failed");
            return Err(messages);
        }
    }
    Ok(())
}

fn rule(ok: bool, message: &str) -> Vec<String> {
    if ok { Vec::new() } else { vec![message.to_string()] }
}

fn trimmed_or_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Mots de passe
// ============================================================================

pub const PASSWORD_RULES: &[Check<str>] = &[
    Check {
        name: "min_length",
        run: |p| rule(p.chars().count() >= 8, "Password must be at least 8 characters long."),
    },
    Check {
        name: "uppercase",
        run: |p| rule(
            p.chars().any(char::is_uppercase),
            "Password must contain at least one uppercase letter.",
        ),
    },
    Check {
        name: "lowercase",
        run: |p| rule(
            p.chars().any(char::is_lowercase),
            "Password must contain at least one lowercase letter.",
        ),
    },
    Check {
        name: "digit",
        run: |p| rule(p.chars().any(char::is_numeric), "Password must contain at least one digit."),
    },
    Check {
        name: "special",
        run: |p| rule(
            p.chars().any(|c| PASSWORD_SPECIAL_CHARACTERS.contains(c)),
            "Password must contain at least one special character (e.g., !@#$%^&*).",
        ),
    },
    Check {
        name: "no_spaces",
        run: |p| rule(!p.contains(' '), "Password cannot contain spaces."),
    },
];

pub fn password_violations(password: &str) -> Vec<String> {
    collect(password, PASSWORD_RULES)
}

pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

// ============================================================================
// Utilisateurs
// ============================================================================

const NEW_USER_CHECKS: &[Check<UserForm>] = &[
    Check {
        name: "required",
        run: |f| rule(
            !f.email.is_empty() && !f.password.is_empty(),
            "Please provide both email and password.",
        ),
    },
    Check {
        name: "email_length",
        run: |f| rule(
            f.email.chars().count() <= MAX_EMAIL_LENGTH,
            "Email address is too long (max 255 characters).",
        ),
    },
    Check {
        name: "password_length",
        run: |f| rule(
            f.password.chars().count() <= MAX_PASSWORD_LENGTH,
            "Password is too long (max 128 characters).",
        ),
    },
    Check {
        name: "email_format",
        run: |f| rule(is_valid_email(&f.email), "Please enter a valid email address."),
    },
    Check {
        name: "password_rules",
        run: |f| password_violations(&f.password),
    },
];

/// Inscription ou ajout par un admin. `allow_admin` vaut false pour
/// l'inscription: la case `is_admin` y est ignorée.
pub fn validate_new_user(form: &UserForm, allow_admin: bool) -> Result<NewUser, Vec<String>> {
    first_failure(form, NEW_USER_CHECKS)?;

    Ok(NewUser {
        email: form.email.clone(),
        password: form.password.clone(),
        first_name: trimmed_or_none(Some(&form.first_name)),
        last_name: trimmed_or_none(Some(&form.last_name)),
        is_admin: allow_admin && checkbox(&form.is_admin),
    })
}

const USER_UPDATE_CHECKS: &[Check<UpdateUserForm>] = &[
    Check {
        name: "required",
        run: |f| rule(!f.email.is_empty(), "Please provide an email address."),
    },
    Check {
        name: "email_length",
        run: |f| rule(
            f.email.chars().count() <= MAX_EMAIL_LENGTH,
            "Email address is too long (max 255 characters).",
        ),
    },
    Check {
        name: "email_format",
        run: |f| rule(is_valid_email(&f.email), "Please enter a valid email address."),
    },
    Check {
        name: "current_password",
        run: |f| rule(
            f.new_password.is_empty() || !f.password.is_empty(),
            "Please provide the current password to change the password.",
        ),
    },
    Check {
        name: "new_password_length",
        run: |f| rule(
            f.new_password.chars().count() <= MAX_PASSWORD_LENGTH,
            "New password is too long (max 128 characters).",
        ),
    },
    Check {
        name: "new_password_rules",
        run: |f| {
            if f.new_password.is_empty() {
                Vec::new()
            } else {
                password_violations(&f.new_password)
            }
        },
    },
];

pub fn validate_user_update(form: &UpdateUserForm) -> Result<UserChanges, Vec<String>> {
    first_failure(form, USER_UPDATE_CHECKS)?;

    let password_change = (!form.new_password.is_empty()).then(|| PasswordChange {
        current: form.password.clone(),
        new: form.new_password.clone(),
    });

    Ok(UserChanges {
        email: form.email.clone(),
        password_change,
        first_name: trimmed_or_none(Some(&form.first_name)),
        last_name: trimmed_or_none(Some(&form.last_name)),
        is_admin: checkbox(&form.is_admin),
    })
}

// ============================================================================
// Étudiants
// ============================================================================

/// Messages des contraintes déclarées sur le formulaire, triés par champ.
fn field_messages<T: Validate>(form: &T) -> Vec<String> {
    let Err(errors) = form.validate() else {
        return Vec::new();
    };

    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Enter a valid value.".to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect()
}

fn photo_messages(photo: Option<&PhotoUpload>) -> Vec<String> {
    let Some(photo) = photo else {
        return Vec::new();
    };
    if photo.file_name.trim().is_empty() {
        return vec!["photo: No filename was submitted.".to_string()];
    }
    if photo.bytes.is_empty() {
        return vec!["photo: The submitted file is empty.".to_string()];
    }
    Vec::new()
}

const STUDENT_CHECKS: &[Check<StudentForm>] = &[
    Check {
        name: "student_id_required",
        run: |f| rule(!f.student_id.trim().is_empty(), "student_id: Student ID is required."),
    },
    Check {
        name: "first_name_required",
        run: |f| rule(!f.first_name.trim().is_empty(), "first_name: This field is required."),
    },
    Check {
        name: "last_name_required",
        run: |f| rule(!f.last_name.trim().is_empty(), "last_name: This field is required."),
    },
    Check {
        name: "lengths",
        run: field_messages::<StudentForm>,
    },
    Check {
        name: "level",
        run: |f| match trimmed_or_none(f.level.as_deref()) {
            Some(level) if StudentLevel::parse(&level).is_none() => {
                vec![format!("level: Select a valid choice. {} is not one of the available choices.", level)]
            }
            _ => Vec::new(),
        },
    },
    Check {
        name: "photo",
        run: |f| photo_messages(f.photo.as_ref()),
    },
];

pub fn validate_student(form: &StudentForm) -> Result<StudentInput, Vec<String>> {
    let messages = collect(form, STUDENT_CHECKS);
    if !messages.is_empty() {
        return Err(messages);
    }

    Ok(StudentInput {
        student_id: form.student_id.trim().to_string(),
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        level: trimmed_or_none(form.level.as_deref()).and_then(|l| StudentLevel::parse(&l)),
        photo: form.photo.clone(),
    })
}

// ============================================================================
// Étapes du parcours
// ============================================================================

/// Création ou modification d'une étape. Seule la création refuse une date
/// de début passée; `today` est la date du jour (UTC) au moment de la requête.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    Create { today: NaiveDate },
    Edit,
}

struct PathDraft {
    form: LearningPathForm,
    mode: PathMode,
}

/// Accepte `YYYY-MM-DDTHH:MM`, `YYYY-MM-DDTHH:MM:SS`, l'espace à la place
/// du `T`, RFC 3339, ou une date seule (minuit). Les heures sans fuseau sont en UTC.
pub fn parse_form_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn date_field(field: &str, value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        vec![format!("{}: This field is required.", field)]
    } else if parse_form_datetime(value).is_none() {
        vec![format!("{}: Enter a valid date/time.", field)]
    } else {
        Vec::new()
    }
}

const LEARNING_PATH_CHECKS: &[Check<PathDraft>] = &[
    Check {
        name: "task_name_required",
        run: |d| rule(!d.form.task_name.trim().is_empty(), "task_name: This field is required."),
    },
    Check {
        name: "start_date",
        run: |d| date_field("start_date", &d.form.start_date),
    },
    Check {
        name: "estimated_end_date",
        run: |d| date_field("estimated_end_date", &d.form.estimated_end_date),
    },
    Check {
        name: "required_duration",
        run: |d| rule(
            !d.form.required_duration.trim().is_empty(),
            "required_duration: Required duration is mandatory.",
        ),
    },
    Check {
        name: "lengths",
        run: |d| field_messages(&d.form),
    },
    Check {
        name: "date_range",
        run: |d| {
            let (Some(start), Some(end)) = (
                parse_form_datetime(&d.form.start_date),
                parse_form_datetime(&d.form.estimated_end_date),
            ) else {
                return Vec::new();
            };
            if start > end {
                return vec!["Start date cannot be later than the estimated end date.".to_string()];
            }
            match d.mode {
                PathMode::Create { today } if start.date_naive() < today => {
                    vec!["Start date cannot be in the past for new learning paths.".to_string()]
                }
                _ => Vec::new(),
            }
        },
    },
];

pub fn validate_learning_path(
    form: &LearningPathForm,
    mode: PathMode,
) -> Result<LearningPathInput, Vec<String>> {
    let draft = PathDraft {
        form: form.clone(),
        mode,
    };
    let messages = collect(&draft, LEARNING_PATH_CHECKS);
    if !messages.is_empty() {
        return Err(messages);
    }

    let (Some(start_date), Some(estimated_end_date)) = (
        parse_form_datetime(&form.start_date),
        parse_form_datetime(&form.estimated_end_date),
    ) else {
        return Err(vec!["Enter a valid date/time.".to_string()]);
    };

    Ok(LearningPathInput {
        task_name: form.task_name.trim().to_string(),
        start_date,
        estimated_end_date,
        required_duration: form.required_duration.trim().to_string(),
        used_leave: trimmed_or_none(form.used_leave.as_deref()),
        notes: trimmed_or_none(form.notes.as_deref()),
    })
}
