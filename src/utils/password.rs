use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::{Rng, distributions::Alphanumeric};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "pbkdf2_sha256";

#[cfg(not(test))]
pub const DEFAULT_ITERATIONS: u32 = 600_000;
// Les tests unitaires n'ont pas besoin du coût de production
#[cfg(test)]
pub const DEFAULT_ITERATIONS: u32 = 1_000;

const SALT_LENGTH: usize = 22;
const KEY_LENGTH: usize = 32;
const MAX_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid PBKDF2 parameters: {0}")]
    InvalidParameters(String),
}

/// Hash un mot de passe au format `pbkdf2_sha256$iterations$salt$hash`
/// (PBKDF2-HMAC-SHA256, salt alphanumérique de 22 caractères, digest base64).
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_iterations(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_with_iterations(
    password: &str,
    iterations: u32,
) -> Result<String, PasswordError> {
    if iterations == 0 {
        return Err(PasswordError::InvalidParameters(
            "iterations must be positive".to_string(),
        ));
    }

    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect();

    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::<HmacSha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key)
        .map_err(|e| PasswordError::InvalidParameters(e.to_string()))?;

    Ok(format!(
        "{}${}${}${}",
        ALGORITHM,
        iterations,
        salt,
        STANDARD.encode(key)
    ))
}

/// Vérifie un mot de passe contre un hash stocké.
/// Un hash mal formé ne produit jamais d'erreur: la vérification échoue simplement.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Some(parsed) = ParsedHash::parse(stored_hash) else {
        return false;
    };

    let mut computed = vec![0u8; parsed.digest.len()];
    if pbkdf2::<HmacSha256>(
        password.as_bytes(),
        parsed.salt.as_bytes(),
        parsed.iterations,
        &mut computed,
    )
    .is_err()
    {
        return false;
    }

    constant_time_eq(&computed, &parsed.digest)
}

/// Vrai si le hash a été produit avec moins d'itérations que la valeur courante
/// (ou s'il est illisible): il doit être recalculé au prochain login réussi.
pub fn needs_rehash(stored_hash: &str) -> bool {
    match ParsedHash::parse(stored_hash) {
        Some(parsed) => parsed.iterations < DEFAULT_ITERATIONS,
        None => true,
    }
}

struct ParsedHash<'a> {
    iterations: u32,
    salt: &'a str,
    digest: Vec<u8>,
}

impl<'a> ParsedHash<'a> {
    fn parse(stored_hash: &'a str) -> Option<Self> {
        let mut parts = stored_hash.split('$');
        let algorithm = parts.next()?;
        let iterations = parts.next()?.parse::<u32>().ok()?;
        let salt = parts.next()?;
        let digest = STANDARD.decode(parts.next()?).ok()?;

        if parts.next().is_some()
            || algorithm != ALGORITHM
            || iterations == 0
            || iterations > MAX_ITERATIONS
            || salt.is_empty()
            || digest.is_empty()
        {
            return None;
        }

        Some(Self {
            iterations,
            salt,
            digest,
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
