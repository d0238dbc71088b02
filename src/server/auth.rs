//! Login handshake: usernames from `[auth].users` are checked against their
//! argon2 hashes; unknown names get in as guests only when guests are allowed.

use argon2::Argon2;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::config::AuthConfig;
use crate::validation::{validate_login_name, UsernameError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Invalid username: {0}")]
    InvalidName(#[from] UsernameError),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Stored password hash is corrupt")]
    CorruptHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub player_id: String,
    pub name: String,
    pub guest: bool,
}

pub fn player_id_for(username: &str) -> String {
    format!("player_{}", username.to_lowercase())
}

pub fn authenticate(config: &AuthConfig, username: &str, password: &str) -> Result<Login, AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    let name = validate_login_name(username)?;
    let lower = name.to_lowercase();
    let stored = config
        .users
        .iter()
        .find(|(user, _)| user.to_lowercase() == lower)
        .map(|(_, hash)| hash);

    match stored {
        Some(hash) => {
            if password.is_empty() {
                return Err(AuthError::MissingCredentials);
            }
            let parsed = PasswordHash::new(hash).map_err(|_| AuthError::CorruptHash)?;
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .map_err(|_| AuthError::InvalidCredentials)?;
            Ok(Login {
                player_id: player_id_for(&name),
                name,
                guest: false,
            })
        }
        None if config.allow_guests => Ok(Login {
            player_id: player_id_for(&name),
            name,
            guest: true,
        }),
        None => Err(AuthError::InvalidCredentials),
    }
}

/// Produce a PHC string suitable for `[auth.users]`.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Hash error: {e}"))?;
    Ok(hash.to_string())
}
