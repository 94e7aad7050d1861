//! Authentification par token Subsonic (API >= 1.13).
//!
//! Chaque requête porte `u`, `t = md5(password + s)` et un sel `s` neuf :
//! le serveur peut refuser un sel déjà vu, rien n'est donc mis en cache.

use md5::{Digest, Md5};
use rand::Rng;
use rand::distr::Alphanumeric;

pub const SALT_LEN: usize = 6;

/// Sel aléatoire alphanumérique
pub fn generate_salt() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

/// md5(password + salt) en hexadécimal minuscule
pub fn token(password: &str, salt: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Identifiants du compte et de l'application cliente
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
    pub client_name: String,
    pub api_version: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        client_name: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client_name: client_name.into(),
            api_version: api_version.into(),
        }
    }

    /// Paramètres d'authentification pour une seule requête
    pub fn auth_params(&self) -> Vec<(&'static str, String)> {
        let salt = generate_salt();
        let token = token(&self.password, &salt);
        vec![
            ("u", self.username.clone()),
            ("t", token),
            ("s", salt),
            ("v", self.api_version.clone()),
            ("c", self.client_name.clone()),
        ]
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("client_name", &self.client_name)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches_reference() {
        // Exemple de la documentation Subsonic
        assert_eq!(token("sesame", "c19b2d"), "26719a1196d2a940705a59634eb18eab");
    }

    #[test]
    fn test_salt_shape() {
        let salt = generate_salt();
        assert_eq!(salt.len(), SALT_LEN);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_fresh_salt_per_request() {
        let creds = Credentials::new("alice", "secret", "RPiPlayer", "1.16.1");
        let first = creds.auth_params();
        let second = creds.auth_params();
        let salt = |p: &[(&str, String)]| p.iter().find(|(k, _)| *k == "s").unwrap().1.clone();
        assert_ne!(salt(&first), salt(&second));
        assert_eq!(first[0], ("u", "alice".to_string()));
        assert_eq!(first[3], ("v", "1.16.1".to_string()));
        assert_eq!(first[4], ("c", "RPiPlayer".to_string()));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("alice", "secret", "RPiPlayer", "1.16.1");
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
