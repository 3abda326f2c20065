use std::fmt;

use {
    secrecy::{ExposeSecret, Secret},
    sha2::{Digest, Sha256},
};

/// Opaque bot token identifying one bot identity to the platform.
///
/// The raw value is only reachable through [`Credential::expose`]; logs and
/// error messages use [`Credential::hint`], and the session pool keys on
/// [`Credential::fingerprint`].
#[derive(Clone)]
pub struct Credential {
    secret: Secret<String>,
    fingerprint: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into().trim().to_string();
        let digest = Sha256::digest(token.as_bytes());
        let fingerprint = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self {
            secret: Secret::new(token),
            fingerprint,
        }
    }

    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// Hex SHA-256 of the token. Stable key for maps and log correlation.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Trailing characters of the token, safe to show in diagnostics.
    pub fn hint(&self) -> String {
        let chars: Vec<char> = self.expose().chars().collect();
        if chars.len() <= 8 {
            return "…".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("…{tail}")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.hint()).finish()
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}
