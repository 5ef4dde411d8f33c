// Authentication domain models
use std::fmt;

/// Login credentials for the telemetry API.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Both parts must be present and non-empty.
    pub fn from_parts(email: Option<String>, password: Option<String>) -> Option<Self> {
        let email = email.filter(|e| !e.trim().is_empty())?;
        let password = password.filter(|p| !p.is_empty())?;
        Some(Self { email, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token and company scope obtained from a successful login.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub company_id: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("company_id", &self.company_id)
            .finish()
    }
}
