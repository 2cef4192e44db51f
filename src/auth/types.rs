use crate::{
    error::{Error, Result},
    session::{Abilities, User},
};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Login input. The password never leaves this struct except in the request
/// body.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }

    /// Local checks run before any request is made.
    ///
    /// # Errors
    /// Returns `Validation` when a field is missing or the email is malformed.
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() || self.password.expose_secret().is_empty() {
            return Err(Error::Validation(
                "Email and password are required".to_string(),
            ));
        }
        if !valid_email(email) {
            return Err(Error::Validation("Invalid email address".to_string()));
        }
        Ok(())
    }

    pub(crate) fn request(&self) -> LoginRequest<'_> {
        LoginRequest {
            email: self.email.trim(),
            password: self.password.expose_secret(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Body of login and register responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default, rename = "expiresIn", alias = "expires_in")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub abilities: Option<Abilities>,
}

impl SessionResponse {
    /// Splits into the parts needed to establish a session, if complete.
    pub fn into_session(self) -> Option<NewSession> {
        let token = self.token.filter(|token| !token.is_empty())?;
        let user = self.user?;
        let abilities = self
            .abilities
            .or_else(|| user.abilities.clone())
            .unwrap_or_default();

        Some(NewSession {
            token: SecretString::from(token),
            expires_at: expiry_from(self.expires_in),
            user,
            abilities,
        })
    }
}

pub(crate) struct NewSession {
    pub token: SecretString,
    pub user: User,
    pub abilities: Abilities,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RefreshResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "expiresIn", alias = "expires_in")]
    pub expires_in: Option<i64>,
}

/// `GET me` and `PUT user/profile` answer either `{user, abilities?}` or the
/// bare user object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserPayload {
    Wrapped {
        user: User,
        #[serde(default)]
        abilities: Option<Abilities>,
    },
    Bare(User),
}

impl UserPayload {
    pub fn into_parts(self) -> (User, Option<Abilities>) {
        match self {
            Self::Wrapped { user, abilities } => {
                let abilities = abilities.or_else(|| user.abilities.clone());
                (user, abilities)
            }
            Self::Bare(user) => {
                let abilities = user.abilities.clone();
                (user, abilities)
            }
        }
    }
}

/// Outcome of a registration.
#[derive(Clone, Debug, Serialize)]
pub struct Registration {
    pub user: Option<User>,
    /// False when the server created the account without issuing a token;
    /// the caller must log in.
    pub session_established: bool,
}

/// `now + seconds`, or `None` when no lifetime was given or it overflows.
pub(crate) fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    let seconds = expires_in?;
    Duration::try_seconds(seconds).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn credentials_require_both_fields() {
        let missing = Credentials::new("", secret("pw"));
        assert!(matches!(missing.validate(), Err(Error::Validation(_))));

        let empty_password = Credentials::new("ada@example.com", secret(""));
        assert!(matches!(empty_password.validate(), Err(Error::Validation(_))));

        let malformed = Credentials::new("ada", secret("pw"));
        assert!(matches!(malformed.validate(), Err(Error::Validation(_))));

        assert!(Credentials::new(" ada@example.com ", secret("pw"))
            .validate()
            .is_ok());
    }

    #[test]
    fn debug_hides_password() {
        let credentials = Credentials::new("ada@example.com", secret("hunter2"));
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[test]
    fn session_response_accepts_both_expiry_spellings() {
        let camel: SessionResponse =
            serde_json::from_value(json!({"token": "T1", "user": {"id": 1}, "expiresIn": 60}))
                .unwrap();
        assert_eq!(camel.expires_in, Some(60));

        let snake: SessionResponse =
            serde_json::from_value(json!({"token": "T1", "user": {"id": 1}, "expires_in": 60}))
                .unwrap();
        assert_eq!(snake.expires_in, Some(60));
    }

    #[test]
    fn incomplete_session_response_is_rejected() {
        let no_token: SessionResponse =
            serde_json::from_value(json!({"user": {"id": 1}})).unwrap();
        assert!(no_token.into_session().is_none());

        let blank_token: SessionResponse =
            serde_json::from_value(json!({"token": "", "user": {"id": 1}})).unwrap();
        assert!(blank_token.into_session().is_none());

        let no_user: SessionResponse = serde_json::from_value(json!({"token": "T1"})).unwrap();
        assert!(no_user.into_session().is_none());
    }

    #[test]
    fn abilities_fall_back_to_user() {
        let response: SessionResponse = serde_json::from_value(json!({
            "token": "T1",
            "user": {"id": 1, "abilities": {"edit": true}}
        }))
        .unwrap();
        let session = response.into_session().unwrap();
        assert_eq!(session.abilities.get("edit"), Some(&json!(true)));
        assert!(session.expires_at.is_none());
    }

    #[test]
    fn user_payload_shapes() {
        let wrapped: UserPayload =
            serde_json::from_value(json!({"user": {"id": 1}, "abilities": {"x": 1}})).unwrap();
        let (user, abilities) = wrapped.into_parts();
        assert_eq!(user.id, 1.into());
        assert!(abilities.is_some());

        let bare: UserPayload = serde_json::from_value(json!({"id": 2, "name": "Ada"})).unwrap();
        let (user, abilities) = bare.into_parts();
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert!(abilities.is_none());
    }

    #[test]
    fn expiry_is_relative_to_now() {
        let before = Utc::now();
        let expiry = expiry_from(Some(3600)).unwrap();
        let delta = (expiry - before).num_seconds();
        assert!((3599..=3601).contains(&delta));
        assert!(expiry_from(None).is_none());
        assert!(expiry_from(Some(i64::MAX)).is_none());
    }
}
