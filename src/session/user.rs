//! Identity snapshot returned by the API. Servers disagree on the shape of the
//! role (a bare slug or an object with a `slug`), so both are accepted. Fields
//! this crate does not model are kept in `extra` and written back untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt};

/// Ability name to a JSON value judged by truthiness.
pub type Abilities = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Customer,
    Admin,
    Manager,
    Other(String),
}

impl Role {
    /// Slugs are matched exactly; `"Admin"` is an unknown role.
    #[must_use]
    pub fn from_slug(slug: &str) -> Self {
        match slug {
            "customer" => Self::Customer,
            "admin" => Self::Admin,
            "manager" => Self::Manager,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Other(slug) => slug,
        }
    }

    /// Admin and manager roles grant administrative access.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Role as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    Slug(String),
    Object {
        slug: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl RoleRef {
    #[must_use]
    pub fn slug(&self) -> &str {
        match self {
            Self::Slug(slug) | Self::Object { slug, .. } => slug,
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        Role::from_slug(self.slug())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abilities: Option<Abilities>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            role: None,
            abilities: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, slug: &str) -> Self {
        self.role = Some(RoleRef::Slug(slug.to_string()));
        self
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role.as_ref().map(RoleRef::role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(|role| role.is_admin())
    }

    /// Merges a server update into this snapshot. Role and abilities survive
    /// unless the update carries its own.
    #[must_use]
    pub fn merged_with(&self, update: Self) -> Self {
        Self {
            role: update.role.or_else(|| self.role.clone()),
            abilities: update.abilities.or_else(|| self.abilities.clone()),
            ..update
        }
    }
}

/// Loose truthiness: `false`, `0`, `""`, and `null` are false.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
