use serde::{Deserialize, Serialize};
use crate::models::department::RequiredRole;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Member,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn satisfies(&self, required: RequiredRole) -> bool {
        match required {
            RequiredRole::None => true,
            RequiredRole::Admin => *self >= Role::Admin,
            RequiredRole::SuperAdmin => *self == Role::SuperAdmin,
        }
    }

    /// Only the highest tier may reorganize navigation.
    pub fn can_edit_sections(&self) -> bool {
        *self == Role::SuperAdmin
    }
}

/// The acting user, resolved from a verified token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Principal {
    pub fn new(user_id: &str, role: Role) -> Self {
        Principal {
            user_id: user_id.to_string(),
            role,
            features: Vec::new(),
        }
    }
}
