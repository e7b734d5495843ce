use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey};
use serde::{Deserialize, Serialize};
use crate::models::assignment::Scope;
use crate::models::user::{Principal, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User id
    pub role: Role,
    pub organization_id: String,
    pub vertical_id: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub exp: usize, // Expiration timestamp
}

impl Claims {
    pub fn new(user_id: &str, role: Role, scope: &Scope) -> Self {
        let expiration = (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as usize;
        Claims {
            sub: user_id.to_string(),
            role,
            organization_id: scope.organization_id.clone(),
            vertical_id: scope.vertical_id.clone(),
            features: Vec::new(),
            exp: expiration,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.sub.clone(),
            role: self.role,
            features: self.features.clone(),
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(&self.organization_id, &self.vertical_id)
    }
}

/// Tokens are issued elsewhere; this exists for tooling and tests.
pub fn generate_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map(|data| data.claims)
}
