use crate::domain::DomainError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub resources: Vec<String>,
    pub exp: usize,
}

/// Authenticated admin, attached to the request by the bearer middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub username: String,
    pub resources: Vec<String>,
}

impl AdminIdentity {
    pub fn is_allowed(&self, resource: &str) -> bool {
        self.resources.iter().any(|r| r == resource)
    }
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Result<Self, DomainError> {
        tracing::debug!(
            "Initializing JwtService with secret length: {}",
            secret.len()
        );

        if secret.len() < 32 {
            tracing::warn!(
                "JWT secret is too short ({} chars). Minimum recommended is 32 chars.",
                secret.len()
            );
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn generate_token(
        &self,
        username: &str,
        resources: Vec<String>,
        valid_for: Duration,
    ) -> Result<String, DomainError> {
        tracing::debug!(
            "Generating token for admin: {}, resources: {:?}",
            username,
            resources
        );

        let expiration = Utc::now()
            .checked_add_signed(valid_for)
            .ok_or_else(|| DomainError::InternalError("Token expiry out of range".to_string()))?
            .timestamp() as usize;

        let claims = Claims {
            sub: username.to_string(),
            resources,
            exp: expiration,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {}", e);
            DomainError::InternalError(format!("Failed to generate token: {}", e))
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<AdminIdentity, DomainError> {
        match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(token_data) => {
                tracing::debug!("Token verified for admin: {}", token_data.claims.sub);
                Ok(AdminIdentity {
                    username: token_data.claims.sub,
                    resources: token_data.claims.resources,
                })
            }
            Err(e) => {
                tracing::warn!("Token verification failed: {}", e);
                Err(DomainError::Unauthorized(format!("Invalid token: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn token_carries_identity_and_resources() {
        let jwt = JwtService::new(SECRET).unwrap();
        let token = jwt
            .generate_token("admin", vec!["DoubleV_Blog::posts".into()], Duration::hours(1))
            .unwrap();

        let identity = jwt.verify_token(&token).unwrap();
        assert_eq!(identity.username, "admin");
        assert!(identity.is_allowed("DoubleV_Blog::posts"));
        assert!(!identity.is_allowed("DoubleV_Blog::comments"));
    }

    #[test]
    fn foreign_or_expired_tokens_are_rejected() {
        let jwt = JwtService::new(SECRET).unwrap();
        let other = JwtService::new("another-secret-another-secret-!!").unwrap();
        let token = other
            .generate_token("admin", Vec::new(), Duration::hours(1))
            .unwrap();
        assert!(matches!(jwt.verify_token(&token), Err(DomainError::Unauthorized(_))));

        let expired = jwt
            .generate_token("admin", Vec::new(), Duration::hours(-2))
            .unwrap();
        assert!(matches!(jwt.verify_token(&expired), Err(DomainError::Unauthorized(_))));
    }
}
