use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    Expired,

    #[error("JWT error: {0}")]
    Other(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken | ErrorKind::InvalidSignature => {
                JwtError::InvalidToken(err.to_string())
            }
            _ => JwtError::Other(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,                       // Account ID
    pub email: String,
    pub name: String,
    pub account_type: String,              // player, club, academy, trainer, agent
    pub organization_id: Option<String>,   // Set for organization accounts
    pub organization_type: Option<String>,
    pub organization_name: Option<String>,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Organization scope carried by an access token
#[derive(Debug, Clone)]
pub struct OrganizationClaims {
    pub id: Uuid,
    pub organization_type: String,
    pub name: String,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_token_exp_hours: i64,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            access_token_exp_hours: 1,
        }
    }

    /// Issue an access token. Accounts are issued elsewhere; this exists for
    /// local tooling and tests.
    pub fn generate_access_token(
        &self,
        account_id: Uuid,
        email: &str,
        name: &str,
        account_type: &str,
        organization: Option<OrganizationClaims>,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.access_token_exp_hours);

        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            account_type: account_type.to_string(),
            organization_id: organization.as_ref().map(|o| o.id.to_string()),
            organization_type: organization.as_ref().map(|o| o.organization_type.clone()),
            organization_name: organization.map(|o| o.name),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
        };

        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let validation = Validation::new(self.algorithm);
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;

        if claims.token_type != TokenType::Access {
            return Err(JwtError::InvalidToken(
                "Token is not an access token".to_string(),
            ));
        }

        Ok(claims)
    }
}
