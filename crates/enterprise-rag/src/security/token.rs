use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::SecurityConfig;
use crate::error::{Error, Result};

/// JWT claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration time (unix seconds)
    pub exp: i64,
}

/// Issues and verifies HS256 access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("default_lifetime", &self.default_lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service from a shared secret
    pub fn new(secret: &str, default_lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            default_lifetime,
        }
    }

    /// Create from security configuration
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        let lifetime = Duration::try_minutes(config.access_token_expire_minutes)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Invalid access token lifetime: {} minutes",
                    config.access_token_expire_minutes
                ))
            })?;
        Ok(Self::new(&config.secret_key, lifetime))
    }

    /// Lifetime applied when no explicit expiry is requested
    pub fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }

    /// Create a signed access token for `subject`
    pub fn create_access_token(&self, subject: &str, expires_in: Option<Duration>) -> Result<String> {
        let now = Utc::now();
        let exp = now + expires_in.unwrap_or(self.default_lifetime);

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Verify a token and return its claims
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                Error::Unauthorized("Could not validate credentials".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::minutes(30))
    }

    #[test]
    fn test_jwt_token_round_trip() {
        let tokens = service();
        let token = tokens.create_access_token("testuser", None).unwrap();

        let claims = tokens.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "testuser");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_custom_expiry() {
        let tokens = service();
        let token = tokens
            .create_access_token("alice", Some(Duration::minutes(5)))
            .unwrap();
        let claims = tokens.verify_token(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service();
        let token = tokens
            .create_access_token("alice", Some(Duration::minutes(-5)))
            .unwrap();
        assert!(matches!(tokens.verify_token(&token), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service().create_access_token("alice", None).unwrap();
        let other = TokenService::new("another-secret", Duration::minutes(30));
        assert!(matches!(other.verify_token(&token), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_out_of_range_lifetime_is_config_error() {
        let config = SecurityConfig {
            secret_key: "k".to_string(),
            access_token_expire_minutes: i64::MAX,
            ..SecurityConfig::default()
        };
        assert!(matches!(TokenService::from_config(&config), Err(Error::Config(_))));

        let config = SecurityConfig {
            secret_key: "k".to_string(),
            access_token_expire_minutes: 15,
            ..SecurityConfig::default()
        };
        let tokens = TokenService::from_config(&config).unwrap();
        assert_eq!(tokens.default_lifetime(), Duration::minutes(15));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            service().verify_token("not.a.token"),
            Err(Error::Unauthorized(_))
        ));
    }
}
