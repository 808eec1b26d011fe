use anyhow::Context;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::{claims::Claims, errors::AuthError},
    config::JwtConfig,
};

/// Signing and verification material built once from [`JwtConfig`].
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> anyhow::Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm: cfg.algorithm()?,
            ttl: Duration::seconds(
                cfg.ttl_minutes
                    .checked_mul(60)
                    .context("token lifetime out of range")?,
            ),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for `subject` with the configured lifetime.
    pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
        self.issue_with_ttl(subject, self.ttl())
    }

    pub fn issue_with_ttl(&self, subject: &str, ttl: Duration) -> Result<String, AuthError> {
        self.issue_at(subject, OffsetDateTime::now_utc(), ttl)
    }

    pub(crate) fn issue_at(
        &self,
        subject: &str,
        now: OffsetDateTime,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let exp = now
            .checked_add(ttl)
            .ok_or_else(|| AuthError::Token("ttl out of range".into()))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| AuthError::Token(e.to_string()))?;
        debug!(sub = %subject, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// Checks signature and expiry, returning the subject.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    pub(crate) fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<String, AuthError> {
        // Expiry is checked below against `now` so the boundary is exact.
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AuthError::InvalidToken
        })?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        if now.unix_timestamp() >= data.claims.exp as i64 {
            debug!(sub = %data.claims.sub, exp = data.claims.exp, "jwt expired");
            return Err(AuthError::Expired);
        }
        debug!(sub = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}
