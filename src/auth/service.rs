use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use log::debug;

use super::{TokenClaims, User};
use crate::integration::idp;

#[async_trait]
pub trait AuthService {
    async fn validate(&self, token: &str) -> super::Result<User>;
}

#[derive(Clone)]
pub struct AuthServiceImpl {
    decoding_key: DecodingKey,
    jwt_validator: Validation,
}

impl AuthServiceImpl {
    pub fn new(cfg: &idp::Config) -> Self {
        let jwt_validator = {
            let mut v = Validation::new(Algorithm::HS256);
            v.set_required_spec_claims(&["exp", "sub"]);
            if let Some(issuer) = cfg.issuer() {
                v.set_issuer(&[issuer]);
            }
            if let Some(audience) = cfg.audience() {
                v.set_audience(&[audience]);
            } else {
                v.validate_aud = false;
            }
            v
        };

        Self {
            decoding_key: DecodingKey::from_secret(cfg.jwt_secret()),
            jwt_validator,
        }
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn validate(&self, token: &str) -> super::Result<User> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.jwt_validator)
            .inspect_err(|e| debug!("Rejected token: {e}"))?;

        Ok(User::new(data.claims.sub.into()))
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;
    use uuid::Uuid;

    use super::*;

    const SECRET: &str = "test-secret";

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: Uuid,
        exp: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        iss: Option<&'a str>,
    }

    fn token(secret: &str, sub: Uuid, exp_offset: i64, iss: Option<&str>) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as u64;
        encode(
            &Header::new(Algorithm::HS256),
            &Claims { sub, exp, iss },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn should_validate_token() {
        let service = AuthServiceImpl::new(&idp::Config::new(SECRET, None, None));
        let sub = Uuid::new_v4();

        let user = service.validate(&token(SECRET, sub, 3600, None)).await.unwrap();

        assert_eq!(user.id().get(), &sub);
    }

    #[tokio::test]
    async fn should_reject_foreign_signature() {
        let service = AuthServiceImpl::new(&idp::Config::new(SECRET, None, None));

        let res = service
            .validate(&token("other-secret", Uuid::new_v4(), 3600, None))
            .await;

        assert!(res.is_err());
    }

    #[tokio::test]
    async fn should_reject_expired_token() {
        let service = AuthServiceImpl::new(&idp::Config::new(SECRET, None, None));

        let res = service
            .validate(&token(SECRET, Uuid::new_v4(), -3600, None))
            .await;

        assert!(res.is_err());
    }

    #[tokio::test]
    async fn should_check_issuer_when_configured() {
        let service = AuthServiceImpl::new(&idp::Config::new(
            SECRET,
            Some("marketplace".into()),
            None,
        ));
        let sub = Uuid::new_v4();

        assert!(
            service
                .validate(&token(SECRET, sub, 3600, Some("marketplace")))
                .await
                .is_ok()
        );
        assert!(
            service
                .validate(&token(SECRET, sub, 3600, Some("elsewhere")))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn should_reject_garbage() {
        let service = AuthServiceImpl::new(&idp::Config::new(SECRET, None, None));

        assert!(service.validate("not-a-jwt").await.is_err());
    }
}
