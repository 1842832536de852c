use std::env;

use crate::integration::Result;

#[derive(Clone)]
pub struct Config {
    jwt_secret: String,
    issuer: Option<String>,
    audience: Option<String>,
}

impl Config {
    pub fn new(
        jwt_secret: impl Into<String>,
        issuer: Option<String>,
        audience: Option<String>,
    ) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            issuer,
            audience,
        }
    }

    pub fn env() -> Result<Self> {
        Ok(Self::new(
            env::var("JWT_SECRET")?,
            env::var("JWT_ISSUER").ok(),
            env::var("JWT_AUDIENCE").ok(),
        ))
    }

    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }
}
