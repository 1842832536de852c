use std::env;
use std::fs::File;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderValue;
use dotenv::dotenv;
use log::{LevelFilter, warn};
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin};

pub mod cache;
pub mod db;
pub mod idp;
pub mod pubsub;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, PartialEq)]
pub enum Env {
    Local,
    Dev,
    Stage,
    Production,
}

impl FromStr for Env {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Env::Local),
            "dev" => Ok(Env::Dev),
            "stg" => Ok(Env::Stage),
            "prod" => Ok(Env::Production),
            other => Err(Error::InvalidEnv(other.to_string())),
        }
    }
}

impl Env {
    pub fn addr(&self) -> SocketAddr {
        match self {
            Env::Local => SocketAddr::from(([127, 0, 0, 1], 8000)),
            Env::Dev | Env::Stage => SocketAddr::from(([0, 0, 0, 0], 8000)),
            Env::Production => SocketAddr::from(([0, 0, 0, 0], 8443)),
        }
    }

    pub fn allow_methods(&self) -> AllowMethods {
        match self {
            Env::Local | Env::Dev | Env::Stage | Env::Production => AllowMethods::any(),
        }
    }

    pub fn allow_headers(&self) -> AllowHeaders {
        match self {
            Env::Local | Env::Dev | Env::Stage | Env::Production => AllowHeaders::any(),
        }
    }
}

#[derive(Clone)]
pub struct Tls {
    pub cert_file: String,
    pub key_file: String,
}

#[derive(Clone)]
pub struct Config {
    pub env: Env,
    pub allow_origin: Vec<HeaderValue>,
    pub tls: Option<Tls>,

    pub postgres: db::Config,
    pub redis: Option<cache::Config>,
    pub pubsub: Option<pubsub::Config>,

    pub idp: idp::Config,
}

impl Config {
    pub fn env() -> Result<Self> {
        dotenv().ok();

        let env = match env::var("ENV") {
            Ok(e) => e.parse()?,
            Err(_) => Env::Local,
        };

        let allow_origin = match env {
            Env::Local | Env::Dev => Vec::new(),
            Env::Stage | Env::Production => env::var("ALLOW_ORIGIN")?
                .split(',')
                .map(|o| {
                    HeaderValue::from_str(o.trim()).map_err(|_| Error::InvalidOrigin(o.into()))
                })
                .collect::<Result<Vec<_>>>()?,
        };

        let tls = match env {
            Env::Production => Some(Tls {
                cert_file: env::var("SSL_CERT_FILE")?,
                key_file: env::var("SSL_KEY_FILE")?,
            }),
            _ => None,
        };

        let redis = cache::Config::env().ok();
        if redis.is_none() {
            warn!("Redis env is not configured, caching is disabled");
        }

        Ok(Self {
            env,
            allow_origin,
            tls,
            postgres: db::Config::env().unwrap_or_default(),
            redis,
            pubsub: pubsub::Config::env(),
            idp: idp::Config::env()?,
        })
    }

    pub fn allow_origin(&self) -> AllowOrigin {
        if self.allow_origin.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(self.allow_origin.clone())
        }
    }
}

pub fn init_logger() -> Result<()> {
    dotenv().ok();

    let rust_log = env::var("RUST_LOG").unwrap_or("info".into());
    let level = LevelFilter::from_str(&rust_log).unwrap_or(LevelFilter::Info);
    let log_file = env::var("SERVICE_NAME")
        .map(|pkg| format!("{pkg}.log"))
        .unwrap_or("service.log".into());

    CombinedLogger::init(vec![
        TermLogger::new(
            level,
            simplelog::Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(level, simplelog::Config::default(), File::create(log_file)?),
    ])?;

    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid environment: {0}")]
    InvalidEnv(String),
    #[error("invalid allowed origin: {0}")]
    InvalidOrigin(String),

    #[error(transparent)]
    _Env(#[from] env::VarError),
    #[error(transparent)]
    _ParseInt(#[from] std::num::ParseIntError),
    #[error(transparent)]
    _Io(#[from] std::io::Error),
    #[error(transparent)]
    _Logger(#[from] log::SetLoggerError),
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Redis(#[from] redis::RedisError),
    #[error(transparent)]
    _Nats(#[from] async_nats::ConnectError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_env() {
        assert_eq!("local".parse::<Env>().unwrap(), Env::Local);
        assert_eq!("dev".parse::<Env>().unwrap(), Env::Dev);
        assert_eq!("stg".parse::<Env>().unwrap(), Env::Stage);
        assert_eq!("prod".parse::<Env>().unwrap(), Env::Production);
    }

    #[test]
    fn should_reject_unknown_env() {
        let err = "qa".parse::<Env>().unwrap_err();
        assert!(matches!(err, Error::InvalidEnv(e) if e == "qa"));
    }

    #[test]
    fn should_bind_production_to_tls_port() {
        assert_eq!(Env::Production.addr().port(), 8443);
        assert_eq!(Env::Local.addr().ip().to_string(), "127.0.0.1");
    }
}
