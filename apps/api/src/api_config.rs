use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use casewell_core::{AppError, DomainName};
use tracing_subscriber::EnvFilter;
use url::Url;

/// What the binary does after loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCommand {
    Serve,
    Migrate,
    SyncRoles(DomainName),
}

impl ApiCommand {
    pub fn from_args<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        match args.next().as_deref() {
            None | Some("serve") => Ok(Self::Serve),
            Some("migrate") => Ok(Self::Migrate),
            Some("sync-roles") => {
                let domain = args.next().ok_or_else(|| {
                    AppError::Validation("sync-roles requires a domain argument".to_owned())
                })?;
                Ok(Self::SyncRoles(DomainName::new(domain)?))
            }
            Some(other) => Err(AppError::Validation(format!(
                "unknown command '{other}', expected 'serve', 'migrate' or 'sync-roles <domain>'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub command: ApiCommand,
    pub database_url: String,
    pub mongodb_url: Option<String>,
    pub mongodb_database: String,
    pub search_backend_url: Url,
    pub search_index: String,
    pub redis_url: Option<String>,
    pub case_search_config_cache_ttl_seconds: u32,
    pub case_search_max_results: usize,
    pub max_related_cases: usize,
    pub api_shared_secret: String,
    pub api_host: String,
    pub api_port: u16,
    pub frontend_url: String,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let command = ApiCommand::from_args(env::args().skip(1))?;

        let database_url = required_env("DATABASE_URL")?;
        let mongodb_url = optional_non_empty_env("MONGODB_URL");
        let mongodb_database =
            env::var("MONGODB_DATABASE").unwrap_or_else(|_| "casewell".to_owned());

        let search_backend_url = required_non_empty_env("SEARCH_BACKEND_URL")?;
        let search_backend_url = Url::parse(&search_backend_url).map_err(|error| {
            AppError::Validation(format!("invalid SEARCH_BACKEND_URL: {error}"))
        })?;
        let search_index = env::var("SEARCH_INDEX").unwrap_or_else(|_| "case_search".to_owned());

        let redis_url = optional_non_empty_env("REDIS_URL");
        let case_search_config_cache_ttl_seconds =
            parse_env_or("CASE_SEARCH_CONFIG_CACHE_TTL_SECONDS", 300_u32)?;
        let case_search_max_results = parse_env_or("CASE_SEARCH_MAX_RESULTS", 500_usize)?;
        let max_related_cases = parse_env_or("MAX_RELATED_CASES", 500_usize)?;

        let api_shared_secret = required_env("API_SHARED_SECRET")?;
        validate_shared_secret(&api_shared_secret)?;

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        Ok(Self {
            command,
            database_url,
            mongodb_url,
            mongodb_database,
            search_backend_url,
            search_index,
            redis_url,
            case_search_config_cache_ttl_seconds,
            case_search_max_results,
            max_related_cases,
            api_shared_secret,
            api_host,
            api_port,
            frontend_url,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn validate_shared_secret(secret: &str) -> Result<(), AppError> {
    if secret.len() < 32 {
        return Err(AppError::Validation(
            "API_SHARED_SECRET must be at least 32 characters".to_owned(),
        ));
    }

    Ok(())
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_non_empty_env(name) {
        Some(value) => parse_value(name, &value),
        None => Ok(default),
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}")))
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn optional_non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
