use std::sync::LazyLock;

use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = ENV_VARS.get_or_try_init(|| async { Env::new() }).await?;
    Ok(match var {
        Var::DatabaseUrl => &vars.database_url,
        Var::ServerApiPort => &vars.server_api_port,
        Var::InternalToken => &vars.internal_post_token,
        Var::CorsAllowOrigins => &vars.cors_allow_origins,
        Var::OtelExporterEndpoint => &vars.otel_exporter_otlp_endpoint,
        Var::ApiServiceName => &vars.api_service_name,
        Var::ApiTracerName => &vars.api_tracer_name,
    })
}

#[derive(Debug, Clone)]
pub struct Env {
    pub database_url: String,
    pub server_api_port: String,
    pub internal_post_token: String,
    pub cors_allow_origins: String,
    pub otel_exporter_otlp_endpoint: String,
    pub api_service_name: String,
    pub api_tracer_name: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_api_port: required("SERVER_API_PORT")?,
            internal_post_token: required("INTERNAL_POST_TOKEN")?,
            cors_allow_origins: optional("CORS_ALLOW_ORIGINS"),
            // empty endpoint means "log to stdout only"
            otel_exporter_otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
            api_service_name: or_default("API_SERVICE_NAME", "lumen-rewards"),
            api_tracer_name: or_default("API_TRACER_NAME", "lumen-rewards-api"),
        })
    }
}

fn required(key: &'static str) -> EnvResult<String> {
    match dotenvy::var(key) {
        Ok(val) => Ok(val),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => {
            Err(EnvErr::MissingValue(key))
        }
        Err(e) => Err(EnvErr::Dotenvy(e)),
    }
}

fn optional(key: &'static str) -> String {
    dotenvy::var(key).unwrap_or_default()
}

fn or_default(key: &'static str, default: &str) -> String {
    dotenvy::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug)]
pub enum Var {
    DatabaseUrl,
    ServerApiPort,
    InternalToken,
    CorsAllowOrigins,
    OtelExporterEndpoint,
    ApiServiceName,
    ApiTracerName,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error("missing required environment variable '{0}'")]
    MissingValue(&'static str),
}
