use std::{env, time::Duration};

use log::*;
use sps_common::Secret;

const DEFAULT_SPS_HOST: &str = "127.0.0.1";
const DEFAULT_SPS_PORT: u16 = 8360;
const DEFAULT_GATEWAY_URL: &str = "https://dev-vanilla.edviron.com/erp";
const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Payment gateway configuration
    pub gateway: GatewayConfig,
}

/// Everything needed to talk to the Edviron collect-request API.
#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    /// The base url of the gateway's ERP API, e.g. "https://dev-vanilla.edviron.com/erp"
    pub base_url: String,
    /// The school identifier the gateway issued to this deployment.
    pub school_id: String,
    /// The trustee identifier orders are created under.
    pub trustee_id: String,
    /// The signing key for gateway request payloads.
    pub pg_key: Secret<String>,
    /// The bearer token for the gateway's REST API.
    pub api_key: Secret<String>,
    /// Where the gateway redirects the payer after the payment attempt.
    pub callback_url: String,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPS_HOST.to_string(),
            port: DEFAULT_SPS_PORT,
            database_url: String::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPS_HOST").ok().unwrap_or_else(|| DEFAULT_SPS_HOST.into());
        let port = env::var("SPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPS_PORT. {e} Using the default, {DEFAULT_SPS_PORT}, instead."
                    );
                    DEFAULT_SPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPS_PORT);
        let database_url = env::var("SPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPS_DATABASE_URL is not set. Please set it to the URL for the payment database.");
            String::default()
        });
        let gateway = GatewayConfig::from_env_or_default();
        Self { host, port, database_url, gateway }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("SPS_GATEWAY_URL").ok().unwrap_or_else(|| {
            info!("🪛️ SPS_GATEWAY_URL is not set. Using the default, {DEFAULT_GATEWAY_URL}.");
            DEFAULT_GATEWAY_URL.into()
        });
        let school_id = env::var("SPS_SCHOOL_ID").ok().unwrap_or_else(|| {
            error!("🪛️ SPS_SCHOOL_ID is not set. The gateway will reject collect requests without it.");
            String::default()
        });
        let trustee_id = env::var("SPS_TRUSTEE_ID").ok().unwrap_or_else(|| {
            warn!("🪛️ SPS_TRUSTEE_ID is not set. Orders will be created with an empty trustee id.");
            String::default()
        });
        let pg_key = env::var("SPS_PG_KEY").map(Secret::new).unwrap_or_else(|_| {
            error!("🪛️ SPS_PG_KEY is not set. Gateway request signing will fail without it.");
            Secret::default()
        });
        let api_key = env::var("SPS_API_KEY").map(Secret::new).unwrap_or_else(|_| {
            error!("🪛️ SPS_API_KEY is not set. The gateway will reject unauthenticated requests.");
            Secret::default()
        });
        let callback_url = env::var("SPS_CALLBACK_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPS_CALLBACK_URL is not set. The gateway will not know where to send the payer afterwards.");
            String::default()
        });
        let timeout = env::var("SPS_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT);
        Self { base_url, school_id, trustee_id, pg_key, api_key, callback_url, timeout }
    }
}
