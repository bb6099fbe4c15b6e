use std::path::PathBuf;
use std::sync::Arc;

use job_protocol::{JobTransport, TransportError};
use job_relay::config::ENV_CONFIG_PATH;
use job_relay::{ConfigError, DeliveryConfig, EnvConfig, RelayConfig, TransportChoice};
use job_transport_http::{HttpJobTransport, HttpTransportConfig, HTTP_TRANSPORT_ID};
use job_transport_mock::{ScriptedTransport, MOCK_TRANSPORT_ID};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build http transport: {0}")]
    Transport(#[from] TransportError),
}

/// Transport plus the delivery settings that go with it.
pub struct TransportSetup {
    pub id: &'static str,
    pub transport: Arc<dyn JobTransport>,
    pub delivery: DeliveryConfig,
    pub state_dir: Option<PathBuf>,
}

pub fn transport_from_env(env: &EnvConfig) -> Result<TransportSetup, StartupError> {
    match env.transport {
        TransportChoice::Mock => Ok(TransportSetup {
            id: MOCK_TRANSPORT_ID,
            transport: Arc::new(ScriptedTransport::demo()),
            delivery: DeliveryConfig::default(),
            state_dir: None,
        }),
        TransportChoice::Http => {
            let path = env
                .config_path
                .as_deref()
                .ok_or(ConfigError::MissingConfigPath(ENV_CONFIG_PATH))?;
            let config = RelayConfig::from_path(path)?;
            http_setup(&config)
        }
    }
}

pub fn http_setup(config: &RelayConfig) -> Result<TransportSetup, StartupError> {
    let mut http = HttpTransportConfig::new(config.base_url.trim());
    if let Some(token) = config.access_token.as_deref() {
        http = http.with_access_token(token);
    }
    if let Some(timeout) = config.request_timeout() {
        http = http.with_timeout(timeout);
    }

    Ok(TransportSetup {
        id: HTTP_TRANSPORT_ID,
        transport: Arc::new(HttpJobTransport::new(http)?),
        delivery: config.delivery_config(),
        state_dir: config.state_dir.clone(),
    })
}
