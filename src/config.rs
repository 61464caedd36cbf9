use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::engine::EngineParams;
use crate::engine::params::ALPHA_MAX;
use crate::identity::Identity;

/// Configuration for the ATOM engine service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Engine parameter configuration
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Enable request/response span logging
    pub log_requests: bool,
}

/// Boot-time engine parameter settings. The authority is mandatory; the
/// smoothing overrides are optional and validated against the same bounds
/// the governance surface enforces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Hex-encoded 32-byte authority identity - MUST be configured
    pub authority: String,
    pub alpha_fast: Option<u16>,
    pub alpha_slow: Option<u16>,
    pub alpha_volatility: Option<u16>,
    pub alpha_arrival: Option<u16>,
}

impl Default for AtomConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8810,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                log_requests: false,
            },
            engine: EngineSettings {
                authority: String::new(), // MUST be configured
                alpha_fast: None,
                alpha_slow: None,
                alpha_volatility: None,
                alpha_arrival: None,
            },
        }
    }
}

impl AtomConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("ATOM_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = env::var("ATOM_PORT") {
            config.server.port = port.parse().context("Invalid ATOM_PORT value")?;
        }

        if let Ok(level) = env::var("ATOM_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(log_requests) = env::var("ATOM_LOG_REQUESTS") {
            config.logging.log_requests = log_requests
                .parse()
                .context("Invalid ATOM_LOG_REQUESTS value")?;
        }

        config.engine.authority =
            env::var("ATOM_AUTHORITY").context("ATOM_AUTHORITY environment variable is required")?;

        if let Ok(alpha) = env::var("ATOM_ALPHA_FAST") {
            config.engine.alpha_fast =
                Some(alpha.parse().context("Invalid ATOM_ALPHA_FAST value")?);
        }
        if let Ok(alpha) = env::var("ATOM_ALPHA_SLOW") {
            config.engine.alpha_slow =
                Some(alpha.parse().context("Invalid ATOM_ALPHA_SLOW value")?);
        }
        if let Ok(alpha) = env::var("ATOM_ALPHA_VOLATILITY") {
            config.engine.alpha_volatility = Some(
                alpha
                    .parse()
                    .context("Invalid ATOM_ALPHA_VOLATILITY value")?,
            );
        }
        if let Ok(alpha) = env::var("ATOM_ALPHA_ARRIVAL") {
            config.engine.alpha_arrival =
                Some(alpha.parse().context("Invalid ATOM_ALPHA_ARRIVAL value")?);
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.engine.authority.is_empty() {
            return Err(anyhow::anyhow!("Engine authority is required"));
        }

        Identity::from_hex(&self.engine.authority)
            .map_err(|e| anyhow::anyhow!("Engine authority must be 32 bytes of hex: {}", e))?;

        for (name, alpha) in [
            ("alpha_fast", self.engine.alpha_fast),
            ("alpha_slow", self.engine.alpha_slow),
            ("alpha_volatility", self.engine.alpha_volatility),
            ("alpha_arrival", self.engine.alpha_arrival),
        ] {
            if let Some(v) = alpha {
                if v == 0 || v > ALPHA_MAX {
                    return Err(anyhow::anyhow!(
                        "Engine {} must be in 1..={}, got {}",
                        name,
                        ALPHA_MAX,
                        v
                    ));
                }
            }
        }

        Ok(())
    }

    /// Build the boot-time engine parameters from this configuration.
    pub fn to_engine_params(&self) -> Result<EngineParams> {
        let authority = Identity::from_hex(&self.engine.authority)
            .map_err(|e| anyhow::anyhow!("Engine authority must be 32 bytes of hex: {}", e))?;

        let mut params = EngineParams::new(authority);
        if let Some(v) = self.engine.alpha_fast {
            params.alpha_fast = v;
        }
        if let Some(v) = self.engine.alpha_slow {
            params.alpha_slow = v;
        }
        if let Some(v) = self.engine.alpha_volatility {
            params.alpha_volatility = v;
        }
        if let Some(v) = self.engine.alpha_arrival {
            params.alpha_arrival = v;
        }

        Ok(params)
    }
}
