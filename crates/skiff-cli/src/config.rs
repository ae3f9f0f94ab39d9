//! Configuration system for the Skiff CLI.

use serde::{Deserialize, Serialize};
use skiff_core::{SessionConfig, TextFraming};
use skiff_crypto::dh::DhParameters;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Skiff configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Protocol parameters; must match on both peers
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,
    /// Receive configuration
    #[serde(default)]
    pub receive: ReceiveConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Diffie-Hellman group selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DhGroup {
    /// RFC 3526 2048-bit MODP group
    #[default]
    Modp2048,
    /// Tiny `23` / `5` group; insecure, for interoperability testing
    Reference,
    /// `prime` and `base` given explicitly
    Custom,
}

/// Text token framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Public value and filenames end with a newline
    #[default]
    Delimited,
    /// No delimiter; token boundaries follow the peer's writes
    Unframed,
}

impl From<Framing> for TextFraming {
    fn from(framing: Framing) -> Self {
        match framing {
            Framing::Delimited => TextFraming::Delimited,
            Framing::Unframed => TextFraming::Unframed,
        }
    }
}

/// Protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// DH group
    #[serde(default)]
    pub group: DhGroup,
    /// Decimal prime for the custom group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prime: Option<String>,
    /// Generator for the custom group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<u64>,
    /// Chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Bound on filenames and public values
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
    /// Text token framing
    #[serde(default)]
    pub framing: Framing,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// Receive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveConfig {
    /// Directory received files are written into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_chunk_size() -> usize {
    skiff_core::DEFAULT_CHUNK_SIZE
}

fn default_max_text_len() -> usize {
    skiff_core::DEFAULT_MAX_TEXT_LEN
}

fn default_listen_addr() -> String {
    "0.0.0.0:12345".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            group: DhGroup::default(),
            prime: None,
            base: None,
            chunk_size: default_chunk_size(),
            max_text_len: default_max_text_len(),
            framing: Framing::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("skiff/config.toml")
    }

    /// Load config from default path, or create default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Parse listen address as `SocketAddr`
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed.
    pub fn parse_listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.network.listen_addr.parse()?)
    }

    /// Resolve the configured DH group
    ///
    /// # Errors
    ///
    /// Returns an error if a custom group is incomplete or invalid.
    pub fn dh_parameters(&self) -> anyhow::Result<DhParameters> {
        let protocol = &self.protocol;
        match protocol.group {
            DhGroup::Modp2048 => Ok(DhParameters::modp_2048()),
            DhGroup::Reference => Ok(DhParameters::reference()),
            DhGroup::Custom => {
                let (Some(prime), Some(base)) = (&protocol.prime, protocol.base) else {
                    anyhow::bail!("Custom DH group requires both `prime` and `base`");
                };
                Ok(DhParameters::from_decimal(prime, &base.to_string())?)
            }
        }
    }

    /// Build the session configuration shared by every connection
    ///
    /// # Errors
    ///
    /// Returns an error if the protocol section is invalid.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let session = SessionConfig {
            dh: self.dh_parameters()?,
            chunk_size: self.protocol.chunk_size,
            max_text_len: self.protocol.max_text_len,
            text_framing: self.protocol.framing.into(),
            max_record_len: None,
        };
        session.validate()?;
        Ok(session)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.parse_listen_addr()?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        if self.protocol.group != DhGroup::Custom
            && (self.protocol.prime.is_some() || self.protocol.base.is_some())
        {
            anyhow::bail!("`prime` and `base` are only used with group = \"custom\"");
        }

        self.session_config()?;

        Ok(())
    }
}
