use std::path::Path;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

// ============================================================================
// Configuration
// ============================================================================

/// Rates and targets driving the churn engine
///
/// All `*_rate` fields are divisors: a rate of 5 means one fifth of the
/// relevant population changes state per tick.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MockerConfig {
    /// Label of this mocker instance (appears in logs)
    pub id: String,

    /// Size of the seed population (informational for the engine, used by the binaries)
    pub node_count: usize,

    /// Tick period in milliseconds (default: 1000)
    pub update_interval: u64,

    /// Fraction of off nodes switching on per tick (default: 5 = 1/5)
    pub switchon_rate: usize,

    /// Fraction of on nodes dropping out per tick (default: 100 = 1/100)
    pub dropout_rate: usize,

    /// New connections attempted per on node per tick (default: 1)
    pub new_conn_count: usize,

    /// Fraction of attempted connections failing (default: 100 = 1/100)
    pub conn_fail_rate: usize,

    /// Fraction of active connections dropped per tick (default: 100 = 1/100)
    pub disconn_rate: usize,

    /// Number of on nodes to converge on (default: 50)
    pub nodes_target: usize,

    /// Connections per on node to converge on (default: 8)
    pub degree_target: usize,

    /// Speed of convergence towards `nodes_target`, higher is slower (default: 5)
    pub convergence_rate: usize,

    /// Random seed for reproducibility (None = from entropy)
    #[serde(skip)]
    pub seed: Option<[u8; 32]>,
}

impl Default for MockerConfig {
    fn default() -> Self {
        Self {
            id: "0".to_string(),
            node_count: 100,
            update_interval: 1000,
            switchon_rate: 5,
            dropout_rate: 100,
            new_conn_count: 1,
            conn_fail_rate: 100,
            disconn_rate: 100,
            nodes_target: 50,
            degree_target: 8,
            convergence_rate: 5,
            seed: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MockerConfig {
    /// Parse a YAML document; missing keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: MockerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject settings that would divide by zero or stall the timer
    pub fn validate(&self) -> Result<(), ConfigError> {
        let divisors = [
            ("switchon_rate", self.switchon_rate),
            ("dropout_rate", self.dropout_rate),
            ("conn_fail_rate", self.conn_fail_rate),
            ("disconn_rate", self.disconn_rate),
            ("convergence_rate", self.convergence_rate),
        ];
        for (field, value) in divisors {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.update_interval == 0 {
            return Err(ConfigError::Zero {
                field: "update_interval",
            });
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.update_interval)
    }

    /// Active links needed for every on node to reach `degree_target`
    ///
    /// Halved because each link counts towards the degree of both endpoints.
    pub fn edge_target(&self) -> usize {
        self.nodes_target.saturating_mul(self.degree_target) / 2
    }

    /// Get or generate seed
    pub fn resolve_seed(&self) -> [u8; 32] {
        self.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            StdRng::from_entropy().fill_bytes(&mut seed);
            seed
        })
    }
}

/// Parse a hex seed such as `0x1234...` (short input is zero padded)
pub fn parse_seed_hex(hex: &str) -> Result<[u8; 32], String> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        if i >= 32 {
            break;
        }
        let byte_str = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
        seed[i] = u8::from_str_radix(byte_str, 16)
            .map_err(|e| format!("invalid hex seed '{}': {}", byte_str, e))?;
    }

    Ok(seed)
}
