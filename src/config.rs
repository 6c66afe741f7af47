//! Harness configuration
//!
//! Defines the eval.toml schema and the request-flag enums shared by the
//! collectors and the ablation study.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Claim-verification mode requested from the service
///
/// - `Off`: stage 4 is skipped entirely
/// - `Consistency`: claims are checked for internal consistency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    Off,
    #[default]
    Consistency,
}

impl VerificationMode {
    /// Wire value submitted in the request payload
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Consistency => "consistency",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Some(Self::Off),
            "consistency" => Some(Self::Consistency),
            _ => None,
        }
    }
}

/// Harness configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Base URL of the council service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Delay between consecutive requests (milliseconds)
    ///
    /// A courtesy to the remote endpoint, owed after every request whether
    /// it succeeded or not.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Council size for the full pipeline
    #[serde(default = "default_council_size")]
    pub council_size: u32,
}

fn default_endpoint() -> String {
    "http://localhost:8787".to_string()
}
fn default_pacing_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_council_size() -> u32 {
    3
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            pacing_ms: default_pacing_ms(),
            request_timeout_secs: default_timeout_secs(),
            council_size: default_council_size(),
        }
    }
}

impl EvalConfig {
    /// Load config from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read eval config: {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse eval config: {:?}", path))?;
        Ok(config)
    }

    /// Load from default location (./eval.toml) or return defaults
    pub fn load_default() -> Result<Self> {
        let local_path = Path::new("eval.toml");
        if local_path.exists() {
            return Self::load(local_path);
        }
        Ok(Self::default())
    }

    /// Save config to TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn pacing(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pacing_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_mode_from_str() {
        assert_eq!(VerificationMode::from_str("off"), Some(VerificationMode::Off));
        assert_eq!(
            VerificationMode::from_str("Consistency"),
            Some(VerificationMode::Consistency)
        );
        assert_eq!(VerificationMode::from_str("invalid"), None);
    }

    #[test]
    fn test_eval_config_defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.endpoint, "http://localhost:8787");
        assert_eq!(config.pacing_ms, 1000);
        assert_eq!(config.council_size, 3);
    }

    #[test]
    fn test_eval_config_toml() {
        let toml_str = r#"
endpoint = "https://council.example.com"
pacing_ms = 250
"#;
        let config: EvalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.endpoint, "https://council.example.com");
        assert_eq!(config.pacing_ms, 250);
        // Unspecified fields fall back to defaults
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.council_size, 3);
    }
}
