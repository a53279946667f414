//! Session configuration.
//!
//! [`AgentOptions`] can be built in code, parsed from a TOML file, or read
//! from `IDVAULT_*` environment variables (with `.env` support via
//! `dotenvy`).
//!
//! ```toml
//! project_id = "0123456789abcdef"
//! network = "goerli"
//! force_overwrite = false
//! lock_timeout_ms = 5000
//! ```

use std::path::Path;
use std::time::Duration;

use idvault_store::StoreOptions;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

pub const ENV_PROJECT_ID: &str = "IDVAULT_PROJECT_ID";
pub const ENV_NETWORK: &str = "IDVAULT_NETWORK";
pub const ENV_FORCE_OVERWRITE: &str = "IDVAULT_FORCE_OVERWRITE";
pub const ENV_LOCK_TIMEOUT_MS: &str = "IDVAULT_LOCK_TIMEOUT_MS";

/// Options for [`Session::open`](crate::Session::open).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOptions {
    /// RPC provider project id, used when none is stored yet.
    pub project_id: Option<String>,

    /// Ethereum network name, used when none is stored yet.
    pub network: Option<String>,

    /// Discard stores that cannot be decrypted with the session key.
    pub force_overwrite: bool,

    /// Bound on lock waits, in milliseconds.  Unset waits forever.
    pub lock_timeout_ms: Option<u64>,
}

impl AgentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Options for each store the session opens.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            force: self.force_overwrite,
            lock_timeout: self.lock_timeout(),
        }
    }

    /// Parse options from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let opts = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded agent options");
        Ok(opts)
    }

    /// Read options from the process environment, after loading a `.env`
    /// file if one is present.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_vars(std::env::vars())
    }

    /// Build options from `IDVAULT_*` key/value pairs; other keys are
    /// ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut opts = Self::default();
        for (key, value) in vars {
            let value: String = value.into();
            match key.as_ref() {
                ENV_PROJECT_ID => opts.project_id = Some(value),
                ENV_NETWORK => opts.network = Some(value),
                ENV_FORCE_OVERWRITE => opts.force_overwrite = parse_bool(&value)?,
                ENV_LOCK_TIMEOUT_MS => {
                    let ms = value
                        .trim()
                        .parse::<u64>()
                        .map_err(|e| AgentError::InvalidConfiguration {
                            reason: format!("{ENV_LOCK_TIMEOUT_MS}: {e}"),
                        })?;
                    opts.lock_timeout_ms = Some(ms);
                }
                _ => {}
            }
        }
        Ok(opts)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(AgentError::InvalidConfiguration {
            reason: format!("{ENV_FORCE_OVERWRITE}: expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip_with_defaults() {
        let opts = AgentOptions::from_toml_str(
            r#"
            network = "goerli"
            lock_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(opts.network.as_deref(), Some("goerli"));
        assert_eq!(opts.project_id, None);
        assert!(!opts.force_overwrite);
        assert_eq!(opts.lock_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = AgentOptions::from_toml_str("force_overwrite = \"maybe\"").unwrap_err();
        assert!(matches!(err, AgentError::Toml(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "project_id = \"p1\"\nforce_overwrite = true\n").unwrap();

        let opts = AgentOptions::load(&path).unwrap();
        assert_eq!(opts.project_id.as_deref(), Some("p1"));
        assert!(opts.store_options().force);

        assert!(matches!(
            AgentOptions::load(dir.path().join("missing.toml")),
            Err(AgentError::Io(_))
        ));
    }

    #[test]
    fn vars_are_parsed() {
        let opts = AgentOptions::from_vars([
            (ENV_PROJECT_ID, "p2"),
            (ENV_NETWORK, "sepolia"),
            (ENV_FORCE_OVERWRITE, "TRUE"),
            (ENV_LOCK_TIMEOUT_MS, "1500"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();
        assert_eq!(
            opts,
            AgentOptions::new()
                .with_project_id("p2")
                .with_network("sepolia")
                .with_force_overwrite(true)
                .with_lock_timeout(Duration::from_millis(1500))
        );
    }

    #[test]
    fn bad_vars_are_rejected() {
        assert!(AgentOptions::from_vars([(ENV_FORCE_OVERWRITE, "sometimes")]).is_err());
        assert!(AgentOptions::from_vars([(ENV_LOCK_TIMEOUT_MS, "soon")]).is_err());
    }
}
