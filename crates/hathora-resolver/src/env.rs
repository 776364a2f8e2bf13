//! Deployment environment: what Hathora tells a process through env vars.
//!
//! Read once at startup. A process that finds no `HATHORA_PROCESS_ID`
//! is not running on Hathora (a client build or a local run) unless a
//! mock process id override is supplied for debugging.

use std::fmt;
use std::net::IpAddr;

use hathora_model::{ProcessId, Region};

/// Set by Hathora on every deployed process. Its presence is the
/// "running under the platform" marker.
pub const ENV_PROCESS_ID: &str = "HATHORA_PROCESS_ID";
pub const ENV_REGION: &str = "HATHORA_REGION";
pub const ENV_PUBLIC_IP: &str = "HATHORA_IP";
pub const ENV_PUBLIC_PORT: &str = "HATHORA_PORT";
pub const ENV_APP_SECRET: &str = "HATHORA_APP_SECRET";
/// Local-only override that makes a non-deployed run resolve as if it were
/// the given process. Paste the id of a live process from the console.
pub const ENV_MOCK_PROCESS_ID: &str = "HATHORA_MOCK_PROCESS_ID";

/// Values read from the deployment environment.
#[derive(Clone, Default)]
pub struct DeployEnv {
    pub process_id: Option<ProcessId>,
    pub region: Option<Region>,
    pub public_ip: Option<IpAddr>,
    pub public_port: Option<u16>,
    pub process_id_override: Option<ProcessId>,
    app_secret: Option<String>,
}

impl DeployEnv {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads variables through `lookup`. Empty values count as unset.
    /// Unparsable values are logged and dropped, never fatal.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let region = get(ENV_REGION).and_then(|raw| match raw.parse() {
            Ok(region) => Some(region),
            Err(e) => {
                tracing::warn!(var = ENV_REGION, error = %e, "ignoring region");
                None
            }
        });

        let public_ip = get(ENV_PUBLIC_IP).and_then(|raw| match raw.parse() {
            Ok(ip) => Some(ip),
            Err(e) => {
                tracing::warn!(var = ENV_PUBLIC_IP, value = %raw, error = %e, "ignoring public ip");
                None
            }
        });

        let public_port =
            get(ENV_PUBLIC_PORT).and_then(|raw| match raw.parse::<u16>() {
                Ok(port) => Some(port),
                Err(e) => {
                    tracing::warn!(
                        var = ENV_PUBLIC_PORT,
                        value = %raw,
                        error = %e,
                        "ignoring public port"
                    );
                    None
                }
            });

        let process_id_override = get(ENV_MOCK_PROCESS_ID).map(ProcessId::new);
        if let Some(id) = &process_id_override {
            tracing::info!(process_id = %id, "overriding {ENV_PROCESS_ID} with mock process id");
        }

        Self {
            process_id: get(ENV_PROCESS_ID).map(ProcessId::new),
            region,
            public_ip,
            public_port,
            process_id_override,
            app_secret: get(ENV_APP_SECRET),
        }
    }

    /// Sets the deployed process id, as `HATHORA_PROCESS_ID` would.
    pub fn with_process_id(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = Some(ProcessId::new(process_id));
        self
    }

    /// Sets the mock process id override.
    pub fn with_override(mut self, process_id: impl Into<String>) -> Self {
        self.process_id_override = Some(ProcessId::new(process_id));
        self
    }

    /// Sets the app secret.
    pub fn with_app_secret(mut self, secret: impl Into<String>) -> Self {
        self.app_secret = Some(secret.into());
        self
    }

    /// The id to resolve: the override if present, else the deployed id.
    pub fn effective_process_id(&self) -> Option<&ProcessId> {
        self.process_id_override
            .as_ref()
            .or(self.process_id.as_ref())
    }

    /// Returns `true` when there is a process id to resolve.
    pub fn is_deployed(&self) -> bool {
        self.effective_process_id().is_some()
    }

    /// Returns `true` when a mock override is active.
    pub fn is_mock(&self) -> bool {
        self.process_id_override.is_some()
    }

    /// The shared secret the control-plane client authenticates with.
    pub fn app_secret(&self) -> Option<&str> {
        self.app_secret.as_deref()
    }
}

impl fmt::Debug for DeployEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployEnv")
            .field("process_id", &self.process_id)
            .field("region", &self.region)
            .field("public_ip", &self.public_ip)
            .field("public_port", &self.public_port)
            .field("process_id_override", &self.process_id_override)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> DeployEnv {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DeployEnv::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_deployed_env_is_parsed() {
        let env = env_of(&[
            (ENV_PROCESS_ID, "p-1"),
            (ENV_REGION, "Frankfurt"),
            (ENV_PUBLIC_IP, "10.0.0.7"),
            (ENV_PUBLIC_PORT, "7777"),
            (ENV_APP_SECRET, "s3cret"),
        ]);
        assert!(env.is_deployed());
        assert!(!env.is_mock());
        assert_eq!(env.effective_process_id(), Some(&ProcessId::new("p-1")));
        assert_eq!(env.region, Some(Region::Frankfurt));
        assert_eq!(env.public_ip, Some("10.0.0.7".parse().unwrap()));
        assert_eq!(env.public_port, Some(7777));
        assert_eq!(env.app_secret(), Some("s3cret"));
    }

    #[test]
    fn test_missing_process_id_means_not_deployed() {
        let env = env_of(&[(ENV_REGION, "Tokyo")]);
        assert!(!env.is_deployed());
        assert_eq!(env.effective_process_id(), None);
    }

    #[test]
    fn test_empty_process_id_means_not_deployed() {
        let env = env_of(&[(ENV_PROCESS_ID, "   ")]);
        assert!(!env.is_deployed());
    }

    #[test]
    fn test_override_wins_over_deployed_id() {
        let env = env_of(&[
            (ENV_PROCESS_ID, "p-real"),
            (ENV_MOCK_PROCESS_ID, "p-mock"),
        ]);
        assert!(env.is_mock());
        assert_eq!(
            env.effective_process_id(),
            Some(&ProcessId::new("p-mock"))
        );
    }

    #[test]
    fn test_override_alone_counts_as_deployed() {
        let env = DeployEnv::default().with_override("p-mock");
        assert!(env.is_deployed());
        assert!(env.is_mock());
    }

    #[test]
    fn test_bad_values_are_dropped() {
        let env = env_of(&[
            (ENV_PROCESS_ID, "p-1"),
            (ENV_REGION, "Atlantis"),
            (ENV_PUBLIC_IP, "not-an-ip"),
            (ENV_PUBLIC_PORT, "70000"),
        ]);
        assert!(env.is_deployed());
        assert_eq!(env.region, None);
        assert_eq!(env.public_ip, None);
        assert_eq!(env.public_port, None);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let env = DeployEnv::default().with_app_secret("s3cret");
        let dbg = format!("{env:?}");
        assert!(!dbg.contains("s3cret"));
        assert!(dbg.contains("<redacted>"));
    }
}
