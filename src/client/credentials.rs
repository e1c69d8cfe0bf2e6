//! Credential providers
//!
//! Host, port and API key are looked up through an ordered list of
//! providers handed to [`ClientConfigBuilder::resolve`]. Nothing reads the
//! environment or spawns processes after a client has been constructed.
//!
//! [`ClientConfigBuilder::resolve`]: super::config::ClientConfigBuilder::resolve

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

/// Environment variable holding the recorder host
pub const ENV_HOST: &str = "MOTIF_HOST";
/// Environment variable holding the recorder port
pub const ENV_PORT: &str = "MOTIF_PORT";
/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "MOTIF_API_KEY";

/// Helper executable that prints the local recorder's API key
pub const API_KEY_HELPER: &str = "recnode-apikey";

/// A value a provider may be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    Host,
    Port,
    ApiKey,
}

/// A source of connection settings
pub trait CredentialProvider {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Look up a value. `None` means "not provided here, ask the next one".
    fn lookup(&self, key: CredentialKey) -> Option<String>;
}

/// Settings taken from `MOTIF_HOST`, `MOTIF_PORT` and `MOTIF_API_KEY`
#[derive(Debug, Clone, Default)]
pub struct EnvProvider {
    vars: HashMap<String, String>,
}

impl EnvProvider {
    /// Capture the relevant variables of the current process environment
    pub fn from_process() -> Self {
        Self::from_pairs(
            [ENV_HOST, ENV_PORT, ENV_API_KEY]
                .iter()
                .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v))),
        )
    }

    /// Build from explicit `(name, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn var_name(key: CredentialKey) -> &'static str {
        match key {
            CredentialKey::Host => ENV_HOST,
            CredentialKey::Port => ENV_PORT,
            CredentialKey::ApiKey => ENV_API_KEY,
        }
    }
}

impl CredentialProvider for EnvProvider {
    fn name(&self) -> &str {
        "environment"
    }

    fn lookup(&self, key: CredentialKey) -> Option<String> {
        self.vars
            .get(Self::var_name(key))
            .filter(|v| !v.is_empty())
            .cloned()
    }
}

/// API key printed by an external helper program
///
/// Only answers [`CredentialKey::ApiKey`]. A missing helper or a failed run
/// is logged and treated as "not provided".
#[derive(Debug, Clone)]
pub struct HelperProvider {
    program: PathBuf,
    args: Vec<String>,
}

impl HelperProvider {
    /// Use a specific helper program
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Pass extra arguments to the helper
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The program that will be run
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl Default for HelperProvider {
    fn default() -> Self {
        Self::new(API_KEY_HELPER)
    }
}

impl CredentialProvider for HelperProvider {
    fn name(&self) -> &str {
        "helper"
    }

    fn lookup(&self, key: CredentialKey) -> Option<String> {
        if key != CredentialKey::ApiKey {
            return None;
        }

        let output = match Command::new(&self.program).args(&self.args).output() {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(
                    program = %self.program.display(),
                    error = %e,
                    "API key helper not available"
                );
                return None;
            }
        };

        if !output.status.success() {
            tracing::warn!(
                program = %self.program.display(),
                status = %output.status,
                "API key helper failed"
            );
            return None;
        }

        let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

/// Environment first, then the `recnode-apikey` helper
pub fn default_providers() -> Vec<Box<dyn CredentialProvider>> {
    vec![
        Box::new(EnvProvider::from_process()),
        Box::new(HelperProvider::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_provider_lookup() {
        let env = EnvProvider::from_pairs([
            (ENV_HOST, "10.0.0.5"),
            (ENV_PORT, "7000"),
            (ENV_API_KEY, "secret"),
        ]);

        assert_eq!(env.lookup(CredentialKey::Host).as_deref(), Some("10.0.0.5"));
        assert_eq!(env.lookup(CredentialKey::Port).as_deref(), Some("7000"));
        assert_eq!(env.lookup(CredentialKey::ApiKey).as_deref(), Some("secret"));
    }

    #[test]
    fn test_env_provider_empty_is_absent() {
        let env = EnvProvider::from_pairs([(ENV_HOST, "")]);
        assert_eq!(env.lookup(CredentialKey::Host), None);
        assert_eq!(env.lookup(CredentialKey::ApiKey), None);
    }

    #[test]
    fn test_missing_helper_is_not_fatal() {
        let helper = HelperProvider::new("/nonexistent/recnode-apikey");
        assert_eq!(helper.lookup(CredentialKey::ApiKey), None);
    }

    #[test]
    fn test_helper_only_answers_api_key() {
        let helper = HelperProvider::new("/nonexistent/recnode-apikey");
        assert_eq!(helper.lookup(CredentialKey::Host), None);
        assert_eq!(helper.lookup(CredentialKey::Port), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_output_trimmed() {
        let helper = HelperProvider::new("sh").args(["-c", "echo '  abc123  '"]);
        assert_eq!(helper.lookup(CredentialKey::ApiKey).as_deref(), Some("abc123"));
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_failure_is_absent() {
        let helper = HelperProvider::new("sh").args(["-c", "echo key; exit 3"]);
        assert_eq!(helper.lookup(CredentialKey::ApiKey), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_blank_output_is_absent() {
        let helper = HelperProvider::new("sh").args(["-c", "echo '   '"]);
        assert_eq!(helper.lookup(CredentialKey::ApiKey), None);
    }
}
