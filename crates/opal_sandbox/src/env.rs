//! Environment Gate (C1): verify the sandbox's required configuration is
//! present before any work starts. Mirrors the `Context`-annotated
//! `std::env::var` reads in `casparian_worker::venv_manager::VenvManager::new`,
//! but fails the whole run instead of falling back to a default.

use std::path::PathBuf;
use thiserror::Error;

pub const SANDBOX_VENV_VAR: &str = "OPALALGO_SANDBOX_VENV";
pub const SANDBOX_USER_VAR: &str = "OPALALGO_SANDBOX_USER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("{SANDBOX_VENV_VAR} points to a nonexistent path: {0}")]
    VenvNotFound(PathBuf),

    #[cfg(unix)]
    #[error("{SANDBOX_USER_VAR} names an unknown local account: {0}")]
    UnknownUser(String),

    #[cfg(unix)]
    #[error("failed to look up local account {user}: {source}")]
    UserLookupFailed {
        user: String,
        #[source]
        source: nix::Error,
    },
}

/// Resolved, validated sandbox configuration. Read-only after construction
/// and freely shared across workers.
#[derive(Debug, Clone)]
pub struct SandboxEnv {
    pub venv_path: PathBuf,
    pub sandbox_user: String,
    #[cfg(unix)]
    pub sandbox_uid: nix::unistd::Uid,
}

impl SandboxEnv {
    /// Read both required variables. Missing either fails the entire run
    /// with a `ConfigError`, no fallback, no defaulting — per spec.
    pub fn from_env() -> Result<Self, ConfigError> {
        let venv_path = std::env::var(SANDBOX_VENV_VAR)
            .map_err(|_| ConfigError::MissingVar(SANDBOX_VENV_VAR))
            .map(PathBuf::from)?;

        if !venv_path.exists() {
            return Err(ConfigError::VenvNotFound(venv_path));
        }

        let sandbox_user = std::env::var(SANDBOX_USER_VAR)
            .map_err(|_| ConfigError::MissingVar(SANDBOX_USER_VAR))?;

        #[cfg(unix)]
        {
            let user = nix::unistd::User::from_name(&sandbox_user).map_err(|source| {
                ConfigError::UserLookupFailed {
                    user: sandbox_user.clone(),
                    source,
                }
            })?;
            let user = user.ok_or_else(|| ConfigError::UnknownUser(sandbox_user.clone()))?;

            Ok(Self {
                venv_path,
                sandbox_user,
                sandbox_uid: user.uid,
            })
        }

        #[cfg(not(unix))]
        Ok(Self {
            venv_path,
            sandbox_user,
        })
    }

    /// Path to the interpreter inside the configured venv.
    pub fn interpreter_path(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_path.join("Scripts").join("python.exe")
        } else {
            self.venv_path.join("bin").join("python")
        }
    }
}
