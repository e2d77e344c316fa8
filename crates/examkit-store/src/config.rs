//! Store configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examkit_core::traits::{ActivitySink, AttemptStore, ExamRepository};

use crate::http::HttpStore;
use crate::memory::MemoryStore;

/// Which backend the session layer talks to.
///
/// Note: Custom Debug impl masks the auth token to prevent accidental
/// exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Http {
        base_url: String,
        #[serde(default)]
        auth_token: Option<String>,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory => f.debug_struct("Memory").finish(),
            StoreConfig::Http { base_url, auth_token } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("auth_token", &auth_token.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

/// Top-level examkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamkitConfig {
    /// Backend selection.
    #[serde(default)]
    pub store: StoreConfig,
    /// Where exam definition TOML files live.
    #[serde(default = "default_exam_dir")]
    pub exam_dir: PathBuf,
    /// Where attempt reports are written.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

fn default_exam_dir() -> PathBuf {
    PathBuf::from("./exams")
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("./examkit-reports")
}

impl Default for ExamkitConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            exam_dir: default_exam_dir(),
            report_dir: default_report_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Memory => StoreConfig::Memory,
        StoreConfig::Http { base_url, auth_token } => StoreConfig::Http {
            base_url: resolve_env_vars(base_url),
            auth_token: auth_token.as_ref().map(|t| resolve_env_vars(t)),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examkit.toml` in the current directory
/// 2. `~/.config/examkit/config.toml`
///
/// Environment variable override: `EXAMKIT_AUTH_TOKEN`.
pub fn load_config() -> Result<ExamkitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamkitConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examkit.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamkitConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamkitConfig::default(),
    };

    if let Ok(token) = std::env::var("EXAMKIT_AUTH_TOKEN") {
        if let StoreConfig::Http { auth_token, .. } = &mut config.store {
            *auth_token = Some(token);
        }
    }

    config.store = resolve_store_config(&config.store);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examkit"))
}

/// The three collaborator handles a session needs, behind trait objects.
#[derive(Clone)]
pub struct StoreHandles {
    pub exams: Arc<dyn ExamRepository>,
    pub attempts: Arc<dyn AttemptStore>,
    pub activity: Arc<dyn ActivitySink>,
}

/// Create the collaborator handles from a store configuration.
pub fn create_store(config: &StoreConfig) -> Result<StoreHandles> {
    match config {
        StoreConfig::Memory => {
            let store = Arc::new(MemoryStore::new());
            Ok(StoreHandles {
                exams: Arc::clone(&store) as Arc<dyn ExamRepository>,
                attempts: Arc::clone(&store) as Arc<dyn AttemptStore>,
                activity: store as Arc<dyn ActivitySink>,
            })
        }
        StoreConfig::Http { base_url, auth_token } => {
            let store = Arc::new(HttpStore::new(base_url, auth_token.clone()));
            Ok(StoreHandles {
                exams: Arc::clone(&store) as Arc<dyn ExamRepository>,
                attempts: Arc::clone(&store) as Arc<dyn AttemptStore>,
                activity: store as Arc<dyn ActivitySink>,
            })
        }
    }
}
