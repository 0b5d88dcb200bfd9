//! Lightweight configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_PIPELINE__EMBED_WORKERS=4`). Every
//! settings section has defaults, so a missing file or section is valid.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::PipelineError;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self::from_figment(figment);
        config.validate()?;
        Ok(config)
    }

    /// Wrap an already assembled figment (used by tests and embedders of the crate).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Like [`Config::get`], but a missing key yields `T::default()`.
    pub fn get_or_default<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Default,
    {
        if self.figment.contains(key) { self.get(key) } else { Ok(T::default()) }
    }

    pub fn pipeline(&self) -> anyhow::Result<PipelineSettings> {
        self.get_or_default("pipeline")
    }

    pub fn http(&self) -> anyhow::Result<HttpSettings> {
        self.get_or_default("http")
    }

    pub fn store(&self) -> anyhow::Result<StoreSettings> {
        self.get_or_default("store")
    }

    pub fn model(&self) -> anyhow::Result<ModelSettings> {
        self.get_or_default("model")
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.pipeline()?.validate()?;
        Ok(())
    }
}

pub const MAX_EMBED_WORKERS: usize = 1024;
/// Result queue capacity is counted in batches.
pub const MAX_RESULT_QUEUE: usize = 1 << 16;

/// Batching and concurrency knobs of the bulk embedding pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Number of downloads issued concurrently per fetch batch.
    pub fetch_batch_size: usize,
    /// Number of images passed to one embedder call.
    pub embed_batch_size: usize,
    /// Embed workers; 0 derives the count from available parallelism.
    pub embed_workers: usize,
    /// Raw queue capacity in items. Derived from the batch sizes when unset.
    pub raw_queue_capacity: Option<usize>,
    /// Result queue capacity in batches. Derived from the worker count when unset.
    pub result_queue_capacity: Option<usize>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_batch_size: 32,
            embed_batch_size: 8,
            embed_workers: 2,
            raw_queue_capacity: None,
            result_queue_capacity: None,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.fetch_batch_size == 0 {
            return Err(PipelineError::InvalidConfig("fetch_batch_size must be at least 1".into()));
        }
        if self.embed_batch_size == 0 {
            return Err(PipelineError::InvalidConfig("embed_batch_size must be at least 1".into()));
        }
        if self.raw_queue_capacity == Some(0) || self.result_queue_capacity == Some(0) {
            return Err(PipelineError::InvalidConfig("queue capacities must be at least 1".into()));
        }
        if self.embed_workers > MAX_EMBED_WORKERS {
            return Err(PipelineError::InvalidConfig(format!("embed_workers must be at most {MAX_EMBED_WORKERS}")));
        }
        if self.result_queue_capacity.is_some_and(|c| c > MAX_RESULT_QUEUE) {
            return Err(PipelineError::InvalidConfig(format!("result_queue_capacity must be at most {MAX_RESULT_QUEUE}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Replaces a trailing `=s0` (full size) in image URLs, e.g. `=w500`.
    pub rewrite_size: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("artvec/", env!("CARGO_PKG_VERSION")).to_string(),
            rewrite_size: Some("=w500".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub uri: String,
    pub objects_table: String,
    pub embeddings_table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            uri: "data/lancedb".to_string(),
            objects_table: "art_objects".to_string(),
            embeddings_table: "embeddings".to_string(),
        }
    }
}

impl StoreSettings {
    /// The store URI with `~` and environment variables expanded.
    pub fn resolved_uri(&self) -> String {
        expand_path(&self.uri).to_string_lossy().into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Directory holding `tokenizer.json` and the CLIP weights.
    pub dir: Option<String>,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self { dir: None, use_fake: false, fake_dim: 512 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
