//! Cache configuration
//!
//! [`CacheConfig`] collects every tunable of the image cache: memory and disk
//! budgets, the disk cache location, decode concurrency and the thumbnail and
//! optimized image sizes. Configuration can be built programmatically, read
//! from environment variables, or loaded from a TOML file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::disk::DEFAULT_TRIM_THRESHOLD;

const MB: usize = 1024 * 1024;

/// Configuration for the image cache system
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Memory cache byte-cost limit
    pub memory_cache_bytes: usize,
    /// Memory cache entry-count limit
    pub memory_cache_entries: usize,
    /// Persistent cache budget in bytes
    pub disk_cache_bytes: u64,
    /// Directory holding persistent cache records
    pub disk_cache_dir: PathBuf,
    /// Usage factor over the disk budget that starts a trim pass
    pub disk_trim_threshold: f64,
    /// Maximum number of decodes running at once
    pub max_concurrent_decodes: usize,
    /// Maximum thumbnail long side in pixels
    pub thumbnail_size: u32,
    /// Cap on the long side of optimized images in pixels
    pub optimized_max_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_cache_bytes: 256 * MB,
            memory_cache_entries: 512,
            disk_cache_bytes: 512 * MB as u64,
            disk_cache_dir: Self::default_cache_dir(),
            disk_trim_threshold: DEFAULT_TRIM_THRESHOLD,
            max_concurrent_decodes: 4,
            thumbnail_size: 256,
            optimized_max_size: 2048,
        }
    }
}

/// On-disk representation; sizes are in megabytes and every key is optional
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_cache_mb: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_cache_entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_cache_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_trim_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_concurrent_decodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optimized_max_size: Option<u32>,
}

impl CacheConfig {
    /// Sets the memory cache byte limit in megabytes.
    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.memory_cache_bytes = mb * MB;
        self
    }

    /// Sets the memory cache entry limit.
    pub fn with_memory_entries(mut self, entries: usize) -> Self {
        self.memory_cache_entries = entries;
        self
    }

    /// Sets the disk cache budget in megabytes.
    pub fn with_disk_mb(mut self, mb: u64) -> Self {
        self.disk_cache_bytes = mb * MB as u64;
        self
    }

    /// Sets the disk cache directory.
    pub fn with_disk_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.disk_cache_dir = path.as_ref().to_path_buf();
        self
    }

    /// Sets the disk trim threshold factor.
    pub fn with_trim_threshold(mut self, threshold: f64) -> Self {
        self.disk_trim_threshold = threshold;
        self
    }

    /// Sets the maximum number of concurrent decodes.
    pub fn with_max_concurrent_decodes(mut self, limit: usize) -> Self {
        self.max_concurrent_decodes = limit;
        self
    }

    /// Sets the thumbnail long side in pixels.
    pub fn with_thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size;
        self
    }

    /// Sets the optimized image cap in pixels.
    pub fn with_optimized_max_size(mut self, size: u32) -> Self {
        self.optimized_max_size = size;
        self
    }

    /// Returns the default cache directory for the current platform.
    ///
    /// - macOS: ~/Library/Caches/imgview/thumbnails
    /// - Linux: ~/.cache/imgview/thumbnails
    /// - Windows: %LOCALAPPDATA%\imgview\thumbnails
    pub fn default_cache_dir() -> PathBuf {
        if let Some(cache_dir) = dirs::cache_dir() {
            cache_dir.join("imgview").join("thumbnails")
        } else {
            // Fallback to current directory if cache dir unavailable
            PathBuf::from("cache/thumbnails")
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IMGVIEW_MEMORY_CACHE_MB`: memory cache size in MB (default: 256)
    /// - `IMGVIEW_MEMORY_CACHE_ENTRIES`: memory cache entry limit (default: 512)
    /// - `IMGVIEW_DISK_CACHE_MB`: disk cache size in MB (default: 512)
    /// - `IMGVIEW_CACHE_DIR`: disk cache directory path
    /// - `IMGVIEW_MAX_DECODES`: concurrent decode limit (default: 4)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(mb) = env_number::<usize>("IMGVIEW_MEMORY_CACHE_MB")? {
            config.memory_cache_bytes = mb * MB;
        }
        if let Some(entries) = env_number("IMGVIEW_MEMORY_CACHE_ENTRIES")? {
            config.memory_cache_entries = entries;
        }
        if let Some(mb) = env_number::<u64>("IMGVIEW_DISK_CACHE_MB")? {
            config.disk_cache_bytes = mb * MB as u64;
        }
        if let Ok(dir) = std::env::var("IMGVIEW_CACHE_DIR") {
            config.disk_cache_dir = PathBuf::from(dir);
        }
        if let Some(limit) = env_number("IMGVIEW_MAX_DECODES")? {
            config.max_concurrent_decodes = limit;
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format (every key optional):
    /// ```toml
    /// memory_cache_mb = 256
    /// memory_cache_entries = 512
    /// disk_cache_mb = 512
    /// disk_cache_dir = "/path/to/cache"
    /// disk_trim_threshold = 1.2
    /// max_concurrent_decodes = 4
    /// thumbnail_size = 256
    /// optimized_max_size = 2048
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(toml_str)?;
        let mut config = Self::default();

        if let Some(mb) = file.memory_cache_mb {
            config.memory_cache_bytes = mb * MB;
        }
        if let Some(entries) = file.memory_cache_entries {
            config.memory_cache_entries = entries;
        }
        if let Some(mb) = file.disk_cache_mb {
            config.disk_cache_bytes = mb * MB as u64;
        }
        if let Some(dir) = file.disk_cache_dir {
            config.disk_cache_dir = dir;
        }
        if let Some(threshold) = file.disk_trim_threshold {
            if !threshold.is_finite() || threshold < 1.0 {
                return Err(ConfigError::InvalidValue("disk_trim_threshold".to_string()));
            }
            config.disk_trim_threshold = threshold;
        }
        if let Some(limit) = file.max_concurrent_decodes {
            config.max_concurrent_decodes = limit;
        }
        if let Some(size) = file.thumbnail_size {
            config.thumbnail_size = size;
        }
        if let Some(size) = file.optimized_max_size {
            config.optimized_max_size = size;
        }

        Ok(config)
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    /// Converts configuration to TOML format.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let file = ConfigFile {
            memory_cache_mb: Some(self.memory_cache_mb()),
            memory_cache_entries: Some(self.memory_cache_entries),
            disk_cache_mb: Some(self.disk_cache_mb()),
            disk_cache_dir: Some(self.disk_cache_dir.clone()),
            disk_trim_threshold: Some(self.disk_trim_threshold),
            max_concurrent_decodes: Some(self.max_concurrent_decodes),
            thumbnail_size: Some(self.thumbnail_size),
            optimized_max_size: Some(self.optimized_max_size),
        };
        Ok(toml::to_string(&file)?)
    }

    /// Returns the memory cache size in megabytes.
    pub fn memory_cache_mb(&self) -> usize {
        self.memory_cache_bytes / MB
    }

    /// Returns the disk cache size in megabytes.
    pub fn disk_cache_mb(&self) -> u64 {
        self.disk_cache_bytes / MB as u64
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    /// I/O error reading or writing configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Configuration file is not valid TOML
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// Configuration could not be rendered as TOML
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: &[&str] = &[
        "IMGVIEW_MEMORY_CACHE_MB",
        "IMGVIEW_MEMORY_CACHE_ENTRIES",
        "IMGVIEW_DISK_CACHE_MB",
        "IMGVIEW_CACHE_DIR",
        "IMGVIEW_MAX_DECODES",
    ];

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.memory_cache_bytes, 256 * 1024 * 1024);
        assert_eq!(config.memory_cache_entries, 512);
        assert_eq!(config.disk_cache_bytes, 512 * 1024 * 1024);
        assert_eq!(config.disk_trim_threshold, 1.2);
        assert_eq!(config.max_concurrent_decodes, 4);
        assert_eq!(config.thumbnail_size, 256);
        assert_eq!(config.optimized_max_size, 2048);
        assert!(config.disk_cache_dir.ends_with("thumbnails"));
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::default()
            .with_memory_mb(64)
            .with_memory_entries(100)
            .with_disk_mb(32)
            .with_disk_dir("/custom/path")
            .with_trim_threshold(1.5)
            .with_max_concurrent_decodes(2)
            .with_thumbnail_size(128)
            .with_optimized_max_size(1024);

        assert_eq!(config.memory_cache_bytes, 64 * 1024 * 1024);
        assert_eq!(config.memory_cache_entries, 100);
        assert_eq!(config.disk_cache_bytes, 32 * 1024 * 1024);
        assert_eq!(config.disk_cache_dir, PathBuf::from("/custom/path"));
        assert_eq!(config.disk_trim_threshold, 1.5);
        assert_eq!(config.max_concurrent_decodes, 2);
        assert_eq!(config.thumbnail_size, 128);
        assert_eq!(config.optimized_max_size, 1024);
    }

    #[test]
    fn test_mb_getters() {
        let config = CacheConfig::default();
        assert_eq!(config.memory_cache_mb(), 256);
        assert_eq!(config.disk_cache_mb(), 512);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("IMGVIEW_MEMORY_CACHE_MB", "128");
        env::set_var("IMGVIEW_MEMORY_CACHE_ENTRIES", "64");
        env::set_var("IMGVIEW_DISK_CACHE_MB", "1024");
        env::set_var("IMGVIEW_CACHE_DIR", "/tmp/test-cache");
        env::set_var("IMGVIEW_MAX_DECODES", "8");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.memory_cache_bytes, 128 * 1024 * 1024);
        assert_eq!(config.memory_cache_entries, 64);
        assert_eq!(config.disk_cache_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.disk_cache_dir, PathBuf::from("/tmp/test-cache"));
        assert_eq!(config.max_concurrent_decodes, 8);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(ENV_VARS);

        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("IMGVIEW_MEMORY_CACHE_MB", "128");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.memory_cache_bytes, 128 * 1024 * 1024);
        assert_eq!(config.disk_cache_bytes, 512 * 1024 * 1024); // default
        assert_eq!(config.max_concurrent_decodes, 4); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&["IMGVIEW_MAX_DECODES"]);

        env::set_var("IMGVIEW_MAX_DECODES", "many");
        let result = CacheConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "IMGVIEW_MAX_DECODES"));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CacheConfig::default()
            .with_memory_mb(128)
            .with_disk_mb(64)
            .with_disk_dir("/tmp/cache")
            .with_trim_threshold(1.5);
        let toml = config.to_toml().unwrap();
        let parsed = CacheConfig::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            # Test configuration
            memory_cache_mb = 128
            memory_cache_entries = 32
            disk_cache_mb = 256
            disk_cache_dir = "/tmp/test"
            max_concurrent_decodes = 2
            thumbnail_size = 200
        "#;

        let config = CacheConfig::from_toml(toml).unwrap();
        assert_eq!(config.memory_cache_bytes, 128 * 1024 * 1024);
        assert_eq!(config.memory_cache_entries, 32);
        assert_eq!(config.disk_cache_bytes, 256 * 1024 * 1024);
        assert_eq!(config.disk_cache_dir, PathBuf::from("/tmp/test"));
        assert_eq!(config.max_concurrent_decodes, 2);
        assert_eq!(config.thumbnail_size, 200);
        assert_eq!(config.optimized_max_size, 2048); // default
    }

    #[test]
    fn test_from_toml_ignores_unknown_keys() {
        let config = CacheConfig::from_toml("gpu_cache_mb = 512\nmemory_cache_mb = 16\n").unwrap();
        assert_eq!(config.memory_cache_mb(), 16);
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            CacheConfig::from_toml("memory_cache_mb = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CacheConfig::from_toml("disk_trim_threshold = 0.5"),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_file_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("cache.toml");

        let config = CacheConfig::default()
            .with_memory_mb(64)
            .with_disk_dir(dir.path().join("thumbs"));
        config.save_to_file(&config_path).unwrap();

        let loaded = CacheConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_missing_file() {
        let result = CacheConfig::from_file("/nonexistent/imgview.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
