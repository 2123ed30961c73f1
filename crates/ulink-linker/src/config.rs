use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};

/// Largest uncompressed chunk the compressor merges exports into.
pub const DEFAULT_MAX_CHUNK_SIZE: u32 = 1024 * 1024;

/// Configuration for [`PackageWriter`](crate::PackageWriter).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Reorder exports so every export's dependencies are written before it.
    pub seek_free_sort: bool,
    /// Panic if the seek-free order breaks a force-load dependency. Force-load
    /// cycles are reported as `LinkError::ForceLoadCycle` either way.
    pub verify_sort: bool,
    pub max_chunk_size: u32,
    /// zstd level used for chunk compression.
    pub compression_level: i32,
    /// Engine version stamped into the summary.
    pub engine_version: u32,
    /// Suffix of the temporary file written next to the destination.
    pub temp_suffix: String,
    /// Compress every package, not only those flagged store-compressed.
    pub force_compression: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            seek_free_sort: true,
            verify_sort: cfg!(debug_assertions),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            compression_level: 3,
            engine_version: 1,
            temp_suffix: "_save.tmp".to_string(),
            force_compression: false,
        }
    }
}

impl LinkerConfig {
    pub fn from_toml_str(text: &str) -> LinkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| LinkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> LinkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> LinkResult<String> {
        toml::to_string(self).map_err(|e| LinkError::Config(e.to_string()))
    }

    fn validate(&self) -> LinkResult<()> {
        if self.max_chunk_size == 0 {
            return Err(LinkError::Config("max_chunk_size must be positive".into()));
        }
        if self.temp_suffix.is_empty() || self.temp_suffix.contains(['/', '\\']) {
            return Err(LinkError::Config(format!(
                "invalid temp_suffix {:?}",
                self.temp_suffix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LinkerConfig::default();
        assert!(c.seek_free_sort);
        assert_eq!(c.max_chunk_size, 1024 * 1024);
        assert_eq!(c.compression_level, 3);
        assert_eq!(c.temp_suffix, "_save.tmp");
        assert!(!c.force_compression);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = LinkerConfig::from_toml_str("max_chunk_size = 4096\nforce_compression = true\n").unwrap();
        assert_eq!(c.max_chunk_size, 4096);
        assert!(c.force_compression);
        assert!(c.seek_free_sort);
    }

    #[test]
    fn toml_roundtrip() {
        let c = LinkerConfig {
            verify_sort: true,
            engine_version: 7,
            ..Default::default()
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(LinkerConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = LinkerConfig::from_toml_str("max_chunk_size = 0").unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(LinkerConfig::from_toml_str("seek_free_sort = \"yes\"").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linker.toml");
        std::fs::write(&path, "compression_level = 9\n").unwrap();
        assert_eq!(LinkerConfig::load(&path).unwrap().compression_level, 9);
    }
}
