//! # Memory Configuration
//!
//! Sizes and names of the process-wide allocators, loaded once at startup
//! from a TOML file.
//!
//! ```toml
//! [general]
//! name = "general"
//! total_size = 16777216
//!
//! [persistent]
//! name = "persistent"
//! page_size = 65536
//! max_pages = 256
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AllocError, AllocResult};

/// Default backing size of the general free-list allocator (16 MiB).
pub const DEFAULT_GENERAL_SIZE: usize = 16 * 1024 * 1024;

/// Default heap page size of the persistent linear allocator (64 KiB).
pub const DEFAULT_PAGE_SIZE: usize = 64 * 1024;

const fn default_validate_headers() -> bool {
    cfg!(debug_assertions)
}

/// Configuration of a free-list allocator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeListConfig {
    /// Name used in log lines and errors.
    pub name: String,
    /// Size of the backing buffer in bytes.
    pub total_size: usize,
    /// Check header self-offsets on `free`/`realloc`.
    pub validate_headers: bool,
}

impl Default for FreeListConfig {
    fn default() -> Self {
        Self {
            name: "general".to_owned(),
            total_size: DEFAULT_GENERAL_SIZE,
            validate_headers: default_validate_headers(),
        }
    }
}

impl FreeListConfig {
    /// Config with the given name and size, everything else default.
    #[must_use]
    pub fn new(name: impl Into<String>, total_size: usize) -> Self {
        Self {
            name: name.into(),
            total_size,
            ..Self::default()
        }
    }
}

/// Configuration of a linear allocator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    /// Name used in log lines and errors.
    pub name: String,
    /// Minimum size of each heap page in bytes.
    pub page_size: usize,
    /// Upper bound on heap pages, `None` for unbounded.
    pub max_pages: Option<usize>,
    /// Check header self-offsets on `free`/`realloc`.
    pub validate_headers: bool,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            name: "persistent".to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
            validate_headers: default_validate_headers(),
        }
    }
}

impl LinearConfig {
    /// Config with the given name and page size, everything else default.
    #[must_use]
    pub fn new(name: impl Into<String>, page_size: usize) -> Self {
        Self {
            name: name.into(),
            page_size,
            ..Self::default()
        }
    }
}

/// Configuration of the process-wide allocators.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// The general free-list allocator.
    pub general: FreeListConfig,
    /// The persistent linear allocator.
    pub persistent: LinearConfig,
}

impl MemoryConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidConfig`] if the document does not parse or fails
    /// [`MemoryConfig::validate`].
    pub fn from_toml_str(source: &str) -> AllocResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| AllocError::InvalidConfig(format!("failed to parse: {e}")).logged())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidConfig`] if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> AllocResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            AllocError::InvalidConfig(format!("failed to read {}: {e}", path.display())).logged()
        })?;
        Self::from_toml_str(&source)
    }

    /// Rejects zero sizes and empty names.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> AllocResult<()> {
        let problem = if self.general.name.is_empty() {
            Some("general.name must not be empty")
        } else if self.general.total_size == 0 {
            Some("general.total_size must be non-zero")
        } else if self.persistent.name.is_empty() {
            Some("persistent.name must not be empty")
        } else if self.persistent.page_size == 0 {
            Some("persistent.page_size must be non-zero")
        } else {
            None
        };

        match problem {
            Some(message) => Err(AllocError::InvalidConfig(message.to_owned()).logged()),
            None => Ok(()),
        }
    }
}
