//! Cloner configuration.
//!
//! Settings can be built in code or read from a TOML table:
//!
//! ```toml
//! null_transient = true
//! immutable_classes = ["com.acme.Currency"]
//! null_instead_of_clone = ["com.acme.Connection"]
//! ```

use crate::error::{CloneError, CloneResult};
use serde::Deserialize;
use std::path::Path;

/// Settings applied when a [`Cloner`](crate::Cloner) is created
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClonerConfig {
    /// Clone at all. When false every clone call returns its input.
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Register the exact-class strategies for standard containers, dates
    /// and text. Subtype fallbacks are installed either way.
    /// Default: true
    #[serde(default = "default_true")]
    pub builtin_strategies: bool,

    /// Reset transient fields to their default value in clones.
    /// Default: false
    #[serde(default)]
    pub null_transient: bool,

    /// Instantiate classes lacking a no-argument constructor by allocating
    /// them bare.
    /// Default: true
    #[serde(default = "default_true")]
    pub allow_bypass_construction: bool,

    /// Log every structurally copied class at debug level.
    /// Default: false
    #[serde(default)]
    pub dump_cloned_classes: bool,

    /// Classes whose exact instances are shared
    #[serde(default)]
    pub immutable_classes: Vec<String>,

    /// Classes whose instances, including subtypes, are shared
    #[serde(default)]
    pub immutable_instance_of: Vec<String>,

    /// Classes whose instances clone to null
    #[serde(default)]
    pub null_instead_of_clone: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ClonerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            builtin_strategies: true,
            null_transient: false,
            allow_bypass_construction: true,
            dump_cloned_classes: false,
            immutable_classes: Vec::new(),
            immutable_instance_of: Vec::new(),
            null_instead_of_clone: Vec::new(),
        }
    }
}

impl ClonerConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> CloneResult<Self> {
        toml::from_str(source).map_err(|e| CloneError::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> CloneResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CloneError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| CloneError::Config(format!("{}: {e}", path.display())))
    }

    /// Enable or disable cloning
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enable or disable the built-in strategies
    pub fn with_builtin_strategies(mut self, enabled: bool) -> Self {
        self.builtin_strategies = enabled;
        self
    }

    /// Enable or disable transient field reset
    pub fn with_null_transient(mut self, enabled: bool) -> Self {
        self.null_transient = enabled;
        self
    }

    /// Allow or forbid constructor bypass
    pub fn with_allow_bypass_construction(mut self, allow: bool) -> Self {
        self.allow_bypass_construction = allow;
        self
    }

    /// Enable or disable logging of cloned classes
    pub fn with_dump_cloned_classes(mut self, enabled: bool) -> Self {
        self.dump_cloned_classes = enabled;
        self
    }

    /// Add an exact immutable class by name
    pub fn immutable_class(mut self, name: impl Into<String>) -> Self {
        self.immutable_classes.push(name.into());
        self
    }

    /// Add an immutable supertype by name
    pub fn immutable_instance_of(mut self, name: impl Into<String>) -> Self {
        self.immutable_instance_of.push(name.into());
        self
    }

    /// Add a class cloned as null by name
    pub fn null_instead_of_clone(mut self, name: impl Into<String>) -> Self {
        self.null_instead_of_clone.push(name.into());
        self
    }
}
