//! Engine configuration.
//!
//! Settings can be built in code with the `with_*` methods or read from a
//! JSON document. Memory sizes accept the launcher suffixes `K` and `M`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be decoded
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A memory size could not be parsed
    #[error("invalid memory size `{0}`")]
    InvalidMemoryValue(String),

    /// Values are individually valid but inconsistent
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Smallest accepted per-thread stack, in bytes.
pub const MIN_STACK_SIZE: usize = 1024;

/// Engine settings.
///
/// # Examples
///
/// ```
/// use interpreter::VmConfig;
///
/// let config = VmConfig::from_json(r#"{ "max_heap": 8388608, "verbose_gc": true }"#).unwrap();
/// assert_eq!(config.max_heap, 8 << 20);
/// assert!(config.verbose_gc);
/// assert!(config.quickening);
///
/// let config = VmConfig::default().with_stack_size(64 * 1024).with_quickening(false);
/// assert_eq!(config.slot_budget(), 8192);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Bytes of interpreter stack per thread
    pub stack_size: usize,
    /// Heap occupancy below which no collection is started
    pub min_heap: usize,
    /// Heap limit in bytes
    pub max_heap: usize,
    /// Report class loading at `info` level
    pub verbose_class: bool,
    /// Report collections at `info` level
    pub verbose_gc: bool,
    /// Rewrite resolved instructions into their quick forms
    pub quickening: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_size: 256 * 1024,
            min_heap: 1024 * 1024,
            max_heap: 64 * 1024 * 1024,
            verbose_class: false,
            verbose_gc: false,
            quickening: true,
        }
    }
}

impl VmConfig {
    /// Decodes and validates a JSON configuration. Missing keys keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: VmConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Encodes the configuration as JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that the settings are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::Inconsistent(format!(
                "stack size {} is below the minimum of {}",
                self.stack_size, MIN_STACK_SIZE
            )));
        }
        if self.min_heap > self.max_heap {
            return Err(ConfigError::Inconsistent(format!(
                "min heap {} exceeds max heap {}",
                self.min_heap, self.max_heap
            )));
        }
        Ok(())
    }

    /// Operand-stack and local-variable slots available to one thread.
    pub fn slot_budget(&self) -> usize {
        self.stack_size / 8
    }

    /// Sets the per-thread stack size.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Sets the minimum heap size.
    pub fn with_min_heap(mut self, bytes: usize) -> Self {
        self.min_heap = bytes;
        self
    }

    /// Sets the heap limit.
    pub fn with_max_heap(mut self, bytes: usize) -> Self {
        self.max_heap = bytes;
        self
    }

    /// Enables class-loading reports.
    pub fn with_verbose_class(mut self, enabled: bool) -> Self {
        self.verbose_class = enabled;
        self
    }

    /// Enables collection reports.
    pub fn with_verbose_gc(mut self, enabled: bool) -> Self {
        self.verbose_gc = enabled;
        self
    }

    /// Enables or disables instruction rewriting.
    pub fn with_quickening(mut self, enabled: bool) -> Self {
        self.quickening = enabled;
        self
    }
}

/// Parses a memory size such as `512`, `64K` or `16m`.
pub fn parse_mem_value(text: &str) -> Result<usize, ConfigError> {
    let invalid = || ConfigError::InvalidMemoryValue(text.to_string());
    let (digits, multiplier) = match text.as_bytes().last() {
        Some(b'k') | Some(b'K') => (&text[..text.len() - 1], 1024),
        Some(b'm') | Some(b'M') => (&text[..text.len() - 1], 1024 * 1024),
        Some(_) => (text, 1),
        None => return Err(invalid()),
    };
    let value: usize = digits.parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}
