//! Per-class configuration.
//!
//! # Example
//!
//! ```
//! use twinlet_core::ClassConfig;
//!
//! pub static CONFIG: ClassConfig = ClassConfig::new("balance_tilde")
//!     .with_description("Linear crossfade between two signals")
//!     .with_max_control_inlets(4);
//!
//! assert_eq!(CONFIG.display_name(), "balance~");
//! ```

use crate::types::DEFAULT_MAX_CONTROL_INLETS;

/// Host-agnostic class metadata.
#[derive(Debug, Clone)]
pub struct ClassConfig {
    /// Class name as written in Rust (`balance_tilde`).
    pub name: &'static str,

    /// One-line description, logged with the class at registration.
    pub description: &'static str,

    /// Highest numbered dispatch slot an instance may use.
    pub max_control_inlets: usize,
}

impl ClassConfig {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            description: "",
            max_control_inlets: DEFAULT_MAX_CONTROL_INLETS,
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the numbered-slot capacity.
    ///
    /// Host crates clamp this to the number of entry points they actually
    /// materialize and reject larger values at port declaration time.
    pub const fn with_max_control_inlets(mut self, max: usize) -> Self {
        self.max_control_inlets = max;
        self
    }

    /// Name registered with the host, with `_tilde` rewritten to `~`.
    pub fn display_name(&self) -> String {
        twinlet_utils::tildefy(self.name)
    }

    /// Display name followed by the description, if there is one.
    pub fn summary(&self) -> String {
        if self.description.is_empty() {
            self.display_name()
        } else {
            format!("{}: {}", self.display_name(), self.description)
        }
    }

    /// Returns true if the class name marks a signal object.
    pub fn is_signal_class(&self) -> bool {
        twinlet_utils::is_signal_name(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClassConfig::new("counter");
        assert_eq!(config.max_control_inlets, DEFAULT_MAX_CONTROL_INLETS);
        assert_eq!(config.display_name(), "counter");
        assert!(!config.is_signal_class());
    }

    #[test]
    fn test_tilde_display_name() {
        let config = ClassConfig::new("balance_tilde").with_max_control_inlets(3);
        assert_eq!(config.display_name(), "balance~");
        assert_eq!(config.max_control_inlets, 3);
        assert!(config.is_signal_class());
    }

    #[test]
    fn test_summary() {
        assert_eq!(ClassConfig::new("counter").summary(), "counter");
        let config = ClassConfig::new("balance_tilde").with_description("Linear crossfade");
        assert_eq!(config.summary(), "balance~: Linear crossfade");
    }
}
