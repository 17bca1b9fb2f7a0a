//! Internal utilities for the Twinlet external framework.
//!
//! This crate provides low-level naming helpers shared between `twinlet-core`,
//! the host crates and the `xtask` bundler. It has zero external dependencies.
//!
//! # Usage
//!
//! This crate is an internal implementation detail and is not intended for direct
//! use by external authors. Use the `twinlet` facade crate instead.
//!
//! # Contents
//!
//! - [`tildefy`] - Rewrites `_tilde` to `~` for host display names
//! - [`untildefy`] - The reverse mapping used for crate and file names
//! - [`method_selector`] - Generated selector names for numbered dispatch slots

pub mod naming;

pub use naming::{is_signal_name, method_selector, tildefy, untildefy, TILDE_SUFFIX};
