//! Limits shared by the core and the host crates.

/// Maximum number of signal channels per direction.
///
/// Render buffers use fixed-size arrays of this length, so no allocation
/// happens while building a block.
pub const MAX_CHANNELS: usize = 32;

/// Default capacity of numbered dispatch slots.
///
/// Seven numbered entry points per message kind.
pub const DEFAULT_MAX_CONTROL_INLETS: usize = 7;

/// Block size assumed when the host has not reported one yet.
pub const DEFAULT_BLOCK_SIZE: usize = 64;
