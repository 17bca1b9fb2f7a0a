//! Naming rules for external classes and generated method selectors.
//!
//! Rust identifiers cannot contain `~`, while both hosts use a trailing `~`
//! to mark signal objects (`balance~`). Class names are therefore written
//! with a `_tilde` suffix in code and rewritten for display.

/// Suffix that stands in for `~` in Rust identifiers and crate names.
pub const TILDE_SUFFIX: &str = "_tilde";

/// Rewrite the first `_tilde` in `name` to `~`.
///
/// Names without `_tilde` are returned unchanged.
///
/// # Examples
///
/// ```
/// use twinlet_utils::tildefy;
///
/// assert_eq!(tildefy("balance_tilde"), "balance~");
/// assert_eq!(tildefy("counter"), "counter");
/// ```
pub fn tildefy(name: &str) -> String {
    match name.find(TILDE_SUFFIX) {
        Some(pos) => {
            let mut out = String::with_capacity(name.len());
            out.push_str(&name[..pos]);
            out.push('~');
            out.push_str(&name[pos + TILDE_SUFFIX.len()..]);
            out
        }
        None => name.to_string(),
    }
}

/// Rewrite every `~` in `name` to `_tilde`.
///
/// Used when deriving crate, module and file names from a display name.
pub fn untildefy(name: &str) -> String {
    name.replace('~', TILDE_SUFFIX)
}

/// Returns true if the display or crate name denotes a signal object.
pub fn is_signal_name(name: &str) -> bool {
    name.ends_with('~') || name.contains(TILDE_SUFFIX)
}

/// Selector symbol registered for numbered dispatch slot `slot` (1-based).
///
/// `prefix` is the message kind, giving e.g. `ext_floatin_3` for the float
/// trampoline bound to the third inlet.
pub fn method_selector(prefix: &str, slot: usize) -> String {
    format!("ext_{}in_{}", prefix, slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tildefy_suffix() {
        assert_eq!(tildefy("balance_tilde"), "balance~");
    }

    #[test]
    fn test_tildefy_only_first_occurrence() {
        assert_eq!(tildefy("a_tilde_tilde"), "a~_tilde");
    }

    #[test]
    fn test_tildefy_without_suffix() {
        assert_eq!(tildefy("counter"), "counter");
        assert_eq!(tildefy(""), "");
    }

    #[test]
    fn test_untildefy() {
        assert_eq!(untildefy("balance~"), "balance_tilde");
        assert_eq!(untildefy("counter"), "counter");
    }

    #[test]
    fn test_is_signal_name() {
        assert!(is_signal_name("balance~"));
        assert!(is_signal_name("balance_tilde"));
        assert!(!is_signal_name("counter"));
    }

    #[test]
    fn test_method_selector() {
        assert_eq!(method_selector("bang", 1), "ext_bangin_1");
        assert_eq!(method_selector("float", 3), "ext_floatin_3");
        assert_eq!(method_selector("symbol", 7), "ext_symbolin_7");
    }
}
