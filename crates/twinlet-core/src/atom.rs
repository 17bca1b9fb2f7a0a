//! Symbols and atoms exchanged with the host.

use std::ffi::CStr;
use std::fmt;
use std::sync::Arc;

/// A host symbol.
///
/// Hosts intern symbols and compare them by pointer. Inside the framework a
/// symbol is an immutable shared string, so clones are cheap and comparison
/// is by value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Create a symbol from a string.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Create a symbol from a host C string.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn from_c_str(name: &CStr) -> Self {
        Self(Arc::from(name.to_string_lossy().as_ref()))
    }

    /// The symbol's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", &*self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self::new("")
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A creation argument.
///
/// Integer arguments arrive as floats on both hosts.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Float(f64),
    Symbol(Symbol),
}

impl Atom {
    /// The float value, or `0.0` for symbols.
    pub fn float(&self) -> f64 {
        match self {
            Self::Float(f) => *f,
            Self::Symbol(_) => 0.0,
        }
    }

    /// The symbol value, if this atom is a symbol.
    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Symbol(s) => Some(s),
            Self::Float(_) => None,
        }
    }
}

impl From<f64> for Atom {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Self::Symbol(Symbol::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_float_of_symbol_is_zero() {
        assert_eq!(Atom::from("up").float(), 0.0);
        assert_eq!(Atom::from(3.5).float(), 3.5);
    }

    #[test]
    fn test_symbol_from_c_str() {
        let name = std::ffi::CString::new("balance").unwrap();
        let sym = Symbol::from_c_str(&name);
        assert_eq!(sym, Symbol::new("balance"));
        assert_eq!(sym.to_string(), "balance");
    }
}
