//! The fixed vocabulary of signal expressions.
//!
//! A [`SymbolTable`] maps every identifier the parser accepts to the
//! primitive it denotes. The process-wide table is built once on first use
//! and never modified; callers share it by reference.

use crate::expr::Constant;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol { name: name.into() }
    }
}

/// Built-in functions of the expression language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    UnitStep,
    Impulse,
    Exp,
    Sin,
    Cos,
    Tan,
    Log,
    Sqrt,
}

impl Function {
    pub const ALL: [Function; 8] = [
        Function::UnitStep,
        Function::Impulse,
        Function::Exp,
        Function::Sin,
        Function::Cos,
        Function::Tan,
        Function::Log,
        Function::Sqrt,
    ];

    /// Name used in expression trees and in formatted output
    pub fn canonical_name(self) -> &'static str {
        match self {
            Function::UnitStep => crate::expr::HEAVISIDE,
            Function::Impulse => crate::expr::DIRAC_DELTA,
            Function::Exp => "exp",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Log => "log",
            Function::Sqrt => "sqrt",
        }
    }

    pub fn from_canonical(name: &str) -> Option<Function> {
        Function::ALL
            .into_iter()
            .find(|f| f.canonical_name() == name)
    }

    pub fn arity(self) -> usize {
        1
    }
}

/// Role of a signal reference inside a system equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalRole {
    Input,
    Output,
}

/// What an identifier resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolEntry {
    Variable(Symbol),
    Function(Function),
    Constant(Constant),
    Signal(SignalRole),
}

/// Immutable identifier table consulted by the parser
#[derive(Debug, Clone)]
pub struct SymbolTable {
    entries: HashMap<String, SymbolEntry>,
}

static SIGNAL_SYMBOLS: Lazy<SymbolTable> = Lazy::new(SymbolTable::signals);

impl SymbolTable {
    /// The shared table used by every engine operation.
    pub fn global() -> &'static SymbolTable {
        &SIGNAL_SYMBOLS
    }

    /// Build the signals-and-systems vocabulary: time/frequency/sample
    /// variables, the elementary functions, unit step and impulse under their
    /// short and canonical spellings, `pi`, `e`, and the signal names `x`/`y`.
    pub fn signals() -> Self {
        let mut entries = HashMap::new();

        for name in ["t", "s", "n", "z"] {
            entries.insert(name.to_string(), SymbolEntry::Variable(Symbol::new(name)));
        }

        for func in Function::ALL {
            entries.insert(
                func.canonical_name().to_string(),
                SymbolEntry::Function(func),
            );
        }
        entries.insert("u".into(), SymbolEntry::Function(Function::UnitStep));
        entries.insert("delta".into(), SymbolEntry::Function(Function::Impulse));

        entries.insert("pi".into(), SymbolEntry::Constant(Constant::Pi));
        entries.insert("e".into(), SymbolEntry::Constant(Constant::E));

        entries.insert("x".into(), SymbolEntry::Signal(SignalRole::Input));
        entries.insert("y".into(), SymbolEntry::Signal(SignalRole::Output));

        SymbolTable { entries }
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Recognised identifiers in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_table_vocabulary() {
        let table = SymbolTable::global();
        for name in [
            "t", "s", "n", "z", "u", "delta", "exp", "sin", "cos", "tan", "log", "sqrt", "pi",
            "e",
        ] {
            assert!(table.contains(name), "missing {name}");
        }
        assert!(table.lookup("foo").is_none());
        assert!(table.lookup("import").is_none());
    }

    #[test]
    fn test_step_and_impulse_aliases() {
        let table = SymbolTable::global();
        assert_eq!(
            table.lookup("u"),
            Some(&SymbolEntry::Function(Function::UnitStep))
        );
        assert_eq!(table.lookup("u"), table.lookup("Heaviside"));
        assert_eq!(table.lookup("delta"), table.lookup("DiracDelta"));
    }

    #[test]
    fn test_variables_resolve_to_symbols() {
        let table = SymbolTable::global();
        assert_eq!(
            table.lookup("t"),
            Some(&SymbolEntry::Variable(Symbol::new("t")))
        );
        assert!(matches!(table.lookup("x"), Some(SymbolEntry::Signal(SignalRole::Input))));
    }

    #[test]
    fn test_function_canonical_round_trip() {
        for f in Function::ALL {
            assert_eq!(Function::from_canonical(f.canonical_name()), Some(f));
        }
    }
}
