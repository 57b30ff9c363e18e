// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Symbol table for labels, equates, variables and externs.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use crate::core::expr::Expr;

/// Prefix that marks a label as local to the preceding global label.
pub const LOCAL_MARKER: char = '.';

/// Width of the name column in the symbol dump.
const NAME_COLUMN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SymbolTableResult {
    Ok,
    Duplicate,
    /// The name is bound as a mutable `.SET` variable.
    Variable,
    /// The name is bound as a permanent label or equate.
    Permanent,
}

pub fn is_local(name: &str) -> bool {
    name.starts_with(LOCAL_MARKER)
}

/// Storage key for a local label, or `None` when no global label precedes it.
pub fn local_key(last_global: Option<&str>, name: &str) -> Option<String> {
    last_global.map(|global| format!("{global}{name}"))
}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: BTreeMap<String, Expr>,
    variables: BTreeSet<String>,
    externs: BTreeSet<String>,
    globals: BTreeSet<String>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a permanent symbol once.
    pub fn define(&mut self, name: &str, value: Expr) -> SymbolTableResult {
        if self.variables.contains(name) {
            return SymbolTableResult::Variable;
        }
        if self.symbols.contains_key(name) {
            return SymbolTableResult::Duplicate;
        }
        self.symbols.insert(name.to_string(), value);
        SymbolTableResult::Ok
    }

    /// Bind a label, replacing any value from an earlier pass.
    pub fn rebind(&mut self, name: &str, value: Expr) {
        self.symbols.insert(name.to_string(), value);
    }

    /// Define or overwrite a mutable variable.
    pub fn set_variable(&mut self, name: &str, value: Expr) -> SymbolTableResult {
        if self.symbols.contains_key(name) && !self.variables.contains(name) {
            return SymbolTableResult::Permanent;
        }
        self.symbols.insert(name.to_string(), value);
        self.variables.insert(name.to_string());
        SymbolTableResult::Ok
    }

    /// Import a name from another module.
    pub fn add_extern(&mut self, name: &str) -> SymbolTableResult {
        if self.symbols.contains_key(name) {
            return SymbolTableResult::Duplicate;
        }
        self.symbols
            .insert(name.to_string(), Expr::Extern(name.to_string()));
        self.externs.insert(name.to_string());
        SymbolTableResult::Ok
    }

    /// Mark a name for export.
    pub fn add_global(&mut self, name: &str) {
        self.globals.insert(name.to_string());
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Expr> {
        self.symbols.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    #[must_use]
    pub fn is_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    #[must_use]
    pub fn is_extern(&self, name: &str) -> bool {
        self.externs.contains(name)
    }

    pub fn globals(&self) -> impl Iterator<Item = &str> {
        self.globals.iter().map(String::as_str)
    }

    /// All symbols in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.symbols.iter().map(|(name, expr)| (name.as_str(), expr))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Write the sorted symbol listing: name in a fixed column, hex value,
    /// and an apostrophe after values that are not absolute.
    pub fn dump<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (name, expr) in &self.symbols {
            let marker = if expr.is_absolute() { "" } else { "'" };
            let column: String = name.chars().take(NAME_COLUMN).collect();
            writeln!(
                out,
                "{column:<NAME_COLUMN$} {:08X}{marker}",
                expr.resolve() as u32
            )?;
        }
        Ok(())
    }
}
