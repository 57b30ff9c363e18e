// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Macro definitions and textual parameter substitution.

use std::collections::HashMap;

use crate::core::source::{Line, MacroInstance};
use crate::core::text_utils::{is_ident_char, is_ident_start};

/// A recorded macro: parameter names and the captured body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Line>,
}

impl MacroDef {
    pub fn new(name: &str, params: Vec<String>, body: Vec<Line>) -> Self {
        Self {
            name: name.to_string(),
            params,
            body,
        }
    }

    /// Build the source for one invocation.
    ///
    /// Missing arguments substitute as empty text; surplus arguments are ignored.
    pub fn invoke(&self, instance: u32, args: &[String]) -> MacroInstance {
        let lines = self
            .body
            .iter()
            .map(|line| line.with_text(substitute_line(&line.text, &self.params, args)))
            .collect();
        MacroInstance::new(&self.name, instance, lines)
    }
}

/// Registered macros, keyed by case-sensitive name.
#[derive(Debug, Default, Clone)]
pub struct MacroTable {
    macros: HashMap<String, MacroDef>,
}

impl MacroTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, returning the one it replaced.
    pub fn define(&mut self, def: MacroDef) -> Option<MacroDef> {
        self.macros.insert(def.name.clone(), def)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// Replace whole identifiers that name a parameter with the matching argument.
///
/// Quoted strings and trailing comments are copied unchanged.
pub fn substitute_line(line: &str, params: &[String], args: &[String]) -> String {
    if params.is_empty() {
        return line.to_string();
    }
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i] != c {
                    i += 1;
                }
                i = (i + 1).min(chars.len());
                out.extend(&chars[start..i]);
            }
            ';' => {
                out.extend(&chars[i..]);
                break;
            }
            _ if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match params.iter().position(|p| *p == word) {
                    Some(index) => out.push_str(args.get(index).map(String::as_str).unwrap_or("")),
                    None => out.push_str(&word),
                }
            }
            _ if is_ident_char(c) => {
                // Digits that continue a number are never parameter names.
                while i < chars.len() && is_ident_char(chars[i]) {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}
