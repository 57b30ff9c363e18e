// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU-agnostic assembler core.
//!
//! This module provides the reusable engine pieces that every processor
//! front end shares.
//!
//! # Components
//!
//! - [`text_utils`] - Character predicates and text helpers
//! - [`tokenizer`] - Tokens and the line lexer with pushback
//! - [`expr`] - Relocatable expression trees
//! - [`symbol_table`] - Labels, equates, variables and externs
//! - [`source`] - Source lines and the source stack
//! - [`macro_processor`] - Macro definitions and parameter substitution
//! - [`module`] - Object module and sections
//! - [`cpu`] - Pass enumeration and the CPU plug-in trait
//! - [`assembler`] - Errors, conditionals, expression parsing and listings

pub mod assembler;
pub mod cpu;
pub mod expr;
pub mod macro_processor;
pub mod module;
pub mod source;
pub mod symbol_table;
pub mod text_utils;
pub mod tokenizer;

// Re-exports for convenience
pub use cpu::{CpuModule, Pass};
pub use expr::{BinaryOp, Expr, SectionId, UnaryOp};
pub use module::{Module, Section, Width};
pub use symbol_table::SymbolTable;
pub use tokenizer::{Directive, Keyword, Lexer, Operator, Token, TokenKind};
