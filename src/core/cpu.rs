// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pass enumeration and the CPU plug-in contract.
//!
//! The engine knows nothing about any particular instruction set. A target
//! implements [`CpuModule`] to recognise its mnemonics, encode them through
//! the [`AssemblerState`] emission API, and optionally opt out of the
//! intermediate sizing pass.

use std::fmt;

use crate::assembler::AssemblerState;
use crate::core::assembler::listing::{format_listing_line, ListingLine};
use crate::core::tokenizer::{Lexer, Token};

/// One traversal of the source. Passes run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pass {
    First,
    Intermediate,
    Final,
}

impl Pass {
    pub const ALL: [Pass; 3] = [Pass::First, Pass::Intermediate, Pass::Final];

    pub fn as_str(self) -> &'static str {
        match self {
            Pass::First => "first",
            Pass::Intermediate => "intermediate",
            Pass::Final => "final",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A processor front end plugged into the engine.
pub trait CpuModule: Send + Sync {
    /// Display name of the target.
    fn name(&self) -> &str;

    /// Byte order for multi-byte values written to the object module.
    fn is_big_endian(&self) -> bool;

    /// Fixed-width instruction sets can skip the intermediate pass.
    fn is_supported_pass(&self, _pass: Pass) -> bool {
        true
    }

    /// True when `name` (upper case) is an opcode of this target.
    fn is_mnemonic(&self, name: &str) -> bool;

    /// Lexer extension hook. The default is the standard syntax.
    fn read_token(&self, lexer: &mut Lexer) -> Token {
        lexer.read_standard_token(|name| self.is_mnemonic(name))
    }

    /// Encode one instruction. Operands are read through the state's token
    /// and expression API. Returns whether a label on the line is bound.
    fn compile(&self, mnemonic: &str, asm: &mut AssemblerState) -> bool;

    /// Called before each pass starts reading source.
    fn start_pass(&self, _asm: &mut AssemblerState) {}

    /// Called after each pass has consumed all source.
    fn end_pass(&self, _asm: &mut AssemblerState) {}

    /// Render one listing line.
    fn format_listing(&self, line: &ListingLine<'_>) -> String {
        format_listing_line(line)
    }
}
