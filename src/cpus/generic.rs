// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Data-only target.
//!
//! Recognises no mnemonics, so sources are limited to directives. It runs all
//! three passes and lets the caller pick the byte order, which makes it the
//! smallest complete [`CpuModule`].

use crate::assembler::AssemblerState;
use crate::core::cpu::CpuModule;

#[derive(Debug, Clone, Copy, Default)]
pub struct GenericCpu {
    big_endian: bool,
}

impl GenericCpu {
    #[must_use]
    pub fn new(big_endian: bool) -> Self {
        Self { big_endian }
    }
}

impl CpuModule for GenericCpu {
    fn name(&self) -> &str {
        if self.big_endian {
            "generic-be"
        } else {
            "generic"
        }
    }

    fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    fn is_mnemonic(&self, _name: &str) -> bool {
        false
    }

    fn compile(&self, _mnemonic: &str, _asm: &mut AssemblerState) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cpu::Pass;

    #[test]
    fn runs_every_pass_without_mnemonics() {
        let cpu = GenericCpu::new(true);
        assert!(cpu.is_big_endian());
        assert_eq!(cpu.name(), "generic-be");
        assert!(Pass::ALL.iter().all(|pass| cpu.is_supported_pass(*pass)));
        assert!(!cpu.is_mnemonic("NOP"));
    }
}
