// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Processor front ends.

pub mod generic;

pub use generic::GenericCpu;
