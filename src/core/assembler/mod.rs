// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Core assembler components shared by every target.

pub mod conditional;
pub mod error;
pub mod expression;
pub mod listing;
