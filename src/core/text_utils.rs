// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared character predicates and text helpers.
//!
//! These are pure functions so that CPU-specific lexer extensions can reuse
//! exactly the same classification rules as the standard lexer.

/// Check if a character is whitespace (space or tab).
#[inline]
pub fn is_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Check if a character is a binary digit.
#[inline]
pub fn is_binary(c: char) -> bool {
    c == '0' || c == '1'
}

/// Check if a character is an octal digit.
#[inline]
pub fn is_octal(c: char) -> bool {
    ('0'..='7').contains(&c)
}

/// Check if a character is a decimal digit.
#[inline]
pub fn is_decimal(c: char) -> bool {
    c.is_ascii_digit()
}

/// Check if a character is a hexadecimal digit.
#[inline]
pub fn is_hexadecimal(c: char) -> bool {
    c.is_ascii_hexdigit()
}

/// Check if a character is an ASCII letter.
#[inline]
pub fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Check if a character is an ASCII letter or digit.
#[inline]
pub fn is_alphanumeric(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// Check if a character may start a symbol (letter, underscore or the local marker).
#[inline]
pub fn is_ident_start(c: char) -> bool {
    is_alpha(c) || c == '_' || c == '.'
}

/// Check if a character may continue a symbol.
#[inline]
pub fn is_ident_char(c: char) -> bool {
    is_alphanumeric(c) || c == '_' || c == '.'
}

/// Expand tab characters to spaces using the given tab stop width.
pub fn expand_tabs(text: &str, tab_size: usize) -> String {
    let tab_size = tab_size.max(1);
    let mut out = String::with_capacity(text.len());
    let mut column = 0usize;
    for c in text.chars() {
        if c == '\t' {
            loop {
                out.push(' ');
                column += 1;
                if column % tab_size == 0 {
                    break;
                }
            }
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

/// Pad or truncate `text` to exactly `width` characters.
pub fn fit_width(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}

/// Replace the extension of a file name, or append one when none is present.
pub fn replace_extension(file_name: &str, extension: &str) -> String {
    let path = std::path::Path::new(file_name);
    path.with_extension(extension).to_string_lossy().into_owned()
}
