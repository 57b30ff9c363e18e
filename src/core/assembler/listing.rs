// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Listing file generation.

use std::io::{self, Write};

use crate::core::symbol_table::SymbolTable;

/// Most generated bytes shown against one listing line.
pub const LISTING_BYTES: usize = 9;

/// Data for a single listing line.
pub struct ListingLine<'a> {
    /// Address (or equated value) shown in the margin.
    pub addr: Option<u32>,
    pub relative: bool,
    pub bytes: &'a [u8],
    pub line_type: char,
    pub line_num: u32,
    pub source: &'a str,
}

/// Default rendering: address, bytes, line type, line number, source.
pub fn format_listing_line(line: &ListingLine<'_>) -> String {
    let addr = match line.addr {
        Some(addr) => format!("{addr:08X}{}", if line.relative { '\'' } else { ' ' }),
        None => " ".repeat(9),
    };
    format!(
        "{addr} {:<26} {}{:>6} {}",
        format_bytes(line.bytes),
        line.line_type,
        line.line_num,
        line.source
    )
}

/// Format bytes as hex string for listing.
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Paginating writer for listing output.
pub struct ListingWriter<W: Write> {
    out: W,
    lines_per_page: usize,
    title: String,
    enabled: bool,
    line_count: usize,
    page_count: usize,
    throw_page: bool,
}

impl<W: Write> ListingWriter<W> {
    pub fn new(out: W, lines_per_page: usize) -> Self {
        Self {
            out,
            lines_per_page: lines_per_page.max(4),
            title: String::new(),
            enabled: true,
            line_count: 0,
            page_count: 1,
            throw_page: false,
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Break the page after the next written line.
    pub fn request_page(&mut self) {
        self.throw_page = true;
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Write one line, emitting a page header and form feeds as needed.
    pub fn paginate(&mut self, text: &str) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.line_count == 0 {
            writeln!(self.out)?;
            writeln!(self.out, "{}", self.title)?;
            writeln!(self.out)?;
            self.line_count += 3;
        }
        writeln!(self.out, "{text}")?;
        self.line_count += 1;
        if self.throw_page || self.line_count == self.lines_per_page - 3 {
            write!(self.out, "\x0C")?;
            self.page_count += 1;
            self.line_count = 0;
            self.throw_page = false;
        }
        Ok(())
    }

    /// Append the sorted symbol table on a fresh page.
    pub fn write_symbols(&mut self, symbols: &SymbolTable) -> io::Result<()> {
        self.enabled = true;
        if self.line_count != 0 {
            self.throw_page = true;
            self.paginate("")?;
        }
        self.paginate("Symbol Table")?;
        self.paginate("")?;
        let mut dump = Vec::new();
        symbols.dump(&mut dump)?;
        for line in String::from_utf8_lossy(&dump).lines() {
            self.paginate(line)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
