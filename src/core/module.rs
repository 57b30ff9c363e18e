// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! In-memory object module.
//!
//! A [`Module`] owns named [`Section`]s. Each section is a sequence of
//! areas: the first area is relocatable (its address is assigned by the
//! linker), and every `.ORG` opens a new area at a fixed address. Values
//! that are not absolute are recorded as relocations over zero-filled
//! placeholder bytes.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::core::expr::{Expr, SectionId};

/// Width of an emitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Long,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Long => 4,
        }
    }
}

/// A value the linker must patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reloc {
    pub offset: usize,
    pub width: Width,
    pub expr: Expr,
}

/// A contiguous run of bytes, either relocatable or at a fixed address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Area {
    pub org: Option<u32>,
    pub data: Vec<u8>,
    pub relocs: Vec<Reloc>,
}

#[derive(Debug, Clone)]
pub struct Section {
    id: SectionId,
    name: String,
    big_endian: bool,
    areas: Vec<Area>,
}

impl Section {
    fn new(id: SectionId, name: &str, big_endian: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            big_endian,
            areas: vec![Area::default()],
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    fn current(&mut self) -> &mut Area {
        if self.areas.is_empty() {
            self.areas.push(Area::default());
        }
        let last = self.areas.len() - 1;
        &mut self.areas[last]
    }

    /// Address of the next byte to be emitted.
    pub fn origin(&self) -> Expr {
        match self.areas.last() {
            Some(Area {
                org: Some(org),
                data,
                ..
            }) => Expr::Value(i64::from(*org) + data.len() as i64),
            Some(area) => Expr::Relative {
                section: self.id,
                offset: area.data.len() as i64,
            },
            None => Expr::Relative {
                section: self.id,
                offset: 0,
            },
        }
    }

    /// Continue emission at a fixed address.
    pub fn set_origin(&mut self, addr: u32) {
        let area = self.current();
        if area.org.is_some() && area.data.is_empty() {
            area.org = Some(addr);
            return;
        }
        self.areas.push(Area {
            org: Some(addr),
            ..Area::default()
        });
    }

    pub fn add_byte(&mut self, value: i64) {
        self.current().data.push(value as u8);
    }

    pub fn add_word(&mut self, value: i64) {
        let bytes = (value as u16).to_le_bytes();
        self.push_ordered(&bytes);
    }

    pub fn add_long(&mut self, value: i64) {
        let bytes = (value as u32).to_le_bytes();
        self.push_ordered(&bytes);
    }

    fn push_ordered(&mut self, little: &[u8]) {
        let big_endian = self.big_endian;
        let data = &mut self.current().data;
        if big_endian {
            data.extend(little.iter().rev());
        } else {
            data.extend_from_slice(little);
        }
    }

    /// Emit an expression, recording a relocation if it is not absolute.
    pub fn add_expr(&mut self, width: Width, expr: &Expr) {
        if expr.is_absolute() {
            let value = expr.resolve();
            match width {
                Width::Byte => self.add_byte(value),
                Width::Word => self.add_word(value),
                Width::Long => self.add_long(value),
            }
            return;
        }
        let area = self.current();
        area.relocs.push(Reloc {
            offset: area.data.len(),
            width,
            expr: expr.clone(),
        });
        area.data.extend(std::iter::repeat(0).take(width.bytes()));
    }

    /// Contents of every area, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.areas
            .iter()
            .flat_map(|area| area.data.iter().copied())
            .collect()
    }

    /// Total number of bytes across all areas.
    pub fn size(&self) -> usize {
        self.areas.iter().map(|area| area.data.len()).sum()
    }

    fn clear(&mut self) {
        self.areas = vec![Area::default()];
    }
}

/// The object module produced by one assembly run.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    big_endian: bool,
    sections: Vec<Section>,
    globals: BTreeMap<String, Expr>,
}

impl Module {
    #[must_use]
    pub fn new(name: &str, big_endian: bool) -> Self {
        Self {
            name: name.to_string(),
            big_endian,
            sections: Vec::new(),
            globals: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Section with the given name, if it exists.
    pub fn section_named(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    /// Look up a section by name, creating it if necessary.
    ///
    /// Section ids are stable for the lifetime of the module, including
    /// across [`Module::clear`].
    pub fn find_section(&mut self, name: &str) -> SectionId {
        if let Some(section) = self.sections.iter().find(|s| s.name == name) {
            return section.id;
        }
        let id = SectionId(self.sections.len());
        self.sections.push(Section::new(id, name, self.big_endian));
        id
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }

    pub fn section_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        self.sections.get_mut(id.0)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_name(&self, id: SectionId) -> &str {
        self.section(id).map(Section::name).unwrap_or("?")
    }

    /// Discard emitted content and exports, keeping section identities.
    pub fn clear(&mut self) {
        for section in &mut self.sections {
            section.clear();
        }
        self.globals.clear();
    }

    pub fn add_global(&mut self, name: &str, expr: Expr) {
        self.globals.insert(name.to_string(), expr);
    }

    pub fn globals(&self) -> &BTreeMap<String, Expr> {
        &self.globals
    }

    /// Serialize the module as XML.
    pub fn write_xml<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let endian = if self.big_endian { "big" } else { "little" };
        writeln!(
            out,
            "<module name=\"{}\" endian=\"{endian}\">",
            escape(&self.name)
        )?;
        for section in &self.sections {
            writeln!(out, "<section name=\"{}\">", escape(&section.name))?;
            for area in &section.areas {
                if area.data.is_empty() && area.relocs.is_empty() {
                    continue;
                }
                match area.org {
                    Some(org) => writeln!(out, "<area org=\"{org:08X}\">")?,
                    None => writeln!(out, "<area>")?,
                }
                writeln!(out, "<data>{}</data>", hex(&area.data))?;
                for reloc in &area.relocs {
                    write!(
                        out,
                        "<reloc offset=\"{}\" size=\"{}\">",
                        reloc.offset,
                        reloc.width.bytes()
                    )?;
                    self.write_expr(out, &reloc.expr)?;
                    writeln!(out, "</reloc>")?;
                }
                writeln!(out, "</area>")?;
            }
            writeln!(out, "</section>")?;
        }
        for (name, expr) in &self.globals {
            write!(out, "<global name=\"{}\">", escape(name))?;
            self.write_expr(out, expr)?;
            writeln!(out, "</global>")?;
        }
        writeln!(out, "</module>")
    }

    fn write_expr<W: Write>(&self, out: &mut W, expr: &Expr) -> io::Result<()> {
        match expr {
            Expr::Value(value) => write!(out, "<value>{value}</value>"),
            Expr::Extern(name) => write!(out, "<extern name=\"{}\"/>", escape(name)),
            Expr::Relative { section, offset } => write!(
                out,
                "<relative section=\"{}\" offset=\"{offset}\"/>",
                escape(self.section_name(*section))
            ),
            Expr::Unary { op, operand } => {
                write!(out, "<unary op=\"{}\">", escape(op.as_str()))?;
                self.write_expr(out, operand)?;
                write!(out, "</unary>")
            }
            Expr::Binary { op, left, right } => {
                write!(out, "<binary op=\"{}\">", escape(op.as_str()))?;
                self.write_expr(out, left)?;
                self.write_expr(out, right)?;
                write!(out, "</binary>")
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
