// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Directive handlers and block capture for .MACRO and .REPEAT.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::assembler::error::AsmError;
use crate::core::cpu::Pass;
use crate::core::expr::{Expr, SectionId};
use crate::core::macro_processor::MacroDef;
use crate::core::source::{FileSource, Line, RepeatSource, Source};
use crate::core::symbol_table::{is_local, SymbolTableResult};
use crate::core::tokenizer::{Directive, Token};

use super::AssemblerState;

/// What a capture produces once its closing directive is reached.
#[derive(Debug)]
pub(super) enum CaptureKind {
    Macro {
        name: Option<String>,
        params: Vec<String>,
    },
    Repeat {
        count: u32,
    },
}

/// A block being recorded verbatim until its closing directive.
#[derive(Debug)]
pub(super) struct Capture {
    kind: CaptureKind,
    body: Vec<Line>,
    /// Nested openers of the same kind seen inside the body.
    depth: u32,
}

impl Capture {
    fn new(kind: CaptureKind) -> Self {
        Self {
            kind,
            body: Vec::new(),
            depth: 0,
        }
    }

    pub(super) fn opener(&self) -> Directive {
        match self.kind {
            CaptureKind::Macro { .. } => Directive::Macro,
            CaptureKind::Repeat { .. } => Directive::Repeat,
        }
    }

    fn closer(&self) -> Directive {
        match self.kind {
            CaptureKind::Macro { .. } => Directive::EndM,
            CaptureKind::Repeat { .. } => Directive::EndR,
        }
    }
}

impl AssemblerState {
    // ---- Capture ----

    /// Record a line into the open capture, closing it on the matching
    /// terminator.
    pub(super) fn capture_line(&mut self, opcode: &Token) {
        let Some(line) = self.line.line.clone() else {
            return;
        };
        let Some(capture) = self.pass.capture.as_mut() else {
            return;
        };
        match opcode {
            Token::Directive(directive) if *directive == capture.opener() => {
                capture.depth += 1;
                capture.body.push(line);
            }
            Token::Directive(directive) if *directive == capture.closer() => {
                if capture.depth > 0 {
                    capture.depth -= 1;
                    capture.body.push(line);
                } else if let Some(capture) = self.pass.capture.take() {
                    self.close_capture(capture);
                }
            }
            _ => capture.body.push(line),
        }
    }

    fn close_capture(&mut self, capture: Capture) {
        match capture.kind {
            CaptureKind::Macro { name: None, .. } => {}
            CaptureKind::Macro {
                name: Some(name),
                params,
            } => {
                if self.pass.pass == Pass::First && self.run.macros.contains(&name) {
                    self.error(AsmError::MacroRedefined(name));
                    return;
                }
                tracing::trace!(name = %name, params = params.len(), "macro defined");
                self.run
                    .macros
                    .define(MacroDef::new(&name, params, capture.body));
            }
            CaptureKind::Repeat { count } => {
                self.pass
                    .sources
                    .push(Source::Repeat(RepeatSource::new(capture.body, count)));
            }
        }
    }

    /// `.MACRO` header: the label names the macro, operands name parameters.
    pub(super) fn open_macro(&mut self, label: Option<String>) {
        if label.is_none() {
            self.error(AsmError::MissingLabel);
        }
        let mut params = Vec::new();
        loop {
            let (token, start, end) = self.next_real_token_span();
            match token {
                Token::EndOfLine => break,
                Token::Symbol(_) | Token::Keyword(_) | Token::Mnemonic(_) => {
                    params.push(self.lexer.slice(start, end));
                }
                _ => {
                    self.error(AsmError::IllegalMacroArgument);
                    break;
                }
            }
            match self.next_real_token() {
                Token::Comma => {}
                Token::EndOfLine => break,
                _ => {
                    self.error(AsmError::UnexpectedAfterArgument);
                    break;
                }
            }
        }
        self.pass.capture = Some(Capture::new(CaptureKind::Macro {
            name: label,
            params,
        }));
    }

    /// `.REPEAT count` header.
    pub(super) fn open_repeat(&mut self) {
        let count = match self.parse_constant() {
            Some(value) => u32::try_from(value).unwrap_or(0),
            None => 0,
        };
        self.expect_end();
        self.pass.capture = Some(Capture::new(CaptureKind::Repeat { count }));
    }

    fn next_real_token_span(&mut self) -> (Token, usize, usize) {
        loop {
            let start = self.lexer.offset();
            let token = self.next_token();
            if token != Token::Whitespace {
                return (token, start, self.lexer.offset());
            }
        }
    }

    /// Parse an expression that must be absolute.
    fn parse_constant(&mut self) -> Option<i64> {
        let expr = self.parse_expr();
        if expr.is_absolute() {
            Some(expr.resolve())
        } else {
            self.error(AsmError::ConstantRequired);
            None
        }
    }

    // ---- Definitions ----

    /// `.EQU` and `.SET`. The value is shown in the listing margin.
    pub(super) fn compile_definition(&mut self, directive: Directive, label: Option<String>) {
        let value = self.parse_expr();
        self.expect_end();
        self.line.addr = Some(value.clone());
        let Some(name) = label else {
            self.error(AsmError::MissingLabel);
            return;
        };
        if directive == Directive::Set {
            self.define_variable(&name, value);
        } else {
            self.define_equate(&name, value);
        }
    }

    /// Equates are checked once on the first pass and refreshed afterwards
    /// so forward references settle.
    fn define_equate(&mut self, name: &str, value: Expr) {
        if is_local(name) {
            self.error(AsmError::LocalEquate);
            return;
        }
        if self.pass.pass != Pass::First {
            if !self.run.symbols.is_variable(name) {
                self.run.symbols.rebind(name, value);
            }
            return;
        }
        match self.run.symbols.define(name, value) {
            SymbolTableResult::Ok => {}
            SymbolTableResult::Variable => self.error(AsmError::DefinedWithSet),
            SymbolTableResult::Duplicate | SymbolTableResult::Permanent => {
                self.error(AsmError::LabelRedefined(name.to_string()));
            }
        }
    }

    fn define_variable(&mut self, name: &str, value: Expr) {
        if is_local(name) {
            self.error(AsmError::LocalVariable);
            return;
        }
        if self.run.symbols.set_variable(name, value) == SymbolTableResult::Permanent {
            self.error(AsmError::PermanentSymbol(name.to_string()));
        }
    }

    // ---- Dispatch ----

    /// Execute a directive. Returns whether a label on the line is bound.
    pub(super) fn compile_directive(&mut self, directive: Directive) -> bool {
        match directive {
            Directive::If
            | Directive::IfAbs
            | Directive::IfNAbs
            | Directive::IfRel
            | Directive::IfNRel => {
                self.compile_if(directive);
                false
            }
            Directive::Else => {
                if let Err(err) = self.pass.conditionals.else_branch() {
                    self.error(err);
                }
                false
            }
            Directive::EndIf => {
                if let Err(err) = self.pass.conditionals.end_if() {
                    self.error(err);
                }
                false
            }
            Directive::EndM | Directive::EndR => {
                if self.is_active() {
                    let opener = if directive == Directive::EndM {
                        Directive::Macro
                    } else {
                        Directive::Repeat
                    };
                    self.error(AsmError::UnmatchedClose(directive.name(), opener.name()));
                }
                false
            }
            Directive::ExitM => {
                if !self.pass.sources.exit_macro() {
                    self.error(AsmError::NoActiveMacro);
                }
                false
            }
            Directive::Include | Directive::Append => {
                self.compile_include(directive);
                false
            }
            Directive::Insert => {
                self.compile_insert();
                true
            }
            Directive::End => {
                self.pass.sources.clear();
                false
            }
            Directive::Space => {
                if let Some(count) = self.parse_constant() {
                    for _ in 0..count.max(0) {
                        self.add_byte(0);
                    }
                }
                self.expect_end();
                true
            }
            Directive::Byte | Directive::DByte | Directive::Word | Directive::Long => {
                self.compile_data(directive);
                true
            }
            Directive::Org => {
                self.compile_org();
                true
            }
            Directive::Code => self.switch_section(self.pass.code),
            Directive::Data => self.switch_section(self.pass.data),
            Directive::Bss => self.switch_section(self.pass.bss),
            Directive::Extern | Directive::Global => {
                self.compile_linkage(directive);
                false
            }
            Directive::List | Directive::NoList => {
                let enabled = directive == Directive::List;
                self.expect_end();
                if let Some(listing) = self.pass.listing.as_mut() {
                    listing.set_enabled(enabled);
                }
                false
            }
            Directive::Page => {
                self.expect_end();
                if let Some(listing) = self.pass.listing.as_mut() {
                    listing.request_page();
                }
                false
            }
            Directive::Title => {
                match self.next_real_token() {
                    Token::Str(title) => {
                        if let Some(listing) = self.pass.listing.as_mut() {
                            listing.set_title(&title);
                        }
                        self.expect_end();
                    }
                    _ => self.error(AsmError::ExpectedString),
                }
                false
            }
            // Handled by the line processor before dispatch.
            Directive::Macro | Directive::Repeat | Directive::Equ | Directive::Set => false,
        }
    }

    fn compile_if(&mut self, directive: Directive) {
        if !self.is_active() {
            self.pass.conditionals.push_if(false);
            return;
        }
        let expr = self.parse_expr();
        self.expect_end();
        let predicate = match directive {
            Directive::IfAbs => expr.is_absolute(),
            Directive::IfNAbs => !expr.is_absolute(),
            Directive::IfRel => expr.is_relative(),
            Directive::IfNRel => !expr.is_relative(),
            _ if expr.is_absolute() => expr.resolve() != 0,
            _ => {
                self.error(AsmError::ConstantRequired);
                false
            }
        };
        self.pass.conditionals.push_if(predicate);
    }

    fn switch_section(&mut self, section: SectionId) -> bool {
        self.expect_end();
        self.set_section(Some(section));
        false
    }

    fn compile_org(&mut self) {
        let Some(addr) = self.parse_constant() else {
            return;
        };
        self.expect_end();
        let Some(id) = self.pass.section else {
            self.error(AsmError::NoSection);
            return;
        };
        if let Some(section) = self.module.section_mut(id) {
            section.set_origin(addr as u32);
            let origin = section.origin();
            self.line.origin = Some(origin.clone());
            self.line.addr = Some(origin);
        }
    }

    // ---- Data ----

    fn compile_data(&mut self, directive: Directive) {
        loop {
            let token = self.next_real_token();
            if token == Token::EndOfLine {
                self.error(AsmError::InvalidExpression);
                return;
            }
            let mut separator = None;
            if let Token::Str(text) = &token {
                if directive == Directive::Byte {
                    let after = self.next_real_token();
                    if matches!(after, Token::Comma | Token::EndOfLine) {
                        for c in text.chars() {
                            self.add_byte(i64::from(u32::from(c) & 0xFF));
                        }
                        separator = Some(after);
                    } else {
                        self.push_token(after);
                    }
                }
            }
            let separator = match separator {
                Some(token) => token,
                None => {
                    self.push_token(token);
                    let value = self.parse_expr();
                    self.emit_data(directive, value);
                    self.next_real_token()
                }
            };
            match separator {
                Token::Comma => {}
                Token::EndOfLine => return,
                _ => {
                    self.error(AsmError::InvalidExpression);
                    return;
                }
            }
        }
    }

    fn emit_data(&mut self, directive: Directive, value: Expr) {
        match directive {
            Directive::DByte => {
                self.add_byte(value.clone().hi());
                self.add_byte(value.lo());
            }
            Directive::Word => self.add_word(value),
            Directive::Long => self.add_long(value),
            _ => self.add_byte(value),
        }
    }

    // ---- Linkage ----

    /// `.EXTERN` and `.GLOBAL` take effect on the first pass only.
    fn compile_linkage(&mut self, directive: Directive) {
        if self.pass.pass != Pass::First {
            return;
        }
        loop {
            let Token::Symbol(name) = self.next_real_token() else {
                self.error(AsmError::ExpectedSymbolList);
                return;
            };
            if directive == Directive::Extern {
                if self.run.symbols.add_extern(&name) != SymbolTableResult::Ok {
                    self.error(AsmError::LabelRedefined(name));
                }
            } else {
                self.run.symbols.add_global(&name);
            }
            match self.next_real_token() {
                Token::Comma => {}
                Token::EndOfLine => return,
                _ => {
                    self.error(AsmError::ExpectedSymbolList);
                    return;
                }
            }
        }
    }

    // ---- Files ----

    fn expect_filename(&mut self) -> Option<String> {
        match self.next_real_token() {
            Token::Str(name) => {
                self.expect_end();
                Some(name)
            }
            _ => {
                self.error(AsmError::ExpectedFilename);
                None
            }
        }
    }

    /// Locate `name`: as given, then beside the current file, then (for
    /// `.INCLUDE`) along the include path.
    fn find_file(&self, name: &str, use_include_path: bool) -> Option<PathBuf> {
        let given = PathBuf::from(name);
        if given.is_file() {
            return Some(given);
        }
        if given.is_absolute() {
            return None;
        }
        let mut dirs: Vec<PathBuf> = self
            .pass
            .sources
            .current_file()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .into_iter()
            .collect();
        if use_include_path {
            dirs.extend(self.options.include_paths.iter().cloned());
        }
        dirs.into_iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
    }

    /// `.INCLUDE` nests a file; `.APPEND` replaces the current source with it.
    fn compile_include(&mut self, directive: Directive) {
        let Some(name) = self.expect_filename() else {
            return;
        };
        let found = self.find_file(&name, directive == Directive::Include);
        let Some(source) = found.and_then(|path| FileSource::open(&path).ok()) else {
            self.error(AsmError::FileNotFound(name));
            return;
        };
        if directive == Directive::Append {
            self.pass.sources.pop();
        }
        self.pass.sources.push(Source::File(source));
    }

    /// `.INSERT` copies a binary file into the current section.
    fn compile_insert(&mut self) {
        let Some(name) = self.expect_filename() else {
            return;
        };
        let Some(path) = self.find_file(&name, false) else {
            self.error(AsmError::FileNotFound(name));
            return;
        };
        match fs::read(&path) {
            Ok(bytes) => {
                for byte in bytes {
                    self.add_byte(i64::from(byte));
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.error(AsmError::FileNotFound(name));
            }
            Err(_) => self.error(AsmError::InsertIo),
        }
    }
}
