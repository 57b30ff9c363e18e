// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Multi-pass assembler engine.
//!
//! This module ties the CPU-agnostic core together: it drives the FIRST,
//! INTERMEDIATE and FINAL passes over the source, dispatches each line to
//! the directive handlers or the CPU plug-in, and writes the object module
//! and listing once the final pass succeeds.

pub mod cli;
mod directives;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use crate::core::assembler::conditional::ConditionalStack;
use crate::core::assembler::error::{
    AsmError, AsmRunError, AsmRunReport, Diagnostic, PassCounts, Severity,
};
use crate::core::assembler::expression::{parse_expression, ExprContext};
use crate::core::assembler::listing::{ListingLine, ListingWriter, LISTING_BYTES};
use crate::core::cpu::{CpuModule, Pass};
use crate::core::expr::{Expr, SectionId};
use crate::core::macro_processor::MacroTable;
use crate::core::module::{Module, Width};
use crate::core::source::{FileSource, Line, Source, SourceStack};
use crate::core::symbol_table::{is_local, local_key, SymbolTable};
use crate::core::text_utils::{expand_tabs, replace_extension};
use crate::core::tokenizer::{Directive, Lexer, Operator, Token};
use crate::cpus::generic::GenericCpu;

use directives::Capture;

use cli::Cli;

pub use cli::VERSION;

/// Names of the sections every pass starts with.
pub const CODE_SECTION: &str = ".code";
pub const DATA_SECTION: &str = ".data";
pub const BSS_SECTION: &str = ".bss";

/// Run the assembler with command-line arguments.
pub fn run() -> Result<AsmRunReport, AsmRunError> {
    let cli = Cli::parse();
    let config = cli::validate_cli(&cli)?;
    let cpu: Arc<dyn CpuModule> = Arc::new(GenericCpu::new(config.big_endian));
    let mut assembler = Assembler::new(cpu, config.options);
    assembler.assemble(&config.source)
}

/// Settings for one assembler instance.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    /// Extra directories searched by `.INCLUDE`.
    pub include_paths: Vec<PathBuf>,
    pub lines_per_page: usize,
    pub tab_size: usize,
    pub write_listing: bool,
    pub write_object: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            lines_per_page: 60,
            tab_size: 8,
            write_listing: true,
            write_object: true,
        }
    }
}

/// State that survives from one pass to the next.
#[derive(Debug, Default)]
struct RunState {
    symbols: SymbolTable,
    macros: MacroTable,
}

/// State rebuilt at the start of every pass.
struct PassState {
    pass: Pass,
    counts: PassCounts,
    diagnostics: Vec<Diagnostic>,
    sources: SourceStack,
    conditionals: ConditionalStack,
    capture: Option<Capture>,
    code: SectionId,
    data: SectionId,
    bss: SectionId,
    section: Option<SectionId>,
    last_label: Option<String>,
    instance: u32,
    listing: Option<ListingWriter<Box<dyn Write>>>,
}

impl PassState {
    fn new(pass: Pass, module: &mut Module) -> Self {
        let code = module.find_section(CODE_SECTION);
        let data = module.find_section(DATA_SECTION);
        let bss = module.find_section(BSS_SECTION);
        Self {
            pass,
            counts: PassCounts::new(),
            diagnostics: Vec::new(),
            sources: SourceStack::new(),
            conditionals: ConditionalStack::new(),
            capture: None,
            code,
            data,
            bss,
            section: Some(code),
            last_label: None,
            instance: 0,
            listing: None,
        }
    }
}

/// State of the line being assembled.
#[derive(Debug, Default)]
struct LineState {
    line: Option<Line>,
    expansion: bool,
    origin: Option<Expr>,
    addr: Option<Expr>,
    line_type: char,
    bytes: Vec<u8>,
    emitted: bool,
}

/// Engine state handed to directive handlers and CPU plug-ins.
pub struct AssemblerState {
    cpu: Arc<dyn CpuModule>,
    options: AssemblerOptions,
    module: Module,
    run: RunState,
    pass: PassState,
    line: LineState,
    lexer: Lexer,
}

impl AssemblerState {
    #[must_use]
    pub fn new(cpu: Arc<dyn CpuModule>, options: AssemblerOptions) -> Self {
        let mut module = Module::new("", cpu.is_big_endian());
        let pass = PassState::new(Pass::First, &mut module);
        Self {
            cpu,
            options,
            module,
            run: RunState::default(),
            pass,
            line: LineState::default(),
            lexer: Lexer::default(),
        }
    }

    pub fn cpu(&self) -> &Arc<dyn CpuModule> {
        &self.cpu
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    pub fn pass(&self) -> Pass {
        self.pass.pass
    }

    pub fn counts(&self) -> PassCounts {
        self.pass.counts
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.pass.diagnostics
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.run.symbols
    }

    pub fn macros(&self) -> &MacroTable {
        &self.run.macros
    }

    /// True when conditional assembly is not suppressing output.
    pub fn is_active(&self) -> bool {
        self.pass.conditionals.is_active()
    }

    pub fn section(&self) -> Option<SectionId> {
        self.pass.section
    }

    pub fn set_section(&mut self, section: Option<SectionId>) {
        self.pass.section = section;
    }

    /// Address captured at the start of the current line.
    pub fn line_origin(&self) -> Option<&Expr> {
        self.line.origin.as_ref()
    }

    /// Number of macro invocations so far in this pass.
    pub fn instance_count(&self) -> u32 {
        self.pass.instance
    }

    /// Invocation number of the innermost expanding macro.
    pub fn macro_instance(&self) -> Option<u32> {
        self.pass.sources.macro_instance()
    }

    // ---- Reset ----

    /// Prepare a fresh pass. Symbols and macros carry over; everything else
    /// is rebuilt.
    pub fn start_pass(&mut self, pass: Pass) {
        self.module.clear();
        self.pass = PassState::new(pass, &mut self.module);
        self.line = LineState::default();
        tracing::debug!(%pass, "pass start");
    }

    fn reset_run(&mut self, module_name: &str) {
        self.run = RunState::default();
        self.module = Module::new(module_name, self.cpu.is_big_endian());
    }

    // ---- Diagnostics ----

    pub fn error(&mut self, error: AsmError) {
        self.report(Severity::Error, error);
    }

    pub fn warning(&mut self, error: AsmError) {
        self.report(Severity::Warning, error);
    }

    fn report(&mut self, severity: Severity, error: AsmError) {
        let (file, line) = match &self.line.line {
            Some(line) => (Some(line.file.to_string()), line.number),
            None => (None, 0),
        };
        let diag = Diagnostic::new(line, severity, error)
            .with_file(file)
            .with_pass(self.pass.pass);
        match severity {
            Severity::Error => self.pass.counts.errors += 1,
            Severity::Warning => self.pass.counts.warnings += 1,
        }
        if self.pass.pass == Pass::Final {
            let text = diag.format();
            self.list_text(&text);
        }
        self.pass.diagnostics.push(diag);
    }

    // ---- Tokens ----

    /// Next token, draining pushed-back tokens first.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.lexer.pop_pushed() {
            return token;
        }
        self.cpu.read_token(&mut self.lexer)
    }

    /// Next token that is not whitespace.
    pub fn next_real_token(&mut self) -> Token {
        loop {
            let token = self.next_token();
            if token != Token::Whitespace {
                return token;
            }
        }
    }

    pub fn push_token(&mut self, token: Token) {
        self.lexer.push_token(token);
    }

    /// Parse an expression, reporting failures and recovering with zero.
    pub fn parse_expr(&mut self) -> Expr {
        match parse_expression(self) {
            Ok(expr) => expr,
            Err(err) => {
                self.error(err);
                Expr::ZERO
            }
        }
    }

    /// Report trailing tokens after a complete statement.
    pub fn expect_end(&mut self) {
        let token = self.next_real_token();
        if token != Token::EndOfLine {
            self.error(AsmError::InvalidExpression);
        }
    }

    // ---- Emission ----

    pub fn add_byte(&mut self, value: impl Into<Expr>) {
        self.emit(Width::Byte, value.into());
    }

    pub fn add_word(&mut self, value: impl Into<Expr>) {
        self.emit(Width::Word, value.into());
    }

    pub fn add_long(&mut self, value: impl Into<Expr>) {
        self.emit(Width::Long, value.into());
    }

    fn emit(&mut self, width: Width, value: Expr) {
        let Some(id) = self.pass.section else {
            self.error(AsmError::NoSection);
            return;
        };
        let size = width.bytes();
        let mut listed = if value.is_absolute() {
            (value.resolve() as u32).to_le_bytes()[..size].to_vec()
        } else {
            vec![0; size]
        };
        if self.module.is_big_endian() {
            listed.reverse();
        }
        for byte in listed {
            if self.line.bytes.len() < LISTING_BYTES {
                self.line.bytes.push(byte);
            }
        }
        self.line.emitted = true;
        if let Some(section) = self.module.section_mut(id) {
            section.add_expr(width, &value);
        }
    }

    // ---- Sources ----

    pub fn push_source(&mut self, source: Source) {
        self.pass.sources.push(source);
    }

    /// Assemble lines until the source stack is empty.
    pub fn drain_sources(&mut self) {
        loop {
            match self.pass.sources.next_line() {
                Ok(Some((line, expansion))) => {
                    self.pass.counts.lines += 1;
                    self.process_line(line, expansion);
                    if self.pass.pass == Pass::Final {
                        self.list_line();
                    }
                }
                Ok(None) => break,
                Err(err) => self.error(AsmError::SourceRead(err.to_string())),
            }
        }
    }

    // ---- Line processing ----

    /// Assemble one line.
    pub fn process_line(&mut self, line: Line, expansion: bool) {
        self.lexer.reset(&line.text);
        let origin = self
            .pass
            .section
            .and_then(|id| self.module.section(id))
            .map(|section| section.origin());
        self.line = LineState {
            line: Some(line),
            expansion,
            addr: origin.clone(),
            origin,
            line_type: if expansion { '+' } else { ' ' },
            bytes: Vec::new(),
            emitted: false,
        };

        let mut token = self.next_token();
        if token == Token::EndOfLine {
            return;
        }

        let mut label = None;
        match token {
            Token::Whitespace => token = self.next_real_token(),
            Token::Directive(_) | Token::Mnemonic(_) => {}
            other => {
                label = Some(other);
                token = self.next_token();
                if token == Token::Colon {
                    token = self.next_token();
                }
                if token == Token::Whitespace {
                    token = self.next_real_token();
                }
            }
        }

        if token == Token::Operator(Operator::Eq) {
            token = Token::Directive(Directive::Equ);
        }

        if self.pass.capture.is_some() {
            self.capture_line(&token);
            return;
        }

        let active = self.is_active();
        if !(active || token.is_always_active()) {
            self.line.line_type = '-';
            return;
        }

        let label = match label {
            None => None,
            Some(Token::Symbol(name)) => Some(name),
            Some(_) => {
                if active {
                    self.error(AsmError::UnknownOpcode);
                } else {
                    self.line.line_type = '-';
                }
                return;
            }
        };

        match token {
            Token::Directive(Directive::Macro) => self.open_macro(label),
            Token::Directive(Directive::Repeat) => {
                if label.is_some() {
                    self.warning(AsmError::LabelIgnored);
                }
                self.open_repeat();
            }
            Token::Directive(directive @ (Directive::Equ | Directive::Set)) => {
                self.compile_definition(directive, label);
                self.line.line_type = '=';
            }
            Token::Directive(_) | Token::Mnemonic(_) | Token::EndOfLine => {
                let bound = match &token {
                    Token::Directive(directive) => self.compile_directive(*directive),
                    Token::Mnemonic(mnemonic) => {
                        let cpu = Arc::clone(&self.cpu);
                        cpu.compile(mnemonic, self)
                    }
                    _ => {
                        if !active {
                            self.line.line_type = '-';
                        }
                        active
                    }
                };
                self.finish_statement(bound, label, active);
            }
            Token::Symbol(name) if self.run.macros.contains(&name) => {
                self.invoke_macro(&name, label);
            }
            _ => {
                if let Some(label) = label {
                    self.bind_label(&label);
                }
                self.error(AsmError::UnknownOpcode);
            }
        }
    }

    fn finish_statement(&mut self, bound: bool, label: Option<String>, active: bool) {
        if bound {
            if self.line.emitted {
                self.line.line_type = if self.line.expansion { '+' } else { ':' };
            }
            if let Some(label) = label {
                self.bind_label(&label);
                if self.line.line_type == ' ' {
                    self.line.line_type = ':';
                }
            }
        } else if label.is_some() && active {
            self.warning(AsmError::LabelIgnored);
        }
    }

    /// Bind a label to the current line's origin.
    fn bind_label(&mut self, label: &str) {
        let Some(origin) = self.line.origin.clone() else {
            self.error(AsmError::NoSection);
            return;
        };
        if is_local(label) {
            match local_key(self.pass.last_label.as_deref(), label) {
                Some(key) => self.set_label(&key, origin),
                None => self.error(AsmError::NoGlobalLabel),
            }
        } else {
            self.pass.last_label = Some(label.to_string());
            self.set_label(label, origin);
        }
    }

    /// Redefinition is only checked on the first pass; later passes rebind.
    fn set_label(&mut self, name: &str, value: Expr) {
        if self.pass.pass == Pass::First && self.run.symbols.contains(name) {
            self.error(AsmError::LabelRedefined(name.to_string()));
        } else {
            self.run.symbols.rebind(name, value);
        }
    }

    fn invoke_macro(&mut self, name: &str, label: Option<String>) {
        let args = self.split_macro_args();
        if let Some(label) = label {
            self.bind_label(&label);
        }
        let Some(def) = self.run.macros.get(name) else {
            return;
        };
        self.pass.instance += 1;
        let instance = def.invoke(self.pass.instance, &args);
        self.pass.sources.push(Source::Macro(instance));
    }

    /// Split the rest of the line into raw comma-separated argument text.
    fn split_macro_args(&mut self) -> Vec<String> {
        let mut args = Vec::new();
        let mut start: Option<usize> = None;
        let mut end = self.lexer.offset();
        loop {
            let before = self.lexer.offset();
            match self.next_token() {
                Token::Whitespace => {}
                Token::Comma => {
                    args.push(match start.take() {
                        Some(start) => self.lexer.slice(start, end),
                        None => String::new(),
                    });
                }
                Token::EndOfLine => {
                    if start.is_some() || !args.is_empty() {
                        args.push(match start {
                            Some(start) => self.lexer.slice(start, end),
                            None => String::new(),
                        });
                    }
                    break;
                }
                _ => {
                    start.get_or_insert(before);
                    end = self.lexer.offset();
                }
            }
        }
        args
    }

    // ---- Listing ----

    fn list_text(&mut self, text: &str) {
        let Some(listing) = self.pass.listing.as_mut() else {
            return;
        };
        if let Err(err) = listing.paginate(text) {
            tracing::warn!(%err, "listing write failed");
            self.pass.listing = None;
        }
    }

    fn list_line(&mut self) {
        if self.pass.listing.is_none() {
            return;
        }
        let Some(line) = &self.line.line else {
            return;
        };
        let source = expand_tabs(&line.text, self.options.tab_size);
        let (addr, relative) = match (&self.line.addr, self.line.line_type) {
            (_, '-') | (None, _) => (None, false),
            (Some(addr), _) => (Some(addr.resolve() as u32), !addr.is_absolute()),
        };
        let text = self.cpu.format_listing(&ListingLine {
            addr,
            relative,
            bytes: &self.line.bytes,
            line_type: self.line.line_type,
            line_num: line.number,
            source: &source,
        });
        self.list_text(&text);
    }

    fn open_listing(&mut self, path: &Path) {
        let list_path = replace_extension(&path.to_string_lossy(), "lst");
        match File::create(&list_path) {
            Ok(file) => {
                tracing::info!(path = %list_path, "writing listing");
                let out: Box<dyn Write> = Box::new(BufWriter::new(file));
                self.pass.listing = Some(ListingWriter::new(out, self.options.lines_per_page));
            }
            Err(_) => self.error(AsmError::ListingCreate(list_path)),
        }
    }

    fn close_listing(&mut self) {
        if let Some(mut listing) = self.pass.listing.take() {
            if let Err(err) = listing.flush() {
                tracing::warn!(%err, "listing flush failed");
            }
        }
    }

    // ---- Passes ----

    /// Run one complete pass over `path`.
    fn run_pass(&mut self, pass: Pass, path: &Path) {
        self.start_pass(pass);
        if pass == Pass::Final && self.options.write_listing {
            self.open_listing(path);
        }
        let cpu = Arc::clone(&self.cpu);
        cpu.start_pass(self);
        match FileSource::open(path) {
            Ok(source) => self.pass.sources.push(Source::File(source)),
            Err(_) => self.error(AsmError::SourceNotFound(path.display().to_string())),
        }
        self.drain_sources();
        self.finish_pass();
        cpu.end_pass(self);
        tracing::info!(
            %pass,
            lines = self.pass.counts.lines,
            errors = self.pass.counts.errors,
            warnings = self.pass.counts.warnings,
            "pass complete"
        );
    }

    /// End-of-pass structural checks.
    pub fn finish_pass(&mut self) {
        if !self.pass.conditionals.is_empty() {
            if self.pass.pass == Pass::Final {
                self.error(AsmError::UnclosedIf);
            } else {
                self.warning(AsmError::UnclosedIf);
            }
            self.pass.conditionals.clear();
        }
        if let Some(capture) = self.pass.capture.take() {
            self.error(AsmError::UnclosedCapture(capture.opener().name()));
        }
    }

    /// Export globals, write the object module and close the listing.
    fn finish_run(&mut self, path: &Path) -> Result<(), AsmError> {
        self.line.line = None;
        let globals: Vec<String> = self.run.symbols.globals().map(str::to_string).collect();
        for name in globals {
            match self.run.symbols.lookup(&name) {
                Some(expr) => {
                    let expr = expr.clone();
                    self.module.add_global(&name, expr);
                }
                None => self.error(AsmError::UndefinedGlobal(name)),
            }
        }

        if self.pass.counts.errors == 0 && self.options.write_object {
            let object_path = replace_extension(&path.to_string_lossy(), "obj");
            self.write_object(Path::new(&object_path))
                .map_err(|err| AsmError::ObjectWrite(format!("{object_path}: {err}")))?;
        }

        if let Some(listing) = self.pass.listing.as_mut() {
            if let Err(err) = listing.write_symbols(&self.run.symbols) {
                tracing::warn!(%err, "listing write failed");
            }
        }
        self.close_listing();
        Ok(())
    }

    fn take_failure(&mut self, error: AsmError) -> AsmRunError {
        self.close_listing();
        AsmRunError::new(
            error,
            std::mem::take(&mut self.pass.diagnostics),
            self.pass.counts,
        )
    }

    fn write_object(&mut self, path: &Path) -> io::Result<()> {
        if let Some(name) = path.file_name() {
            self.module.set_name(&name.to_string_lossy());
        }
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "<?xml version='1.0'?>")?;
        self.module.write_xml(&mut out)?;
        out.flush()?;
        tracing::info!(path = %path.display(), "wrote object module");
        Ok(())
    }
}

impl ExprContext for AssemblerState {
    fn next_real_token(&mut self) -> Token {
        AssemblerState::next_real_token(self)
    }

    fn push_token(&mut self, token: Token) {
        AssemblerState::push_token(self, token);
    }

    fn origin(&mut self) -> Expr {
        match self.line.origin.clone() {
            Some(origin) => origin,
            None => {
                self.error(AsmError::NoSection);
                Expr::ZERO
            }
        }
    }

    fn lookup(&mut self, name: &str) -> Expr {
        let key = if is_local(name) {
            match local_key(self.pass.last_label.as_deref(), name) {
                Some(key) => key,
                None => {
                    self.error(AsmError::NoGlobalLabel);
                    return Expr::ZERO;
                }
            }
        } else {
            name.to_string()
        };
        match self.run.symbols.lookup(&key) {
            Some(expr) => expr.clone(),
            None => {
                if self.pass.pass == Pass::Final {
                    self.error(AsmError::UndefinedSymbol(name.to_string()));
                }
                Expr::ZERO
            }
        }
    }

    fn symbols_settled(&self) -> bool {
        self.pass.pass == Pass::Final
    }
}

/// Runs the supported passes over a source file.
pub struct Assembler {
    state: AssemblerState,
}

impl Assembler {
    #[must_use]
    pub fn new(cpu: Arc<dyn CpuModule>, options: AssemblerOptions) -> Self {
        Self {
            state: AssemblerState::new(cpu, options),
        }
    }

    pub fn state(&self) -> &AssemblerState {
        &self.state
    }

    pub fn module(&self) -> &Module {
        self.state.module()
    }

    pub fn symbols(&self) -> &SymbolTable {
        self.state.symbols()
    }

    /// Assemble `path`. Any pass that reports errors ends the run before the
    /// object module is written.
    pub fn assemble(&mut self, path: &Path) -> Result<AsmRunReport, AsmRunError> {
        let state = &mut self.state;
        let module_name = path
            .file_name()
            .map(|name| replace_extension(&name.to_string_lossy(), "obj"))
            .unwrap_or_default();
        state.reset_run(&module_name);

        let mut ran_final = false;
        for pass in Pass::ALL {
            if !state.cpu.is_supported_pass(pass) {
                tracing::debug!(%pass, cpu = state.cpu.name(), "pass skipped");
                continue;
            }
            state.run_pass(pass, path);
            ran_final = pass == Pass::Final;
            let errors = state.pass.counts.errors;
            if errors > 0 {
                return Err(state.take_failure(AsmError::Failed(errors)));
            }
        }

        if ran_final {
            if let Err(err) = state.finish_run(path) {
                return Err(state.take_failure(err));
            }
        }

        let counts = state.pass.counts;
        if counts.errors > 0 {
            return Err(state.take_failure(AsmError::Failed(counts.errors)));
        }
        Ok(AsmRunReport::new(
            std::mem::take(&mut state.pass.diagnostics),
            counts,
        ))
    }
}

#[cfg(test)]
mod tests;
