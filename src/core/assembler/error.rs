// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;

use crate::core::cpu::Pass;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Assembler,
    Cli,
    Conditional,
    Directive,
    Expression,
    Io,
    Macro,
    Symbol,
}

/// Every diagnostic the engine can raise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    #[error("Unknown opcode or directive")]
    UnknownOpcode,
    #[error("No active section")]
    NoSection,
    #[error("Constant expression required")]
    ConstantRequired,
    #[error(".ELSE or .ENDIF with no matching .IF")]
    NoOpenIf,
    #[error("Unterminated .IF block")]
    UnclosedIf,
    #[error("Closing parenthesis missing in expression")]
    MissingParen,
    #[error("Invalid expression")]
    InvalidExpression,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("A local label must be preceded by normal label")]
    NoGlobalLabel,
    #[error("Undefined symbol: {0}")]
    UndefinedSymbol(String),
    #[error("Label has already been defined: {0}")]
    LabelRedefined(String),
    #[error("Symbol has already been defined with .SET")]
    DefinedWithSet,
    #[error("Symbol has already been defined: {0}")]
    PermanentSymbol(String),
    #[error("Equate symbols may not start with a '.'")]
    LocalEquate,
    #[error("Variable symbols may not start with a '.'")]
    LocalVariable,
    #[error("This statement requires a label")]
    MissingLabel,
    #[error("This statement cannot be labelled")]
    LabelIgnored,
    #[error("Expected a list of symbols")]
    ExpectedSymbolList,
    #[error("Undefined global symbol: {0}")]
    UndefinedGlobal(String),
    #[error("Illegal macro argument")]
    IllegalMacroArgument,
    #[error("Unexpected token after macro argument")]
    UnexpectedAfterArgument,
    #[error("Macro has already been defined: {0}")]
    MacroRedefined(String),
    #[error(".EXITM used outside of a macro expansion")]
    NoActiveMacro,
    #[error("{0} with no matching {1}")]
    UnmatchedClose(&'static str, &'static str),
    #[error("Unterminated {0} block")]
    UnclosedCapture(&'static str),
    #[error("Expected quoted filename")]
    ExpectedFilename,
    #[error("Expected a quoted string")]
    ExpectedString,
    #[error("Failed to find specified file: {0}")]
    FileNotFound(String),
    #[error("I/O error while inserting binary data")]
    InsertIo,
    #[error("I/O error while reading source: {0}")]
    SourceRead(String),
    #[error("Source file not found: {0}")]
    SourceNotFound(String),
    #[error("Could not create listing file: {0}")]
    ListingCreate(String),
    #[error("Could not write object module: {0}")]
    ObjectWrite(String),
    #[error("Assembly failed with {0} error(s)")]
    Failed(u32),
    #[error("{0}")]
    Cli(String),
}

impl AsmError {
    pub fn kind(&self) -> AsmErrorKind {
        match self {
            AsmError::UnknownOpcode
            | AsmError::NoSection
            | AsmError::LabelIgnored
            | AsmError::Failed(_) => AsmErrorKind::Assembler,
            AsmError::NoOpenIf | AsmError::UnclosedIf => AsmErrorKind::Conditional,
            AsmError::ConstantRequired
            | AsmError::MissingParen
            | AsmError::InvalidExpression
            | AsmError::DivisionByZero => AsmErrorKind::Expression,
            AsmError::NoGlobalLabel
            | AsmError::UndefinedSymbol(_)
            | AsmError::LabelRedefined(_)
            | AsmError::DefinedWithSet
            | AsmError::PermanentSymbol(_)
            | AsmError::LocalEquate
            | AsmError::LocalVariable
            | AsmError::UndefinedGlobal(_) => AsmErrorKind::Symbol,
            AsmError::IllegalMacroArgument
            | AsmError::UnexpectedAfterArgument
            | AsmError::MacroRedefined(_)
            | AsmError::NoActiveMacro
            | AsmError::UnmatchedClose(..)
            | AsmError::UnclosedCapture(_) => AsmErrorKind::Macro,
            AsmError::MissingLabel
            | AsmError::ExpectedSymbolList
            | AsmError::ExpectedFilename
            | AsmError::ExpectedString => AsmErrorKind::Directive,
            AsmError::FileNotFound(_)
            | AsmError::InsertIo
            | AsmError::SourceRead(_)
            | AsmError::SourceNotFound(_)
            | AsmError::ListingCreate(_)
            | AsmError::ObjectWrite(_) => AsmErrorKind::Io,
            AsmError::Cli(_) => AsmErrorKind::Cli,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) file: Option<String>,
    pub(crate) line: u32,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) pass: Option<Pass>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            file: None,
            line,
            severity,
            error,
            pass: None,
        }
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_pass(mut self, pass: Pass) -> Self {
        self.pass = Some(pass);
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn pass(&self) -> Option<Pass> {
        self.pass
    }

    pub fn format(&self) -> String {
        let sev = match self.severity {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        match &self.file {
            Some(file) => format!("{sev}: {file} ({}) {}", self.line, self.error),
            None => format!("{sev}: {}", self.error),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Report from a successful assembly run.
#[derive(Debug)]
pub struct AsmRunReport {
    diagnostics: Vec<Diagnostic>,
    counts: PassCounts,
}

impl AsmRunReport {
    pub fn new(diagnostics: Vec<Diagnostic>, counts: PassCounts) -> Self {
        Self {
            diagnostics,
            counts,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn counts(&self) -> PassCounts {
        self.counts
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Error from a failed assembly run.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
    counts: PassCounts,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>, counts: PassCounts) -> Self {
        Self {
            error,
            diagnostics,
            counts,
        }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn counts(&self) -> PassCounts {
        self.counts
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

/// Pass statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassCounts {
    pub lines: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl PassCounts {
    pub fn new() -> Self {
        Self::default()
    }
}
