// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source lines and the stack of line providers.
//!
//! Nested inclusion and expansion are linearized by a [`SourceStack`]: the
//! top entry supplies lines until it is exhausted, then it is popped and the
//! entry below resumes. Each entry owns its backing resource (an open file
//! or a buffer of captured lines) and releases it when popped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One logical source line and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub file: Rc<str>,
    pub number: u32,
    pub text: String,
}

impl Line {
    pub fn new(file: Rc<str>, number: u32, text: impl Into<String>) -> Self {
        Self {
            file,
            number,
            text: text.into(),
        }
    }

    /// Copy of this line with different text but the same location.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            file: Rc::clone(&self.file),
            number: self.number,
            text: text.into(),
        }
    }
}

/// Lines read from a file on disk.
pub struct FileSource {
    path: PathBuf,
    name: Rc<str>,
    reader: Box<dyn BufRead>,
    number: u32,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(path, Box::new(BufReader::new(file))))
    }

    pub fn from_reader(path: &Path, reader: Box<dyn BufRead>) -> Self {
        Self {
            path: path.to_path_buf(),
            name: Rc::from(path.to_string_lossy().as_ref()),
            reader,
            number: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_line(&mut self) -> io::Result<Option<Line>> {
        let mut text = String::new();
        if self.reader.read_line(&mut text)? == 0 {
            return Ok(None);
        }
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        self.number += 1;
        Ok(Some(Line::new(Rc::clone(&self.name), self.number, text)))
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("path", &self.path)
            .field("number", &self.number)
            .finish()
    }
}

/// Lines replayed once, front to back.
#[derive(Debug, Clone, Default)]
struct TextSource {
    lines: Vec<Line>,
    next: usize,
}

impl TextSource {
    fn new(lines: Vec<Line>) -> Self {
        Self { lines, next: 0 }
    }

    fn next_line(&mut self) -> Option<Line> {
        let line = self.lines.get(self.next).cloned();
        self.next += 1;
        line
    }
}

/// An argument-substituted macro body.
#[derive(Debug, Clone)]
pub struct MacroInstance {
    pub name: String,
    pub instance: u32,
    body: TextSource,
}

impl MacroInstance {
    pub fn new(name: &str, instance: u32, lines: Vec<Line>) -> Self {
        Self {
            name: name.to_string(),
            instance,
            body: TextSource::new(lines),
        }
    }
}

/// A captured block replayed `count` times.
#[derive(Debug, Clone)]
pub struct RepeatSource {
    lines: Rc<[Line]>,
    count: u32,
    iteration: u32,
    next: usize,
}

impl RepeatSource {
    pub fn new(lines: Vec<Line>, count: u32) -> Self {
        Self {
            lines: lines.into(),
            count,
            iteration: 0,
            next: 0,
        }
    }

    fn next_line(&mut self) -> Option<Line> {
        if self.lines.is_empty() {
            return None;
        }
        while self.iteration < self.count {
            if let Some(line) = self.lines.get(self.next) {
                self.next += 1;
                return Some(line.clone());
            }
            self.iteration += 1;
            self.next = 0;
        }
        None
    }
}

/// A line provider on the source stack.
#[derive(Debug)]
pub enum Source {
    File(FileSource),
    Macro(MacroInstance),
    Repeat(RepeatSource),
}

impl Source {
    /// Next line, or `None` once the provider is exhausted.
    pub fn next_line(&mut self) -> io::Result<Option<Line>> {
        Ok(match self {
            Source::File(file) => return file.next_line(),
            Source::Macro(instance) => instance.body.next_line(),
            Source::Repeat(repeat) => repeat.next_line(),
        })
    }

    /// True for providers that replay captured text rather than a file.
    pub fn is_expansion(&self) -> bool {
        !matches!(self, Source::File(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Source::File(file) => format!("file {}", file.path.display()),
            Source::Macro(instance) => format!("macro {} #{}", instance.name, instance.instance),
            Source::Repeat(repeat) => format!("repeat x{}", repeat.count),
        }
    }
}

#[derive(Debug, Default)]
pub struct SourceStack {
    sources: Vec<Source>,
}

impl SourceStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: Source) {
        tracing::debug!(source = %source.describe(), depth = self.sources.len() + 1, "push source");
        self.sources.push(source);
    }

    pub fn pop(&mut self) -> Option<Source> {
        self.sources.pop()
    }

    pub fn top(&self) -> Option<&Source> {
        self.sources.last()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    /// Path of the innermost file provider.
    pub fn current_file(&self) -> Option<&Path> {
        self.sources.iter().rev().find_map(|source| match source {
            Source::File(file) => Some(file.path()),
            _ => None,
        })
    }

    /// True when any macro expansion is on the stack.
    pub fn in_macro(&self) -> bool {
        self.sources
            .iter()
            .any(|source| matches!(source, Source::Macro(_)))
    }

    /// Invocation number of the innermost macro expansion.
    pub fn macro_instance(&self) -> Option<u32> {
        self.sources.iter().rev().find_map(|source| match source {
            Source::Macro(instance) => Some(instance.instance),
            _ => None,
        })
    }

    /// Pop entries down to and including the innermost macro expansion.
    ///
    /// Returns false, leaving the stack untouched, when no macro is active.
    pub fn exit_macro(&mut self) -> bool {
        if !self.in_macro() {
            return false;
        }
        while let Some(source) = self.sources.pop() {
            if matches!(source, Source::Macro(_)) {
                break;
            }
        }
        true
    }

    /// Next logical line, popping exhausted providers.
    ///
    /// A read error pops the failing provider before being returned.
    pub fn next_line(&mut self) -> io::Result<Option<(Line, bool)>> {
        while let Some(top) = self.sources.last_mut() {
            match top.next_line() {
                Ok(Some(line)) => return Ok(Some((line, top.is_expansion()))),
                Ok(None) => {
                    self.sources.pop();
                }
                Err(err) => {
                    self.sources.pop();
                    return Err(err);
                }
            }
        }
        Ok(None)
    }
}
