// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Conditional assembly state.

use super::error::AsmError;

/// Stack of branch states; the top decides whether lines are assembled.
#[derive(Debug, Default, Clone)]
pub struct ConditionalStack {
    stack: Vec<bool>,
}

impl ConditionalStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the current line should be assembled.
    pub fn is_active(&self) -> bool {
        self.stack.last().copied().unwrap_or(true)
    }

    /// Open a block. An inactive context always opens an inactive block so
    /// that nesting stays balanced.
    pub fn push_if(&mut self, predicate: bool) {
        let state = self.is_active() && predicate;
        self.stack.push(state);
    }

    /// Switch to the alternative branch of the innermost block.
    pub fn else_branch(&mut self) -> Result<(), AsmError> {
        let state = self.stack.pop().ok_or(AsmError::NoOpenIf)?;
        let enclosing = self.is_active();
        self.stack.push(enclosing && !state);
        Ok(())
    }

    pub fn end_if(&mut self) -> Result<(), AsmError> {
        self.stack.pop().map(|_| ()).ok_or(AsmError::NoOpenIf)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_is_active() {
        let stack = ConditionalStack::new();
        assert!(stack.is_active());
        assert!(stack.is_empty());
    }

    #[test]
    fn else_inverts_branch() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        assert!(!stack.is_active());
        stack.else_branch().unwrap();
        assert!(stack.is_active());
        stack.end_if().unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn nested_blocks_inside_false_branch_stay_inactive() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        stack.push_if(true);
        assert!(!stack.is_active());
        stack.else_branch().unwrap();
        assert!(!stack.is_active());
        stack.end_if().unwrap();
        stack.else_branch().unwrap();
        assert!(stack.is_active());
    }

    #[test]
    fn unbalanced_directives_error() {
        let mut stack = ConditionalStack::new();
        assert_eq!(stack.else_branch(), Err(AsmError::NoOpenIf));
        assert_eq!(stack.end_if(), Err(AsmError::NoOpenIf));
    }
}
