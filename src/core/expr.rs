// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Relocatable expression trees.
//!
//! An [`Expr`] is either absolute (known at assembly time) or relative to a
//! section or external symbol whose final address is only known to the
//! linker. Expressions are immutable; the combinators below build new trees
//! and fold absolute operands eagerly, so a fully absolute expression is
//! always a single [`Expr::Value`].

use std::fmt;

/// Index of a section inside a [`crate::core::module::Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Complement,
    LogicalNot,
    Lo,
    Hi,
    Bank,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Complement => "~",
            UnaryOp::LogicalNot => "!",
            UnaryOp::Lo => "LO",
            UnaryOp::Hi => "HI",
            UnaryOp::Bank => "BANK",
        }
    }

    fn apply(self, value: i64) -> i64 {
        match self {
            UnaryOp::Neg => value.wrapping_neg(),
            UnaryOp::Plus => value,
            UnaryOp::Complement => !value,
            UnaryOp::LogicalNot => i64::from(value == 0),
            UnaryOp::Lo => value & 0xFF,
            UnaryOp::Hi => (value >> 8) & 0xFF,
            UnaryOp::Bank => value >> 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    LogicalAnd,
    LogicalOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    /// Apply the operator to two integers. Division by zero yields `None`.
    pub fn apply(self, l: i64, r: i64) -> Option<i64> {
        let truth = |b: bool| i64::from(b);
        Some(match self {
            BinaryOp::Add => l.wrapping_add(r),
            BinaryOp::Sub => l.wrapping_sub(r),
            BinaryOp::Mul => l.wrapping_mul(r),
            BinaryOp::Div => l.checked_div(r)?,
            BinaryOp::Mod => l.checked_rem(r)?,
            BinaryOp::Shl => l.wrapping_shl(r as u32),
            BinaryOp::Shr => l.wrapping_shr(r as u32),
            BinaryOp::And => l & r,
            BinaryOp::Or => l | r,
            BinaryOp::Xor => l ^ r,
            BinaryOp::LogicalAnd => truth(l != 0 && r != 0),
            BinaryOp::LogicalOr => truth(l != 0 || r != 0),
            BinaryOp::Eq => truth(l == r),
            BinaryOp::Ne => truth(l != r),
            BinaryOp::Lt => truth(l < r),
            BinaryOp::Le => truth(l <= r),
            BinaryOp::Gt => truth(l > r),
            BinaryOp::Ge => truth(l >= r),
        })
    }
}

/// An immutable expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Absolute constant.
    Value(i64),
    /// Reference to a symbol imported from another module.
    Extern(String),
    /// Offset from the start of a relocatable section.
    Relative { section: SectionId, offset: i64 },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub const ZERO: Expr = Expr::Value(0);

    /// True when the value is fully known at assembly time.
    pub fn is_absolute(&self) -> bool {
        match self {
            Expr::Value(_) => true,
            Expr::Extern(_) | Expr::Relative { .. } => false,
            Expr::Unary { operand, .. } => operand.is_absolute(),
            Expr::Binary { left, right, .. } => left.is_absolute() && right.is_absolute(),
        }
    }

    /// True when the value depends on a load address known only to the linker.
    pub fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    /// Integer value of the expression within the current pass.
    ///
    /// Section-relative terms contribute their offset and externs contribute
    /// zero; callers that need a link-time value must check [`Expr::is_absolute`].
    pub fn resolve(&self) -> i64 {
        match self {
            Expr::Value(value) => *value,
            Expr::Extern(_) => 0,
            Expr::Relative { offset, .. } => *offset,
            Expr::Unary { op, operand } => op.apply(operand.resolve()),
            Expr::Binary { op, left, right } => {
                op.apply(left.resolve(), right.resolve()).unwrap_or(0)
            }
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        match operand {
            Expr::Value(value) => Expr::Value(op.apply(value)),
            operand if op == UnaryOp::Plus => operand,
            operand => Expr::Unary {
                op,
                operand: Box::new(operand),
            },
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        match (op, &left, &right) {
            (_, Expr::Value(l), Expr::Value(r)) => {
                if let Some(value) = op.apply(*l, *r) {
                    return Expr::Value(value);
                }
            }
            (BinaryOp::Add, Expr::Relative { section, offset }, Expr::Value(v))
            | (BinaryOp::Add, Expr::Value(v), Expr::Relative { section, offset }) => {
                return Expr::Relative {
                    section: *section,
                    offset: offset.wrapping_add(*v),
                };
            }
            (BinaryOp::Sub, Expr::Relative { section, offset }, Expr::Value(v)) => {
                return Expr::Relative {
                    section: *section,
                    offset: offset.wrapping_sub(*v),
                };
            }
            (
                BinaryOp::Sub,
                Expr::Relative {
                    section: ls,
                    offset: lo,
                },
                Expr::Relative {
                    section: rs,
                    offset: ro,
                },
            ) if ls == rs => return Expr::Value(lo.wrapping_sub(*ro)),
            _ => {}
        }
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn add(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, other)
    }

    pub fn sub(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, other)
    }

    pub fn shr(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Shr, self, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::And, self, other)
    }

    pub fn lo(self) -> Expr {
        Expr::unary(UnaryOp::Lo, self)
    }

    pub fn hi(self) -> Expr {
        Expr::unary(UnaryOp::Hi, self)
    }

    pub fn bank(self) -> Expr {
        Expr::unary(UnaryOp::Bank, self)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Value(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Value(value) => write!(f, "{value}"),
            Expr::Extern(name) => f.write_str(name),
            Expr::Relative { section, offset } => write!(f, "[{}]+{offset}", section.0),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Lo | UnaryOp::Hi | UnaryOp::Bank => {
                    write!(f, "{}({operand})", op.as_str())
                }
                _ => write!(f, "{}{operand}", op.as_str()),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rel(section: usize, offset: i64) -> Expr {
        Expr::Relative {
            section: SectionId(section),
            offset,
        }
    }

    #[test]
    fn absolute_operands_fold() {
        let e = Expr::Value(2).add(Expr::Value(3));
        assert_eq!(e, Expr::Value(5));
        assert!(e.is_absolute());
    }

    #[test]
    fn relative_plus_constant_stays_relative() {
        let e = rel(0, 0x10).add(Expr::Value(4));
        assert_eq!(e, rel(0, 0x14));
        assert!(e.is_relative());
        assert_eq!(e.resolve(), 0x14);
    }

    #[test]
    fn same_section_difference_is_absolute() {
        let e = rel(1, 0x30).sub(rel(1, 0x10));
        assert_eq!(e, Expr::Value(0x20));
        let e = rel(1, 0x30).sub(rel(2, 0x10));
        assert!(e.is_relative());
    }

    #[test]
    fn externs_are_relative() {
        let e = Expr::Extern("PUTC".to_string()).add(Expr::Value(1));
        assert!(e.is_relative());
        assert_eq!(e.resolve(), 1);
    }

    #[test]
    fn byte_extractors() {
        let value = Expr::Value(0x12_3456);
        assert_eq!(value.clone().lo(), Expr::Value(0x56));
        assert_eq!(value.clone().hi(), Expr::Value(0x34));
        assert_eq!(value.bank(), Expr::Value(0x12));
        assert!(rel(0, 0x1234).hi().is_relative());
    }

    #[test]
    fn division_by_zero_does_not_fold() {
        let e = Expr::binary(BinaryOp::Div, Expr::Value(1), Expr::Value(0));
        assert!(matches!(e, Expr::Binary { .. }));
        assert_eq!(e.resolve(), 0);
    }

    #[test]
    fn comparisons_yield_truth_values() {
        assert_eq!(BinaryOp::Lt.apply(1, 2), Some(1));
        assert_eq!(BinaryOp::Eq.apply(1, 2), Some(0));
        assert_eq!(UnaryOp::LogicalNot.apply(0), 1);
    }

    proptest! {
        #[test]
        fn folded_value_matches_tree_resolution(a in -10_000i64..10_000, b in -10_000i64..10_000) {
            let folded = Expr::Value(a).add(Expr::Value(b)).sub(Expr::Value(3));
            let tree = Expr::Binary {
                op: BinaryOp::Sub,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(Expr::Value(a)),
                    right: Box::new(Expr::Value(b)),
                }),
                right: Box::new(Expr::Value(3)),
            };
            prop_assert_eq!(folded.resolve(), tree.resolve());
            prop_assert!(folded.is_absolute());
        }
    }
}
