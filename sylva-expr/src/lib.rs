//! Factored-form logic expressions with construction-time simplification.
//!
//! An expression is a DAG over `{0, 1, v, !v, AND, OR, XOR}` owned by an
//! [`ExprMgr`]. Operators are n-ary (at least two children once built) and
//! the constructors normalize on the way in rather than on the way out:
//!
//! - nested AND under AND (and OR under OR, XOR under XOR) is flattened;
//! - constants are absorbed (`x & 1 = x`, `x & 0 = 0`, `x ^ 1 = !x`, ...);
//! - duplicate AND/OR operands are dropped, duplicate XOR operands cancel
//!   in pairs;
//! - an operand together with its complement collapses AND to 0, OR to 1,
//!   and flips XOR parity.
//!
//! Complement is eager as well: `!e` rewrites through De Morgan's laws so
//! the representation never carries an external negation. Consequently the
//! only normal forms for a constant or literal are the shared singleton
//! nodes the manager pins for its whole lifetime.
//!
//! [`Expr`] is the owning handle to a root node; it holds one reference
//! which must be returned with [`ExprMgr::release`] for the node storage
//! to be recycled. Handles are duplicated with [`ExprMgr::dup`].
//!
//! The crate also carries the analyses that ride along with the
//! representation: word-parallel evaluation, dense truth tables,
//! literal-count queries, sum-of-products size estimation, substitution
//! and variable remapping, and a compact binary serialization.

#![deny(missing_docs)]

mod binary;
mod eval;
mod manager;
mod node;
mod sop;

pub use self::binary::DecodeError;
pub use self::eval::TruthTable;
pub use self::manager::{DisplayExpr, Expr, ExprMgr, ExprView};
pub use self::node::{ExprId, VarId};

use thiserror::Error;

/// Errors from expression construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    /// `make_and`, `make_or` and `make_xor` need at least one operand.
    #[error("operator requires at least one operand")]
    NoOperands,
}
