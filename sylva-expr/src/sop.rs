//! Sum-of-products size estimation.
//!
//! Expanding a factored form to two-level SOP can blow up exponentially,
//! so these queries never build the expansion. A bottom-up DP carries a
//! `(cube count, literal count)` pair per node and polarity:
//!
//! - AND combines operand SOPs as a product (cube counts multiply, each
//!   operand's literals are replicated once per cube of the others);
//! - OR combines them as a sum; complemented AND/OR swap the two by
//!   De Morgan;
//! - XOR sums the product expansions over all operand sign assignments
//!   with the right parity of positive operands, folded incrementally so
//!   the work stays linear in the operand count.
//!
//! The counts are upper bounds: the expansion is purely structural and no
//! cross-operand cancellation is considered.

use crate::manager::{Expr, ExprMgr, ExprView};
use crate::node::{ExprId, VarId};

/// Cube and literal counts of a (virtual) SOP expansion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SopCount {
    /// Number of product terms.
    np: u64,
    /// Number of literal occurrences over all product terms.
    nl: u64,
}

impl SopCount {
    /// The empty sum: constant 0.
    const NONE: SopCount = SopCount { np: 0, nl: 0 };
    /// The empty product: constant 1, a single literal-free cube.
    const EMPTY_CUBE: SopCount = SopCount { np: 1, nl: 0 };

    /// Disjunction: terms accumulate.
    fn sum(self, other: SopCount) -> SopCount {
        SopCount {
            np: self.np.saturating_add(other.np),
            nl: self.nl.saturating_add(other.nl),
        }
    }

    /// Conjunction: every term meets every term.
    fn product(self, other: SopCount) -> SopCount {
        SopCount {
            np: self.np.saturating_mul(other.np),
            nl: self
                .nl
                .saturating_mul(other.np)
                .saturating_add(other.nl.saturating_mul(self.np)),
        }
    }
}

/// Restricts which literal occurrences are counted.
#[derive(Clone, Copy)]
struct LitFilter {
    var: Option<VarId>,
    inv: Option<bool>,
}

impl LitFilter {
    const ALL: LitFilter = LitFilter {
        var: None,
        inv: None,
    };

    fn admits(&self, var: VarId, inv: bool) -> bool {
        match self.var {
            None => true,
            Some(v) => v == var && self.inv.map_or(true, |i| i == inv),
        }
    }
}

impl ExprMgr {
    /// Number of cubes in the SOP expansion of `e` (an upper bound).
    pub fn sop_cubenum(&self, e: &Expr) -> u64 {
        self.soplit(e.id(), false, LitFilter::ALL).np
    }

    /// Number of literals in the SOP expansion of `e` (an upper bound).
    pub fn sop_litnum(&self, e: &Expr) -> u64 {
        self.soplit(e.id(), false, LitFilter::ALL).nl
    }

    /// Occurrences of `var` (either polarity) in the SOP expansion.
    pub fn sop_litnum_var(&self, e: &Expr, var: VarId) -> u64 {
        let filter = LitFilter {
            var: Some(var),
            inv: None,
        };
        self.soplit(e.id(), false, filter).nl
    }

    /// Occurrences of `var` with polarity `inv` in the SOP expansion.
    pub fn sop_litnum_pol(&self, e: &Expr, var: VarId, inv: bool) -> u64 {
        let filter = LitFilter {
            var: Some(var),
            inv: Some(inv),
        };
        self.soplit(e.id(), false, filter).nl
    }

    fn soplit(&self, id: ExprId, inverted: bool, filter: LitFilter) -> SopCount {
        match self.view(id) {
            ExprView::Const0 => {
                if inverted {
                    SopCount::EMPTY_CUBE
                } else {
                    SopCount::NONE
                }
            }
            ExprView::Const1 => {
                if inverted {
                    SopCount::NONE
                } else {
                    SopCount::EMPTY_CUBE
                }
            }
            ExprView::PosLit(v) => self.soplit_literal(v, inverted, filter),
            ExprView::NegLit(v) => self.soplit_literal(v, !inverted, filter),
            ExprView::And(c) => {
                if inverted {
                    // De Morgan: a sum of complemented operands.
                    c.iter().fold(SopCount::NONE, |acc, &c| {
                        acc.sum(self.soplit(c, true, filter))
                    })
                } else {
                    c.iter().fold(SopCount::EMPTY_CUBE, |acc, &c| {
                        acc.product(self.soplit(c, false, filter))
                    })
                }
            }
            ExprView::Or(c) => {
                if inverted {
                    c.iter().fold(SopCount::EMPTY_CUBE, |acc, &c| {
                        acc.product(self.soplit(c, true, filter))
                    })
                } else {
                    c.iter().fold(SopCount::NONE, |acc, &c| {
                        acc.sum(self.soplit(c, false, filter))
                    })
                }
            }
            ExprView::Xor(c) => {
                // Fold operands into the pair of partial expansions with an
                // even / odd number of positive operands so far.
                let mut even = SopCount::EMPTY_CUBE;
                let mut odd = SopCount::NONE;
                for &c in c {
                    let pos = self.soplit(c, false, filter);
                    let neg = self.soplit(c, true, filter);
                    let next_even = even.product(neg).sum(odd.product(pos));
                    let next_odd = odd.product(neg).sum(even.product(pos));
                    even = next_even;
                    odd = next_odd;
                }
                // XOR is true when an odd number of operands is true.
                if inverted {
                    even
                } else {
                    odd
                }
            }
        }
    }

    fn soplit_literal(&self, var: VarId, inv: bool, filter: LitFilter) -> SopCount {
        SopCount {
            np: 1,
            nl: filter.admits(var, inv) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(n: u32) -> VarId {
        VarId::from_u32(n)
    }

    #[test]
    fn constants() {
        let mut m = ExprMgr::new();
        let z = m.zero();
        assert_eq!(m.sop_cubenum(&z), 0);
        assert_eq!(m.sop_litnum(&z), 0);
        let o = m.one();
        assert_eq!(m.sop_cubenum(&o), 1);
        assert_eq!(m.sop_litnum(&o), 0);
    }

    #[test]
    fn single_cube() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let nb = m.negaliteral(var(1));
        let c = m.posliteral(var(2));
        let ops = [m.dup(&a), m.dup(&nb), m.dup(&c)];
        let e = m.make_and(&ops).unwrap();
        assert_eq!(m.sop_cubenum(&e), 1);
        assert_eq!(m.sop_litnum(&e), 3);
        assert_eq!(m.sop_litnum_var(&e, var(1)), 1);
        assert_eq!(m.sop_litnum_pol(&e, var(1), true), 1);
        assert_eq!(m.sop_litnum_pol(&e, var(1), false), 0);
    }

    #[test]
    fn product_of_sums() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        let c = m.posliteral(var(2));
        let d = m.posliteral(var(3));
        let ab = m.or2(&a, &b);
        let cd = m.or2(&c, &d);
        // (a | b)(c | d): 4 cubes of 2 literals.
        let e = m.and2(&ab, &cd);
        assert_eq!(m.sop_cubenum(&e), 4);
        assert_eq!(m.sop_litnum(&e), 8);
        assert_eq!(m.sop_litnum_var(&e, var(0)), 2);
    }

    #[test]
    fn xor_expansion() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        // a ^ b = a !b | !a b.
        let e = m.xor2(&a, &b);
        assert_eq!(m.sop_cubenum(&e), 2);
        assert_eq!(m.sop_litnum(&e), 4);
        assert_eq!(m.sop_litnum_pol(&e, var(0), false), 1);
        assert_eq!(m.sop_litnum_pol(&e, var(0), true), 1);

        // Three-input parity expands to 4 cubes of 3 literals.
        let c = m.posliteral(var(2));
        let e3 = m.xor2(&e, &c);
        assert_eq!(m.sop_cubenum(&e3), 4);
        assert_eq!(m.sop_litnum(&e3), 12);
    }
}
