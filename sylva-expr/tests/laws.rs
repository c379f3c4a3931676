//! Randomized law checking for the expression engine.

use proptest::prelude::*;
use std::collections::HashMap;
use sylva_expr::{Expr, ExprMgr, VarId};

const NVARS: u32 = 4;

/// A manager-free description of an expression, so strategies can build
/// values before a manager exists.
#[derive(Debug, Clone)]
enum Recipe {
    Zero,
    One,
    Lit(u32, bool),
    And(Vec<Recipe>),
    Or(Vec<Recipe>),
    Xor(Vec<Recipe>),
}

fn build(m: &mut ExprMgr, recipe: &Recipe) -> Expr {
    match recipe {
        Recipe::Zero => m.zero(),
        Recipe::One => m.one(),
        Recipe::Lit(v, inv) => m.literal(VarId::from_u32(*v), *inv),
        Recipe::And(parts) | Recipe::Or(parts) | Recipe::Xor(parts) => {
            let operands: Vec<Expr> = parts.iter().map(|p| build(m, p)).collect();
            let e = match recipe {
                Recipe::And(_) => m.make_and(&operands),
                Recipe::Or(_) => m.make_or(&operands),
                _ => m.make_xor(&operands),
            }
            .expect("strategies generate at least one operand");
            for op in operands {
                m.release(op);
            }
            e
        }
    }
}

fn recipes() -> impl Strategy<Value = Recipe> {
    let leaf = prop_oneof![
        1 => Just(Recipe::Zero),
        1 => Just(Recipe::One),
        8 => (0..NVARS, any::<bool>()).prop_map(|(v, inv)| Recipe::Lit(v, inv)),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Recipe::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Recipe::Or),
            prop::collection::vec(inner, 1..4).prop_map(Recipe::Xor),
        ]
    })
}

/// Brute-force evaluation of a recipe on one assignment.
fn reference_eval(recipe: &Recipe, assignment: usize) -> bool {
    match recipe {
        Recipe::Zero => false,
        Recipe::One => true,
        Recipe::Lit(v, inv) => (assignment >> v & 1 != 0) != *inv,
        Recipe::And(parts) => parts.iter().all(|p| reference_eval(p, assignment)),
        Recipe::Or(parts) => parts.iter().any(|p| reference_eval(p, assignment)),
        Recipe::Xor(parts) => parts
            .iter()
            .fold(false, |acc, p| acc ^ reference_eval(p, assignment)),
    }
}

proptest! {
    /// Construction-time simplification preserves the function.
    #[test]
    fn simplification_is_sound(recipe in recipes()) {
        let mut m = ExprMgr::new();
        let e = build(&mut m, &recipe);
        let tv = m.make_tv(&e, NVARS as usize);
        for p in 0..1usize << NVARS {
            prop_assert_eq!(tv.value(p), reference_eval(&recipe, p));
        }
    }

    /// Truth tables agree with word-parallel evaluation.
    #[test]
    fn truth_table_matches_eval(recipe in recipes()) {
        let mut m = ExprMgr::new();
        let e = build(&mut m, &recipe);
        let tv = m.make_tv(&e, NVARS as usize);
        for p in 0..1usize << NVARS {
            let mut vals = [0u64; NVARS as usize];
            for (i, val) in vals.iter_mut().enumerate() {
                if p >> i & 1 != 0 {
                    *val = 1;
                }
            }
            prop_assert_eq!(m.eval(&e, &vals, 1) != 0, tv.value(p));
        }
    }

    /// Binary round-trip is the identity on canonical forms.
    #[test]
    fn encode_decode_roundtrip(recipe in recipes()) {
        let mut m = ExprMgr::new();
        let e = build(&mut m, &recipe);
        let bytes = m.encode(&e);
        let back = m.decode(&bytes).unwrap();
        prop_assert!(m.struct_eq(&back, &e));
    }

    /// Complement is an involution.
    #[test]
    fn complement_involution(recipe in recipes()) {
        let mut m = ExprMgr::new();
        let e = build(&mut m, &recipe);
        let ne = m.complement(&e);
        let nne = m.complement(&ne);
        prop_assert!(m.struct_eq(&nne, &e));
    }

    /// The constructors leave nothing for `simplify` to do.
    #[test]
    fn simplify_is_identity(recipe in recipes()) {
        let mut m = ExprMgr::new();
        let e = build(&mut m, &recipe);
        let s = m.simplify(&e);
        prop_assert_eq!(s.id(), e.id());
    }

    /// Substituting for an unmentioned variable changes nothing.
    #[test]
    fn compose_noop(recipe in recipes()) {
        let mut m = ExprMgr::new();
        let e = build(&mut m, &recipe);
        let sub = m.posliteral(VarId::from_u32(0));
        let composed = m.compose(&e, VarId::from_u32(NVARS + 3), &sub);
        prop_assert_eq!(composed.id(), e.id());
    }

    /// Remapping by a permutation and by its inverse round-trips.
    #[test]
    fn remap_inverse(recipe in recipes(), shift in 1..NVARS) {
        let mut m = ExprMgr::new();
        let e = build(&mut m, &recipe);

        let fwd: HashMap<VarId, VarId> = (0..NVARS)
            .map(|v| {
                (
                    VarId::from_u32(v),
                    VarId::from_u32((v + shift) % NVARS),
                )
            })
            .collect();
        let inv: HashMap<VarId, VarId> = fwd.iter().map(|(&k, &v)| (v, k)).collect();

        let mapped = m.remap_var(&e, &fwd);
        let back = m.remap_var(&mapped, &inv);
        prop_assert!(m.struct_eq(&back, &e));
    }

    /// Canonical-form invariant: no operator has an operand of its own
    /// kind, and AND/OR never keep a constant operand.
    #[test]
    fn canonical_form(recipe in recipes()) {
        let mut m = ExprMgr::new();
        let e = build(&mut m, &recipe);
        check_canonical(&m, e.id());
    }
}

fn check_canonical(m: &ExprMgr, id: sylva_expr::ExprId) {
    use sylva_expr::ExprView;
    match m.view(id) {
        ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => {
            let own = std::mem::discriminant(&m.view(id));
            assert!(c.len() >= 2, "operator with fewer than two operands");
            for &child in c {
                assert_ne!(
                    std::mem::discriminant(&m.view(child)),
                    own,
                    "unflattened operator nesting"
                );
                if !matches!(m.view(id), ExprView::Xor(_)) {
                    assert!(
                        !matches!(m.view(child), ExprView::Const0 | ExprView::Const1),
                        "constant operand survived"
                    );
                }
                check_canonical(m, child);
            }
        }
        _ => {}
    }
}
