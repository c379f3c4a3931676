//! The expression manager: arena, reference counts, and constructors.

use crate::node::{Children, ExprId, NodeData, Slot, VarId, REF_STUCK};
use crate::BuildError;
use core::fmt;
use core::mem;
use smallvec::{smallvec, SmallVec};
use std::collections::HashMap;
use sylva_entity::{EntityRef, PrimaryMap};

/// Free slots are binned by the arity of the node they held; the last bin
/// collects everything wider.
const FREE_BUCKETS: usize = 9;

/// An owning handle to an expression.
///
/// The handle holds one reference to its root node. It is deliberately not
/// `Clone`: duplicate with [`ExprMgr::dup`] and return the reference with
/// [`ExprMgr::release`]. A handle that is simply dropped keeps its nodes
/// alive until the manager itself is cleared or dropped.
///
/// Equality on handles is identity of the root node, not structural
/// equivalence; for the latter see [`ExprMgr::struct_eq`].
#[derive(Debug, PartialEq, Eq)]
pub struct Expr {
    root: ExprId,
}

impl Expr {
    /// The root node id, for read-only walks through [`ExprMgr::view`].
    pub fn id(&self) -> ExprId {
        self.root
    }
}

/// A read-only view of one expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprView<'a> {
    /// Constant false.
    Const0,
    /// Constant true.
    Const1,
    /// A positive literal.
    PosLit(VarId),
    /// A negative literal.
    NegLit(VarId),
    /// An AND over the listed operands.
    And(&'a [ExprId]),
    /// An OR over the listed operands.
    Or(&'a [ExprId]),
    /// An XOR over the listed operands.
    Xor(&'a [ExprId]),
}

/// Owner of all expression nodes.
///
/// Distinct managers share nothing; an [`Expr`] is only meaningful to the
/// manager that created it. The two constants and the literal pair of
/// every variable seen so far are singletons pinned for the manager's
/// lifetime; every other node is reference counted and its slot recycled
/// when the last reference goes away.
pub struct ExprMgr {
    nodes: PrimaryMap<ExprId, Slot>,
    /// Recycled slots, binned by the arity they last held.
    free: [Vec<ExprId>; FREE_BUCKETS],
    /// Literal singletons, indexed by `2 * var + polarity`.
    literals: Vec<ExprId>,
    const0: ExprId,
    const1: ExprId,
    node_count: usize,
    max_node_count: usize,
    stuck_count: usize,
}

impl ExprMgr {
    /// Create a manager holding just the two constants.
    pub fn new() -> Self {
        let mut mgr = Self {
            nodes: PrimaryMap::new(),
            free: Default::default(),
            literals: Vec::new(),
            const0: ExprId::from_u32(0),
            const1: ExprId::from_u32(1),
            node_count: 0,
            max_node_count: 0,
            stuck_count: 0,
        };
        mgr.const0 = mgr.alloc_stuck(NodeData::Const0);
        mgr.const1 = mgr.alloc_stuck(NodeData::Const1);
        mgr
    }

    /// Drop every node, including the pinned singletons, and start over.
    /// All outstanding handles are invalidated; using one afterwards is a
    /// contract violation caught by debug assertions.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free = Default::default();
        self.literals.clear();
        self.node_count = 0;
        self.max_node_count = 0;
        self.stuck_count = 0;
        self.const0 = self.alloc_stuck(NodeData::Const0);
        self.const1 = self.alloc_stuck(NodeData::Const1);
    }

    //
    // Handles and reference counts.
    //

    /// Duplicate a handle, acquiring another reference to its root.
    pub fn dup(&mut self, e: &Expr) -> Expr {
        self.make_expr(e.root)
    }

    /// Return a handle's reference. When the last reference to a node goes
    /// away its slot is recycled, recursively through its operands.
    pub fn release(&mut self, e: Expr) {
        self.drop_refs(smallvec![e.root]);
    }

    fn make_expr(&mut self, id: ExprId) -> Expr {
        self.inc_ref(id);
        Expr { root: id }
    }

    fn inc_ref(&mut self, id: ExprId) {
        let slot = &mut self.nodes[id];
        debug_assert!(!slot.data.is_free(), "expression used after release");
        if slot.refs < REF_STUCK {
            slot.refs += 1;
        }
    }

    fn drop_refs(&mut self, mut stack: SmallVec<[ExprId; 8]>) {
        while let Some(id) = stack.pop() {
            let slot = &mut self.nodes[id];
            debug_assert!(!slot.data.is_free(), "expression used after release");
            if slot.refs >= REF_STUCK {
                // Pinned singleton, or a counter that saturated and is now
                // stuck for the lifetime of the manager.
                continue;
            }
            debug_assert!(slot.refs > 0);
            slot.refs -= 1;
            if slot.refs == 0 {
                self.reclaim(id, &mut stack);
            }
        }
    }

    /// Recycle a node whose reference count reached zero. Its operands are
    /// pushed on `stack` for the caller to keep unwinding.
    fn reclaim(&mut self, id: ExprId, stack: &mut SmallVec<[ExprId; 8]>) {
        let slot = &mut self.nodes[id];
        let data = mem::replace(&mut slot.data, NodeData::Free(Children::new()));
        let mut children = match data {
            NodeData::And(c) | NodeData::Or(c) | NodeData::Xor(c) => c,
            _ => unreachable!("constants and literals are pinned"),
        };
        let bucket = children.len().min(FREE_BUCKETS - 1);
        stack.extend_from_slice(&children);
        children.clear();
        self.nodes[id].data = NodeData::Free(children);
        self.free[bucket].push(id);
        self.node_count -= 1;
    }

    /// Free a node that was built but never referenced. Construction
    /// helpers create candidate operands that canonicalization may then
    /// discard; this is where those go.
    fn release_orphan(&mut self, id: ExprId) {
        let slot = &self.nodes[id];
        if !slot.data.is_free() && slot.refs == 0 {
            let mut stack = SmallVec::new();
            self.reclaim(id, &mut stack);
            self.drop_refs(stack);
        }
    }

    fn sweep(&mut self, ids: &[ExprId]) {
        for &id in ids {
            self.release_orphan(id);
        }
    }

    fn alloc(&mut self, data: NodeData) -> ExprId {
        if let NodeData::And(c) | NodeData::Or(c) | NodeData::Xor(c) = &data {
            debug_assert!(c.len() >= 2);
            let operands: SmallVec<[ExprId; 8]> = SmallVec::from_slice(c);
            for id in operands {
                self.inc_ref(id);
            }
        }
        let arity = match &data {
            NodeData::And(c) | NodeData::Or(c) | NodeData::Xor(c) => c.len(),
            _ => 0,
        };
        self.node_count += 1;
        if self.node_count > self.max_node_count {
            self.max_node_count = self.node_count;
        }
        let bucket = arity.min(FREE_BUCKETS - 1);
        if let Some(id) = self.free[bucket].pop() {
            self.nodes[id] = Slot { data, refs: 0 };
            id
        } else {
            self.nodes.push(Slot { data, refs: 0 })
        }
    }

    fn alloc_stuck(&mut self, data: NodeData) -> ExprId {
        self.node_count += 1;
        if self.node_count > self.max_node_count {
            self.max_node_count = self.node_count;
        }
        self.stuck_count += 1;
        self.nodes.push(Slot {
            data,
            refs: REF_STUCK,
        })
    }

    //
    // Leaf constructors.
    //

    /// The constant-false expression.
    pub fn zero(&mut self) -> Expr {
        let id = self.const0;
        self.make_expr(id)
    }

    /// The constant-true expression.
    pub fn one(&mut self) -> Expr {
        let id = self.const1;
        self.make_expr(id)
    }

    /// The positive literal of `var`, creating the pair on first use.
    pub fn posliteral(&mut self, var: VarId) -> Expr {
        let id = self.literal_id(var, false);
        self.make_expr(id)
    }

    /// The negative literal of `var`, creating the pair on first use.
    pub fn negaliteral(&mut self, var: VarId) -> Expr {
        let id = self.literal_id(var, true);
        self.make_expr(id)
    }

    /// A literal with an explicit polarity.
    pub fn literal(&mut self, var: VarId, inv: bool) -> Expr {
        let id = self.literal_id(var, inv);
        self.make_expr(id)
    }

    fn literal_id(&mut self, var: VarId, inv: bool) -> ExprId {
        let mut next = self.literals.len() / 2;
        while next <= var.index() {
            let v = VarId::from_u32(next as u32);
            let pos = self.alloc_stuck(NodeData::PosLit(v));
            self.literals.push(pos);
            let neg = self.alloc_stuck(NodeData::NegLit(v));
            self.literals.push(neg);
            next += 1;
        }
        self.literals[var.index() * 2 + inv as usize]
    }

    //
    // Operator constructors.
    //

    /// AND of the given operands. Requires at least one operand.
    pub fn make_and(&mut self, operands: &[Expr]) -> Result<Expr, BuildError> {
        if operands.is_empty() {
            return Err(BuildError::NoOperands);
        }
        let ids: SmallVec<[ExprId; 8]> = operands.iter().map(|e| e.root).collect();
        let id = self.mk_and(&ids);
        Ok(self.make_expr(id))
    }

    /// OR of the given operands. Requires at least one operand.
    pub fn make_or(&mut self, operands: &[Expr]) -> Result<Expr, BuildError> {
        if operands.is_empty() {
            return Err(BuildError::NoOperands);
        }
        let ids: SmallVec<[ExprId; 8]> = operands.iter().map(|e| e.root).collect();
        let id = self.mk_or(&ids);
        Ok(self.make_expr(id))
    }

    /// XOR of the given operands. Requires at least one operand.
    pub fn make_xor(&mut self, operands: &[Expr]) -> Result<Expr, BuildError> {
        if operands.is_empty() {
            return Err(BuildError::NoOperands);
        }
        let ids: SmallVec<[ExprId; 8]> = operands.iter().map(|e| e.root).collect();
        let id = self.mk_xor(&ids);
        Ok(self.make_expr(id))
    }

    /// Binary AND convenience.
    pub fn and2(&mut self, a: &Expr, b: &Expr) -> Expr {
        let id = self.mk_and(&[a.root, b.root]);
        self.make_expr(id)
    }

    /// Binary OR convenience.
    pub fn or2(&mut self, a: &Expr, b: &Expr) -> Expr {
        let id = self.mk_or(&[a.root, b.root]);
        self.make_expr(id)
    }

    /// Binary XOR convenience.
    pub fn xor2(&mut self, a: &Expr, b: &Expr) -> Expr {
        let id = self.mk_xor(&[a.root, b.root]);
        self.make_expr(id)
    }

    /// The complement of `e`, rewritten through De Morgan's laws so no
    /// external negation remains.
    pub fn complement(&mut self, e: &Expr) -> Expr {
        let id = self.mk_complement(e.root);
        self.make_expr(id)
    }

    /// Outcome of checking one AND/OR operand against those collected so
    /// far.
    fn absorb(&self, list: &mut Children, id: ExprId) -> bool {
        for &seen in list.iter() {
            if self.posi_equiv_id(id, seen) {
                // Idempotent duplicate, drop it.
                return false;
            }
            if self.nega_equiv_id(id, seen) {
                // An operand and its complement: the caller short-circuits
                // to the dominating constant.
                return true;
            }
        }
        list.push(id);
        false
    }

    /// XOR flavor of `absorb`: duplicates cancel in pairs, a complement
    /// pair cancels and flips the parity (returns `true`).
    fn absorb_xor(&self, list: &mut Children, id: ExprId) -> bool {
        for (pos, &seen) in list.iter().enumerate() {
            if self.posi_equiv_id(id, seen) {
                list.remove(pos);
                return false;
            }
            if self.nega_equiv_id(id, seen) {
                list.remove(pos);
                return true;
            }
        }
        list.push(id);
        false
    }

    fn mk_and(&mut self, operands: &[ExprId]) -> ExprId {
        let mut list = Children::new();
        let mut const0 = false;
        'operands: for &op in operands {
            match &self.nodes[op].data {
                NodeData::Const0 => {
                    const0 = true;
                    break;
                }
                NodeData::Const1 => {}
                NodeData::And(grand) => {
                    let grand: SmallVec<[ExprId; 8]> = SmallVec::from_slice(grand);
                    for g in grand {
                        if self.absorb(&mut list, g) {
                            const0 = true;
                            break 'operands;
                        }
                    }
                }
                _ => {
                    if self.absorb(&mut list, op) {
                        const0 = true;
                        break;
                    }
                }
            }
        }
        if const0 {
            return self.const0;
        }
        match list.len() {
            0 => self.const1,
            1 => list[0],
            _ => self.alloc(NodeData::And(list)),
        }
    }

    fn mk_or(&mut self, operands: &[ExprId]) -> ExprId {
        let mut list = Children::new();
        let mut const1 = false;
        'operands: for &op in operands {
            match &self.nodes[op].data {
                NodeData::Const1 => {
                    const1 = true;
                    break;
                }
                NodeData::Const0 => {}
                NodeData::Or(grand) => {
                    let grand: SmallVec<[ExprId; 8]> = SmallVec::from_slice(grand);
                    for g in grand {
                        if self.absorb(&mut list, g) {
                            const1 = true;
                            break 'operands;
                        }
                    }
                }
                _ => {
                    if self.absorb(&mut list, op) {
                        const1 = true;
                        break;
                    }
                }
            }
        }
        if const1 {
            return self.const1;
        }
        match list.len() {
            0 => self.const0,
            1 => list[0],
            _ => self.alloc(NodeData::Or(list)),
        }
    }

    fn mk_xor(&mut self, operands: &[ExprId]) -> ExprId {
        let mut list = Children::new();
        let mut parity = false;
        for &op in operands {
            match &self.nodes[op].data {
                NodeData::Const1 => parity = !parity,
                NodeData::Const0 => {}
                NodeData::Xor(grand) => {
                    let grand: SmallVec<[ExprId; 8]> = SmallVec::from_slice(grand);
                    for g in grand {
                        if self.absorb_xor(&mut list, g) {
                            parity = !parity;
                        }
                    }
                }
                _ => {
                    if self.absorb_xor(&mut list, op) {
                        parity = !parity;
                    }
                }
            }
        }
        let result = match list.len() {
            0 => self.const0,
            1 => list[0],
            _ => self.alloc(NodeData::Xor(list)),
        };
        if parity {
            let complemented = self.mk_complement(result);
            self.release_orphan(result);
            complemented
        } else {
            result
        }
    }

    fn mk_complement(&mut self, id: ExprId) -> ExprId {
        match &self.nodes[id].data {
            NodeData::Const0 => self.const1,
            NodeData::Const1 => self.const0,
            NodeData::PosLit(v) => {
                let v = *v;
                self.literal_id(v, true)
            }
            NodeData::NegLit(v) => {
                let v = *v;
                self.literal_id(v, false)
            }
            NodeData::And(children) => {
                let children: SmallVec<[ExprId; 8]> = SmallVec::from_slice(children);
                let comps: SmallVec<[ExprId; 8]> =
                    children.iter().map(|&c| self.mk_complement(c)).collect();
                let result = self.mk_or(&comps);
                self.sweep(&comps);
                result
            }
            NodeData::Or(children) => {
                let children: SmallVec<[ExprId; 8]> = SmallVec::from_slice(children);
                let comps: SmallVec<[ExprId; 8]> =
                    children.iter().map(|&c| self.mk_complement(c)).collect();
                let result = self.mk_and(&comps);
                self.sweep(&comps);
                result
            }
            NodeData::Xor(children) => {
                let mut operands: SmallVec<[ExprId; 8]> = SmallVec::from_slice(children);
                let first = self.mk_complement(operands[0]);
                operands[0] = first;
                let result = self.mk_xor(&operands);
                self.release_orphan(first);
                result
            }
            NodeData::Free(_) => unreachable!("expression used after release"),
        }
    }

    //
    // Substitution, remapping, renormalization.
    //

    /// Substitute `sub` for the positive literal of `var` and `!sub` for
    /// the negative one. The substitution is structural and single-level:
    /// literals inside `sub` are not themselves substituted. If `e` does
    /// not mention `var` the returned expression shares `e`'s root.
    pub fn compose(&mut self, e: &Expr, var: VarId, sub: &Expr) -> Expr {
        let id = self.compose_id(e.root, var, sub.root);
        self.make_expr(id)
    }

    fn compose_id(&mut self, id: ExprId, var: VarId, sub: ExprId) -> ExprId {
        match &self.nodes[id].data {
            NodeData::Const0 | NodeData::Const1 => id,
            NodeData::PosLit(v) => {
                if *v == var {
                    sub
                } else {
                    id
                }
            }
            NodeData::NegLit(v) => {
                if *v == var {
                    self.mk_complement(sub)
                } else {
                    id
                }
            }
            NodeData::And(_) | NodeData::Or(_) | NodeData::Xor(_) => {
                self.rebuild(id, |mgr, child| mgr.compose_id(child, var, sub))
            }
            NodeData::Free(_) => unreachable!("expression used after release"),
        }
    }

    /// Simultaneous substitution: every variable with an entry in `map` is
    /// replaced by its image, in one pass.
    pub fn compose_map(&mut self, e: &Expr, map: &HashMap<VarId, Expr>) -> Expr {
        let id = self.compose_map_id(e.root, map);
        self.make_expr(id)
    }

    fn compose_map_id(&mut self, id: ExprId, map: &HashMap<VarId, Expr>) -> ExprId {
        match &self.nodes[id].data {
            NodeData::Const0 | NodeData::Const1 => id,
            NodeData::PosLit(v) => match map.get(v) {
                Some(sub) => sub.root,
                None => id,
            },
            NodeData::NegLit(v) => match map.get(v) {
                Some(sub) => {
                    let sub = sub.root;
                    self.mk_complement(sub)
                }
                None => id,
            },
            NodeData::And(_) | NodeData::Or(_) | NodeData::Xor(_) => {
                self.rebuild(id, |mgr, child| mgr.compose_map_id(child, map))
            }
            NodeData::Free(_) => unreachable!("expression used after release"),
        }
    }

    /// Renumber variables according to `map`; variables without an entry
    /// are left unchanged.
    pub fn remap_var(&mut self, e: &Expr, map: &HashMap<VarId, VarId>) -> Expr {
        let id = self.remap_var_id(e.root, map);
        self.make_expr(id)
    }

    fn remap_var_id(&mut self, id: ExprId, map: &HashMap<VarId, VarId>) -> ExprId {
        match &self.nodes[id].data {
            NodeData::Const0 | NodeData::Const1 => id,
            NodeData::PosLit(v) => match map.get(v) {
                Some(&to) => self.literal_id(to, false),
                None => id,
            },
            NodeData::NegLit(v) => match map.get(v) {
                Some(&to) => self.literal_id(to, true),
                None => id,
            },
            NodeData::And(_) | NodeData::Or(_) | NodeData::Xor(_) => {
                self.rebuild(id, |mgr, child| mgr.remap_var_id(child, map))
            }
            NodeData::Free(_) => unreachable!("expression used after release"),
        }
    }

    /// Re-apply every construction-time simplification to a tree. The
    /// constructors keep expressions normal, so this returns the original
    /// root unless external surgery denormalized something.
    pub fn simplify(&mut self, e: &Expr) -> Expr {
        let id = self.simplify_id(e.root);
        self.make_expr(id)
    }

    fn simplify_id(&mut self, id: ExprId) -> ExprId {
        match &self.nodes[id].data {
            NodeData::And(_) | NodeData::Or(_) | NodeData::Xor(_) => {
                self.rebuild(id, |mgr, child| mgr.simplify_id(child))
            }
            NodeData::Free(_) => unreachable!("expression used after release"),
            _ => id,
        }
    }

    /// Apply `f` to every operand of the operator node `id`, in index
    /// order, and reconstruct. If no operand changed the original node is
    /// returned so shared structure (and anything keyed on it) survives.
    fn rebuild(
        &mut self,
        id: ExprId,
        mut f: impl FnMut(&mut Self, ExprId) -> ExprId,
    ) -> ExprId {
        enum Op {
            And,
            Or,
            Xor,
        }
        let (op, children): (Op, SmallVec<[ExprId; 8]>) = match &self.nodes[id].data {
            NodeData::And(c) => (Op::And, SmallVec::from_slice(c)),
            NodeData::Or(c) => (Op::Or, SmallVec::from_slice(c)),
            NodeData::Xor(c) => (Op::Xor, SmallVec::from_slice(c)),
            _ => unreachable!(),
        };
        let mut mapped: SmallVec<[ExprId; 8]> = SmallVec::with_capacity(children.len());
        let mut identical = true;
        for &child in &children {
            let image = f(self, child);
            identical &= image == child;
            mapped.push(image);
        }
        if identical {
            return id;
        }
        let result = match op {
            Op::And => self.mk_and(&mapped),
            Op::Or => self.mk_or(&mapped),
            Op::Xor => self.mk_xor(&mapped),
        };
        self.sweep(&mapped);
        result
    }

    //
    // Structure queries.
    //

    /// Read-only view of a node.
    pub fn view(&self, id: ExprId) -> ExprView<'_> {
        match &self.nodes[id].data {
            NodeData::Const0 => ExprView::Const0,
            NodeData::Const1 => ExprView::Const1,
            NodeData::PosLit(v) => ExprView::PosLit(*v),
            NodeData::NegLit(v) => ExprView::NegLit(*v),
            NodeData::And(c) => ExprView::And(c),
            NodeData::Or(c) => ExprView::Or(c),
            NodeData::Xor(c) => ExprView::Xor(c),
            NodeData::Free(_) => panic!("expression used after release"),
        }
    }

    /// Is this the constant-false expression?
    pub fn is_zero(&self, e: &Expr) -> bool {
        e.root == self.const0
    }

    /// Is this the constant-true expression?
    pub fn is_one(&self, e: &Expr) -> bool {
        e.root == self.const1
    }

    /// Is this either constant?
    pub fn is_constant(&self, e: &Expr) -> bool {
        self.is_zero(e) || self.is_one(e)
    }

    /// Is the root a positive literal?
    pub fn is_posiliteral(&self, e: &Expr) -> bool {
        matches!(self.view(e.root), ExprView::PosLit(_))
    }

    /// Is the root a negative literal?
    pub fn is_negaliteral(&self, e: &Expr) -> bool {
        matches!(self.view(e.root), ExprView::NegLit(_))
    }

    /// Is the root a literal of either polarity?
    pub fn is_literal(&self, e: &Expr) -> bool {
        matches!(
            self.view(e.root),
            ExprView::PosLit(_) | ExprView::NegLit(_)
        )
    }

    /// Is the root an AND?
    pub fn is_and(&self, e: &Expr) -> bool {
        matches!(self.view(e.root), ExprView::And(_))
    }

    /// Is the root an OR?
    pub fn is_or(&self, e: &Expr) -> bool {
        matches!(self.view(e.root), ExprView::Or(_))
    }

    /// Is the root an XOR?
    pub fn is_xor(&self, e: &Expr) -> bool {
        matches!(self.view(e.root), ExprView::Xor(_))
    }

    /// Is the root any operator?
    pub fn is_op(&self, e: &Expr) -> bool {
        matches!(
            self.view(e.root),
            ExprView::And(_) | ExprView::Or(_) | ExprView::Xor(_)
        )
    }

    /// The variable of a literal root, if it is one.
    pub fn varid(&self, e: &Expr) -> Option<VarId> {
        match self.view(e.root) {
            ExprView::PosLit(v) | ExprView::NegLit(v) => Some(v),
            _ => None,
        }
    }

    /// Number of operands of an operator root; 0 for leaves.
    pub fn child_num(&self, e: &Expr) -> usize {
        match self.view(e.root) {
            ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => c.len(),
            _ => 0,
        }
    }

    /// An owned handle to the `pos`-th operand of an operator root.
    pub fn child(&mut self, e: &Expr, pos: usize) -> Expr {
        let id = match self.view(e.root) {
            ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => c[pos],
            _ => panic!("child() on a leaf expression"),
        };
        self.make_expr(id)
    }

    fn is_literal_id(&self, id: ExprId) -> bool {
        matches!(
            self.nodes[id].data,
            NodeData::PosLit(_) | NodeData::NegLit(_)
        )
    }

    /// A leaf, or one operator whose operands are all literals.
    pub fn is_simple(&self, e: &Expr) -> bool {
        match self.view(e.root) {
            ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => {
                c.iter().all(|&c| self.is_literal_id(c))
            }
            _ => true,
        }
    }

    /// A single AND cube over literals.
    pub fn is_simple_and(&self, e: &Expr) -> bool {
        self.is_and(e) && self.is_simple(e)
    }

    /// A single OR over literals.
    pub fn is_simple_or(&self, e: &Expr) -> bool {
        self.is_or(e) && self.is_simple(e)
    }

    /// A single XOR over literals.
    pub fn is_simple_xor(&self, e: &Expr) -> bool {
        self.is_xor(e) && self.is_simple(e)
    }

    /// Already in sum-of-products shape: a constant, a literal, one cube,
    /// or an OR of literals and cubes.
    pub fn is_sop(&self, e: &Expr) -> bool {
        match self.view(e.root) {
            ExprView::Xor(_) => false,
            ExprView::And(c) => c.iter().all(|&c| self.is_literal_id(c)),
            ExprView::Or(c) => c.iter().all(|&c| match self.view(c) {
                ExprView::PosLit(_) | ExprView::NegLit(_) => true,
                ExprView::And(cc) => cc.iter().all(|&g| self.is_literal_id(g)),
                _ => false,
            }),
            _ => true,
        }
    }

    /// Number of literal occurrences in the factored form.
    pub fn litnum(&self, e: &Expr) -> usize {
        self.litnum_id(e.root, None)
    }

    /// Number of occurrences of `var`, either polarity.
    pub fn litnum_var(&self, e: &Expr, var: VarId) -> usize {
        self.litnum_id(e.root, Some((var, None)))
    }

    /// Number of occurrences of `var` with the given polarity.
    pub fn litnum_pol(&self, e: &Expr, var: VarId, inv: bool) -> usize {
        self.litnum_id(e.root, Some((var, Some(inv))))
    }

    fn litnum_id(&self, id: ExprId, filter: Option<(VarId, Option<bool>)>) -> usize {
        match self.view(id) {
            ExprView::Const0 | ExprView::Const1 => 0,
            ExprView::PosLit(v) => match filter {
                None => 1,
                Some((f, pol)) => (v == f && pol != Some(true)) as usize,
            },
            ExprView::NegLit(v) => match filter {
                None => 1,
                Some((f, pol)) => (v == f && pol != Some(false)) as usize,
            },
            ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => {
                c.iter().map(|&c| self.litnum_id(c, filter)).sum()
            }
        }
    }

    /// One past the largest variable number mentioned; 0 for constants.
    pub fn input_size(&self, e: &Expr) -> usize {
        self.input_size_id(e.root)
    }

    fn input_size_id(&self, id: ExprId) -> usize {
        match self.view(id) {
            ExprView::Const0 | ExprView::Const1 => 0,
            ExprView::PosLit(v) | ExprView::NegLit(v) => v.index() + 1,
            ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => {
                c.iter().map(|&c| self.input_size_id(c)).max().unwrap_or(0)
            }
        }
    }

    //
    // Structural equivalence.
    //

    /// Structural equality: equal shapes over equal literals. Shared
    /// subtrees compare by identity first, so this is cheap on expressions
    /// built through the constructors.
    pub fn struct_eq(&self, a: &Expr, b: &Expr) -> bool {
        self.posi_equiv_id(a.root, b.root)
    }

    /// Structural complement: `a` is the De Morgan image of `!b`.
    pub fn struct_complement(&self, a: &Expr, b: &Expr) -> bool {
        self.nega_equiv_id(a.root, b.root)
    }

    fn posi_equiv_id(&self, a: ExprId, b: ExprId) -> bool {
        if a == b {
            return true;
        }
        match (&self.nodes[a].data, &self.nodes[b].data) {
            (NodeData::Const0, NodeData::Const0) => true,
            (NodeData::Const1, NodeData::Const1) => true,
            (NodeData::PosLit(u), NodeData::PosLit(v)) => u == v,
            (NodeData::NegLit(u), NodeData::NegLit(v)) => u == v,
            (NodeData::And(x), NodeData::And(y))
            | (NodeData::Or(x), NodeData::Or(y))
            | (NodeData::Xor(x), NodeData::Xor(y)) => {
                x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|(&c, &d)| self.posi_equiv_id(c, d))
            }
            _ => false,
        }
    }

    fn nega_equiv_id(&self, a: ExprId, b: ExprId) -> bool {
        match (&self.nodes[a].data, &self.nodes[b].data) {
            (NodeData::Const0, NodeData::Const1) => true,
            (NodeData::Const1, NodeData::Const0) => true,
            (NodeData::PosLit(u), NodeData::NegLit(v)) => u == v,
            (NodeData::NegLit(u), NodeData::PosLit(v)) => u == v,
            (NodeData::And(x), NodeData::Or(y)) | (NodeData::Or(x), NodeData::And(y)) => {
                x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|(&c, &d)| self.nega_equiv_id(c, d))
            }
            (NodeData::Xor(x), NodeData::Xor(y)) => {
                // Two XOR nodes are complements when their operands agree
                // position by position up to an odd number of complemented
                // positions.
                if x.len() != y.len() {
                    return false;
                }
                let mut flipped = 0usize;
                for (&c, &d) in x.iter().zip(y.iter()) {
                    if self.posi_equiv_id(c, d) {
                        continue;
                    }
                    if self.nega_equiv_id(c, d) {
                        flipped += 1;
                        continue;
                    }
                    return false;
                }
                flipped % 2 == 1
            }
            _ => false,
        }
    }

    //
    // Statistics.
    //

    /// Nodes currently alive, pinned singletons included.
    pub fn node_num(&self) -> usize {
        self.node_count
    }

    /// High-water mark of [`node_num`](Self::node_num).
    pub fn max_node_num(&self) -> usize {
        self.max_node_count
    }

    /// Number of pinned singleton nodes (constants and literals).
    pub fn stuck_num(&self) -> usize {
        self.stuck_count
    }

    /// Render `e` for logs and test failures.
    pub fn display<'a>(&'a self, e: &'a Expr) -> DisplayExpr<'a> {
        DisplayExpr {
            mgr: self,
            id: e.root,
        }
    }

    fn fmt_id(&self, id: ExprId, f: &mut fmt::Formatter) -> fmt::Result {
        match self.view(id) {
            ExprView::Const0 => write!(f, "0"),
            ExprView::Const1 => write!(f, "1"),
            ExprView::PosLit(v) => write!(f, "{}", v),
            ExprView::NegLit(v) => write!(f, "!{}", v),
            ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => {
                let sep = match self.view(id) {
                    ExprView::And(_) => " & ",
                    ExprView::Or(_) => " | ",
                    _ => " ^ ",
                };
                write!(f, "(")?;
                for (i, &child) in c.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sep)?;
                    }
                    self.fmt_id(child, f)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Default for ExprMgr {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper displaying an expression in infix form; see [`ExprMgr::display`].
pub struct DisplayExpr<'a> {
    mgr: &'a ExprMgr,
    id: ExprId,
}

impl fmt::Display for DisplayExpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.mgr.fmt_id(self.id, f)
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
        let o = m.one();
        assert!(m.is_zero(&z) && m.is_constant(&z) && !m.is_one(&z));
        assert!(m.is_one(&o) && m.is_constant(&o) && !m.is_zero(&o));
        assert!(!m.is_literal(&z) && !m.is_op(&z));
        assert!(m.is_simple(&z) && m.is_sop(&z));
        assert_eq!(m.child_num(&z), 0);
        assert_eq!(m.litnum(&z), 0);
        assert_eq!(m.input_size(&o), 0);
        // The constants are shared singletons.
        let z2 = m.zero();
        assert_eq!(z.id(), z2.id());
    }

    #[test]
    fn literals() {
        let mut m = ExprMgr::new();
        let p = m.posliteral(var(3));
        assert!(m.is_posiliteral(&p) && m.is_literal(&p) && !m.is_negaliteral(&p));
        assert_eq!(m.varid(&p), Some(var(3)));
        assert_eq!(m.litnum(&p), 1);
        assert_eq!(m.input_size(&p), 4);

        let n = m.negaliteral(var(3));
        assert!(m.is_negaliteral(&n));
        assert!(m.struct_complement(&p, &n));

        // Pairs are created up to the largest variable seen, all shared.
        let p2 = m.literal(var(3), false);
        assert_eq!(p.id(), p2.id());
        assert_eq!(m.stuck_num(), 2 + 8);
    }

    #[test]
    fn and_simplification() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        let na = m.negaliteral(var(0));
        let one = m.one();
        let zero = m.zero();

        // Drop 1 operands, keep the rest.
        let ops = [m.dup(&a), m.dup(&one), m.dup(&b)];
        let e = m.make_and(&ops).unwrap();
        assert!(m.is_and(&e));
        assert_eq!(m.child_num(&e), 2);
        assert_eq!(m.litnum(&e), 2);

        // A 0 operand dominates.
        let ops = [m.dup(&a), m.dup(&zero), m.dup(&b)];
        let e = m.make_and(&ops).unwrap();
        assert!(m.is_zero(&e));

        // x & !x = 0.
        let e = m.and2(&a, &na);
        assert!(m.is_zero(&e));

        // Duplicates collapse, single operand is returned as is.
        let e = m.and2(&a, &a);
        assert_eq!(e.id(), a.id());

        // Nested ANDs flatten.
        let ab = m.and2(&a, &b);
        let c = m.posliteral(var(2));
        let abc = m.and2(&ab, &c);
        assert_eq!(m.child_num(&abc), 3);
    }

    #[test]
    fn or_simplification() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let na = m.negaliteral(var(0));
        let b = m.posliteral(var(1));
        let zero = m.zero();

        let ops = [m.dup(&a), m.dup(&zero), m.dup(&b)];
        let e = m.make_or(&ops).unwrap();
        assert!(m.is_or(&e));
        assert_eq!(m.child_num(&e), 2);

        let e = m.or2(&a, &na);
        assert!(m.is_one(&e));
    }

    #[test]
    fn xor_parity_cancellation() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        let one = m.one();

        // a ^ b ^ a ^ 1 = !b.
        let ops = [m.dup(&a), m.dup(&b), m.dup(&a), m.dup(&one)];
        let e = m.make_xor(&ops).unwrap();
        assert!(m.is_negaliteral(&e));
        assert_eq!(m.varid(&e), Some(var(1)));
        assert_eq!(m.litnum(&e), 1);
        let nb = m.negaliteral(var(1));
        assert!(m.struct_eq(&e, &nb));
    }

    #[test]
    fn xor_all_const_ones() {
        let mut m = ExprMgr::new();
        let ones: Vec<Expr> = (0..4).map(|_| m.one()).collect();
        let even = m.make_xor(&ones).unwrap();
        assert!(m.is_zero(&even));
        let ones: Vec<Expr> = (0..5).map(|_| m.one()).collect();
        let odd = m.make_xor(&ones).unwrap();
        assert!(m.is_one(&odd));
    }

    #[test]
    fn empty_operands_is_an_error() {
        let mut m = ExprMgr::new();
        assert_eq!(m.make_and(&[]).unwrap_err(), BuildError::NoOperands);
        assert_eq!(m.make_or(&[]).unwrap_err(), BuildError::NoOperands);
        assert_eq!(m.make_xor(&[]).unwrap_err(), BuildError::NoOperands);
    }

    #[test]
    fn single_operand_returns_it() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let ops = [m.dup(&a)];
        let e = m.make_and(&ops).unwrap();
        assert_eq!(e.id(), a.id());
        let zero = m.zero();
        let e = m.make_and(&[zero]).unwrap();
        assert!(m.is_zero(&e));
        let one = m.one();
        let e = m.make_and(&[one]).unwrap();
        assert!(m.is_one(&e));
    }

    #[test]
    fn complement_involution() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.negaliteral(var(1));
        let c = m.posliteral(var(2));
        let ab = m.and2(&a, &b);
        let e = m.xor2(&ab, &c);

        let ne = m.complement(&e);
        let nne = m.complement(&ne);
        assert!(m.struct_eq(&nne, &e));
        assert!(m.struct_complement(&e, &ne));
    }

    #[test]
    fn demorgan() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        let ab = m.and2(&a, &b);
        let n = m.complement(&ab);
        // !(a & b) = !a | !b.
        assert!(m.is_or(&n));
        let na = m.negaliteral(var(0));
        let nb = m.negaliteral(var(1));
        let expect = m.or2(&na, &nb);
        assert!(m.struct_eq(&n, &expect));
    }

    #[test]
    fn compose_basic() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let nb = m.negaliteral(var(1));
        let e = m.and2(&a, &nb);

        // b := a | c, so e becomes a & !(a | c) = a & !a & !c = 0.
        let c = m.posliteral(var(2));
        let sub = m.or2(&a, &c);
        let composed = m.compose(&e, var(1), &sub);
        assert!(m.is_zero(&composed));
    }

    #[test]
    fn compose_noop_preserves_identity() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        let e = m.and2(&a, &b);
        let sub = m.posliteral(var(5));
        let composed = m.compose(&e, var(9), &sub);
        assert_eq!(composed.id(), e.id());
    }

    #[test]
    fn remap_permutation_roundtrip() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let nb = m.negaliteral(var(1));
        let e = m.xor2(&a, &nb);

        let fwd: HashMap<VarId, VarId> =
            [(var(0), var(1)), (var(1), var(0))].into_iter().collect();
        let swapped = m.remap_var(&e, &fwd);
        assert_eq!(m.litnum_pol(&swapped, var(0), true), 1);
        assert_eq!(m.litnum_pol(&swapped, var(1), false), 1);

        let back = m.remap_var(&swapped, &fwd);
        assert!(m.struct_eq(&back, &e));
    }

    #[test]
    fn simplify_is_identity_on_normal_forms() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        let c = m.posliteral(var(2));
        let ab = m.and2(&a, &b);
        let e = m.or2(&ab, &c);
        let s = m.simplify(&e);
        assert_eq!(s.id(), e.id());
        let s2 = m.simplify(&s);
        assert_eq!(s2.id(), s.id());
    }

    #[test]
    fn release_recycles_nodes() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        let baseline = m.node_num();

        let e = m.and2(&a, &b);
        assert_eq!(m.node_num(), baseline + 1);
        m.release(e);
        assert_eq!(m.node_num(), baseline);

        // The recycled slot is handed out again.
        let c = m.posliteral(var(2));
        let before = m.nodes.len();
        let e2 = m.and2(&a, &c);
        assert_eq!(m.nodes.len(), before);
        m.release(e2);
    }

    #[test]
    fn shared_subtrees_count_references() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let b = m.posliteral(var(1));
        let c = m.posliteral(var(2));
        let ab = m.and2(&a, &b);
        let e1 = m.or2(&ab, &c);
        let baseline = m.node_num();

        // Releasing the outer expression keeps `ab` alive through its own
        // handle.
        m.release(e1);
        assert_eq!(m.node_num(), baseline - 1);
        assert!(m.is_and(&ab));
        m.release(ab);
        assert_eq!(m.node_num(), baseline - 2);
    }

    #[test]
    fn display_format() {
        let mut m = ExprMgr::new();
        let a = m.posliteral(var(0));
        let nb = m.negaliteral(var(1));
        let e = m.and2(&a, &nb);
        assert_eq!(m.display(&e).to_string(), "(v0 & !v1)");
    }
}
