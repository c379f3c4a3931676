//! Node storage for the expression arena.

use smallvec::SmallVec;
use sylva_entity::entity_impl;

/// A logic variable number.
///
/// Variables are externally supplied and need no declaration: asking for a
/// literal of a variable the manager has not seen yet creates its literal
/// pair on demand.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);
entity_impl!(VarId, "v");

/// An opaque reference to a node in an [`ExprMgr`](crate::ExprMgr) arena.
///
/// Ids are only meaningful to the manager that produced them. They are
/// exposed so read-only consumers (the subject-graph builder, the
/// serializer) can walk an expression without touching reference counts.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);
entity_impl!(ExprId, "x");

/// Operand list of an operator node. Most factored-form operators are
/// narrow, so a little inline capacity avoids most heap traffic.
pub(crate) type Children = SmallVec<[ExprId; 4]>;

/// The payload of one arena slot.
#[derive(Clone, Debug)]
pub(crate) enum NodeData {
    /// Constant false.
    Const0,
    /// Constant true.
    Const1,
    /// A positive literal.
    PosLit(VarId),
    /// A negative literal.
    NegLit(VarId),
    /// Conjunction of two or more operands.
    And(Children),
    /// Disjunction of two or more operands.
    Or(Children),
    /// Parity of two or more operands.
    Xor(Children),
    /// A recycled slot. The emptied operand vector is kept so its heap
    /// allocation can be handed to the next node of similar arity.
    Free(Children),
}

impl NodeData {
    pub(crate) fn is_free(&self) -> bool {
        matches!(self, NodeData::Free(_))
    }
}

/// Reference counts saturate here and never come back down; the constants
/// and literal singletons are created saturated so they are never freed.
pub(crate) const REF_STUCK: u32 = u32::MAX;

/// One arena slot: payload plus reference count.
#[derive(Clone, Debug)]
pub(crate) struct Slot {
    pub data: NodeData,
    pub refs: u32,
}
