//! Compact binary serialization of expressions.
//!
//! The stream is a preorder walk: one tag byte per node, literals carry
//! their variable number and operators their operand count as native-endian
//! `u32`s. The format is for same-machine persistence and inter-process
//! handoff, not for portable archives.

use crate::manager::{Expr, ExprMgr, ExprView};
use crate::node::{ExprId, VarId};
use smallvec::SmallVec;
use thiserror::Error;

const TAG_CONST0: u8 = 0x00;
const TAG_CONST1: u8 = 0x01;
const TAG_POSLIT: u8 = 0x02;
const TAG_NEGLIT: u8 = 0x03;
const TAG_AND: u8 = 0x04;
const TAG_OR: u8 = 0x05;
const TAG_XOR: u8 = 0x06;

/// Errors from [`ExprMgr::decode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The stream ended inside a node.
    #[error("unexpected end of expression stream")]
    UnexpectedEof,
    /// A byte that is not one of the seven node tags.
    #[error("unknown expression tag {0:#04x}")]
    BadTag(u8),
    /// An operator claiming zero operands.
    #[error("operator with no operands")]
    EmptyOperator,
    /// Well-formed expression followed by garbage.
    #[error("trailing bytes after expression")]
    TrailingBytes,
}

impl ExprMgr {
    /// Serialize `e` into a byte vector.
    pub fn encode(&self, e: &Expr) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(e, &mut buf);
        buf
    }

    /// Serialize `e`, appending to `buf`.
    pub fn encode_into(&self, e: &Expr, buf: &mut Vec<u8>) {
        self.encode_id(e.id(), buf);
    }

    fn encode_id(&self, id: ExprId, buf: &mut Vec<u8>) {
        match self.view(id) {
            ExprView::Const0 => buf.push(TAG_CONST0),
            ExprView::Const1 => buf.push(TAG_CONST1),
            ExprView::PosLit(v) => {
                buf.push(TAG_POSLIT);
                buf.extend_from_slice(&v.as_u32().to_ne_bytes());
            }
            ExprView::NegLit(v) => {
                buf.push(TAG_NEGLIT);
                buf.extend_from_slice(&v.as_u32().to_ne_bytes());
            }
            ExprView::And(c) | ExprView::Or(c) | ExprView::Xor(c) => {
                let tag = match self.view(id) {
                    ExprView::And(_) => TAG_AND,
                    ExprView::Or(_) => TAG_OR,
                    _ => TAG_XOR,
                };
                buf.push(tag);
                buf.extend_from_slice(&(c.len() as u32).to_ne_bytes());
                let c: SmallVec<[ExprId; 8]> = SmallVec::from_slice(c);
                for child in c {
                    self.encode_id(child, buf);
                }
            }
        }
    }

    /// Deserialize one expression from `bytes`, which must contain exactly
    /// one encoded expression. The result is rebuilt through the normal
    /// constructors, so it is structurally equivalent to the encoded
    /// expression up to the engine's own canonicalization.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Expr, DecodeError> {
        let mut cursor = bytes;
        let e = self.decode_one(&mut cursor)?;
        if !cursor.is_empty() {
            self.release(e);
            return Err(DecodeError::TrailingBytes);
        }
        Ok(e)
    }

    fn decode_one(&mut self, cursor: &mut &[u8]) -> Result<Expr, DecodeError> {
        let tag = take_u8(cursor)?;
        match tag {
            TAG_CONST0 => Ok(self.zero()),
            TAG_CONST1 => Ok(self.one()),
            TAG_POSLIT => {
                let var = VarId::from_u32(take_u32(cursor)?);
                Ok(self.posliteral(var))
            }
            TAG_NEGLIT => {
                let var = VarId::from_u32(take_u32(cursor)?);
                Ok(self.negaliteral(var))
            }
            TAG_AND | TAG_OR | TAG_XOR => {
                let nc = take_u32(cursor)? as usize;
                if nc == 0 {
                    return Err(DecodeError::EmptyOperator);
                }
                let mut operands = Vec::with_capacity(nc);
                for _ in 0..nc {
                    match self.decode_one(cursor) {
                        Ok(child) => operands.push(child),
                        Err(e) => {
                            for op in operands {
                                self.release(op);
                            }
                            return Err(e);
                        }
                    }
                }
                let result = match tag {
                    TAG_AND => self.make_and(&operands),
                    TAG_OR => self.make_or(&operands),
                    _ => self.make_xor(&operands),
                }
                .expect("operand count checked above");
                for op in operands {
                    self.release(op);
                }
                Ok(result)
            }
            bad => Err(DecodeError::BadTag(bad)),
        }
    }
}

fn take_u8(cursor: &mut &[u8]) -> Result<u8, DecodeError> {
    let (&first, rest) = cursor.split_first().ok_or(DecodeError::UnexpectedEof)?;
    *cursor = rest;
    Ok(first)
}

fn take_u32(cursor: &mut &[u8]) -> Result<u32, DecodeError> {
    if cursor.len() < 4 {
        return Err(DecodeError::UnexpectedEof);
    }
    let (word, rest) = cursor.split_at(4);
    *cursor = rest;
    Ok(u32::from_ne_bytes(word.try_into().unwrap()))
}
