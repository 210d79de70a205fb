use crate::jvm::code::{InsnList, InsnNode, Instruction};

/// A planned insertion into an instruction stream
///
/// Edits are plain data: building one performs no mutation, so an analysis
/// pass can traverse a stream read-only while accumulating the edits it
/// wants, then apply them all at the end. Edits anchored at distinct nodes
/// are independent; applying them in any order yields the same stream.
/// Several edits anchored at the same node on the same side stack up in
/// application order, each landing closer to the anchor than the last.
#[derive(Debug)]
pub enum InsnEdit<'a> {
    Before {
        anchor: &'a InsnNode<'a>,
        insns: Vec<Instruction>,
    },
    After {
        anchor: &'a InsnNode<'a>,
        insns: Vec<Instruction>,
    },
}

impl<'a> InsnEdit<'a> {
    /// Plan to insert `insns` (in order) immediately before `anchor`
    pub fn insert_before(anchor: &'a InsnNode<'a>, insns: Vec<Instruction>) -> InsnEdit<'a> {
        InsnEdit::Before { anchor, insns }
    }

    /// Plan to insert `insns` (in order) immediately after `anchor`
    pub fn insert_after(anchor: &'a InsnNode<'a>, insns: Vec<Instruction>) -> InsnEdit<'a> {
        InsnEdit::After { anchor, insns }
    }

    /// Splice the planned instructions into `list`
    ///
    /// `list` must be the stream the anchor belongs to.
    pub fn apply(self, list: &InsnList<'a>) {
        match self {
            InsnEdit::Before { anchor, insns } => {
                for insn in insns {
                    list.insert_before(anchor, insn);
                }
            }
            InsnEdit::After { anchor, insns } => {
                let mut at = anchor;
                for insn in insns {
                    at = list.insert_after(at, insn);
                }
            }
        }
    }
}
