use crate::jvm::code::Instruction;
use std::cell::Cell;
use std::fmt;
use typed_arena::Arena;

/// Arena holding the nodes of one (or more) instruction streams
///
/// The arena owns every node; streams and analyses only hold `&'a` references
/// into it, so node identity is stable for the arena's whole lifetime.
pub type InsnArena<'a> = Arena<InsnNode<'a>>;

/// One position in an instruction stream
///
/// Two nodes are only "the same instruction" if they are the same node;
/// compare with [`RefId`](crate::util::RefId) or `std::ptr::eq`, never by the
/// (structurally comparable) instruction they carry.
pub struct InsnNode<'a> {
    pub insn: Instruction,
    prev: Cell<Option<&'a InsnNode<'a>>>,
    next: Cell<Option<&'a InsnNode<'a>>>,
}

impl<'a> InsnNode<'a> {
    pub fn previous(&self) -> Option<&'a InsnNode<'a>> {
        self.prev.get()
    }

    pub fn next(&self) -> Option<&'a InsnNode<'a>> {
        self.next.get()
    }
}

// The derived impl would chase `prev`/`next` and never terminate
impl fmt::Debug for InsnNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InsnNode({:?})", self.insn)
    }
}

/// Doubly-linked instruction stream with stable node identity
///
/// Links live in `Cell`s, so insertion works through a shared reference; an
/// analysis can keep `&'a InsnNode` handles while the stream around them is
/// extended.
pub struct InsnList<'a> {
    arena: &'a InsnArena<'a>,
    first: Cell<Option<&'a InsnNode<'a>>>,
    last: Cell<Option<&'a InsnNode<'a>>>,
    len: Cell<usize>,
}

impl<'a> InsnList<'a> {
    pub fn new(arena: &'a InsnArena<'a>) -> InsnList<'a> {
        InsnList {
            arena,
            first: Cell::new(None),
            last: Cell::new(None),
            len: Cell::new(0),
        }
    }

    /// Build a stream from instructions in order
    pub fn from_instructions(
        arena: &'a InsnArena<'a>,
        insns: impl IntoIterator<Item = Instruction>,
    ) -> InsnList<'a> {
        let list = InsnList::new(arena);
        for insn in insns {
            list.push(insn);
        }
        list
    }

    fn alloc(&self, insn: Instruction) -> &'a InsnNode<'a> {
        let arena: &'a InsnArena<'a> = self.arena;
        arena.alloc(InsnNode {
            insn,
            prev: Cell::new(None),
            next: Cell::new(None),
        })
    }

    /// Append an instruction at the end of the stream
    pub fn push(&self, insn: Instruction) -> &'a InsnNode<'a> {
        let node = self.alloc(insn);
        node.prev.set(self.last.get());
        match self.last.get() {
            Some(last) => last.next.set(Some(node)),
            None => self.first.set(Some(node)),
        }
        self.last.set(Some(node));
        self.len.set(self.len.get() + 1);
        node
    }

    /// Insert an instruction immediately before `anchor`
    ///
    /// `anchor` must be a node of this stream.
    pub fn insert_before(&self, anchor: &'a InsnNode<'a>, insn: Instruction) -> &'a InsnNode<'a> {
        let node = self.alloc(insn);
        let prev = anchor.prev.get();
        node.prev.set(prev);
        node.next.set(Some(anchor));
        anchor.prev.set(Some(node));
        match prev {
            Some(prev) => prev.next.set(Some(node)),
            None => self.first.set(Some(node)),
        }
        self.len.set(self.len.get() + 1);
        node
    }

    /// Insert an instruction immediately after `anchor`
    ///
    /// `anchor` must be a node of this stream.
    pub fn insert_after(&self, anchor: &'a InsnNode<'a>, insn: Instruction) -> &'a InsnNode<'a> {
        let node = self.alloc(insn);
        let next = anchor.next.get();
        node.next.set(next);
        node.prev.set(Some(anchor));
        anchor.next.set(Some(node));
        match next {
            Some(next) => next.prev.set(Some(node)),
            None => self.last.set(Some(node)),
        }
        self.len.set(self.len.get() + 1);
        node
    }

    pub fn first(&self) -> Option<&'a InsnNode<'a>> {
        self.first.get()
    }

    pub fn last(&self) -> Option<&'a InsnNode<'a>> {
        self.last.get()
    }

    pub fn len(&self) -> usize {
        self.len.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    /// Nodes from first to last
    pub fn iter(&self) -> InsnIter<'a> {
        InsnIter {
            next: self.first.get(),
        }
    }

    /// Instructions from first to last, without node identity
    pub fn instructions(&self) -> impl Iterator<Item = &'a Instruction> {
        self.iter().map(|node| &node.insn)
    }
}

impl fmt::Debug for InsnList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.instructions()).finish()
    }
}

pub struct InsnIter<'a> {
    next: Option<&'a InsnNode<'a>>,
}

impl<'a> Iterator for InsnIter<'a> {
    type Item = &'a InsnNode<'a>;

    fn next(&mut self) -> Option<&'a InsnNode<'a>> {
        let node = self.next?;
        self.next = node.next.get();
        Some(node)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::Instruction::*;

    fn insns<'a>(list: &InsnList<'a>) -> Vec<Instruction> {
        list.instructions().cloned().collect()
    }

    #[test]
    fn push_links_both_directions() {
        let arena = InsnArena::new();
        let list = InsnList::new(&arena);
        let a = list.push(IConst0);
        let b = list.push(IConst1);
        let c = list.push(IConst2);

        assert_eq!(list.len(), 3);
        assert!(std::ptr::eq(list.first().unwrap(), a));
        assert!(std::ptr::eq(list.last().unwrap(), c));
        assert!(std::ptr::eq(b.previous().unwrap(), a));
        assert!(std::ptr::eq(b.next().unwrap(), c));
        assert!(a.previous().is_none());
        assert!(c.next().is_none());
    }

    #[test]
    fn insert_before_head_updates_first() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(&arena, vec![IConst1]);
        let head = list.first().unwrap();
        let inserted = list.insert_before(head, IConst0);

        assert!(std::ptr::eq(list.first().unwrap(), inserted));
        assert_eq!(insns(&list), vec![IConst0, IConst1]);
    }

    #[test]
    fn insert_after_tail_updates_last() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(&arena, vec![IConst0]);
        let tail = list.last().unwrap();
        let inserted = list.insert_after(tail, IConst1);

        assert!(std::ptr::eq(list.last().unwrap(), inserted));
        assert_eq!(insns(&list), vec![IConst0, IConst1]);
    }

    #[test]
    fn insertion_preserves_existing_node_identity() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(&arena, vec![IConst0, IConst1]);
        let held = list.last().unwrap();
        list.insert_before(held, Dup);

        // The held node is unmoved; only its neighbours changed
        assert!(std::ptr::eq(list.last().unwrap(), held));
        assert_eq!(held.previous().unwrap().insn, Dup);
        assert_eq!(insns(&list), vec![IConst0, Dup, IConst1]);
    }

    #[test]
    fn structurally_equal_nodes_are_distinct() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(&arena, vec![Dup, Dup]);
        let a = list.first().unwrap();
        let b = list.last().unwrap();

        assert_eq!(a.insn, b.insn);
        assert!(!std::ptr::eq(a, b));
    }
}
