use crate::jvm::code::{InsnNode, Instruction};
use crate::jvm::interpreter::{Interpreter, Operand};
use crate::jvm::Error;

/// Where a runtime-reference chase bottomed out
enum Resolution<'a> {
    /// The ref was loaded from a local never stored to: a method parameter.
    /// Carries the load instruction.
    Parameter(&'a InsnNode<'a>),
    /// The ref aliases this concrete array operand
    Concrete(Operand),
    /// No introduction visible in the straight-line window
    Unknown,
}

/// Provenance queries over one instruction stream
///
/// Built on the memoized [`Interpreter`]: "which instruction put this operand
/// on the stack" is answered by comparing the stacks before and after each
/// candidate. An instruction *introduces* an operand its entry stack lacks
/// but its exit stack holds, and *removes* it when its exit stack no longer
/// holds it at all.
///
/// Because operand equality is structural, a search can match an operand
/// that merely looks like the one in question. Searches therefore take the
/// *earliest* introduction in the window, which for straight-line code is
/// the instruction that created the value the later look-alikes alias.
pub struct DataFlow<'a> {
    interpreter: Interpreter<'a>,
}

impl<'a> DataFlow<'a> {
    pub fn new() -> DataFlow<'a> {
        DataFlow {
            interpreter: Interpreter::new(),
        }
    }

    /// Build over an existing (possibly pre-seeded) interpreter
    pub fn with_interpreter(interpreter: Interpreter<'a>) -> DataFlow<'a> {
        DataFlow { interpreter }
    }

    /// Which instruction introduced the operand `depth` entries below the top
    /// of the stack as `consumer` begins executing?
    pub fn introducing_insn(
        &mut self,
        consumer: &'a InsnNode<'a>,
        depth: usize,
    ) -> Result<Option<&'a InsnNode<'a>>, Error> {
        let stack = self.interpreter.stack_before(consumer)?;
        let operand = stack
            .peek(depth)
            .map_err(|err| Error::at(&consumer.insn, err))?
            .clone();
        self.earliest_introducing(consumer, &operand)
    }

    /// Which instruction created the array that `store` (an `*astore`)
    /// writes into?
    ///
    /// `None` means the array's origin is outside the straight-line window.
    /// The answer is a `newarray`-family instruction, or the `aload` of a
    /// method parameter.
    pub fn insn_introducing_array(
        &mut self,
        store: &'a InsnNode<'a>,
    ) -> Result<Option<&'a InsnNode<'a>>, Error> {
        if !store.insn.is_array_store() {
            return Err(Error::unhandled_provenance(&store.insn));
        }

        // The array ref sits under the index and the value
        let stack = self.interpreter.stack_before(store)?;
        let array_ref = stack
            .peek(2)
            .map_err(|err| Error::at(&store.insn, err))?
            .clone();

        match array_ref {
            Operand::ArrayRef(_) | Operand::RefArrayRef => {
                self.earliest_introducing(store, &array_ref)
            }
            Operand::RuntimeRef => match self.resolve_runtime_ref(store, &array_ref)? {
                Resolution::Parameter(load) => Ok(Some(load)),
                Resolution::Concrete(concrete) => {
                    // Every memoized state learns what this ref really was
                    self.interpreter.replace_operand(&array_ref, &concrete);
                    self.earliest_introducing(store, &concrete)
                }
                Resolution::Unknown => Ok(None),
            },
            // A null array ref, or a non-ref where one must be
            _ => Err(Error::unhandled_provenance(&store.insn)),
        }
    }

    /// Which local variable holds the array that `store` writes into?
    ///
    /// `None` means no local can be credited: the array never left the
    /// operand stack, or its origin is outside the window.
    pub fn local_holding_array_ref(
        &mut self,
        store: &'a InsnNode<'a>,
    ) -> Result<Option<u16>, Error> {
        let introduction = match self.insn_introducing_array(store)? {
            Some(node) => node,
            None => return Ok(None),
        };

        match introduction.insn {
            // Loaded straight out of a local
            Instruction::ALoad(index) => Ok(Some(index)),

            Instruction::NewArray(_)
            | Instruction::ANewArray(_)
            | Instruction::MultiANewArray(..) => {
                // Re-read the ref: the chase above may have sharpened it
                let stack = self.interpreter.stack_before(store)?;
                let array_ref = stack
                    .peek(2)
                    .map_err(|err| Error::at(&store.insn, err))?
                    .clone();
                self.local_consuming_ref(introduction, &array_ref)
            }

            _ => Err(Error::unhandled_provenance(&introduction.insn)),
        }
    }

    /// Forward from a fresh array's creation, find the local the ref first
    /// goes into
    ///
    /// An `astore` taking the ref off the top is credited directly, even when
    /// a dup'd copy stays behind (javac's array-initializer pattern parks the
    /// ref only after the element writes). Otherwise the scan ends at the
    /// instruction that drops the ref from the stack entirely: an element
    /// store may still be credited through a reload in between, anything else
    /// means the array never reached a local.
    fn local_consuming_ref(
        &mut self,
        introduction: &'a InsnNode<'a>,
        array_ref: &Operand,
    ) -> Result<Option<u16>, Error> {
        let mut at = introduction.next();
        while let Some(node) = at {
            if let Instruction::AStore(index) = node.insn {
                let before = self.interpreter.stack_before(node)?;
                let top = before.peek(0).map_err(|err| Error::at(&node.insn, err))?;
                if top == array_ref {
                    return Ok(Some(index));
                }
            }
            match self.removes(node, array_ref) {
                Ok(true) => {
                    return if node.insn.is_array_store() {
                        // Consumed by an element store; a reload in between
                        // still tells us which local held it
                        self.reload_between(introduction, node, array_ref)
                    } else {
                        Ok(None)
                    };
                }
                Ok(false) => {}
                // Straight-line evaluation stops here (a return, say) with
                // the ref still on the stack and never in a local
                Err(Error::UnsupportedInstruction { .. }) => return Ok(None),
                Err(err) => return Err(err),
            }
            at = node.next();
        }
        Ok(None)
    }

    /// First `aload` strictly between `from` and `until` that introduces
    /// `array_ref`
    fn reload_between(
        &mut self,
        from: &'a InsnNode<'a>,
        until: &'a InsnNode<'a>,
        array_ref: &Operand,
    ) -> Result<Option<u16>, Error> {
        let mut at = from.next();
        while let Some(node) = at {
            if std::ptr::eq(node, until) {
                break;
            }
            if let Instruction::ALoad(index) = node.insn {
                if self.introduces(node, array_ref)? {
                    return Ok(Some(index));
                }
            }
            at = node.next();
        }
        Ok(None)
    }

    /// Chase a runtime ref back through load/store aliasing
    ///
    /// Each round finds the earliest introduction of the current ref. A load
    /// with no preceding store to its local is a parameter; a load fed by a
    /// store whose value was a concrete array resolves the chase; a store of
    /// yet another runtime ref moves the search window back and repeats. The
    /// window shrinks every round, so this terminates.
    fn resolve_runtime_ref(
        &mut self,
        start: &'a InsnNode<'a>,
        runtime_ref: &Operand,
    ) -> Result<Resolution<'a>, Error> {
        let mut at = start;
        loop {
            let introduction = match self.earliest_introducing(at, runtime_ref)? {
                Some(node) => node,
                None => return Ok(Resolution::Unknown),
            };

            let index = match introduction.insn {
                Instruction::ALoad(index) => index,
                // A ref conjured by something we cannot see through
                // (getfield, invoke, ...)
                _ => return Err(Error::unhandled_provenance(&introduction.insn)),
            };

            let store = match Self::most_recent_store_to(introduction.previous(), index) {
                None => return Ok(Resolution::Parameter(introduction)),
                Some(store) => store,
            };

            let stored = self
                .interpreter
                .stack_before(store)?
                .peek(0)
                .map_err(|err| Error::at(&store.insn, err))?
                .clone();
            match stored {
                Operand::ArrayRef(_) | Operand::RefArrayRef => {
                    return Ok(Resolution::Concrete(stored))
                }
                // The stored value is itself opaque; keep chasing from there
                Operand::RuntimeRef => at = store,
                _ => return Err(Error::unhandled_provenance(&store.insn)),
            }
        }
    }

    /// Earliest instruction at or before `from` that introduces `operand`
    fn earliest_introducing(
        &mut self,
        from: &'a InsnNode<'a>,
        operand: &Operand,
    ) -> Result<Option<&'a InsnNode<'a>>, Error> {
        let mut found = None;
        let mut at = Some(from);
        while let Some(node) = at {
            if self.introduces(node, operand)? {
                found = Some(node);
            }
            at = node.previous();
        }
        Ok(found)
    }

    /// Most recent `*store` to local `index` at or before `from`
    fn most_recent_store_to(
        from: Option<&'a InsnNode<'a>>,
        index: u16,
    ) -> Option<&'a InsnNode<'a>> {
        let mut at = from;
        while let Some(node) = at {
            if node.insn.local_store_index() == Some(index) {
                return Some(node);
            }
            at = node.previous();
        }
        None
    }

    /// Did `node` put `operand` onto a stack that did not hold it before?
    fn introduces(&mut self, node: &'a InsnNode<'a>, operand: &Operand) -> Result<bool, Error> {
        if !self.interpreter.stack_after(node)?.contains(operand) {
            return Ok(false);
        }
        Ok(!self.interpreter.stack_before(node)?.contains(operand))
    }

    /// Did `node` take the last copy of `operand` off the stack?
    ///
    /// Presence-based on purpose: a store that pops one copy of a dup'd ref
    /// while another copy stays behind has not ended the ref's life on the
    /// stack.
    fn removes(&mut self, node: &'a InsnNode<'a>, operand: &Operand) -> Result<bool, Error> {
        if !self.interpreter.stack_before(node)?.contains(operand) {
            return Ok(false);
        }
        Ok(!self.interpreter.stack_after(node)?.contains(operand))
    }
}

impl<'a> Default for DataFlow<'a> {
    fn default() -> DataFlow<'a> {
        DataFlow::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{InsnArena, InsnList, Instruction::*};
    use crate::jvm::interpreter::OperandStack;
    use crate::jvm::BaseType;

    /// `node_at(list, n)`: the `n`th node, counted from the head
    fn node_at<'a>(list: &InsnList<'a>, n: usize) -> &'a InsnNode<'a> {
        list.iter().nth(n).unwrap()
    }

    fn last_store<'a>(list: &InsnList<'a>) -> &'a InsnNode<'a> {
        list.iter()
            .filter(|node| node.insn.is_array_store())
            .last()
            .unwrap()
    }

    #[test]
    fn introducing_insn_finds_the_pushing_instruction() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(&arena, vec![IConst3, BiPush(7), IStore(1)]);
        let mut dataflow = DataFlow::new();

        let store = node_at(&list, 2);
        let introduction = dataflow.introducing_insn(store, 0).unwrap().unwrap();
        assert!(std::ptr::eq(introduction, node_at(&list, 1)));
    }

    #[test]
    fn introducing_insn_prefers_the_earliest_structural_match() {
        // Both loads push an indistinguishable runtime int; the earliest one
        // is the canonical introduction
        let arena = InsnArena::new();
        let list =
            InsnList::from_instructions(&arena, vec![ILoad(1), ILoad(2), IStore(3)]);
        let mut dataflow = DataFlow::new();

        let store = node_at(&list, 2);
        let introduction = dataflow.introducing_insn(store, 0).unwrap().unwrap();
        assert!(std::ptr::eq(introduction, node_at(&list, 0)));
    }

    #[test]
    fn array_stored_into_a_local_and_reloaded() {
        // int[] a = new int[2]; a[0] = 5;
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst2,
                NewArray(BaseType::Int),
                AStore(1),
                ALoad(1),
                IConst0,
                BiPush(5),
                IAStore,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, NewArray(BaseType::Int));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(1));
    }

    #[test]
    fn array_aliased_through_two_locals_credits_the_first() {
        // int[] a = new int[2]; int[] b = a; a[0] = 5;
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst2,
                NewArray(BaseType::Int),
                AStore(1),
                ALoad(1),
                AStore(2),
                ALoad(1),
                IConst0,
                BiPush(5),
                IAStore,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, NewArray(BaseType::Int));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(1));
    }

    #[test]
    fn array_dup_ed_and_written_without_a_reload() {
        // int[] a = new int[2]; a[0] = 5; - javac keeps the ref with a dup
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst2,
                NewArray(BaseType::Int),
                Dup,
                AStore(1),
                IConst0,
                BiPush(5),
                IAStore,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, NewArray(BaseType::Int));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(1));
    }

    #[test]
    fn array_initializer_parks_the_ref_after_the_element_write() {
        // int[] i = {6}; - javac writes the element through a dup'd copy
        // and only then astores the ref
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst1,
                NewArray(BaseType::Int),
                Dup,
                IConst0,
                BiPush(6),
                IAStore,
                AStore(1),
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, NewArray(BaseType::Int));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(1));
    }

    #[test]
    fn dup_ed_array_left_on_the_stack_has_no_holder() {
        // The surviving copy reaches the return without ever being astored
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst1,
                NewArray(BaseType::Int),
                Dup,
                IConst0,
                BiPush(6),
                IAStore,
                Return,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), None);
    }

    #[test]
    fn two_array_instances_resolve_to_the_first_creation() {
        // Structural equality cannot tell the instances apart; the earliest
        // introduction wins, and the query is about the first array
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst2,
                NewArray(BaseType::Int),
                AStore(1),
                IConst2,
                NewArray(BaseType::Int),
                AStore(2),
                ALoad(1),
                IConst0,
                BiPush(5),
                IAStore,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert!(std::ptr::eq(introduction, node_at(&list, 1)));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(1));
    }

    #[test]
    fn parameter_array_resolves_to_its_load() {
        // static void f(int[] a) { a[0] = 5; }
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![ALoad(0), IConst0, BiPush(5), IAStore],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, ALoad(0));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(0));
    }

    #[test]
    fn unrelated_array_creation_does_not_shadow_a_parameter() {
        // A fresh array parked in local 1, but the write goes to the
        // parameter in local 0
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst1,
                NewArray(BaseType::Int),
                AStore(1),
                ALoad(0),
                IConst0,
                BiPush(5),
                IAStore,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, ALoad(0));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(0));
    }

    #[test]
    fn parameter_array_shuffled_with_swap() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![IConst0, ALoad(0), Swap, BiPush(5), IAStore],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, ALoad(0));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(0));
    }

    #[test]
    fn misleading_store_of_a_dup_ed_parameter() {
        // The parameter ref also gets parked in local 1, but it is still the
        // parameter's local that holds the array being written
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                ALoad(0),
                Dup,
                AStore(1),
                IConst0,
                BiPush(5),
                IAStore,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, ALoad(0));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(0));
    }

    #[test]
    fn array_that_never_reaches_a_local_has_no_holder() {
        // new int[1][0] = 5; - the ref lives only on the stack
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst1,
                NewArray(BaseType::Int),
                IConst0,
                BiPush(5),
                IAStore,
                Return,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, NewArray(BaseType::Int));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), None);
    }

    #[test]
    fn reference_array_stores_resolve_too() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                IConst1,
                ANewArray("java/lang/String".into()),
                AStore(1),
                ALoad(1),
                IConst0,
                AConstNull,
                AAStore,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert_eq!(introduction.insn, ANewArray("java/lang/String".into()));
        assert_eq!(dataflow.local_holding_array_ref(store).unwrap(), Some(1));
    }

    #[test]
    fn querying_a_non_array_store_is_an_error() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(&arena, vec![IConst0, IStore(1)]);
        let mut dataflow = DataFlow::new();

        let store = node_at(&list, 1);
        assert!(matches!(
            dataflow.insn_introducing_array(store),
            Err(Error::UnhandledProvenance { .. })
        ));
    }

    #[test]
    fn a_null_array_ref_has_no_provenance_rule() {
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![AConstNull, IConst0, BiPush(5), IAStore],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        assert!(matches!(
            dataflow.insn_introducing_array(store),
            Err(Error::UnhandledProvenance { .. })
        ));
    }

    #[test]
    fn a_ref_conjured_by_a_call_has_no_provenance_rule() {
        use crate::jvm::code::MethodRef;
        use crate::jvm::{MethodDescriptor, ParseDescriptor};

        let make = MethodRef {
            owner: "com/example/Arrays".into(),
            name: "make".into(),
            descriptor: MethodDescriptor::parse("()Ljava/lang/Object;").unwrap(),
        };
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![
                Invoke(crate::jvm::code::InvokeType::Static, make),
                AStore(1),
                ALoad(1),
                IConst0,
                BiPush(5),
                IAStore,
            ],
        );
        let mut dataflow = DataFlow::new();

        let store = last_store(&list);
        assert!(matches!(
            dataflow.insn_introducing_array(store),
            Err(Error::UnhandledProvenance { .. })
        ));
    }

    #[test]
    fn seeded_mid_stream_states_drive_the_search() {
        // Pin the state after a stand-in head instruction and query past it
        let arena = InsnArena::new();
        let list = InsnList::from_instructions(
            &arena,
            vec![Nop, IConst0, BiPush(5), IAStore],
        );
        let mut interpreter = Interpreter::new();
        interpreter.seed_stack_after(
            list.first().unwrap(),
            OperandStack::from(vec![Operand::ArrayRef(BaseType::Int)]),
        );
        let mut dataflow = DataFlow::with_interpreter(interpreter);

        let store = last_store(&list);
        let introduction = dataflow.insn_introducing_array(store).unwrap().unwrap();
        assert!(std::ptr::eq(introduction, list.first().unwrap()));
    }
}
