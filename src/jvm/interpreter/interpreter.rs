use crate::jvm::code::InsnNode;
use crate::jvm::interpreter::effects::apply_effect;
use crate::jvm::interpreter::{Operand, OperandStack};
use crate::jvm::Error;
use crate::util::RefId;
use std::collections::HashMap;

/// Memoizing straight-line interpreter
///
/// Computes the operand stack before/after any instruction of a stream by
/// folding stack effects along the instruction's predecessor chain, starting
/// from an empty stack at the head. Results are cached per instruction node,
/// so repeated and overlapping queries evaluate each instruction's effect at
/// most once.
///
/// The cache is keyed by node identity, not instruction structure: the two
/// `dup`s of a stream memoize independently. One interpreter serves one
/// stream; analyses over different methods each get their own.
pub struct Interpreter<'a> {
    stack_after: HashMap<RefId<'a, InsnNode<'a>>, OperandStack>,
    effect_evaluations: u64,
}

impl<'a> Interpreter<'a> {
    pub fn new() -> Interpreter<'a> {
        Interpreter {
            stack_after: HashMap::new(),
            effect_evaluations: 0,
        }
    }

    /// Operand stack state after `insn` executes
    pub fn stack_after(&mut self, insn: &'a InsnNode<'a>) -> Result<OperandStack, Error> {
        if let Some(cached) = self.stack_after.get(&RefId(insn)) {
            return Ok(cached.clone());
        }

        // Walk back to the nearest cached predecessor (or the stream head),
        // then fold effects forward over the uncached suffix
        let mut pending = vec![insn];
        let mut stack = OperandStack::new();
        let mut at = insn.previous();
        while let Some(node) = at {
            if let Some(cached) = self.stack_after.get(&RefId(node)) {
                stack = cached.clone();
                break;
            }
            pending.push(node);
            at = node.previous();
        }

        for node in pending.into_iter().rev() {
            self.effect_evaluations += 1;
            stack = apply_effect(&node.insn, &stack).map_err(|err| Error::at(&node.insn, err))?;
            self.stack_after.insert(RefId(node), stack.clone());
        }
        Ok(stack)
    }

    /// Operand stack state as `insn` begins executing
    ///
    /// The stream head starts from an empty stack.
    pub fn stack_before(&mut self, insn: &'a InsnNode<'a>) -> Result<OperandStack, Error> {
        match insn.previous() {
            Some(previous) => self.stack_after(previous),
            None => Ok(OperandStack::new()),
        }
    }

    /// Rewrite every memoized stack, replacing occurrences of `old` by `new`
    ///
    /// Used when dataflow learns what an opaque reference really was: all
    /// recorded states are retroactively sharpened so later searches see the
    /// refined operand everywhere it flowed.
    pub fn replace_operand(&mut self, old: &Operand, new: &Operand) {
        for stack in self.stack_after.values_mut() {
            *stack = stack.replace(old, new);
        }
    }

    /// Record `stack` as the state after `insn` without evaluating anything
    ///
    /// Later queries start folding from this state instead of recomputing the
    /// prefix. This is how tests pin a mid-stream state directly.
    pub fn seed_stack_after(&mut self, insn: &'a InsnNode<'a>, stack: OperandStack) {
        self.stack_after.insert(RefId(insn), stack);
    }

    /// How many instruction effects have been evaluated so far
    pub fn effect_evaluations(&self) -> u64 {
        self.effect_evaluations
    }
}

impl<'a> Default for Interpreter<'a> {
    fn default() -> Interpreter<'a> {
        Interpreter::new()
    }
}
