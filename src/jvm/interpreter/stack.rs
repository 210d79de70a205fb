use crate::jvm::interpreter::Operand;
use crate::jvm::EffectError;
use std::fmt;
use std::slice;

/// Immutable snapshot of the operand stack at one point in a stream
///
/// Every operation returns a new stack; the interpreter caches these
/// snapshots per instruction, so sharing a mutable stack between them would
/// corrupt the memo table. Category 2 operands are single entries (see
/// [`Category`](crate::jvm::interpreter::Category)).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperandStack {
    /// Bottom of the stack first
    operands: Vec<Operand>,
}

impl OperandStack {
    pub fn new() -> OperandStack {
        OperandStack::default()
    }

    /// Build a stack from operands listed bottom to top
    pub fn from(operands: Vec<Operand>) -> OperandStack {
        OperandStack { operands }
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    /// Copy of this stack with `operand` pushed on top
    pub fn push(&self, operand: Operand) -> OperandStack {
        let mut operands = self.operands.clone();
        operands.push(operand);
        OperandStack { operands }
    }

    /// Copy of this stack with `operand` inserted below the top `depth`
    /// operands
    ///
    /// `push_at(op, 0)` is `push(op)`. This is how the `dup*_x*` forms place
    /// their duplicate underneath the values they skip over.
    pub fn push_at(&self, operand: Operand, depth: usize) -> Result<OperandStack, EffectError> {
        if depth > self.operands.len() {
            return Err(EffectError::Underflow);
        }
        let mut operands = self.operands.clone();
        let at = operands.len() - depth;
        operands.insert(at, operand);
        Ok(OperandStack { operands })
    }

    /// Top operand plus a copy of the stack without it
    pub fn pop(&self) -> Result<(Operand, OperandStack), EffectError> {
        let mut operands = self.operands.clone();
        match operands.pop() {
            Some(operand) => Ok((operand, OperandStack { operands })),
            None => Err(EffectError::Underflow),
        }
    }

    /// Operand `depth` entries below the top (`peek(0)` is the top)
    pub fn peek(&self, depth: usize) -> Result<&Operand, EffectError> {
        if depth >= self.operands.len() {
            return Err(EffectError::Underflow);
        }
        Ok(&self.operands[self.operands.len() - 1 - depth])
    }

    pub fn contains(&self, operand: &Operand) -> bool {
        self.operands.contains(operand)
    }

    /// Copy of this stack with every occurrence of `old` replaced by `new`
    pub fn replace(&self, old: &Operand, new: &Operand) -> OperandStack {
        let operands = self
            .operands
            .iter()
            .map(|operand| {
                if operand == old {
                    new.clone()
                } else {
                    operand.clone()
                }
            })
            .collect();
        OperandStack { operands }
    }

    /// Operands from the bottom of the stack to the top
    pub fn iter(&self) -> slice::Iter<Operand> {
        self.operands.iter()
    }
}

impl fmt::Display for OperandStack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.operands.is_empty() {
            return write!(f, "<empty>");
        }
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", operand)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::interpreter::Operand::*;

    #[test]
    fn push_and_pop_are_lifo() {
        let stack = OperandStack::new().push(ConstInt(1)).push(ConstInt(2));
        let (top, rest) = stack.pop().unwrap();
        assert_eq!(top, ConstInt(2));
        let (next, rest) = rest.pop().unwrap();
        assert_eq!(next, ConstInt(1));
        assert!(rest.is_empty());
    }

    #[test]
    fn operations_leave_the_original_untouched() {
        let stack = OperandStack::from(vec![ConstInt(1)]);
        let _ = stack.push(ConstInt(2));
        let _ = stack.pop().unwrap();
        assert_eq!(stack, OperandStack::from(vec![ConstInt(1)]));
    }

    #[test]
    fn pop_of_empty_stack_underflows() {
        assert_eq!(OperandStack::new().pop(), Err(EffectError::Underflow));
    }

    #[test]
    fn peek_counts_down_from_the_top() {
        let stack = OperandStack::from(vec![ConstInt(1), ConstInt(2), ConstInt(3)]);
        assert_eq!(stack.peek(0), Ok(&ConstInt(3)));
        assert_eq!(stack.peek(2), Ok(&ConstInt(1)));
        assert_eq!(stack.peek(3), Err(EffectError::Underflow));
    }

    #[test]
    fn push_at_inserts_below_the_skipped_operands() {
        let stack = OperandStack::from(vec![ConstInt(1), ConstInt(2)]);
        let pushed = stack.push_at(Null, 2).unwrap();
        assert_eq!(
            pushed,
            OperandStack::from(vec![Null, ConstInt(1), ConstInt(2)])
        );
        assert_eq!(stack.push_at(Null, 0).unwrap(), stack.push(Null));
        assert_eq!(stack.push_at(Null, 3), Err(EffectError::Underflow));
    }

    #[test]
    fn replace_rewrites_every_occurrence() {
        let stack = OperandStack::from(vec![RuntimeRef, ConstInt(1), RuntimeRef]);
        let replaced = stack.replace(&RuntimeRef, &RefArrayRef);
        assert_eq!(
            replaced,
            OperandStack::from(vec![RefArrayRef, ConstInt(1), RefArrayRef])
        );
    }
}
