use crate::jvm::code::Instruction;
use crate::jvm::interpreter::OperandKind;
use std::fmt;

/// Why applying a stack effect to an operand stack failed
///
/// These carry no instruction context; [`Error`] adds that at the point where
/// the interpreter knows which instruction it was evaluating.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectError {
    /// An instruction needed more operands than the stack held
    Underflow,

    /// A popped operand was not of the kind the instruction requires
    TypeMismatch {
        expected: OperandKind,
        actual: OperandKind,
    },

    /// The instruction is outside the closed set the interpreter models
    UnsupportedInstruction,
}

/// Fatal analysis failure for one method's instrumentation
///
/// Analysis correctness is a safety property: a wrong answer would silently
/// mistrace the program, which is worse than a crash. Every detected
/// inconsistency therefore aborts the current method's analysis. Callers may
/// skip that one method and move on, but nothing here is downgraded to a
/// best-effort guess.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The stack held fewer operands than an instruction required
    Underflow { instruction: String },

    /// An instruction consumed an operand of the wrong kind
    TypeMismatch {
        instruction: String,
        expected: OperandKind,
        actual: OperandKind,
    },

    /// An instruction outside the interpreter's closed coverage list
    UnsupportedInstruction { instruction: String },

    /// The dataflow search hit an introduction shape it has no rule for
    UnhandledProvenance { instruction: String },
}

impl Error {
    /// Attach the offending instruction to a bare effect error
    pub(crate) fn at(instruction: &Instruction, err: EffectError) -> Error {
        let instruction = format!("{:?}", instruction);
        match err {
            EffectError::Underflow => Error::Underflow { instruction },
            EffectError::TypeMismatch { expected, actual } => Error::TypeMismatch {
                instruction,
                expected,
                actual,
            },
            EffectError::UnsupportedInstruction => Error::UnsupportedInstruction { instruction },
        }
    }

    pub(crate) fn unhandled_provenance(instruction: &Instruction) -> Error {
        Error::UnhandledProvenance {
            instruction: format!("{:?}", instruction),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Underflow { instruction } => {
                write!(f, "Operand stack underflow at {}", instruction)
            }
            Error::TypeMismatch {
                instruction,
                expected,
                actual,
            } => write!(
                f,
                "Expected {} but found {} at {}",
                expected, actual, instruction
            ),
            Error::UnsupportedInstruction { instruction } => {
                write!(f, "Instruction not covered by the interpreter: {}", instruction)
            }
            Error::UnhandledProvenance { instruction } => {
                write!(f, "No provenance rule for {}", instruction)
            }
        }
    }
}

impl std::error::Error for Error {}
