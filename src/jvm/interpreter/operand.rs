use crate::jvm::BaseType;
use std::fmt;

/// Computational type category of an operand (JVMS 2.11.1)
///
/// Category 2 values (`long`, `double`) occupy two stack slots on a real JVM;
/// here they are single stack entries and the category drives the width rules
/// of the `dup`/`pop` families instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    One,
    Two,
}

/// Abstract value on the modelled operand stack
///
/// Constants loaded by constant-push instructions keep their value; anything
/// computed at runtime collapses to the per-type `Runtime*` operand. Array
/// references keep their element type (primitive arrays exactly, reference
/// arrays as one lump), which is what lets dataflow recognize "the same"
/// array ref across stack states.
///
/// Equality is structural. Two `RuntimeInt`s are indistinguishable even if
/// they were computed by different instructions, which is why searches that
/// care about *which* instruction pick the earliest structural match rather
/// than any match.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    ConstInt(i32),
    RuntimeInt,
    ConstLong(i64),
    RuntimeLong,
    ConstFloat(f32),
    RuntimeFloat,
    ConstDouble(f64),
    RuntimeDouble,
    ConstByte(i8),
    RuntimeByte,
    ConstShort(i16),
    RuntimeShort,
    RuntimeChar,
    Null,
    /// Reference to an array of the given primitive element type
    ArrayRef(BaseType),
    /// Reference to an array of references
    RefArrayRef,
    /// Reference of unknown shape (object, or an array we did not see made)
    RuntimeRef,
}

impl Operand {
    pub fn category(&self) -> Category {
        match self {
            Operand::ConstLong(_)
            | Operand::RuntimeLong
            | Operand::ConstDouble(_)
            | Operand::RuntimeDouble => Category::Two,
            _ => Category::One,
        }
    }

    /// Does this operand live in an `int` on the JVM?
    ///
    /// `boolean`, `byte`, `char`, and `short` values are all manipulated as
    /// ints by the instruction set, so any of them satisfies an instruction
    /// expecting an int-like value.
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            Operand::ConstInt(_)
                | Operand::RuntimeInt
                | Operand::ConstByte(_)
                | Operand::RuntimeByte
                | Operand::ConstShort(_)
                | Operand::RuntimeShort
                | Operand::RuntimeChar
        )
    }

    pub fn is_ref(&self) -> bool {
        matches!(
            self,
            Operand::Null | Operand::ArrayRef(_) | Operand::RefArrayRef | Operand::RuntimeRef
        )
    }

    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::ConstInt(_) | Operand::RuntimeInt => OperandKind::Int,
            Operand::ConstLong(_) | Operand::RuntimeLong => OperandKind::Long,
            Operand::ConstFloat(_) | Operand::RuntimeFloat => OperandKind::Float,
            Operand::ConstDouble(_) | Operand::RuntimeDouble => OperandKind::Double,
            Operand::ConstByte(_) | Operand::RuntimeByte => OperandKind::Byte,
            Operand::ConstShort(_) | Operand::RuntimeShort => OperandKind::Short,
            Operand::RuntimeChar => OperandKind::Char,
            Operand::Null | Operand::RuntimeRef => OperandKind::Ref,
            Operand::ArrayRef(element) => OperandKind::PrimitiveArray(*element),
            Operand::RefArrayRef => OperandKind::RefArray,
        }
    }

    /// Does this operand satisfy an instruction expecting `kind`?
    pub fn matches(&self, kind: OperandKind) -> bool {
        match kind {
            OperandKind::IntLike => self.is_int_like(),
            OperandKind::Ref => self.is_ref(),
            OperandKind::Category1 => self.category() == Category::One,
            OperandKind::Category2 => self.category() == Category::Two,
            OperandKind::RefArray => matches!(self, Operand::RefArrayRef),
            OperandKind::PrimitiveArray(expected) => match self {
                // baload/bastore also cover boolean[]
                Operand::ArrayRef(element) => {
                    *element == expected
                        || (expected == BaseType::Byte && *element == BaseType::Boolean)
                }
                _ => false,
            },
            OperandKind::Int => matches!(self, Operand::ConstInt(_) | Operand::RuntimeInt),
            OperandKind::Long => matches!(self, Operand::ConstLong(_) | Operand::RuntimeLong),
            OperandKind::Float => matches!(self, Operand::ConstFloat(_) | Operand::RuntimeFloat),
            OperandKind::Double => matches!(self, Operand::ConstDouble(_) | Operand::RuntimeDouble),
            OperandKind::Byte => matches!(self, Operand::ConstByte(_) | Operand::RuntimeByte),
            OperandKind::Short => matches!(self, Operand::ConstShort(_) | Operand::RuntimeShort),
            OperandKind::Char => matches!(self, Operand::RuntimeChar),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::ConstInt(value) => write!(f, "int({})", value),
            Operand::RuntimeInt => write!(f, "int"),
            Operand::ConstLong(value) => write!(f, "long({})", value),
            Operand::RuntimeLong => write!(f, "long"),
            Operand::ConstFloat(value) => write!(f, "float({})", value),
            Operand::RuntimeFloat => write!(f, "float"),
            Operand::ConstDouble(value) => write!(f, "double({})", value),
            Operand::RuntimeDouble => write!(f, "double"),
            Operand::ConstByte(value) => write!(f, "byte({})", value),
            Operand::RuntimeByte => write!(f, "byte"),
            Operand::ConstShort(value) => write!(f, "short({})", value),
            Operand::RuntimeShort => write!(f, "short"),
            Operand::RuntimeChar => write!(f, "char"),
            Operand::Null => write!(f, "null"),
            Operand::ArrayRef(element) => write!(f, "arrayref({:?})", element),
            Operand::RefArrayRef => write!(f, "arrayref(ref)"),
            Operand::RuntimeRef => write!(f, "ref"),
        }
    }
}

/// Shape an instruction expects of (or produced as) an operand
///
/// Used in [`TypeMismatch`](crate::jvm::Error::TypeMismatch) reports: the
/// `expected` side can be a loose shape like [`IntLike`](OperandKind::IntLike)
/// or a bare category, while the `actual` side is the concrete kind of the
/// operand that was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Int,
    Long,
    Float,
    Double,
    Byte,
    Short,
    Char,
    Ref,
    PrimitiveArray(BaseType),
    RefArray,
    /// Any of int, byte, short, char
    IntLike,
    Category1,
    Category2,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperandKind::Int => write!(f, "an int"),
            OperandKind::Long => write!(f, "a long"),
            OperandKind::Float => write!(f, "a float"),
            OperandKind::Double => write!(f, "a double"),
            OperandKind::Byte => write!(f, "a byte"),
            OperandKind::Short => write!(f, "a short"),
            OperandKind::Char => write!(f, "a char"),
            OperandKind::Ref => write!(f, "a reference"),
            OperandKind::PrimitiveArray(element) => write!(f, "a {:?} array", element),
            OperandKind::RefArray => write!(f, "a reference array"),
            OperandKind::IntLike => write!(f, "an int-like value"),
            OperandKind::Category1 => write!(f, "a category 1 value"),
            OperandKind::Category2 => write!(f, "a category 2 value"),
        }
    }
}
