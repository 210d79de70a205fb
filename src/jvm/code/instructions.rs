use crate::jvm::{BaseType, FieldType, MethodDescriptor};

/// How a method is dispatched at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface,
}

/// Symbolic reference to a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Binary name of the defining class (eg. `java/io/PrintStream`)
    pub owner: String,
    pub name: String,
    pub descriptor: MethodDescriptor,
}

/// Symbolic reference to a field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub descriptor: FieldType,
}

/// Loadable constant-pool entry, as pushed by `ldc`/`ldc2_w`
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(String),
}

/// Direction of a shift instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftType {
    Left,
    ArithmeticRight,
    LogicalRight,
}

/// NaN bias of the floating-point comparison instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// `fcmpg`/`dcmpg`
    G,
    /// `fcmpl`/`dcmpl`
    L,
}

/// One JVM instruction, decoded to symbolic operands
///
/// This covers the straight-line subset the interpreter understands plus the
/// surrounding instructions a decoded method body can contain anyway
/// (arithmetic, conversions, returns, ...). The latter are representable so
/// a stream can hold a whole method, but asking the interpreter to step over
/// one of them is an [`UnsupportedInstruction`] error.
///
/// `LineNumber` is a pseudo-instruction standing in for the line number
/// table: it occupies a stream position, has no stack effect, and marks that
/// subsequent instructions belong to that source line.
///
/// [`UnsupportedInstruction`]: crate::jvm::Error::UnsupportedInstruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Nop,

    // Constants
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant),
    Ldc2(Constant),

    // Local variable loads
    ILoad(u16),
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),

    // Array loads
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,

    // Local variable stores
    IStore(u16),
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),

    // Array stores
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,

    // Stack shuffling
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,

    // Arithmetic and logic (representable, not interpreted)
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType),
    LSh(ShiftType),
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,

    IInc(u16, i16),

    // Conversions (representable, not interpreted)
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,

    // Comparisons (representable, not interpreted)
    LCmp,
    FCmp(CompareMode),
    DCmp(CompareMode),

    // Returns and exits (representable, not interpreted)
    Return,
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    AThrow,
    MonitorEnter,
    MonitorExit,

    // Field access and calls
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),

    // Object and array creation
    New(String),
    NewArray(BaseType),
    ANewArray(String),
    MultiANewArray(FieldType, u8),
    ArrayLength,
    CheckCast(String),
    InstanceOf(String),

    /// Line number table pseudo-instruction
    LineNumber(u16),
}

impl Instruction {
    /// Is this one of the eight `*astore` instructions?
    pub fn is_array_store(&self) -> bool {
        matches!(
            self,
            Instruction::IAStore
                | Instruction::LAStore
                | Instruction::FAStore
                | Instruction::DAStore
                | Instruction::AAStore
                | Instruction::BAStore
                | Instruction::CAStore
                | Instruction::SAStore
        )
    }

    /// Element type written by an array store (`None` for other instructions)
    ///
    /// `aastore` elements are reported as `java/lang/Object`; the stream does
    /// not track the array's precise reference element type.
    pub fn array_store_element_type(&self) -> Option<FieldType> {
        let typ = match self {
            Instruction::IAStore => FieldType::Base(BaseType::Int),
            Instruction::LAStore => FieldType::Base(BaseType::Long),
            Instruction::FAStore => FieldType::Base(BaseType::Float),
            Instruction::DAStore => FieldType::Base(BaseType::Double),
            Instruction::BAStore => FieldType::Base(BaseType::Byte),
            Instruction::CAStore => FieldType::Base(BaseType::Char),
            Instruction::SAStore => FieldType::Base(BaseType::Short),
            Instruction::AAStore => FieldType::object("java/lang/Object"),
            _ => return None,
        };
        Some(typ)
    }

    /// Local variable index written by a `*store` instruction
    pub fn local_store_index(&self) -> Option<u16> {
        match self {
            Instruction::IStore(index)
            | Instruction::LStore(index)
            | Instruction::FStore(index)
            | Instruction::DStore(index)
            | Instruction::AStore(index) => Some(*index),
            _ => None,
        }
    }

    /// Type of the value written by a `*store` instruction
    ///
    /// Like [`array_store_element_type`](Instruction::array_store_element_type),
    /// reference stores come back as `java/lang/Object`.
    pub fn local_store_value_type(&self) -> Option<FieldType> {
        let typ = match self {
            Instruction::IStore(_) => FieldType::Base(BaseType::Int),
            Instruction::LStore(_) => FieldType::Base(BaseType::Long),
            Instruction::FStore(_) => FieldType::Base(BaseType::Float),
            Instruction::DStore(_) => FieldType::Base(BaseType::Double),
            Instruction::AStore(_) => FieldType::object("java/lang/Object"),
            _ => return None,
        };
        Some(typ)
    }
}
