//! Emission of trace-recording call sequences
//!
//! Every recording is a static call into the probe class, which the runtime
//! library is expected to provide on the instrumented program's classpath.
//! The emitters here only build instruction vectors; anchoring them in a
//! method body is the transformer's job.

use crate::jvm::code::{Constant, Instruction, InvokeType, MethodRef};
use crate::jvm::{BaseType, FieldType, MethodDescriptor};

/// Binary name of the runtime probe class every recording calls into
pub const PROBE_CLASS: &str = "traceweave/runtime/TraceProbe";

/// Binary name of the base class of per-signature trace containers
pub const TRACE_CLASS: &str = "traceweave/runtime/MethodTrace";

fn probe(name: &str, parameters: Vec<FieldType>) -> Instruction {
    Instruction::Invoke(
        InvokeType::Static,
        MethodRef {
            owner: PROBE_CLASS.to_string(),
            name: name.to_string(),
            descriptor: MethodDescriptor {
                parameters,
                return_type: None,
            },
        },
    )
}

/// Recorded name and recorded type for a value of type `typ`
///
/// Primitives record as themselves; every reference records as a plain
/// `java/lang/Object`, since the probe has no overload per reference type.
pub(crate) fn adapted_type(typ: &FieldType) -> (&'static str, FieldType) {
    match typ {
        FieldType::Base(BaseType::Boolean) => ("boolean", typ.clone()),
        FieldType::Base(BaseType::Char) => ("char", typ.clone()),
        FieldType::Base(BaseType::Byte) => ("byte", typ.clone()),
        FieldType::Base(BaseType::Short) => ("short", typ.clone()),
        FieldType::Base(BaseType::Int) => ("int", typ.clone()),
        FieldType::Base(BaseType::Float) => ("float", typ.clone()),
        FieldType::Base(BaseType::Long) => ("long", typ.clone()),
        FieldType::Base(BaseType::Double) => ("double", typ.clone()),
        FieldType::Object(_) | FieldType::Array(_) => {
            ("Object", FieldType::object("java/lang/Object"))
        }
    }
}

/// Load instruction for a value of type `typ` in local slot `slot`
pub(crate) fn load_local(typ: &FieldType, slot: u16) -> Instruction {
    match typ {
        FieldType::Base(BaseType::Boolean)
        | FieldType::Base(BaseType::Char)
        | FieldType::Base(BaseType::Byte)
        | FieldType::Base(BaseType::Short)
        | FieldType::Base(BaseType::Int) => Instruction::ILoad(slot),
        FieldType::Base(BaseType::Long) => Instruction::LLoad(slot),
        FieldType::Base(BaseType::Float) => Instruction::FLoad(slot),
        FieldType::Base(BaseType::Double) => Instruction::DLoad(slot),
        FieldType::Object(_) | FieldType::Array(_) => Instruction::ALoad(slot),
    }
}

/// Duplicate the value on top of the stack
pub(crate) fn dup_value(typ: &FieldType) -> Instruction {
    if typ.width() == 2 {
        Instruction::Dup2
    } else {
        Instruction::Dup
    }
}

/// Duplicate the value on top of the stack below the receiver under it
///
/// Used before `putfield`: `[receiver, value]` becomes
/// `[value, receiver, value]`, leaving a copy for the recording call after
/// the store consumes the original.
pub(crate) fn dup_value_under_receiver(typ: &FieldType) -> Instruction {
    if typ.width() == 2 {
        Instruction::Dup2X1
    } else {
        Instruction::DupX1
    }
}

/// Duplicate the value on top of the stack below the array ref and index
/// under it
///
/// Used before `*astore`: `[array, index, value]` becomes
/// `[value, array, index, value]`.
pub(crate) fn dup_value_under_array_and_index(typ: &FieldType) -> Instruction {
    if typ.width() == 2 {
        Instruction::Dup2X2
    } else {
        Instruction::DupX2
    }
}

/// Announce the context of an upcoming traced event: source class, line, and
/// the method about to be entered
pub(crate) fn call_site_preamble(
    out: &mut Vec<Instruction>,
    class_name: &str,
    line: u16,
    method_name: &str,
) {
    out.push(Instruction::Ldc(Constant::String(class_name.to_string())));
    out.push(probe("className", vec![FieldType::object("java/lang/String")]));
    out.push(Instruction::Ldc(Constant::Integer(i32::from(line))));
    out.push(probe("lineNumber", vec![FieldType::int()]));
    out.push(Instruction::Ldc(Constant::String(method_name.to_string())));
    out.push(probe("methodName", vec![FieldType::object("java/lang/String")]));
}

/// Open a method-call record with a fresh trace container
pub(crate) fn method_call_start(out: &mut Vec<Instruction>, container_class: &str) {
    out.push(Instruction::New(container_class.to_string()));
    out.push(Instruction::Dup);
    out.push(Instruction::Invoke(
        InvokeType::Special,
        MethodRef {
            owner: container_class.to_string(),
            name: "<init>".to_string(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
        },
    ));
    out.push(probe("methodCall_start", vec![FieldType::object(TRACE_CLASS)]));
}

/// Record one argument of the open method-call record
pub(crate) fn method_call_argument(out: &mut Vec<Instruction>, typ: &FieldType, slot: u16) {
    let (suffix, adapted) = adapted_type(typ);
    out.push(load_local(typ, slot));
    out.push(probe(&format!("methodCall_argument_{}", suffix), vec![adapted]));
}

/// Close the open method-call record
pub(crate) fn method_call_end(out: &mut Vec<Instruction>) {
    out.push(probe("methodCall_end", vec![]));
}

/// Record a store of the value on top of the stack
///
/// The (duplicated) value is already on the stack; this pushes the source
/// class, line, and variable name after it, matching the probe's
/// `store(value, className, lineNumber, variableName)` overloads.
pub(crate) fn record_store(
    out: &mut Vec<Instruction>,
    class_name: &str,
    line: u16,
    variable_name: &str,
    value_type: &FieldType,
) {
    let (_, adapted) = adapted_type(value_type);
    out.push(Instruction::Ldc(Constant::String(class_name.to_string())));
    out.push(Instruction::Ldc(Constant::Integer(i32::from(line))));
    out.push(Instruction::Ldc(Constant::String(variable_name.to_string())));
    out.push(probe(
        "store",
        vec![
            adapted,
            FieldType::object("java/lang/String"),
            FieldType::int(),
            FieldType::object("java/lang/String"),
        ],
    ));
}
