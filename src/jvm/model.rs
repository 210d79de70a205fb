use crate::jvm::code::InsnList;
use crate::jvm::{FieldType, MethodAccessFlags, MethodDescriptor};

/// A decoded class, as handed to the transformer by the embedding's
/// class-file reader
#[derive(Debug)]
pub struct Class<'a> {
    /// Binary name (eg. `com/example/Counter`)
    pub name: String,

    /// Binary name of the superclass, absent only for `java/lang/Object`
    pub super_name: Option<String>,

    /// Major class-file version (eg. 52 for Java 8)
    pub major_version: u16,

    pub methods: Vec<Method<'a>>,
}

/// One method body plus the metadata instrumentation needs
#[derive(Debug)]
pub struct Method<'a> {
    pub name: String,
    pub access_flags: MethodAccessFlags,
    pub descriptor: MethodDescriptor,

    /// The method's instruction stream
    pub code: InsnList<'a>,

    /// Local variable debug table; may be empty if the class was compiled
    /// without debug information
    pub local_variables: Vec<LocalVariable>,
}

impl<'a> Method<'a> {
    /// Debug-table entry for the local at `index`, if one was recorded
    pub fn local_variable(&self, index: u16) -> Option<&LocalVariable> {
        self.local_variables.iter().find(|local| local.index == index)
    }
}

/// Entry of the local variable debug table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: String,
    pub descriptor: FieldType,
    pub index: u16,
}
