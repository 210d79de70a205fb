//! Class transformation: planning and applying trace instrumentation
//!
//! The transformer walks each method of a decoded class, plans every
//! recording as an [`InsnEdit`] while the stream is still pristine, and
//! applies the collected edits in one batch at the end. A method whose
//! analysis fails is logged and left untouched; the rest of the class is
//! still instrumented.

mod recorder;

pub use recorder::{PROBE_CLASS, TRACE_CLASS};

use crate::jvm::code::{InsnEdit, InsnNode, Instruction, InvokeType};
use crate::jvm::interpreter::DataFlow;
use crate::jvm::{Class, Error, FieldType, Method, MethodDescriptor};
use log::{debug, warn};

/// Which classes' call sites deserve a trace record
pub trait ClassFilter {
    /// Should calls into `class_name` (a binary name) be traced?
    fn should_trace(&self, class_name: &str) -> bool;
}

/// Source of per-signature trace container classes
///
/// Each traced method call allocates a container matching the callee's
/// signature; the definer hands out (and is responsible for generating) the
/// container class for a given shape.
pub trait TraceContainerDefiner {
    /// Binary name of the container class for this signature
    fn container_for(&self, descriptor: &MethodDescriptor, is_static: bool) -> String;
}

/// Collaborators a transformation runs against
pub struct TransformContext<'c> {
    pub filter: &'c dyn ClassFilter,
    pub definer: &'c dyn TraceContainerDefiner,
}

/// Knobs for a transformation run
#[derive(Debug, Clone, Copy)]
pub struct TransformOptions {
    /// Record method entries (receiver and arguments) in instrumented
    /// methods
    pub record_method_calls: bool,
}

impl Default for TransformOptions {
    fn default() -> TransformOptions {
        TransformOptions {
            record_method_calls: true,
        }
    }
}

/// The special treatment a method body gets (JVMS 2.9, JLS 12.1.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// `<init>`: entry may only be recorded after the superclass constructor
    /// has run
    InstanceInitializer,
    /// `<clinit>`: run by the JVM at class initialization, instrumented like
    /// any other static method
    ClassInitializer,
    /// `public static void main(String[])`: fakes its own call-site preamble,
    /// since its caller (the JVM) is not instrumented
    EntryPoint,
    Normal,
}

impl MethodKind {
    pub fn of(class: &Class, method: &Method) -> MethodKind {
        if method.name == "<init>" && method.descriptor.return_type.is_none() {
            return MethodKind::InstanceInitializer;
        }

        // Before class-file version 51, <clinit> was special regardless of
        // its flags and arity
        let is_void_niladic = method.descriptor.return_type.is_none()
            && method.descriptor.parameters.is_empty();
        if method.name == "<clinit>"
            && method.descriptor.return_type.is_none()
            && (class.major_version < 51 || (method.access_flags.is_static() && is_void_niladic))
        {
            return MethodKind::ClassInitializer;
        }

        let main_flags = crate::jvm::MethodAccessFlags::PUBLIC | crate::jvm::MethodAccessFlags::STATIC;
        if method.name == "main"
            && method.access_flags.contains(main_flags)
            && method.descriptor.return_type.is_none()
            && method.descriptor.parameters
                == [FieldType::array(FieldType::object("java/lang/String"))]
        {
            return MethodKind::EntryPoint;
        }

        MethodKind::Normal
    }
}

/// Plans and applies the instrumentation of one class
pub struct ClassTransformer<'a, 'c> {
    class: &'c Class<'a>,
    context: TransformContext<'c>,
    options: TransformOptions,
    /// Dotted source name recorded in trace events (`com.example.A`)
    source_name: String,
}

impl<'a, 'c> ClassTransformer<'a, 'c> {
    pub fn new(class: &'c Class<'a>, context: TransformContext<'c>) -> ClassTransformer<'a, 'c> {
        ClassTransformer::with_options(class, context, TransformOptions::default())
    }

    pub fn with_options(
        class: &'c Class<'a>,
        context: TransformContext<'c>,
        options: TransformOptions,
    ) -> ClassTransformer<'a, 'c> {
        let source_name = class.name.replace('/', ".");
        ClassTransformer {
            class,
            context,
            options,
            source_name,
        }
    }

    /// Instrument every method of the class, in place
    ///
    /// Methods whose analysis fails are skipped with a warning.
    pub fn transform(&self) {
        // Only java/lang/Object has no superclass, and it is never ours to
        // instrument
        if self.class.super_name.is_none() {
            debug!("{} has no superclass; not instrumenting", self.class.name);
            return;
        }
        for method in &self.class.methods {
            // Abstract and native methods have no body to instrument
            if method.code.is_empty() {
                continue;
            }
            let kind = MethodKind::of(self.class, method);
            match self.plan_method(method, kind) {
                Ok(edits) => {
                    debug!(
                        "{} edits for {}.{} ({:?})",
                        edits.len(),
                        self.class.name,
                        method.name,
                        kind
                    );
                    for edit in edits {
                        edit.apply(&method.code);
                    }
                }
                Err(err) => warn!(
                    "Not instrumenting {}.{}: {}",
                    self.class.name, method.name, err
                ),
            }
        }
    }

    fn plan_method(
        &self,
        method: &'c Method<'a>,
        kind: MethodKind,
    ) -> Result<Vec<InsnEdit<'a>>, Error> {
        match kind {
            MethodKind::Normal | MethodKind::ClassInitializer => {
                self.plan_body(method, self.options.record_method_calls)
            }
            MethodKind::EntryPoint => self.plan_entry_point(method),
            MethodKind::InstanceInitializer => self.plan_instance_initializer(method),
        }
    }

    /// The entry point's caller is the JVM itself, so the call-site preamble
    /// its callers would normally emit is faked at the top of its own body
    fn plan_entry_point(&self, method: &'c Method<'a>) -> Result<Vec<InsnEdit<'a>>, Error> {
        let mut edits = vec![];
        if let Some(first) = method.code.first() {
            let line = method
                .code
                .instructions()
                .find_map(|insn| match insn {
                    Instruction::LineNumber(line) => Some(*line),
                    _ => None,
                })
                .unwrap_or(0);
            let mut out = vec![];
            recorder::call_site_preamble(&mut out, &self.source_name, line, &method.name);
            edits.push(InsnEdit::insert_before(first, out));
        }
        edits.extend(self.plan_body(method, self.options.record_method_calls)?);
        Ok(edits)
    }

    /// Entry of a constructor may only be recorded once the superclass
    /// constructor has run, so the record goes after that call instead of
    /// before the first instruction
    fn plan_instance_initializer(&self, method: &'c Method<'a>) -> Result<Vec<InsnEdit<'a>>, Error> {
        let mut edits = vec![];
        if self.options.record_method_calls {
            let super_call = method.code.iter().find(|node| match &node.insn {
                Instruction::Invoke(InvokeType::Special, target) => {
                    target.name == "<init>" && Some(&target.owner) == self.class.super_name.as_ref()
                }
                _ => false,
            });
            match super_call {
                Some(node) => {
                    let mut out = vec![];
                    self.emit_method_call_record(&mut out, method);
                    edits.push(InsnEdit::insert_after(node, out));
                }
                None => {
                    return Err(Error::UnhandledProvenance {
                        instruction: format!(
                            "<init> of {} never invokes its superclass constructor",
                            self.class.name
                        ),
                    })
                }
            }
        }
        edits.extend(self.plan_body(method, false)?);
        Ok(edits)
    }

    /// Plan the per-instruction recordings of one method body
    fn plan_body(
        &self,
        method: &'c Method<'a>,
        record_method_call: bool,
    ) -> Result<Vec<InsnEdit<'a>>, Error> {
        let mut edits = vec![];

        if record_method_call {
            if let Some(first) = method.code.first() {
                let mut out = vec![];
                self.emit_method_call_record(&mut out, method);
                edits.push(InsnEdit::insert_before(first, out));
            }
        }

        let mut dataflow = DataFlow::new();
        let mut line = 0u16;
        for node in method.code.iter() {
            match &node.insn {
                Instruction::LineNumber(number) => line = *number,

                Instruction::Invoke(_, target) => {
                    if self.context.filter.should_trace(&target.owner) {
                        let mut out = vec![];
                        recorder::call_site_preamble(&mut out, &self.source_name, line, &target.name);
                        edits.push(InsnEdit::insert_before(node, out));
                    }
                }

                Instruction::IInc(index, _) => {
                    // The incremented value never crosses the stack; reload
                    // it for the record
                    let mut out = vec![Instruction::ILoad(*index)];
                    recorder::record_store(
                        &mut out,
                        &self.source_name,
                        line,
                        &self.local_name(method, *index),
                        &FieldType::int(),
                    );
                    edits.push(InsnEdit::insert_after(node, out));
                }

                Instruction::PutField(field) => {
                    edits.push(InsnEdit::insert_before(
                        node,
                        vec![recorder::dup_value_under_receiver(&field.descriptor)],
                    ));
                    edits.push(self.field_store_record(node, field, line));
                }

                Instruction::PutStatic(field) => {
                    edits.push(InsnEdit::insert_before(
                        node,
                        vec![recorder::dup_value(&field.descriptor)],
                    ));
                    edits.push(self.field_store_record(node, field, line));
                }

                insn => {
                    if let Some(index) = insn.local_store_index() {
                        let value_type = self.local_type(method, index, insn);
                        edits.push(InsnEdit::insert_before(
                            node,
                            vec![recorder::dup_value(&value_type)],
                        ));
                        let mut out = vec![];
                        recorder::record_store(
                            &mut out,
                            &self.source_name,
                            line,
                            &self.local_name(method, index),
                            &value_type,
                        );
                        edits.push(InsnEdit::insert_after(node, out));
                    } else if let Some(element) = insn.array_store_element_type() {
                        match dataflow.local_holding_array_ref(node)? {
                            Some(index) => {
                                edits.push(InsnEdit::insert_before(
                                    node,
                                    vec![recorder::dup_value_under_array_and_index(&element)],
                                ));
                                let mut out = vec![];
                                recorder::record_store(
                                    &mut out,
                                    &self.source_name,
                                    line,
                                    &self.local_name(method, index),
                                    &element,
                                );
                                edits.push(InsnEdit::insert_after(node, out));
                            }
                            None => debug!(
                                "{}.{}: array written by {:?} never reaches a local; not recorded",
                                self.class.name, method.name, insn
                            ),
                        }
                    }
                }
            }
        }

        Ok(edits)
    }

    fn field_store_record(
        &self,
        node: &'a InsnNode<'a>,
        field: &crate::jvm::code::FieldRef,
        line: u16,
    ) -> InsnEdit<'a> {
        let qualified = format!("{}.{}", field.owner.replace('/', "."), field.name);
        let mut out = vec![];
        recorder::record_store(&mut out, &self.source_name, line, &qualified, &field.descriptor);
        InsnEdit::insert_after(node, out)
    }

    /// Record the entry of `method`: fresh container, receiver, arguments
    fn emit_method_call_record(&self, out: &mut Vec<Instruction>, method: &Method) {
        let is_static = method.access_flags.is_static();
        let container = self
            .context
            .definer
            .container_for(&method.descriptor, is_static);
        recorder::method_call_start(out, &container);

        let mut slot = 0u16;
        if !is_static {
            recorder::method_call_argument(out, &FieldType::object("java/lang/Object"), 0);
            slot = 1;
        }
        for parameter in &method.descriptor.parameters {
            recorder::method_call_argument(out, parameter, slot);
            slot += parameter.width() as u16;
        }
        recorder::method_call_end(out);
    }

    /// Name to record for local `index`, from the debug table when present
    fn local_name(&self, method: &Method, index: u16) -> String {
        match method.local_variable(index) {
            Some(local) => local.name.clone(),
            None => format!("local{}", index),
        }
    }

    /// Recorded type of a store into local `index`
    ///
    /// The debug table knows the declared type; without it, the store
    /// instruction's own shape is the best available answer.
    fn local_type(&self, method: &Method, index: u16, store: &Instruction) -> FieldType {
        if let Some(local) = method.local_variable(index) {
            return local.descriptor.clone();
        }
        store
            .local_store_value_type()
            .unwrap_or_else(|| FieldType::object("java/lang/Object"))
    }
}
