use crate::jvm::code::{Constant, Instruction, InvokeType};
use crate::jvm::interpreter::{Category, Operand, OperandKind, OperandStack};
use crate::jvm::{BaseType, EffectError, FieldType};

/// Pop the top operand, checking it satisfies `expected`
fn pop_expecting(
    stack: &OperandStack,
    expected: OperandKind,
) -> Result<(Operand, OperandStack), EffectError> {
    let (operand, rest) = stack.pop()?;
    if operand.matches(expected) {
        Ok((operand, rest))
    } else {
        Err(EffectError::TypeMismatch {
            expected,
            actual: operand.kind(),
        })
    }
}

/// Abstract operand produced by reading a value of type `typ`
///
/// `boolean` and `char` live in plain ints once loaded from a field or
/// returned from a call, so they come back as `RuntimeInt`.
fn operand_for_type(typ: &FieldType) -> Operand {
    match typ {
        FieldType::Base(BaseType::Boolean)
        | FieldType::Base(BaseType::Char)
        | FieldType::Base(BaseType::Int) => Operand::RuntimeInt,
        FieldType::Base(BaseType::Byte) => Operand::RuntimeByte,
        FieldType::Base(BaseType::Short) => Operand::RuntimeShort,
        FieldType::Base(BaseType::Long) => Operand::RuntimeLong,
        FieldType::Base(BaseType::Float) => Operand::RuntimeFloat,
        FieldType::Base(BaseType::Double) => Operand::RuntimeDouble,
        FieldType::Object(_) => Operand::RuntimeRef,
        FieldType::Array(element) => match element.as_ref() {
            FieldType::Base(base) => Operand::ArrayRef(*base),
            _ => Operand::RefArrayRef,
        },
    }
}

/// Operand shape required when consuming a value of type `typ`
fn kind_for_type(typ: &FieldType) -> OperandKind {
    match typ {
        FieldType::Base(BaseType::Boolean)
        | FieldType::Base(BaseType::Char)
        | FieldType::Base(BaseType::Byte)
        | FieldType::Base(BaseType::Short)
        | FieldType::Base(BaseType::Int) => OperandKind::IntLike,
        FieldType::Base(BaseType::Long) => OperandKind::Long,
        FieldType::Base(BaseType::Float) => OperandKind::Float,
        FieldType::Base(BaseType::Double) => OperandKind::Double,
        FieldType::Object(_) | FieldType::Array(_) => OperandKind::Ref,
    }
}

/// `*aload` on a primitive array: pop index, pop array, push the element
fn primitive_array_load(
    stack: &OperandStack,
    element: BaseType,
    loaded: Operand,
) -> Result<OperandStack, EffectError> {
    let (_, stack) = pop_expecting(stack, OperandKind::IntLike)?;
    let (_, stack) = pop_expecting(&stack, OperandKind::PrimitiveArray(element))?;
    Ok(stack.push(loaded))
}

/// `*astore` on a primitive array: pop value, pop index, pop array
fn primitive_array_store(
    stack: &OperandStack,
    element: BaseType,
    value: OperandKind,
) -> Result<OperandStack, EffectError> {
    let (_, stack) = pop_expecting(stack, value)?;
    let (_, stack) = pop_expecting(&stack, OperandKind::IntLike)?;
    let (_, stack) = pop_expecting(&stack, OperandKind::PrimitiveArray(element))?;
    Ok(stack)
}

/// Stack state after executing `insn` on a stack in state `stack`
///
/// This is the whole per-instruction semantics of the interpreter: pure,
/// total over the supported subset, and an error (never a guess) outside it.
pub(crate) fn apply_effect(
    insn: &Instruction,
    stack: &OperandStack,
) -> Result<OperandStack, EffectError> {
    use Instruction::*;

    match insn {
        // No stack effect (iinc works on a local, not the stack)
        Nop | LineNumber(_) | IInc(..) => Ok(stack.clone()),

        AConstNull => Ok(stack.push(Operand::Null)),
        IConstM1 => Ok(stack.push(Operand::ConstInt(-1))),
        IConst0 => Ok(stack.push(Operand::ConstInt(0))),
        IConst1 => Ok(stack.push(Operand::ConstInt(1))),
        IConst2 => Ok(stack.push(Operand::ConstInt(2))),
        IConst3 => Ok(stack.push(Operand::ConstInt(3))),
        IConst4 => Ok(stack.push(Operand::ConstInt(4))),
        IConst5 => Ok(stack.push(Operand::ConstInt(5))),
        LConst0 => Ok(stack.push(Operand::ConstLong(0))),
        LConst1 => Ok(stack.push(Operand::ConstLong(1))),
        FConst0 => Ok(stack.push(Operand::ConstFloat(0.0))),
        FConst1 => Ok(stack.push(Operand::ConstFloat(1.0))),
        FConst2 => Ok(stack.push(Operand::ConstFloat(2.0))),
        DConst0 => Ok(stack.push(Operand::ConstDouble(0.0))),
        DConst1 => Ok(stack.push(Operand::ConstDouble(1.0))),
        BiPush(value) => Ok(stack.push(Operand::ConstByte(*value))),
        SiPush(value) => Ok(stack.push(Operand::ConstShort(*value))),

        // ldc only loads category 1 constants; ldc2_w only category 2
        Ldc(constant) => match constant {
            Constant::Integer(value) => Ok(stack.push(Operand::ConstInt(*value))),
            Constant::Float(value) => Ok(stack.push(Operand::ConstFloat(*value))),
            Constant::String(_) | Constant::Class(_) => Ok(stack.push(Operand::RuntimeRef)),
            Constant::Long(_) => Err(EffectError::TypeMismatch {
                expected: OperandKind::Category1,
                actual: OperandKind::Long,
            }),
            Constant::Double(_) => Err(EffectError::TypeMismatch {
                expected: OperandKind::Category1,
                actual: OperandKind::Double,
            }),
        },
        Ldc2(constant) => match constant {
            Constant::Long(value) => Ok(stack.push(Operand::ConstLong(*value))),
            Constant::Double(value) => Ok(stack.push(Operand::ConstDouble(*value))),
            Constant::Integer(_) => Err(EffectError::TypeMismatch {
                expected: OperandKind::Category2,
                actual: OperandKind::Int,
            }),
            Constant::Float(_) => Err(EffectError::TypeMismatch {
                expected: OperandKind::Category2,
                actual: OperandKind::Float,
            }),
            Constant::String(_) | Constant::Class(_) => Err(EffectError::TypeMismatch {
                expected: OperandKind::Category2,
                actual: OperandKind::Ref,
            }),
        },

        ILoad(_) => Ok(stack.push(Operand::RuntimeInt)),
        LLoad(_) => Ok(stack.push(Operand::RuntimeLong)),
        FLoad(_) => Ok(stack.push(Operand::RuntimeFloat)),
        DLoad(_) => Ok(stack.push(Operand::RuntimeDouble)),
        ALoad(_) => Ok(stack.push(Operand::RuntimeRef)),

        IALoad => primitive_array_load(stack, BaseType::Int, Operand::RuntimeInt),
        LALoad => primitive_array_load(stack, BaseType::Long, Operand::RuntimeLong),
        FALoad => primitive_array_load(stack, BaseType::Float, Operand::RuntimeFloat),
        DALoad => primitive_array_load(stack, BaseType::Double, Operand::RuntimeDouble),
        BALoad => primitive_array_load(stack, BaseType::Byte, Operand::RuntimeByte),
        CALoad => primitive_array_load(stack, BaseType::Char, Operand::RuntimeChar),
        SALoad => primitive_array_load(stack, BaseType::Short, Operand::RuntimeShort),
        AALoad => {
            let (_, stack) = pop_expecting(stack, OperandKind::IntLike)?;
            let (_, stack) = pop_expecting(&stack, OperandKind::RefArray)?;
            Ok(stack.push(Operand::RuntimeRef))
        }

        IStore(_) => Ok(pop_expecting(stack, OperandKind::IntLike)?.1),
        LStore(_) => Ok(pop_expecting(stack, OperandKind::Long)?.1),
        FStore(_) => Ok(pop_expecting(stack, OperandKind::Float)?.1),
        DStore(_) => Ok(pop_expecting(stack, OperandKind::Double)?.1),
        AStore(_) => Ok(pop_expecting(stack, OperandKind::Ref)?.1),

        // The stored int-like value may be any of int/byte/short/char
        IAStore => primitive_array_store(stack, BaseType::Int, OperandKind::IntLike),
        LAStore => primitive_array_store(stack, BaseType::Long, OperandKind::Long),
        FAStore => primitive_array_store(stack, BaseType::Float, OperandKind::Float),
        DAStore => primitive_array_store(stack, BaseType::Double, OperandKind::Double),
        BAStore => primitive_array_store(stack, BaseType::Byte, OperandKind::IntLike),
        CAStore => primitive_array_store(stack, BaseType::Char, OperandKind::IntLike),
        SAStore => primitive_array_store(stack, BaseType::Short, OperandKind::IntLike),
        AAStore => {
            let (_, stack) = pop_expecting(stack, OperandKind::Ref)?;
            let (_, stack) = pop_expecting(&stack, OperandKind::IntLike)?;
            let (_, stack) = pop_expecting(&stack, OperandKind::RefArray)?;
            Ok(stack)
        }

        Pop => Ok(pop_expecting(stack, OperandKind::Category1)?.1),
        Pop2 => {
            let (top, rest) = stack.pop()?;
            match top.category() {
                Category::Two => Ok(rest),
                Category::One => Ok(pop_expecting(&rest, OperandKind::Category1)?.1),
            }
        }

        Dup => {
            let (v1, rest) = pop_expecting(stack, OperandKind::Category1)?;
            Ok(rest.push(v1.clone()).push(v1))
        }
        DupX1 => {
            let (v1, rest) = pop_expecting(stack, OperandKind::Category1)?;
            let (v2, rest) = pop_expecting(&rest, OperandKind::Category1)?;
            Ok(rest.push(v1.clone()).push(v2).push(v1))
        }
        DupX2 => {
            let (v1, rest) = pop_expecting(stack, OperandKind::Category1)?;
            let (v2, rest) = rest.pop()?;
            match v2.category() {
                Category::Two => Ok(rest.push(v1.clone()).push(v2).push(v1)),
                Category::One => {
                    let (v3, rest) = pop_expecting(&rest, OperandKind::Category1)?;
                    Ok(rest.push(v1.clone()).push(v3).push(v2).push(v1))
                }
            }
        }
        Dup2 => {
            let (v1, rest) = stack.pop()?;
            match v1.category() {
                Category::Two => Ok(rest.push(v1.clone()).push(v1)),
                Category::One => {
                    let (v2, rest) = pop_expecting(&rest, OperandKind::Category1)?;
                    Ok(rest.push(v2.clone()).push(v1.clone()).push(v2).push(v1))
                }
            }
        }
        Dup2X1 => {
            let (v1, rest) = stack.pop()?;
            match v1.category() {
                Category::Two => {
                    let (v2, rest) = pop_expecting(&rest, OperandKind::Category1)?;
                    Ok(rest.push(v1.clone()).push(v2).push(v1))
                }
                Category::One => {
                    let (v2, rest) = pop_expecting(&rest, OperandKind::Category1)?;
                    let (v3, rest) = pop_expecting(&rest, OperandKind::Category1)?;
                    Ok(rest
                        .push(v2.clone())
                        .push(v1.clone())
                        .push(v3)
                        .push(v2)
                        .push(v1))
                }
            }
        }
        Dup2X2 => {
            let (v1, rest) = stack.pop()?;
            match v1.category() {
                Category::Two => {
                    let (v2, rest) = rest.pop()?;
                    match v2.category() {
                        Category::Two => Ok(rest.push(v1.clone()).push(v2).push(v1)),
                        Category::One => {
                            let (v3, rest) = pop_expecting(&rest, OperandKind::Category1)?;
                            Ok(rest.push(v1.clone()).push(v3).push(v2).push(v1))
                        }
                    }
                }
                Category::One => {
                    let (v2, rest) = pop_expecting(&rest, OperandKind::Category1)?;
                    let (v3, rest) = rest.pop()?;
                    match v3.category() {
                        Category::Two => Ok(rest
                            .push(v2.clone())
                            .push(v1.clone())
                            .push(v3)
                            .push(v2)
                            .push(v1)),
                        Category::One => {
                            let (v4, rest) = pop_expecting(&rest, OperandKind::Category1)?;
                            Ok(rest
                                .push(v2.clone())
                                .push(v1.clone())
                                .push(v4)
                                .push(v3)
                                .push(v2)
                                .push(v1))
                        }
                    }
                }
            }
        }
        Swap => {
            let (v1, rest) = pop_expecting(stack, OperandKind::Category1)?;
            let (v2, rest) = pop_expecting(&rest, OperandKind::Category1)?;
            Ok(rest.push(v1).push(v2))
        }

        ArrayLength => {
            let (_, rest) = pop_expecting(stack, OperandKind::Ref)?;
            Ok(rest.push(Operand::RuntimeInt))
        }
        // The cast neither consumes nor changes the operand we track
        CheckCast(_) => {
            let _ = pop_expecting(stack, OperandKind::Ref)?;
            Ok(stack.clone())
        }
        InstanceOf(_) => {
            let (_, rest) = pop_expecting(stack, OperandKind::Ref)?;
            Ok(rest.push(Operand::RuntimeInt))
        }

        New(_) => Ok(stack.push(Operand::RuntimeRef)),
        NewArray(element) => {
            let (_, rest) = pop_expecting(stack, OperandKind::IntLike)?;
            Ok(rest.push(Operand::ArrayRef(*element)))
        }
        ANewArray(_) => {
            let (_, rest) = pop_expecting(stack, OperandKind::IntLike)?;
            Ok(rest.push(Operand::RefArrayRef))
        }
        MultiANewArray(descriptor, dimensions) => {
            let mut stack = stack.clone();
            for _ in 0..*dimensions {
                stack = pop_expecting(&stack, OperandKind::IntLike)?.1;
            }
            Ok(stack.push(operand_for_type(descriptor)))
        }

        GetStatic(field) => Ok(stack.push(operand_for_type(&field.descriptor))),
        PutStatic(field) => Ok(pop_expecting(stack, kind_for_type(&field.descriptor))?.1),
        GetField(field) => {
            let (_, rest) = pop_expecting(stack, OperandKind::Ref)?;
            Ok(rest.push(operand_for_type(&field.descriptor)))
        }
        PutField(field) => {
            let (_, rest) = pop_expecting(stack, kind_for_type(&field.descriptor))?;
            let (_, rest) = pop_expecting(&rest, OperandKind::Ref)?;
            Ok(rest)
        }

        Invoke(invoke_type, method) => {
            let mut stack = stack.clone();
            for parameter in method.descriptor.parameters.iter().rev() {
                stack = pop_expecting(&stack, kind_for_type(parameter))?.1;
            }
            if *invoke_type != InvokeType::Static {
                stack = pop_expecting(&stack, OperandKind::Ref)?.1;
            }
            match &method.descriptor.return_type {
                Some(return_type) => Ok(stack.push(operand_for_type(return_type))),
                None => Ok(stack),
            }
        }

        // Outside the supported straight-line subset
        IAdd | LAdd | FAdd | DAdd | ISub | LSub | FSub | DSub | IMul | LMul | FMul | DMul
        | IDiv | LDiv | FDiv | DDiv | IRem | LRem | FRem | DRem | INeg | LNeg | FNeg | DNeg
        | ISh(_) | LSh(_) | IAnd | LAnd | IOr | LOr | IXor | LXor | I2L | I2F | I2D | L2I
        | L2F | L2D | F2I | F2L | F2D | D2I | D2L | D2F | I2B | I2C | I2S | LCmp | FCmp(_)
        | DCmp(_) | Return | IReturn | LReturn | FReturn | DReturn | AReturn | AThrow
        | MonitorEnter | MonitorExit => Err(EffectError::UnsupportedInstruction),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::MethodRef;
    use crate::jvm::{MethodDescriptor, ParseDescriptor};
    use Instruction::*;
    use Operand::*;

    fn apply(insns: &[Instruction], stack: OperandStack) -> OperandStack {
        insns.iter().fold(stack, |stack, insn| {
            apply_effect(insn, &stack).unwrap_or_else(|err| {
                panic!("applying {:?} to [{}] failed: {:?}", insn, stack, err)
            })
        })
    }

    #[test]
    fn constants_keep_their_value() {
        let stack = apply(
            &[IConst3, BiPush(7), LConst1, Ldc(Constant::Float(1.5))],
            OperandStack::new(),
        );
        assert_eq!(
            stack,
            OperandStack::from(vec![
                ConstInt(3),
                ConstByte(7),
                ConstLong(1),
                ConstFloat(1.5)
            ])
        );
    }

    #[test]
    fn loads_produce_runtime_operands() {
        let stack = apply(&[ILoad(0), ALoad(1), DLoad(2)], OperandStack::new());
        assert_eq!(
            stack,
            OperandStack::from(vec![RuntimeInt, RuntimeRef, RuntimeDouble])
        );
    }

    #[test]
    fn ldc_rejects_category_2_constants() {
        let result = apply_effect(&Ldc(Constant::Long(1)), &OperandStack::new());
        assert_eq!(
            result,
            Err(EffectError::TypeMismatch {
                expected: OperandKind::Category1,
                actual: OperandKind::Long,
            })
        );
        let result = apply_effect(&Ldc2(Constant::Integer(1)), &OperandStack::new());
        assert_eq!(
            result,
            Err(EffectError::TypeMismatch {
                expected: OperandKind::Category2,
                actual: OperandKind::Int,
            })
        );
    }

    #[test]
    fn istore_accepts_any_int_like_value() {
        let stack = apply(&[BiPush(6), IStore(1)], OperandStack::new());
        assert!(stack.is_empty());
    }

    #[test]
    fn istore_rejects_a_long() {
        let result = apply_effect(&IStore(1), &OperandStack::from(vec![RuntimeLong]));
        assert_eq!(
            result,
            Err(EffectError::TypeMismatch {
                expected: OperandKind::IntLike,
                actual: OperandKind::Long,
            })
        );
    }

    #[test]
    fn newarray_tracks_the_element_type() {
        let stack = apply(&[IConst2, NewArray(BaseType::Char)], OperandStack::new());
        assert_eq!(stack, OperandStack::from(vec![ArrayRef(BaseType::Char)]));
    }

    #[test]
    fn array_store_consumes_array_index_and_value() {
        let stack = apply(
            &[
                IConst2,
                NewArray(BaseType::Int),
                IConst0,
                BiPush(42),
                IAStore,
            ],
            OperandStack::new(),
        );
        assert!(stack.is_empty());
    }

    #[test]
    fn array_store_element_types_must_agree() {
        let stack = apply(&[IConst1, NewArray(BaseType::Long)], OperandStack::new());
        let stack = apply(&[IConst0, IConst5], stack);
        assert_eq!(
            apply_effect(&IAStore, &stack),
            Err(EffectError::TypeMismatch {
                expected: OperandKind::PrimitiveArray(BaseType::Int),
                actual: OperandKind::PrimitiveArray(BaseType::Long),
            })
        );
    }

    #[test]
    fn bastore_accepts_a_boolean_array() {
        let stack = apply(
            &[
                IConst1,
                NewArray(BaseType::Boolean),
                IConst0,
                IConst1,
                BAStore,
            ],
            OperandStack::new(),
        );
        assert!(stack.is_empty());
    }

    #[test]
    fn pop2_takes_one_category_2_or_two_category_1_operands() {
        let stack = apply(&[LConst0, Pop2], OperandStack::new());
        assert!(stack.is_empty());
        let stack = apply(&[IConst0, IConst1, Pop2], OperandStack::new());
        assert!(stack.is_empty());
    }

    #[test]
    fn dup_rejects_a_category_2_operand() {
        assert_eq!(
            apply_effect(&Dup, &OperandStack::from(vec![RuntimeDouble])),
            Err(EffectError::TypeMismatch {
                expected: OperandKind::Category1,
                actual: OperandKind::Double,
            })
        );
    }

    #[test]
    fn dup_x2_both_forms() {
        // Form 1: three category 1 values
        let stack = OperandStack::from(vec![ConstInt(3), ConstInt(2), ConstInt(1)]);
        assert_eq!(
            apply_effect(&DupX2, &stack).unwrap(),
            OperandStack::from(vec![ConstInt(1), ConstInt(3), ConstInt(2), ConstInt(1)])
        );
        // Form 2: category 1 over category 2
        let stack = OperandStack::from(vec![ConstLong(9), ConstInt(1)]);
        assert_eq!(
            apply_effect(&DupX2, &stack).unwrap(),
            OperandStack::from(vec![ConstInt(1), ConstLong(9), ConstInt(1)])
        );
    }

    #[test]
    fn dup2_x2_duplicates_a_category_2_value_over_two_slots() {
        // The shape used to keep a stored long visible past its lastore
        let stack = OperandStack::from(vec![
            ArrayRef(BaseType::Long),
            ConstInt(0),
            ConstLong(42),
        ]);
        assert_eq!(
            apply_effect(&Dup2X2, &stack).unwrap(),
            OperandStack::from(vec![
                ConstLong(42),
                ArrayRef(BaseType::Long),
                ConstInt(0),
                ConstLong(42),
            ])
        );
    }

    #[test]
    fn swap_exchanges_the_top_two_operands() {
        let stack = apply(&[Swap], OperandStack::from(vec![ConstInt(1), ConstInt(2)]));
        assert_eq!(stack, OperandStack::from(vec![ConstInt(2), ConstInt(1)]));
    }

    #[test]
    fn checkcast_leaves_the_stack_unchanged() {
        let stack = OperandStack::from(vec![RuntimeRef]);
        let after = apply_effect(&CheckCast("java/lang/String".into()), &stack).unwrap();
        assert_eq!(after, stack);
    }

    #[test]
    fn invoke_pops_arguments_and_receiver_and_pushes_the_return() {
        let method = MethodRef {
            owner: "java/lang/String".into(),
            name: "substring".into(),
            descriptor: MethodDescriptor::parse("(II)Ljava/lang/String;").unwrap(),
        };
        let stack = OperandStack::from(vec![RuntimeRef, ConstInt(0), ConstInt(5)]);
        let after = apply_effect(&Invoke(InvokeType::Virtual, method), &stack).unwrap();
        assert_eq!(after, OperandStack::from(vec![RuntimeRef]));
    }

    #[test]
    fn static_invoke_leaves_no_receiver_to_pop() {
        let method = MethodRef {
            owner: "java/lang/Long".into(),
            name: "parseLong".into(),
            descriptor: MethodDescriptor::parse("(Ljava/lang/String;)J").unwrap(),
        };
        let stack = OperandStack::from(vec![RuntimeRef]);
        let after = apply_effect(&Invoke(InvokeType::Static, method), &stack).unwrap();
        assert_eq!(after, OperandStack::from(vec![RuntimeLong]));
    }

    #[test]
    fn getfield_maps_the_descriptor_to_an_operand() {
        let field = crate::jvm::code::FieldRef {
            owner: "com/example/Holder".into(),
            name: "values".into(),
            descriptor: FieldType::array(FieldType::int()),
        };
        let stack = OperandStack::from(vec![RuntimeRef]);
        let after = apply_effect(&GetField(field), &stack).unwrap();
        assert_eq!(after, OperandStack::from(vec![ArrayRef(BaseType::Int)]));
    }

    #[test]
    fn multianewarray_pops_one_count_per_dimension() {
        let descriptor = FieldType::parse("[[Ljava/lang/String;").unwrap();
        let stack = OperandStack::from(vec![ConstInt(2), ConstInt(3)]);
        let after = apply_effect(&MultiANewArray(descriptor, 2), &stack).unwrap();
        assert_eq!(after, OperandStack::from(vec![RefArrayRef]));
    }

    #[test]
    fn underflow_is_reported() {
        assert_eq!(
            apply_effect(&Pop, &OperandStack::new()),
            Err(EffectError::Underflow)
        );
        assert_eq!(
            apply_effect(&IAStore, &OperandStack::from(vec![ConstInt(0)])),
            Err(EffectError::Underflow)
        );
    }

    #[test]
    fn arithmetic_is_not_interpreted() {
        let stack = OperandStack::from(vec![ConstInt(1), ConstInt(2)]);
        assert_eq!(
            apply_effect(&IAdd, &stack),
            Err(EffectError::UnsupportedInstruction)
        );
        assert_eq!(
            apply_effect(&Return, &OperandStack::new()),
            Err(EffectError::UnsupportedInstruction)
        );
    }
}
