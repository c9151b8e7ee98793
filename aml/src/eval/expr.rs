//! Expression opcodes: every operator that yields a `TermArg` value
//! (`spec.md` §4.7).

use std::cmp::Ordering;

use aml_opcode::{Decoder, Opcode};

use crate::{
    data::{new_buffer_ref, new_package_ref, BufferData, Data, PackageData, PackageElementHandle},
    error::{AmlError, AmlResult},
    object::{BufferFieldObject, Object, ObjectKind, ObjectRef},
    state::State,
};

/// Where an expression's (optional) result target points
/// (`spec.md` §4.7 "Target" operand).
pub enum Target {
    None,
    Debug,
    Local(u8),
    Arg(u8),
    /// A resolved `SuperName`: a reference/field-unit/package-element value
    /// to store through, or a plain named object wrapped as a `Reference`.
    Object(Data),
}

fn is_name_lead(decoder: &Decoder<'_>) -> bool {
    matches!(decoder.peek_byte(0), Some(b'\\') | Some(b'^'))
        || decoder
            .peek_byte(0)
            .map(aml_opcode::name::is_lead_name_char)
            .unwrap_or(false)
}

/// Parse a `TargetOrNone`/`SuperName` operand without evaluating it as a
/// value (`spec.md` §4.7).
pub fn parse_target(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Target> {
    if decoder.peek_byte(0) == Some(0x00) {
        decoder.consume_byte()?;
        return Ok(Target::None);
    }
    if is_name_lead(decoder) {
        let name = decoder.consume_name_string()?;
        let node = state.namespace().search(&name)?;
        let obj = node
            .borrow()
            .object
            .borrow()
            .clone()
            .ok_or_else(|| AmlError::NameNotFound(name.to_display_string()))?;
        return Ok(Target::Object(Data::Reference(obj)));
    }
    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::Local(n) => {
            decoder.consume_opcode()?;
            Ok(Target::Local(n))
        }
        Opcode::Arg(n) => {
            decoder.consume_opcode()?;
            Ok(Target::Arg(n))
        }
        Opcode::Debug => {
            decoder.consume_opcode()?;
            Ok(Target::Debug)
        }
        _ => {
            let value = eval_expr(state, decoder)?;
            Ok(Target::Object(value))
        }
    }
}

/// Write `value` through `target` (`spec.md` §4.6 "store").
pub fn store_result(state: &mut State, target: &Target, value: &Data) -> AmlResult<()> {
    match target {
        Target::None => Ok(()),
        Target::Debug => {
            crate::convert::convert_to(state, value, crate::data::AcpiObjectType::DebugObject)?;
            Ok(())
        }
        Target::Local(n) => {
            let mut frame = state
                .method_frames
                .pop()
                .ok_or(AmlError::ReturnOutsideMethod)?;
            crate::method::write_local(state, &mut frame.locals[*n as usize], value.duplicate());
            state.method_frames.push(frame);
            Ok(())
        }
        Target::Arg(n) => {
            let mut frame = state
                .method_frames
                .pop()
                .ok_or(AmlError::ReturnOutsideMethod)?;
            let result = crate::method::write_arg(state, &mut frame.args[*n as usize], value);
            state.method_frames.push(frame);
            result
        }
        Target::Object(data) => crate::convert::store_into_target(state, data, value),
    }
}

fn read_target_value(state: &mut State, target: &Target) -> AmlResult<Data> {
    match target {
        Target::None => Ok(Data::None),
        Target::Debug => Ok(Data::Debug),
        Target::Local(n) => {
            let slot = state
                .current_method_frame()
                .map(|f| f.locals[*n as usize].clone())
                .unwrap_or_default();
            crate::method::read_arg_or_local(state, &slot, true)
        }
        Target::Arg(n) => {
            let slot = state
                .current_method_frame()
                .map(|f| f.args[*n as usize].clone())
                .unwrap_or_default();
            crate::method::read_arg_or_local(state, &slot, true)
        }
        Target::Object(data) => crate::convert::resolve_through_indirection(state, data),
    }
}

fn require_integer(state: &mut State, value: &Data) -> AmlResult<u64> {
    match crate::convert::to_integer(state, value, false)? {
        Data::Integer(i) => Ok(i),
        other => Err(AmlError::WrongType(other.acpi_type())),
    }
}

fn bool_data(state: &State, value: bool) -> Data {
    Data::Integer(if value { state.integer_width().mask() } else { 0 })
}

fn compute_pkg_end(decoder: &Decoder<'_>, pkg: aml_opcode::PkgLength) -> usize {
    (decoder.cursor() - pkg.encoded_bytes as usize) + pkg.total_length as usize
}

/// Read a namespace object's current value by dispatching on its kind
/// (`spec.md` §4.3 "Read through a node", used by plain `NameString`
/// operands and by `DerefOf`/`Local`/`Arg` auto-dereference).
pub fn read_object_value(state: &mut State, obj: &ObjectRef) -> AmlResult<Data> {
    let kind_is_alias = matches!(&obj.borrow().kind, ObjectKind::Alias(_));
    if kind_is_alias {
        let target = match &obj.borrow().kind {
            ObjectKind::Alias(weak) => weak.upgrade(),
            _ => unreachable!(),
        };
        let Some(node) = target else {
            return Err(AmlError::NameNotFound("<stale alias>".to_string()));
        };
        let aliased = node
            .borrow()
            .object
            .borrow()
            .clone()
            .ok_or_else(|| AmlError::NameNotFound(node.borrow().absolute_name.clone()))?;
        return read_object_value(state, &aliased);
    }
    let dispatch = {
        let borrowed = obj.borrow();
        match &borrowed.kind {
            ObjectKind::Name(cell) => return Ok(cell.borrow().clone()),
            ObjectKind::Method(_) => ReadDispatch::Invoke,
            ObjectKind::Field(_) | ObjectKind::BankField(_) | ObjectKind::IndexField(_) | ObjectKind::BufferField(_) => {
                ReadDispatch::Field
            }
            _ => ReadDispatch::SelfReference,
        }
    };
    match dispatch {
        ReadDispatch::Invoke => crate::method::invoke(state, obj, &[]),
        ReadDispatch::Field => crate::field_io::read_field_as_data(state, obj),
        ReadDispatch::SelfReference => Ok(Data::Reference(obj.clone())),
    }
}

enum ReadDispatch {
    Invoke,
    Field,
    SelfReference,
}

/// Evaluate one `TermArg`: a computational-data leaf, a `NameString`
/// reference, an `Arg`/`Local` slot (auto-dereferenced), or an expression
/// opcode (`spec.md` §4.7).
pub fn eval_expr(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    if is_name_lead(decoder) {
        let name = decoder.consume_name_string()?;
        let node = state.namespace().search(&name)?;
        let obj = node
            .borrow()
            .object
            .borrow()
            .clone()
            .ok_or_else(|| AmlError::NameNotFound(name.to_display_string()))?;
        return read_object_value(state, &obj);
    }

    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::Zero => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(0))
        }
        Opcode::One => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(1))
        }
        Opcode::Ones => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(state.integer_width().mask()))
        }
        Opcode::RevisionOf => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(crate::builtins::INTERPRETER_REVISION))
        }
        Opcode::BytePrefix => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(decoder.consume_byte()? as u64))
        }
        Opcode::WordPrefix => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(decoder.consume_word()? as u64))
        }
        Opcode::DWordPrefix => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(decoder.consume_dword()? as u64))
        }
        Opcode::QWordPrefix => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(decoder.consume_qword()?))
        }
        Opcode::StringPrefix => {
            decoder.consume_opcode()?;
            let start = decoder.cursor();
            while decoder.consume_byte()? != 0 {}
            let end = decoder.cursor() - 1;
            let bytes = decoder.data()[start..end].to_vec();
            Ok(Data::String(new_buffer_ref(BufferData::from_bytes(bytes))))
        }
        Opcode::Local(n) => {
            decoder.consume_opcode()?;
            read_local(state, n)
        }
        Opcode::Arg(n) => {
            decoder.consume_opcode()?;
            read_arg(state, n)
        }
        Opcode::Debug => {
            decoder.consume_opcode()?;
            Ok(Data::Debug)
        }
        Opcode::Buffer => eval_buffer(state, decoder),
        Opcode::Package | Opcode::VarPackage => eval_package(state, decoder, op == Opcode::VarPackage),
        Opcode::Store => eval_store(state, decoder),
        Opcode::CopyObject => eval_copy_object(state, decoder),
        Opcode::RefOf => eval_ref_of(state, decoder),
        Opcode::CondRefOf => eval_cond_ref_of(state, decoder),
        Opcode::DerefOf => eval_deref_of(state, decoder),
        Opcode::Index => eval_index(state, decoder),
        Opcode::SizeOf => {
            decoder.consume_opcode()?;
            let target = parse_target(state, decoder)?;
            let value = read_target_value(state, &target)?;
            Ok(Data::Integer(crate::convert::size_of(state, &value)?))
        }
        Opcode::ObjectType => {
            decoder.consume_opcode()?;
            let target = parse_target(state, decoder)?;
            let value = read_target_value(state, &target)?;
            Ok(Data::Integer(crate::convert::object_type_of(&value)))
        }
        Opcode::Add
        | Opcode::Subtract
        | Opcode::Multiply
        | Opcode::ShiftLeft
        | Opcode::ShiftRight
        | Opcode::And
        | Opcode::Nand
        | Opcode::Or
        | Opcode::Nor
        | Opcode::Xor
        | Opcode::Mod => eval_binary(state, decoder, op),
        Opcode::Divide => eval_divide(state, decoder),
        Opcode::Increment | Opcode::Decrement => eval_incr_decr(state, decoder, op),
        Opcode::Not | Opcode::FindSetLeftBit | Opcode::FindSetRightBit => eval_unary(state, decoder, op),
        Opcode::LAnd => {
            decoder.consume_opcode()?;
            let a = require_integer(state, &eval_expr(state, decoder)?)?;
            let b = require_integer(state, &eval_expr(state, decoder)?)?;
            Ok(bool_data(state, a != 0 && b != 0))
        }
        Opcode::LOr => {
            decoder.consume_opcode()?;
            let a = require_integer(state, &eval_expr(state, decoder)?)?;
            let b = require_integer(state, &eval_expr(state, decoder)?)?;
            Ok(bool_data(state, a != 0 || b != 0))
        }
        Opcode::LNot => {
            decoder.consume_opcode()?;
            let a = require_integer(state, &eval_expr(state, decoder)?)?;
            Ok(bool_data(state, a == 0))
        }
        Opcode::LEqual | Opcode::LGreater | Opcode::LLess => {
            decoder.consume_opcode()?;
            let a = eval_expr(state, decoder)?;
            let b = eval_expr(state, decoder)?;
            let ordering = compare_data(state, &a, &b)?;
            let result = match op {
                Opcode::LEqual => ordering == Ordering::Equal,
                Opcode::LGreater => ordering == Ordering::Greater,
                Opcode::LLess => ordering == Ordering::Less,
                _ => unreachable!(),
            };
            Ok(bool_data(state, result))
        }
        Opcode::ToBuffer => {
            decoder.consume_opcode()?;
            let src = eval_expr(state, decoder)?;
            let target = parse_target(state, decoder)?;
            let result = crate::convert::to_buffer(state, &src, true)?;
            store_result(state, &target, &result)?;
            Ok(result)
        }
        Opcode::ToInteger => {
            decoder.consume_opcode()?;
            let src = eval_expr(state, decoder)?;
            let target = parse_target(state, decoder)?;
            let result = crate::convert::to_integer(state, &src, true)?;
            store_result(state, &target, &result)?;
            Ok(result)
        }
        Opcode::ToHexString => {
            decoder.consume_opcode()?;
            let src = eval_expr(state, decoder)?;
            let target = parse_target(state, decoder)?;
            let result = crate::convert::to_hex_string(state, &src)?;
            store_result(state, &target, &result)?;
            Ok(result)
        }
        Opcode::ToDecimalString => {
            decoder.consume_opcode()?;
            let src = eval_expr(state, decoder)?;
            let target = parse_target(state, decoder)?;
            let result = crate::convert::to_decimal_string(state, &src)?;
            store_result(state, &target, &result)?;
            Ok(result)
        }
        Opcode::ToString => eval_to_string(state, decoder),
        Opcode::Mid => eval_mid(state, decoder),
        Opcode::Concat => eval_concat(state, decoder),
        Opcode::ConcatRes => eval_concat_res(state, decoder),
        Opcode::Match => eval_match(state, decoder),
        Opcode::FromBcd => {
            decoder.consume_opcode()?;
            let v = require_integer(state, &eval_expr(state, decoder)?)?;
            let target = parse_target(state, decoder)?;
            let result = Data::Integer(crate::bcd::bcd_to_decimal(v));
            store_result(state, &target, &result)?;
            Ok(result)
        }
        Opcode::ToBcd => {
            decoder.consume_opcode()?;
            let v = require_integer(state, &eval_expr(state, decoder)?)?;
            let target = parse_target(state, decoder)?;
            let result = Data::Integer(crate::bcd::decimal_to_bcd(v));
            store_result(state, &target, &result)?;
            Ok(result)
        }
        Opcode::Timer => {
            decoder.consume_opcode()?;
            Ok(Data::Integer(state.host_mut().monotonic_timer()?))
        }
        Opcode::Acquire => eval_acquire(state, decoder),
        Opcode::Wait => eval_wait(state, decoder),
        Opcode::LoadTable => eval_load_table(state, decoder),
        _ => Err(AmlError::Decoder(aml_opcode::DecodeError::InvalidOpcode(0))),
    }
}

fn read_local(state: &mut State, n: u8) -> AmlResult<Data> {
    let slot = state
        .current_method_frame()
        .map(|f| f.locals[n as usize].clone())
        .unwrap_or_default();
    crate::method::read_arg_or_local(state, &slot, true)
}

fn read_arg(state: &mut State, n: u8) -> AmlResult<Data> {
    let slot = state
        .current_method_frame()
        .map(|f| f.args[n as usize].clone())
        .unwrap_or_default();
    crate::method::read_arg_or_local(state, &slot, true)
}

/// Reads `Local`/`Arg` *without* auto-dereferencing a held `Reference`, for
/// `DerefOf`'s operand (`spec.md` §4.11 "except when the caller is
/// specifically a DerefOf").
fn eval_expr_raw_ref(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::Local(n) => {
            decoder.consume_opcode()?;
            Ok(state
                .current_method_frame()
                .map(|f| f.locals[n as usize].clone())
                .unwrap_or_default())
        }
        Opcode::Arg(n) => {
            decoder.consume_opcode()?;
            Ok(state
                .current_method_frame()
                .map(|f| f.args[n as usize].clone())
                .unwrap_or_default())
        }
        _ => eval_expr(state, decoder),
    }
}

fn eval_buffer(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let size_value = eval_expr(state, decoder)?;
    let size = require_integer(state, &size_value)? as usize;
    let bytes = decoder.data()[decoder.cursor()..body_end].to_vec();
    decoder.set_cursor(body_end);
    let mut buf = BufferData::new(size, size);
    let n = bytes.len().min(size);
    buf.data[..n].copy_from_slice(&bytes[..n]);
    Ok(Data::Buffer(new_buffer_ref(buf)))
}

fn eval_package(state: &mut State, decoder: &mut Decoder<'_>, is_var: bool) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let num_elements = if is_var {
        require_integer(state, &eval_expr(state, decoder)?)? as usize
    } else {
        decoder.consume_byte()? as usize
    };
    let data = PackageData::with_len(num_elements);
    let mut i = 0;
    while decoder.cursor() < body_end && i < num_elements {
        let value = eval_expr(state, decoder)?;
        *data.elements[i].borrow_mut() = value;
        i += 1;
    }
    decoder.set_cursor(body_end);
    Ok(Data::Package(new_package_ref(data)))
}

fn eval_store(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let value = eval_expr(state, decoder)?;
    let target = parse_target(state, decoder)?;
    store_result(state, &target, &value)?;
    Ok(value)
}

fn eval_copy_object(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let value = eval_expr(state, decoder)?;
    let target = parse_target(state, decoder)?;
    let copied = crate::convert::copy_object(state, &value)?;
    store_result(state, &target, &copied)?;
    Ok(copied)
}

fn eval_ref_of(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let target = parse_target(state, decoder)?;
    match target {
        Target::Object(Data::Reference(obj)) => Ok(Data::Reference(obj)),
        Target::Object(other) => Ok(Data::Reference(crate::convert::name_object(other))),
        Target::Local(n) => {
            let value = read_local(state, n)?;
            Ok(Data::Reference(crate::convert::name_object(value)))
        }
        Target::Arg(n) => {
            let value = read_arg(state, n)?;
            Ok(Data::Reference(crate::convert::name_object(value)))
        }
        Target::None | Target::Debug => Err(AmlError::WrongType(crate::data::AcpiObjectType::Uninitialized)),
    }
}

fn eval_cond_ref_of(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let maybe_obj = if is_name_lead(decoder) {
        let name = decoder.consume_name_string()?;
        state
            .namespace()
            .search(&name)
            .ok()
            .and_then(|n| n.borrow().object.borrow().clone())
    } else {
        match parse_target(state, decoder)? {
            Target::Object(Data::Reference(obj)) => Some(obj),
            _ => None,
        }
    };
    let target = parse_target(state, decoder)?;
    match maybe_obj {
        Some(obj) => {
            store_result(state, &target, &Data::Reference(obj))?;
            Ok(bool_data(state, true))
        }
        None => Ok(bool_data(state, false)),
    }
}

fn eval_deref_of(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let operand = eval_expr_raw_ref(state, decoder)?;
    match operand {
        Data::Reference(obj) => read_object_value(state, &obj),
        Data::PackageElement(handle) => {
            if !handle.is_valid() {
                return Err(AmlError::IndexOutOfBounds {
                    index: handle.index,
                    len: handle.package.borrow().element_count() as u64,
                });
            }
            Ok(handle.package.borrow().elements[handle.index as usize].borrow().clone())
        }
        Data::FieldUnit(obj) => crate::field_io::read_field_as_data(state, &obj),
        other => Ok(other),
    }
}

fn eval_index(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let source = eval_expr(state, decoder)?;
    let index = require_integer(state, &eval_expr(state, decoder)?)?;
    let target = parse_target(state, decoder)?;
    let result = match &source {
        Data::Package(pkg) => {
            let len = pkg.borrow().element_count() as u64;
            if index >= len {
                return Err(AmlError::IndexOutOfBounds { index, len });
            }
            Data::PackageElement(PackageElementHandle {
                package: pkg.clone(),
                index,
            })
        }
        Data::Buffer(_) | Data::String(_) => {
            let obj = Object::new(ObjectKind::BufferField(BufferFieldObject {
                bit_offset: index * 8,
                bit_count: 8,
                source: source.clone(),
            }));
            Data::Reference(obj)
        }
        other => return Err(AmlError::WrongType(other.acpi_type())),
    };
    store_result(state, &target, &result)?;
    Ok(result)
}

fn eval_binary(state: &mut State, decoder: &mut Decoder<'_>, op: Opcode) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let a = require_integer(state, &eval_expr(state, decoder)?)?;
    let b = require_integer(state, &eval_expr(state, decoder)?)?;
    let target = parse_target(state, decoder)?;
    let mask = state.integer_width().mask();
    let raw = match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Subtract => a.wrapping_sub(b),
        Opcode::Multiply => a.wrapping_mul(b),
        Opcode::ShiftLeft => {
            if b >= 64 {
                0
            } else {
                a.wrapping_shl(b as u32)
            }
        }
        Opcode::ShiftRight => {
            if b >= 64 {
                0
            } else {
                a.wrapping_shr(b as u32)
            }
        }
        Opcode::And => a & b,
        Opcode::Nand => !(a & b),
        Opcode::Or => a | b,
        Opcode::Nor => !(a | b),
        Opcode::Xor => a ^ b,
        Opcode::Mod => {
            if b == 0 {
                return Err(AmlError::ModuloByZero);
            }
            a % b
        }
        _ => unreachable!("eval_binary called with non-binary opcode"),
    } & mask;
    store_result(state, &target, &Data::Integer(raw))?;
    Ok(Data::Integer(raw))
}

fn eval_divide(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let dividend = require_integer(state, &eval_expr(state, decoder)?)?;
    let divisor = require_integer(state, &eval_expr(state, decoder)?)?;
    let remainder_target = parse_target(state, decoder)?;
    let quotient_target = parse_target(state, decoder)?;
    if divisor == 0 {
        return Err(AmlError::DivideByZero);
    }
    let mask = state.integer_width().mask();
    let quotient = (dividend / divisor) & mask;
    let remainder = (dividend % divisor) & mask;
    store_result(state, &remainder_target, &Data::Integer(remainder))?;
    store_result(state, &quotient_target, &Data::Integer(quotient))?;
    Ok(Data::Integer(quotient))
}

fn eval_incr_decr(state: &mut State, decoder: &mut Decoder<'_>, op: Opcode) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let target = parse_target(state, decoder)?;
    let current = require_integer(state, &read_target_value(state, &target)?)?;
    let mask = state.integer_width().mask();
    let result = if op == Opcode::Increment {
        current.wrapping_add(1) & mask
    } else {
        current.wrapping_sub(1) & mask
    };
    store_result(state, &target, &Data::Integer(result))?;
    Ok(Data::Integer(result))
}

fn eval_unary(state: &mut State, decoder: &mut Decoder<'_>, op: Opcode) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let a = require_integer(state, &eval_expr(state, decoder)?)?;
    let target = parse_target(state, decoder)?;
    let mask = state.integer_width().mask();
    let raw = match op {
        Opcode::Not => (!a) & mask,
        Opcode::FindSetLeftBit => {
            if a == 0 {
                0
            } else {
                (64 - a.leading_zeros()) as u64
            }
        }
        Opcode::FindSetRightBit => {
            if a == 0 {
                0
            } else {
                (a.trailing_zeros() + 1) as u64
            }
        }
        _ => unreachable!("eval_unary called with non-unary opcode"),
    };
    store_result(state, &target, &Data::Integer(raw))?;
    Ok(Data::Integer(raw))
}

fn compare_data(state: &mut State, a: &Data, b: &Data) -> AmlResult<Ordering> {
    let a = crate::convert::resolve_through_indirection(state, a)?;
    let b = crate::convert::resolve_through_indirection(state, b)?;
    if matches!(a, Data::String(_)) || matches!(b, Data::String(_)) {
        let Data::String(sa) = crate::convert::to_string(state, &a, false)? else {
            unreachable!()
        };
        let Data::String(sb) = crate::convert::to_string(state, &b, false)? else {
            unreachable!()
        };
        return Ok(sa.borrow().as_slice().cmp(sb.borrow().as_slice()));
    }
    if matches!(a, Data::Buffer(_)) || matches!(b, Data::Buffer(_)) {
        let Data::Buffer(ba) = crate::convert::to_buffer(state, &a, false)? else {
            unreachable!()
        };
        let Data::Buffer(bb) = crate::convert::to_buffer(state, &b, false)? else {
            unreachable!()
        };
        return Ok(ba.borrow().as_slice().cmp(bb.borrow().as_slice()));
    }
    let ia = require_integer(state, &a)?;
    let ib = require_integer(state, &b)?;
    Ok(ia.cmp(&ib))
}

fn eval_to_string(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let src = eval_expr(state, decoder)?;
    let length_marker = eval_expr(state, decoder)?;
    let target = parse_target(state, decoder)?;
    let length_value = require_integer(state, &length_marker)?;
    let result = match &src {
        Data::Buffer(b) => {
            let data = b.borrow();
            let full = data.as_slice();
            let nul_stop = full.iter().position(|&c| c == 0).unwrap_or(full.len());
            let limit = if length_value == state.integer_width().mask() {
                nul_stop
            } else {
                nul_stop.min(length_value as usize)
            };
            Data::String(new_buffer_ref(BufferData::from_bytes(full[..limit].to_vec())))
        }
        other => crate::convert::to_string(state, other, false)?,
    };
    store_result(state, &target, &result)?;
    Ok(result)
}

fn eval_mid(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let src = eval_expr(state, decoder)?;
    let index = require_integer(state, &eval_expr(state, decoder)?)? as usize;
    let length = require_integer(state, &eval_expr(state, decoder)?)? as usize;
    let target = parse_target(state, decoder)?;
    let result = match &src {
        Data::String(b) => {
            let data = b.borrow();
            let start = index.min(data.size);
            let end = (index + length).min(data.size);
            Data::String(new_buffer_ref(BufferData::from_bytes(data.as_slice()[start..end].to_vec())))
        }
        Data::Buffer(b) => {
            let data = b.borrow();
            let start = index.min(data.size);
            let end = (index + length).min(data.size);
            Data::Buffer(new_buffer_ref(BufferData::from_bytes(data.as_slice()[start..end].to_vec())))
        }
        other => return Err(AmlError::WrongType(other.acpi_type())),
    };
    store_result(state, &target, &result)?;
    Ok(result)
}

fn concat_values(state: &mut State, a: &Data, b: &Data) -> AmlResult<Data> {
    if matches!(a, Data::String(_)) || matches!(b, Data::String(_)) {
        let Data::String(sa) = crate::convert::to_string(state, a, false)? else {
            unreachable!()
        };
        let Data::String(sb) = crate::convert::to_string(state, b, false)? else {
            unreachable!()
        };
        let mut bytes = sa.borrow().as_slice().to_vec();
        bytes.extend_from_slice(sb.borrow().as_slice());
        return Ok(Data::String(new_buffer_ref(BufferData::from_bytes(bytes))));
    }
    let Data::Buffer(ba) = crate::convert::to_buffer(state, a, false)? else {
        unreachable!()
    };
    let Data::Buffer(bb) = crate::convert::to_buffer(state, b, false)? else {
        unreachable!()
    };
    let mut bytes = ba.borrow().as_slice().to_vec();
    bytes.extend_from_slice(bb.borrow().as_slice());
    Ok(Data::Buffer(new_buffer_ref(BufferData::from_bytes(bytes))))
}

fn eval_concat(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let a = eval_expr(state, decoder)?;
    let b = eval_expr(state, decoder)?;
    let target = parse_target(state, decoder)?;
    let result = concat_values(state, &a, &b)?;
    store_result(state, &target, &result)?;
    Ok(result)
}

/// `ConcatRes` (`spec.md` §4.7): like `Concat` over two resource-template
/// buffers, but the first buffer's trailing End Tag (2 bytes) is dropped so
/// the merged buffer ends with exactly one.
fn eval_concat_res(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let a = eval_expr(state, decoder)?;
    let b = eval_expr(state, decoder)?;
    let target = parse_target(state, decoder)?;
    let Data::Buffer(ba) = crate::convert::to_buffer(state, &a, false)? else {
        unreachable!()
    };
    let Data::Buffer(bb) = crate::convert::to_buffer(state, &b, false)? else {
        unreachable!()
    };
    let mut bytes = ba.borrow().as_slice().to_vec();
    bytes.truncate(bytes.len().saturating_sub(2));
    bytes.extend_from_slice(bb.borrow().as_slice());
    let result = Data::Buffer(new_buffer_ref(BufferData::from_bytes(bytes)));
    store_result(state, &target, &result)?;
    Ok(result)
}

fn match_test(code: u8, a: u64, b: u64) -> bool {
    match code {
        0 => true,
        1 => a == b,
        2 => a <= b,
        3 => a < b,
        4 => a >= b,
        5 => a > b,
        _ => false,
    }
}

fn eval_match(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let pkg_value = eval_expr(state, decoder)?;
    let op1 = decoder.consume_byte()?;
    let v1 = require_integer(state, &eval_expr(state, decoder)?)?;
    let op2 = decoder.consume_byte()?;
    let v2 = require_integer(state, &eval_expr(state, decoder)?)?;
    let start = require_integer(state, &eval_expr(state, decoder)?)? as usize;
    let Data::Package(pkg) = pkg_value else {
        return Err(AmlError::WrongType(pkg_value.acpi_type()));
    };
    let len = pkg.borrow().element_count();
    let mut found = None;
    for i in start..len {
        let elem = pkg.borrow().elements[i].borrow().clone();
        let Ok(elem_int) = require_integer(state, &elem) else {
            continue;
        };
        if match_test(op1, elem_int, v1) && match_test(op2, elem_int, v2) {
            found = Some(i as u64);
            break;
        }
    }
    Ok(Data::Integer(found.unwrap_or(state.integer_width().mask())))
}

pub(crate) fn mutex_handle_of(state: &mut State, obj: &ObjectRef) -> AmlResult<u64> {
    let existing = match &obj.borrow().kind {
        ObjectKind::Mutex(m) => m.handle.get(),
        other => return Err(AmlError::WrongType(other.acpi_type())),
    };
    if let Some(h) = existing {
        return Ok(h);
    }
    let h = state.host_mut().mutex_create()?;
    if let ObjectKind::Mutex(m) = &obj.borrow().kind {
        m.handle.set(Some(h));
    }
    Ok(h)
}

pub(crate) fn event_handle_of(state: &mut State, obj: &ObjectRef) -> AmlResult<u64> {
    let existing = match &obj.borrow().kind {
        ObjectKind::Event(e) => e.handle.get(),
        other => return Err(AmlError::WrongType(other.acpi_type())),
    };
    if let Some(h) = existing {
        return Ok(h);
    }
    let h = state.host_mut().event_create()?;
    if let ObjectKind::Event(e) = &obj.borrow().kind {
        e.handle.set(Some(h));
    }
    Ok(h)
}

fn eval_acquire(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let target = parse_target(state, decoder)?;
    let timeout = decoder.consume_word()?;
    let Target::Object(Data::Reference(obj)) = target else {
        return Err(AmlError::WrongType(crate::data::AcpiObjectType::Mutex));
    };
    let handle = mutex_handle_of(state, &obj)?;
    let timed_out = state.host_mut().mutex_acquire(handle, timeout)?;
    if !timed_out {
        if let Some(frame) = state.current_method_frame_mut() {
            frame.record_mutex_acquire(handle);
        }
    }
    Ok(bool_data(state, timed_out))
}

fn eval_wait(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let target = parse_target(state, decoder)?;
    let timeout = decoder.consume_word()?;
    let Target::Object(Data::Reference(obj)) = target else {
        return Err(AmlError::WrongType(crate::data::AcpiObjectType::Event));
    };
    let handle = event_handle_of(state, &obj)?;
    let timed_out = state.host_mut().event_await(handle, timeout)?;
    Ok(bool_data(state, timed_out))
}

fn to_fixed_ascii<const N: usize>(state: &mut State, value: &Data) -> AmlResult<[u8; N]> {
    let Data::String(s) = crate::convert::to_string(state, value, false)? else {
        unreachable!()
    };
    let mut out = [0u8; N];
    let bytes = s.borrow();
    let n = bytes.size.min(N);
    out[..n].copy_from_slice(&bytes.as_slice()[..n]);
    Ok(out)
}

/// `LoadTable` (`spec.md` §4.7, §8 scenario 6): ask the host to find a
/// matching table and, if found, load it through the normal two-pass path
/// under `\` (`root` only selects where `parameter_path` is resolved
/// relative to; the definition block's own absolute names are unaffected),
/// then — if `parameter_path` names an existing object — store
/// `parameter_data` into it. Returns the canonical AML boolean `Ones` on
/// success, `Zero` on a miss, exactly like every other "did this succeed"
/// expression opcode (`spec.md` §8 "the `LoadTable` return value is `Ones`").
fn eval_load_table(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Data> {
    decoder.consume_opcode()?;
    let sig = eval_expr(state, decoder)?;
    let oem_id = eval_expr(state, decoder)?;
    let oem_table_id = eval_expr(state, decoder)?;
    let root_path = eval_expr(state, decoder)?;
    let parameter_path = eval_expr(state, decoder)?;
    let parameter_data = eval_expr(state, decoder)?;

    let sig = to_fixed_ascii::<4>(state, &sig)?;
    let oem_id = to_fixed_ascii::<6>(state, &oem_id)?;
    let oem_table_id = to_fixed_ascii::<8>(state, &oem_table_id)?;
    let found = state.host_mut().search_acpi_table(sig, oem_id, oem_table_id)?;
    let Some(table) = found else {
        return Ok(Data::Integer(0));
    };
    let bytes = (*table.bytes).clone();
    state.load_table(bytes)?;

    let Data::String(path) = crate::convert::to_string(state, &parameter_path, false)? else {
        unreachable!("to_string always returns Data::String");
    };
    let path_text = std::str::from_utf8(path.borrow().as_slice()).unwrap_or("").to_string();
    if !path_text.is_empty() {
        let Data::String(root) = crate::convert::to_string(state, &root_path, false)? else {
            unreachable!("to_string always returns Data::String");
        };
        let root_text = std::str::from_utf8(root.borrow().as_slice()).unwrap_or("\\").to_string();
        let full_path = if path_text.starts_with('\\') || path_text.starts_with('^') {
            path_text
        } else {
            format!("{}.{}", root_text.trim_end_matches('\\'), path_text)
        };
        let name = aml_opcode::Decoder::new(full_path.as_bytes())
            .consume_name_string()
            .map_err(AmlError::Decoder)?;
        if let Ok(node) = state.namespace().search(&name) {
            let obj = node.borrow().object.borrow().clone();
            if let Some(obj) = obj {
                crate::convert::store_into_object(state, &obj, &parameter_data)?;
            }
        }
    }

    Ok(bool_data(state, true))
}
