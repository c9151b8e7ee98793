//! Named-object definition opcodes (`spec.md` §4.9) and the two-pass
//! definition-block driver `state::State::load_table` calls into.
//!
//! Every opcode here parses its operands unconditionally, regardless of
//! pass, so the decoder always ends up in the same place either way; only
//! the namespace node creation itself is gated on `pass == Pass::Namespace`
//! (re-creating an already-parsed node on the full pass would collide).
//! `Method` and `Name` (the latter in `eval::modifiers`) are the two
//! exceptions that defer real evaluation to the full pass, since their
//! bodies/values are exactly the things the two-pass split exists to let
//! forward-reference.

use std::{cell::Cell, rc::Rc};

use aml_opcode::{Decoder, FieldFlags, MethodFlags, NamePrefix, NameSeg, NameString, Opcode, ScopeFlags};

use crate::{
    data::Data,
    error::{AmlError, AmlResult},
    eval::{
        expr,
        termlist::{eval_term_list, Pass},
    },
    field_io,
    namespace::CreateMode,
    object::{
        DeviceObject, EventObject, FieldElement, MethodBody, MethodObject, MutexObject, Object,
        ObjectKind, ObjectRef, OperationRegionObject, PowerResourceObject, ProcessorObject,
    },
    region::RegionSpace,
    state::State,
};

fn compute_pkg_end(decoder: &Decoder<'_>, pkg: aml_opcode::PkgLength) -> usize {
    (decoder.cursor() - pkg.encoded_bytes as usize) + pkg.total_length as usize
}

fn require_integer(state: &mut State, value: &Data) -> AmlResult<u64> {
    match crate::convert::to_integer(state, value, false)? {
        Data::Integer(i) => Ok(i),
        other => Err(AmlError::WrongType(other.acpi_type())),
    }
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

fn single_seg_name(seg: NameSeg) -> NameString {
    NameString {
        prefix: NamePrefix::NONE,
        segments: vec![seg],
    }
}

fn resolve_existing(state: &State, name: &NameString) -> AmlResult<ObjectRef> {
    let node = state.namespace().search(name)?;
    let obj = node.borrow().object.borrow().clone();
    obj.ok_or_else(|| AmlError::NameNotFound(name.to_display_string()))
}

fn current_table(state: &State) -> Rc<Vec<u8>> {
    state
        .tables
        .last()
        .expect("named-object eval only runs while a table load is in progress")
        .clone()
}

/// `spec.md` §2 "Control flow", first pass: discover every named object
/// without evaluating operand expressions or running conditionals.
pub fn run_namespace_pass(state: &mut State, table: &Rc<Vec<u8>>) -> AmlResult<()> {
    let decoder = Decoder::new(table.as_slice());
    eval_term_list(state, decoder, Pass::Namespace)
}

/// `spec.md` §2 "Control flow", second pass: the real evaluation, in the
/// same textual order.
pub fn run_full_pass(state: &mut State, table: &Rc<Vec<u8>>) -> AmlResult<()> {
    let decoder = Decoder::new(table.as_slice());
    eval_term_list(state, decoder, Pass::Full)
}

pub fn eval(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::Method => eval_method(state, decoder, pass),
        Opcode::Device => eval_scope_like(state, decoder, pass, |_| Ok(ObjectKind::Device(DeviceObject::default()))),
        Opcode::ThermalZone => eval_scope_like(state, decoder, pass, |_| Ok(ObjectKind::ThermalZone)),
        Opcode::Processor => eval_scope_like(state, decoder, pass, |d| {
            let proc_id = d.consume_byte()?;
            let pblk_addr = d.consume_dword()?;
            let pblk_len = d.consume_byte()?;
            Ok(ObjectKind::Processor(ProcessorObject { proc_id, pblk_addr, pblk_len }))
        }),
        Opcode::PowerRes => eval_scope_like(state, decoder, pass, |d| {
            let system_level = d.consume_byte()?;
            let resource_order = d.consume_word()?;
            Ok(ObjectKind::PowerResource(PowerResourceObject { system_level, resource_order }))
        }),
        Opcode::OpRegion => eval_op_region(state, decoder, pass),
        Opcode::DataRegion => eval_data_region(state, decoder, pass),
        Opcode::Event => eval_event(state, decoder, pass),
        Opcode::Mutex => eval_mutex(state, decoder, pass),
        Opcode::Field => eval_field(state, decoder, pass),
        Opcode::BankField => eval_bank_field(state, decoder, pass),
        Opcode::IndexField => eval_index_field(state, decoder, pass),
        Opcode::CreateBitField => eval_create_fixed_field(state, decoder, pass, 1),
        Opcode::CreateByteField => eval_create_fixed_field(state, decoder, pass, 8),
        Opcode::CreateWordField => eval_create_fixed_field(state, decoder, pass, 16),
        Opcode::CreateDWordField => eval_create_fixed_field(state, decoder, pass, 32),
        Opcode::CreateQWordField => eval_create_fixed_field(state, decoder, pass, 64),
        Opcode::CreateField => eval_create_field(state, decoder, pass),
        Opcode::External => eval_external(decoder),
        other => unreachable!("named::eval called with non-named-object opcode {other:?}"),
    }
}

/// Shared shape for `Device`/`Processor`/`PowerRes`/`ThermalZone`
/// (`spec.md` §4.9): `Op PkgLength NameString <extra fixed fields> ObjectList`.
/// `parse_extra` both consumes the kind-specific fixed fields (so the
/// decoder lands in the same place on either pass) and builds the payload
/// used only when this is the namespace pass.
fn eval_scope_like(
    state: &mut State,
    decoder: &mut Decoder<'_>,
    pass: Pass,
    parse_extra: impl FnOnce(&mut Decoder<'_>) -> AmlResult<ObjectKind>,
) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let name = decoder.consume_name_string()?;
    let kind = parse_extra(decoder)?;
    let body_start = decoder.cursor();
    decoder.set_cursor(body_end);

    let absolute = match pass {
        Pass::Namespace => {
            let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
            state.namespace().bind(&node, Object::new(kind));
            node.borrow().is_pre_parsed.set(true);
            node.borrow().absolute_name.clone()
        }
        Pass::Full => {
            let node = state.namespace().search(&name)?;
            node.borrow().is_evaluated.set(true);
            node.borrow().absolute_name.clone()
        }
    };

    state.namespace_mut().push_absolute_scope(absolute, ScopeFlags::empty());
    let window = decoder.sub_window(body_start, body_end - body_start)?;
    let result = eval_term_list(state, window, pass);
    state.namespace_mut().pop_scope();
    result
}

/// `DefMethod := MethodOp PkgLength NameString MethodFlags TermList`
/// (`spec.md` §4.9 "Method"): the body is never walked during load on
/// either pass, only recorded as a byte span invoked later
/// (`spec.md` §4.11).
fn eval_method(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let name = decoder.consume_name_string()?;
    let flags = MethodFlags(decoder.consume_byte()?);
    let body_start = decoder.cursor();
    decoder.set_cursor(body_end);

    if pass == Pass::Namespace {
        let table = current_table(state);
        let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
        let obj = Object::new(ObjectKind::Method(MethodObject {
            arg_count: flags.arg_count(),
            serialized: flags.is_serialized(),
            sync_level: flags.sync_level(),
            body: MethodBody::Bytecode { table, start: body_start, end: body_end },
        }));
        state.namespace().bind(&node, obj);
        node.borrow().is_pre_parsed.set(true);
        node.borrow().is_evaluated.set(true);
    }
    Ok(())
}

/// `DefOpRegion := OpRegionOp NameString RegionSpace RegionOffset RegionLen`
/// (`spec.md` §4.9 "OperationRegion"): unlike most named objects this one
/// carries no `PkgLength` — there is nothing nested inside it.
fn eval_op_region(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let name = decoder.consume_name_string()?;
    let space = RegionSpace::from_byte(decoder.consume_byte()?);
    let offset = require_integer(state, &expr::eval_expr(state, decoder)?)?;
    let length = require_integer(state, &expr::eval_expr(state, decoder)?)?;

    if pass == Pass::Namespace {
        let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
        let obj = Object::new(ObjectKind::OperationRegion(OperationRegionObject {
            space,
            offset,
            length,
            mapped_cookie: Cell::new(None),
        }));
        state.namespace().bind(&node, obj);
        node.borrow().is_pre_parsed.set(true);
        node.borrow().is_evaluated.set(true);
    }
    Ok(())
}

/// `DefDataRegion := DataRegionOp NameString TermArg TermArg TermArg`
/// (`spec.md` §4.9 "OperationRegion" variant): the region's contents are
/// the named ACPI table itself, found through the same host lookup
/// `LoadTable` uses. There is no dedicated wire-level address space for
/// "table data"; a host that wants field access against one of these
/// registers a handler for `RegionSpace::Oem(0xFF)` (documented in
/// `DESIGN.md`).
fn eval_data_region(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let name = decoder.consume_name_string()?;
    let sig = expr::eval_expr(state, decoder)?;
    let oem_id = expr::eval_expr(state, decoder)?;
    let oem_table_id = expr::eval_expr(state, decoder)?;

    if pass == Pass::Namespace {
        let sig = to_fixed_ascii::<4>(state, &sig)?;
        let oem_id = to_fixed_ascii::<6>(state, &oem_id)?;
        let oem_table_id = to_fixed_ascii::<8>(state, &oem_table_id)?;
        let found = state.host_mut().search_acpi_table(sig, oem_id, oem_table_id)?;
        let length = found.as_ref().map(|f| f.bytes.len() as u64).unwrap_or(0);
        let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
        let obj = Object::new(ObjectKind::DataRegion(OperationRegionObject {
            space: RegionSpace::Oem(0xFF),
            offset: 0,
            length,
            mapped_cookie: Cell::new(None),
        }));
        state.namespace().bind(&node, obj);
        node.borrow().is_pre_parsed.set(true);
        node.borrow().is_evaluated.set(true);
    }
    Ok(())
}

fn eval_event(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let name = decoder.consume_name_string()?;
    if pass == Pass::Namespace {
        let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
        state.namespace().bind(&node, Object::new(ObjectKind::Event(EventObject::default())));
        node.borrow().is_pre_parsed.set(true);
        node.borrow().is_evaluated.set(true);
    }
    Ok(())
}

/// `DefMutex := MutexOp NameString SyncFlags` (`spec.md` §4.9 "Mutex"):
/// only the low nibble of `SyncFlags` is defined (`SyncLevel`).
fn eval_mutex(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let name = decoder.consume_name_string()?;
    let sync_flags = decoder.consume_byte()?;
    if pass == Pass::Namespace {
        let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
        let obj = Object::new(ObjectKind::Mutex(MutexObject {
            sync_level: sync_flags & 0x0F,
            handle: Cell::new(None),
        }));
        state.namespace().bind(&node, obj);
        node.borrow().is_pre_parsed.set(true);
        node.borrow().is_evaluated.set(true);
    }
    Ok(())
}

struct FieldListItem {
    name: NameSeg,
    element: FieldElement,
}

/// `FieldList` (`spec.md` §4.9 "Field"): a run of `NamedField`/
/// `ReservedField`/`AccessField`/`ExtendedAccessField`/`ConnectField`
/// entries back to back until `body_end`, each `NamedField` claiming the
/// next `bit_count` bits of the running offset. Control-byte tags
/// (`0x00-0x03`) can't collide with a `NameSeg`'s lead byte (which must be
/// `_`/`A-Z`), so a bare peek distinguishes them.
fn parse_field_list(
    state: &mut State,
    decoder: &mut Decoder<'_>,
    body_end: usize,
    initial_flags: FieldFlags,
) -> AmlResult<Vec<FieldListItem>> {
    let mut items = Vec::new();
    let mut bit_offset: u64 = 0;
    let mut flags = initial_flags;
    let mut access_attrib: u8 = 0;
    let mut access_byte_len: u8 = 0;
    let mut connection: Option<Vec<u8>> = None;

    while decoder.cursor() < body_end {
        let Some(tag) = decoder.peek_byte(0) else {
            return Err(AmlError::Decoder(aml_opcode::DecodeError::UnexpectedEnd(decoder.cursor())));
        };
        match tag {
            aml_opcode::consts::FIELD_ELEMENT_RESERVED => {
                decoder.consume_byte()?;
                let pkg = decoder.consume_pkg_length()?;
                bit_offset += pkg.total_length as u64;
            }
            aml_opcode::consts::FIELD_ELEMENT_ACCESS => {
                decoder.consume_byte()?;
                let access_type_byte = decoder.consume_byte()?;
                access_attrib = decoder.consume_byte()?;
                flags = FieldFlags((flags.0 & !0x0F) | (access_type_byte & 0x0F));
            }
            aml_opcode::consts::FIELD_ELEMENT_CONNECT => {
                decoder.consume_byte()?;
                connection = Some(parse_connect_payload(state, decoder)?);
            }
            aml_opcode::consts::FIELD_ELEMENT_EXTENDED_ACCESS => {
                decoder.consume_byte()?;
                let access_type_byte = decoder.consume_byte()?;
                access_attrib = decoder.consume_byte()?;
                access_byte_len = decoder.consume_byte()?;
                flags = FieldFlags((flags.0 & !0x0F) | (access_type_byte & 0x0F));
            }
            _ => {
                let seg = decoder.consume_name_seg()?;
                let pkg = decoder.consume_pkg_length()?;
                let bit_count = pkg.total_length as u64;
                items.push(FieldListItem {
                    name: seg,
                    element: FieldElement {
                        bit_offset,
                        bit_count,
                        flags,
                        access_attrib,
                        access_byte_len,
                        connection: connection.clone(),
                    },
                });
                bit_offset += bit_count;
            }
        }
    }
    Ok(items)
}

/// `ConnectField := <0x02 NameString> | <0x02 BufferData>` (`spec.md` §4.9
/// "Field", `SPEC_FULL.md` GenericSerialBus connection resources): resolve
/// either form down to the raw resource-descriptor bytes.
fn parse_connect_payload(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<Vec<u8>> {
    let (op, _) = decoder.peek_opcode()?;
    let value = if op == Opcode::Buffer {
        expr::eval_expr(state, decoder)?
    } else {
        let name = decoder.consume_name_string()?;
        let obj = resolve_existing(state, &name)?;
        expr::read_object_value(state, &obj)?
    };
    let Data::Buffer(b) = crate::convert::to_buffer(state, &value, false)? else {
        unreachable!("to_buffer always returns Data::Buffer")
    };
    Ok(b.borrow().as_slice().to_vec())
}

/// `DefField := FieldOp PkgLength NameString FieldFlags FieldList`
/// (`spec.md` §4.9 "Field"): each `NamedField` becomes its own namespace
/// node, as a sibling in the current scope, not nested under a node for
/// the `Field()` construct itself (there is no such node).
fn eval_field(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let region_name = decoder.consume_name_string()?;
    let flags = FieldFlags(decoder.consume_byte()?);
    let items = parse_field_list(state, decoder, body_end, flags)?;
    decoder.set_cursor(body_end);

    if pass == Pass::Namespace {
        let region_obj = resolve_existing(state, &region_name)?;
        for item in items {
            let name = single_seg_name(item.name);
            let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
            let obj = Object::new(ObjectKind::Field(field_io::new_field_object(region_obj.clone(), item.element)));
            state.namespace().bind(&node, obj);
            node.borrow().is_pre_parsed.set(true);
            node.borrow().is_evaluated.set(true);
        }
    }
    Ok(())
}

/// `DefBankField := BankFieldOp PkgLength NameString NameString BankValue
/// FieldFlags FieldList` (`spec.md` §4.9 "BankField").
fn eval_bank_field(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let region_name = decoder.consume_name_string()?;
    let bank_name = decoder.consume_name_string()?;
    let bank_value = require_integer(state, &expr::eval_expr(state, decoder)?)?;
    let flags = FieldFlags(decoder.consume_byte()?);
    let items = parse_field_list(state, decoder, body_end, flags)?;
    decoder.set_cursor(body_end);

    if pass == Pass::Namespace {
        let region_obj = resolve_existing(state, &region_name)?;
        let bank_obj = resolve_existing(state, &bank_name)?;
        for item in items {
            let name = single_seg_name(item.name);
            let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
            let obj = Object::new(ObjectKind::BankField(field_io::new_bank_field_object(
                region_obj.clone(),
                bank_obj.clone(),
                bank_value,
                item.element,
            )));
            state.namespace().bind(&node, obj);
            node.borrow().is_pre_parsed.set(true);
            node.borrow().is_evaluated.set(true);
        }
    }
    Ok(())
}

/// `DefIndexField := IndexFieldOp PkgLength NameString NameString
/// FieldFlags FieldList` (`spec.md` §4.9 "IndexField").
fn eval_index_field(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let index_name = decoder.consume_name_string()?;
    let data_name = decoder.consume_name_string()?;
    let flags = FieldFlags(decoder.consume_byte()?);
    let items = parse_field_list(state, decoder, body_end, flags)?;
    decoder.set_cursor(body_end);

    if pass == Pass::Namespace {
        let index_obj = resolve_existing(state, &index_name)?;
        let data_obj = resolve_existing(state, &data_name)?;
        for item in items {
            let name = single_seg_name(item.name);
            let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
            let obj = Object::new(ObjectKind::IndexField(field_io::new_index_field_object(
                index_obj.clone(),
                data_obj.clone(),
                item.element,
            )));
            state.namespace().bind(&node, obj);
            node.borrow().is_pre_parsed.set(true);
            node.borrow().is_evaluated.set(true);
        }
    }
    Ok(())
}

/// `DefCreateBitField`/`ByteField`/`WordField`/`DWordField`/`QWordField`
/// (`spec.md` §4.9 "BufferField"): all five share `Op SourceBuf Index
/// NameString`, differing only in the fixed bit width and whether `Index`
/// counts bits (`CreateBitField`) or bytes (everything else).
fn eval_create_fixed_field(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass, width_bits: u64) -> AmlResult<()> {
    decoder.consume_opcode()?;
    if pass == Pass::Namespace {
        // `source`/`index` are not evaluated here: the source operand is
        // typically a `Name` whose value is only bound during the full
        // pass, so the node (and its `source` capture) is built there
        // instead, after every operand can resolve to a real value.
        decoder.skip_term_arg_span()?;
        decoder.skip_term_arg_span()?;
        let _name = decoder.consume_name_string()?;
        return Ok(());
    }
    let source = expr::eval_expr(state, decoder)?;
    let index = require_integer(state, &expr::eval_expr(state, decoder)?)?;
    let name = decoder.consume_name_string()?;

    let bit_offset = if width_bits == 1 { index } else { index * 8 };
    let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
    let obj = Object::new(ObjectKind::BufferField(field_io::create_buffer_field(source, bit_offset, width_bits)));
    state.namespace().bind(&node, obj);
    node.borrow().is_pre_parsed.set(true);
    node.borrow().is_evaluated.set(true);
    Ok(())
}

/// `DefCreateField := CreateFieldOp SourceBuf BitIndex NumBits NameString`
/// (`spec.md` §4.9 "BufferField"): the only one of the five with a
/// caller-chosen width.
fn eval_create_field(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    if pass == Pass::Namespace {
        // See `eval_create_fixed_field`: deferred to the full pass so
        // `source` captures a real value instead of `Data::None`.
        decoder.skip_term_arg_span()?;
        decoder.skip_term_arg_span()?;
        decoder.skip_term_arg_span()?;
        let _name = decoder.consume_name_string()?;
        return Ok(());
    }
    let source = expr::eval_expr(state, decoder)?;
    let bit_index = require_integer(state, &expr::eval_expr(state, decoder)?)?;
    let num_bits = require_integer(state, &expr::eval_expr(state, decoder)?)?;
    let name = decoder.consume_name_string()?;

    let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
    let obj = Object::new(ObjectKind::BufferField(field_io::create_buffer_field(source, bit_index, num_bits)));
    state.namespace().bind(&node, obj);
    node.borrow().is_pre_parsed.set(true);
    node.borrow().is_evaluated.set(true);
    Ok(())
}

/// `DefExternal := ExternalOp NameString ObjectType ArgumentCount`
/// (`spec.md` §4.9 "External"): a forward-declaration hint for objects
/// defined in another table. Nothing to bind at runtime; just consume the
/// fixed-shape operands so the decoder lands correctly.
fn eval_external(decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let _name = decoder.consume_name_string()?;
    let _object_type = decoder.consume_byte()?;
    let _argument_count = decoder.consume_byte()?;
    Ok(())
}
