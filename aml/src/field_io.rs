//! Field and operation-region I/O (`spec.md` §4.5).

use aml_opcode::{AccessType, LockRule, UpdateRule};

use crate::{
    bits::copy_bits,
    data::{new_buffer_ref, BufferData, Data},
    error::{AmlError, AmlResult},
    object::{BankFieldObject, BufferFieldObject, FieldElement, FieldObject, IndexFieldObject, ObjectKind, ObjectRef},
    region::{RegionAccess, RegionSpace},
    state::State,
};

pub fn field_bit_count(obj: &ObjectRef) -> u64 {
    match &obj.borrow().kind {
        ObjectKind::Field(f) => f.element.bit_count,
        ObjectKind::BankField(f) => f.element.bit_count,
        ObjectKind::IndexField(f) => f.element.bit_count,
        ObjectKind::BufferField(f) => f.bit_count,
        _ => 0,
    }
}

/// Whether `lock_rule == Lock` for whatever field kind `obj` is.
fn lock_rule_of(obj: &ObjectRef) -> LockRule {
    match &obj.borrow().kind {
        ObjectKind::Field(f) => f.element.flags.lock_rule(),
        ObjectKind::BankField(f) => f.element.flags.lock_rule(),
        ObjectKind::IndexField(f) => f.element.flags.lock_rule(),
        _ => LockRule::NoLock,
    }
}

/// Acquire/release the `_GL` global-lock mutex around a field operation
/// whose `lock_rule == Lock` (`spec.md` §4.5.6, §5).
fn with_global_lock<T>(
    state: &mut State,
    obj: &ObjectRef,
    f: impl FnOnce(&mut State) -> AmlResult<T>,
) -> AmlResult<T> {
    if lock_rule_of(obj) != LockRule::Lock {
        return f(state);
    }
    let timed_out = state.host_mut().mutex_acquire(
        state.global_lock_handle(),
        crate::host::GLOBAL_LOCK_WAIT_FOREVER,
    )?;
    if timed_out {
        return Err(AmlError::MutexTimeout("_GL".to_string()));
    }
    let result = f(state);
    state.host_mut().mutex_release(state.global_lock_handle())?;
    result
}

/// Read a field-bearing object's raw bytes, dispatching on kind
/// (`spec.md` §4.5.2-§4.5.5). Returns exactly `ceil(bit_count / 8)` bytes.
pub fn read_field_raw(state: &mut State, obj: &ObjectRef) -> AmlResult<Vec<u8>> {
    let kind_snapshot = clone_kind_for_dispatch(obj);
    with_global_lock(state, obj, move |state| match kind_snapshot {
        FieldDispatch::Plain(region, element) => read_plain_field(state, &region, &element),
        FieldDispatch::Bank(region, element, bank, bank_value) => {
            write_field_from_integer(state, &bank, bank_value)?;
            read_plain_field(state, &region, &element)
        }
        FieldDispatch::Index(index, data, element) => {
            write_field_from_integer(state, &index, element.bit_offset / 8)?;
            read_field_raw(state, &data)
        }
        FieldDispatch::Buffer(source, bit_offset, bit_count) => {
            read_buffer_field(&source, bit_offset, bit_count)
        }
    })
}

/// Write `value`'s bytes into a field-bearing object, converting `value`
/// through the integer/buffer path first (`spec.md` §4.5.2-§4.5.5).
pub fn write_field_from_data(state: &mut State, obj: &ObjectRef, value: &Data) -> AmlResult<()> {
    let bit_count = field_bit_count(obj);
    let byte_len = ((bit_count + 7) / 8) as usize;
    let bytes = data_to_bytes(state, value, byte_len)?;
    write_field_bytes(state, obj, &bytes, bit_count)
}

fn write_field_from_integer(state: &mut State, obj: &ObjectRef, value: u64) -> AmlResult<()> {
    let bit_count = field_bit_count(obj);
    let byte_len = ((bit_count + 7) / 8).max(1) as usize;
    let mut bytes = value.to_le_bytes().to_vec();
    bytes.truncate(byte_len.max(bytes.len().min(byte_len)));
    bytes.resize(byte_len, 0);
    write_field_bytes(state, obj, &bytes, bit_count)
}

fn data_to_bytes(state: &mut State, value: &Data, byte_len: usize) -> AmlResult<Vec<u8>> {
    match value {
        Data::Integer(i) => {
            let mut bytes = i.to_le_bytes().to_vec();
            bytes.resize(byte_len.max(1), 0);
            Ok(bytes)
        }
        Data::Buffer(b) | Data::String(b) => {
            let src = b.borrow();
            let mut bytes = src.as_slice().to_vec();
            bytes.resize(byte_len, 0);
            Ok(bytes)
        }
        Data::FieldUnit(obj) => read_field_raw(state, obj),
        other => {
            let resolved = crate::convert::resolve_through_indirection(state, other)?;
            if matches!(resolved, Data::FieldUnit(_)) {
                return Err(AmlError::WrongType(other.acpi_type()));
            }
            data_to_bytes(state, &resolved, byte_len)
        }
    }
}

fn write_field_bytes(state: &mut State, obj: &ObjectRef, bytes: &[u8], bit_count: u64) -> AmlResult<()> {
    let kind_snapshot = clone_kind_for_dispatch(obj);
    with_global_lock(state, obj, move |state| match kind_snapshot {
        FieldDispatch::Plain(region, element) => write_plain_field(state, &region, &element, bytes),
        FieldDispatch::Bank(region, element, bank, bank_value) => {
            write_field_from_integer(state, &bank, bank_value)?;
            write_plain_field(state, &region, &element, bytes)
        }
        FieldDispatch::Index(index, data, element) => {
            write_field_from_integer(state, &index, element.bit_offset / 8)?;
            write_field_bytes(state, &data, bytes, bit_count)
        }
        FieldDispatch::Buffer(source, bit_offset, field_bit_count) => {
            write_buffer_field(&source, bit_offset, field_bit_count, bytes)
        }
    })
}

/// A snapshot of the pieces needed to dispatch a field op, cloned out from
/// under the `RefCell` borrow so the recursive calls above (which also
/// need to borrow `obj`) don't deadlock on a re-entrant borrow.
enum FieldDispatch {
    Plain(ObjectRef, FieldElement),
    Bank(ObjectRef, FieldElement, ObjectRef, u64),
    Index(ObjectRef, ObjectRef, FieldElement),
    Buffer(Data, u64, u64),
}

fn clone_kind_for_dispatch(obj: &ObjectRef) -> FieldDispatch {
    let borrowed = obj.borrow();
    match &borrowed.kind {
        ObjectKind::Field(f) => FieldDispatch::Plain(f.region.clone(), f.element.clone()),
        ObjectKind::BankField(f) => {
            FieldDispatch::Bank(f.region.clone(), f.element.clone(), f.bank.clone(), f.bank_value)
        }
        ObjectKind::IndexField(f) => {
            FieldDispatch::Index(f.index.clone(), f.data.clone(), f.element.clone())
        }
        ObjectKind::BufferField(f) => FieldDispatch::Buffer(f.source.clone(), f.bit_offset, f.bit_count),
        _ => unreachable!("clone_kind_for_dispatch called on non-field object"),
    }
}

/// Plain field read (`spec.md` §4.5.2): loop over access-width words,
/// extracting the overlapping bits into the output buffer via `CopyBits`.
fn read_plain_field(
    state: &mut State,
    region_obj: &ObjectRef,
    element: &FieldElement,
) -> AmlResult<Vec<u8>> {
    let region_borrow = region_obj.borrow();
    let region = match &region_borrow.kind {
        ObjectKind::OperationRegion(r) | ObjectKind::DataRegion(r) => r,
        _ => return Err(AmlError::WrongType(region_borrow.kind.acpi_type())),
    };
    let space = region.space;
    let access_width = element.flags.access_type().access_bit_width();
    let out_bytes = ((element.bit_count + 7) / 8) as usize;
    let mut out = vec![0u8; out_bytes];

    if space.is_buffer_acc_space() && element.flags.access_type() == AccessType::Buffer {
        let mut packet = vec![0u8; out_bytes];
        crate::region::read_with_builtin_default(
            state,
            space,
            region,
            Some(element),
            element.bit_offset / 8,
            RegionAccess {
                access_type: AccessType::Buffer,
                access_attrib: element.access_attrib,
                bit_width: access_width,
            },
            &mut packet,
        )?;
        return Ok(packet);
    }

    let mut bit_cursor = 0u64;
    while bit_cursor < element.bit_count {
        let abs_bit = element.bit_offset + bit_cursor;
        let word_start_bit = (abs_bit / access_width as u64) * access_width as u64;
        let word_byte_offset = word_start_bit / 8;
        let mut word = vec![0u8; (access_width / 8) as usize];
        crate::region::read_with_builtin_default(
            state,
            space,
            region,
            Some(element),
            word_byte_offset,
            RegionAccess {
                access_type: element.flags.access_type(),
                access_attrib: element.access_attrib,
                bit_width: access_width,
            },
            &mut word,
        )?;
        let bits_left_in_word = (word_start_bit + access_width as u64) - abs_bit;
        let remaining = element.bit_count - bit_cursor;
        let take = bits_left_in_word.min(remaining);
        copy_bits(
            &word,
            access_width as u64,
            &mut out,
            (out_bytes * 8) as u64,
            abs_bit - word_start_bit,
            take,
            bit_cursor,
        )?;
        bit_cursor += take;
    }
    Ok(out)
}

/// Plain field write (`spec.md` §4.5.2): for each access-width word
/// touched, initialize per the update rule, overlay the input bits, write
/// back.
fn write_plain_field(
    state: &mut State,
    region_obj: &ObjectRef,
    element: &FieldElement,
    input: &[u8],
) -> AmlResult<()> {
    let region_borrow = region_obj.borrow();
    let region = match &region_borrow.kind {
        ObjectKind::OperationRegion(r) | ObjectKind::DataRegion(r) => r,
        _ => return Err(AmlError::WrongType(region_borrow.kind.acpi_type())),
    };
    let space = region.space;
    let access_width = element.flags.access_type().access_bit_width();

    if space.is_buffer_acc_space() && element.flags.access_type() == AccessType::Buffer {
        return crate::region::write_with_builtin_default(
            state,
            space,
            region,
            Some(element),
            element.bit_offset / 8,
            RegionAccess {
                access_type: AccessType::Buffer,
                access_attrib: element.access_attrib,
                bit_width: access_width,
            },
            input,
        );
    }

    let input_bits = (input.len() as u64) * 8;
    let mut bit_cursor = 0u64;
    while bit_cursor < element.bit_count {
        let abs_bit = element.bit_offset + bit_cursor;
        let word_start_bit = (abs_bit / access_width as u64) * access_width as u64;
        let word_byte_offset = word_start_bit / 8;
        let word_bytes = (access_width / 8) as usize;
        let mut word = match element.flags.update_rule() {
            UpdateRule::Preserve => {
                let mut buf = vec![0u8; word_bytes];
                crate::region::read_with_builtin_default(
                    state,
                    space,
                    region,
                    Some(element),
                    word_byte_offset,
                    RegionAccess {
                        access_type: element.flags.access_type(),
                        access_attrib: element.access_attrib,
                        bit_width: access_width,
                    },
                    &mut buf,
                )?;
                buf
            }
            UpdateRule::WriteAsOnes => vec![0xFFu8; word_bytes],
            UpdateRule::WriteAsZeros => vec![0u8; word_bytes],
        };

        let bits_left_in_word = (word_start_bit + access_width as u64) - abs_bit;
        let remaining = element.bit_count - bit_cursor;
        let mut take = bits_left_in_word.min(remaining);

        let available_input = input_bits.saturating_sub(bit_cursor);
        if take > available_input {
            // `AllowTruncation`: missing input bits are written as zero
            // rather than following the update rule (`spec.md` §4.5.2).
            let zero_tail = take - available_input;
            if available_input > 0 {
                copy_bits(
                    input,
                    input_bits,
                    &mut word,
                    (word_bytes * 8) as u64,
                    bit_cursor,
                    available_input,
                    abs_bit - word_start_bit,
                )?;
            }
            for i in 0..zero_tail {
                let dst_bit = abs_bit - word_start_bit + available_input + i;
                word[(dst_bit / 8) as usize] &= !(1 << (dst_bit % 8));
            }
        } else {
            copy_bits(
                input,
                input_bits,
                &mut word,
                (word_bytes * 8) as u64,
                bit_cursor,
                take,
                abs_bit - word_start_bit,
            )?;
        }

        crate::region::write_with_builtin_default(
            state,
            space,
            region,
            Some(element),
            word_byte_offset,
            RegionAccess {
                access_type: element.flags.access_type(),
                access_attrib: element.access_attrib,
                bit_width: access_width,
            },
            &word,
        )?;

        if take == 0 {
            take = remaining; // avoid infinite loop on a degenerate word.
        }
        bit_cursor += take;
    }
    Ok(())
}

/// Buffer field read (`spec.md` §4.5.5): `CopyBits` directly against the
/// backing string/buffer bytes.
fn read_buffer_field(source: &Data, bit_offset: u64, bit_count: u64) -> AmlResult<Vec<u8>> {
    let backing = match source {
        Data::Buffer(b) | Data::String(b) => b.borrow(),
        _ => return Err(AmlError::WrongType(source.acpi_type())),
    };
    let out_bytes = ((bit_count + 7) / 8) as usize;
    let mut out = vec![0u8; out_bytes];
    copy_bits(
        backing.as_slice(),
        (backing.size as u64) * 8,
        &mut out,
        (out_bytes * 8) as u64,
        bit_offset,
        bit_count,
        0,
    )?;
    Ok(out)
}

fn write_buffer_field(source: &Data, bit_offset: u64, bit_count: u64, input: &[u8]) -> AmlResult<()> {
    let mut backing = match source {
        Data::Buffer(b) | Data::String(b) => b.borrow_mut(),
        _ => return Err(AmlError::WrongType(source.acpi_type())),
    };
    let input_bits = (input.len() as u64) * 8;
    let take = bit_count.min(input_bits);
    let size = backing.size;
    copy_bits(
        input,
        input_bits,
        &mut backing.data,
        (size as u64) * 8,
        0,
        take,
        bit_offset,
    )?;
    Ok(())
}

/// `CreateXField` (`spec.md` §4.9 "CreateXField"): build a fixed- or
/// explicit-width buffer field over a source buffer/string.
pub fn create_buffer_field(source: Data, bit_offset: u64, bit_count: u64) -> BufferFieldObject {
    BufferFieldObject {
        bit_offset,
        bit_count,
        source,
    }
}

/// Construct a plain field object (`spec.md` §4.9 "Field").
pub fn new_field_object(region: ObjectRef, element: FieldElement) -> FieldObject {
    FieldObject { region, element }
}

pub fn new_bank_field_object(
    region: ObjectRef,
    bank: ObjectRef,
    bank_value: u64,
    element: FieldElement,
) -> BankFieldObject {
    BankFieldObject {
        region,
        bank,
        bank_value,
        element,
    }
}

pub fn new_index_field_object(index: ObjectRef, data: ObjectRef, element: FieldElement) -> IndexFieldObject {
    IndexFieldObject { index, data, element }
}

/// Read a field and immediately classify the result as `Integer` or
/// `Buffer` depending on whether it fits the active integer width
/// (`spec.md` §4.6 "FieldUnit" row).
pub fn read_field_as_data(state: &mut State, obj: &ObjectRef) -> AmlResult<Data> {
    let bytes = read_field_raw(state, obj)?;
    let width = match state.integer_width() {
        aml_opcode::IntegerWidth::Bits32 => 4,
        aml_opcode::IntegerWidth::Bits64 => 8,
    };
    if bytes.len() <= width {
        let mut arr = [0u8; 8];
        arr[..bytes.len()].copy_from_slice(&bytes);
        Ok(Data::Integer(u64::from_le_bytes(arr) & state.integer_width().mask()))
    } else {
        Ok(Data::Buffer(new_buffer_ref(BufferData::from_bytes(bytes))))
    }
}

/// Region space of the operation region backing a plain/bank field,
/// needed by `_REG` broadcast bookkeeping when a field is first accessed.
pub fn region_space_of(obj: &ObjectRef) -> Option<RegionSpace> {
    match &obj.borrow().kind {
        ObjectKind::OperationRegion(r) | ObjectKind::DataRegion(r) => Some(r.space),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        object::{FieldElement, Object, ObjectKind, OperationRegionObject},
        state::{InterpreterConfig, State},
    };
    use aml_opcode::{AccessType, FieldFlags};
    use std::cell::Cell;

    fn byte_acc_flags() -> FieldFlags {
        // AccessType::Byte=1, LockRule::NoLock=0, UpdateRule::Preserve=0.
        FieldFlags(1)
    }

    fn make_memory_region(state: &mut State, len: u64) -> ObjectRef {
        let base = state.test_mock_mmio_base(len);
        Object::new(ObjectKind::OperationRegion(OperationRegionObject {
            space: RegionSpace::SystemMemory,
            offset: base,
            length: len,
            mapped_cookie: Cell::new(None),
        }))
    }

    #[test]
    fn plain_field_round_trip() {
        let mut st = State::new(InterpreterConfig::default());
        let region = make_memory_region(&mut st, 0x10);
        let element = FieldElement {
            bit_offset: 8,
            bit_count: 24,
            flags: byte_acc_flags(),
            access_attrib: 0,
            access_byte_len: 0,
            connection: None,
        };
        let field = Object::new(ObjectKind::Field(FieldObject {
            region: region.clone(),
            element,
        }));
        write_field_from_data(&mut st, &field, &Data::Integer(0x112233)).unwrap();
        let data = read_field_as_data(&mut st, &field).unwrap();
        match data {
            Data::Integer(v) => assert_eq!(v, 0x112233),
            _ => panic!("expected integer"),
        }
    }

    #[test]
    fn preserve_update_rule_leaves_untouched_bits() {
        let mut st = State::new(InterpreterConfig::default());
        let region = make_memory_region(&mut st, 0x10);
        // First write a full byte pattern directly.
        let element_full = FieldElement {
            bit_offset: 0,
            bit_count: 8,
            flags: byte_acc_flags(),
            access_attrib: 0,
            access_byte_len: 0,
            connection: None,
        };
        let field_full = Object::new(ObjectKind::Field(FieldObject {
            region: region.clone(),
            element: element_full,
        }));
        write_field_from_data(&mut st, &field_full, &Data::Integer(0b1111_0000)).unwrap();

        // Now write only the low nibble through a sub-field; with Preserve,
        // high nibble must survive.
        let element_nibble = FieldElement {
            bit_offset: 0,
            bit_count: 4,
            flags: byte_acc_flags(),
            access_attrib: 0,
            access_byte_len: 0,
            connection: None,
        };
        let field_nibble = Object::new(ObjectKind::Field(FieldObject {
            region,
            element: element_nibble,
        }));
        write_field_from_data(&mut st, &field_nibble, &Data::Integer(0b0000_1010)).unwrap();
        let data = read_field_as_data(&mut st, &field_full).unwrap();
        match data {
            Data::Integer(v) => assert_eq!(v, 0b1111_1010),
            _ => panic!("expected integer"),
        }
    }
}
