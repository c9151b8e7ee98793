//! Implicit/explicit type conversion and the `store`/`CopyObject` dispatch
//! (`spec.md` §4.6).

use std::rc::Rc;

use aml_opcode::IntegerWidth;

use crate::{
    data::{new_buffer_ref, new_package_ref, BufferData, Data, PackageData},
    error::{AmlError, AmlResult},
    object::{Object, ObjectKind},
    state::State,
};

/// Separator used when stringifying a buffer via `ToHexString`
/// (`spec.md` §9 open question: space vs. comma). This crate picks a
/// space, matching the ACPI spec's own example text rather than the
/// comma some widely-used implementations print.
pub const HEX_STRING_SEPARATOR: &str = " ";

fn integer_width_bytes(state: &State) -> usize {
    match state.integer_width() {
        IntegerWidth::Bits32 => 4,
        IntegerWidth::Bits64 => 8,
    }
}

/// `store`: implicit conversion of `src` into whatever type currently
/// occupies `*slot`, replacing it (`spec.md` §4.6, §4.7 "Store").
///
/// An uninitialized (`Data::None`) target slot simply takes `src`'s value
/// verbatim — there is no existing type to convert toward.
pub fn implicit_store(state: &mut State, src: &Data, slot: &mut Data) -> AmlResult<()> {
    if matches!(slot, Data::None) {
        *slot = src.duplicate();
        return Ok(());
    }
    let target_ty = slot.acpi_type();
    *slot = convert_to(state, src, target_ty)?;
    Ok(())
}

/// `CopyObject`/explicit conversions (`ToString`, `ToBuffer`, …): replace
/// whatever was in the target with the freshly produced value, performing
/// no further implicit conversion on the result (`spec.md` §4.6).
pub fn copy_object(_state: &mut State, src: &Data) -> AmlResult<Data> {
    Ok(deep_copy(src))
}

/// `Data duplicate` shares buffer/string/package payloads by ref-count
/// bump (`spec.md` §4.2, §9); `CopyObject`'s deep-copy is this separate
/// path, used only where ACPI's documented semantics call for it
/// explicitly.
pub fn deep_copy(src: &Data) -> Data {
    match src {
        Data::Package(pkg) => {
            let elements: Vec<_> = pkg
                .borrow()
                .elements
                .iter()
                .map(|e| std::cell::RefCell::new(deep_copy(&e.borrow())))
                .collect();
            Data::Package(new_package_ref(PackageData { elements }))
        }
        Data::String(b) => {
            let data = b.borrow().clone();
            Data::String(new_buffer_ref(data))
        }
        Data::Buffer(b) => {
            let data = b.borrow().clone();
            Data::Buffer(new_buffer_ref(data))
        }
        other => other.duplicate(),
    }
}

use crate::data::AcpiObjectType;

/// Dispatch on source type, fan out to the target-type-specific routine
/// from the `spec.md` §4.6 table.
pub fn convert_to(state: &mut State, src: &Data, target: AcpiObjectType) -> AmlResult<Data> {
    let resolved = resolve_through_indirection(state, src)?;
    match target {
        AcpiObjectType::Integer => to_integer(state, &resolved, false),
        AcpiObjectType::String => to_string(state, &resolved, false),
        AcpiObjectType::Buffer => to_buffer(state, &resolved, false),
        AcpiObjectType::FieldUnit => {
            // `resolve_through_indirection` always reads a `FieldUnit`
            // through to its `Integer`/`Buffer` value before this match, so
            // there is never a bare field unit left to convert into here;
            // field writes go through `store_into_target` instead
            // (`spec.md` §4.5.2).
            Err(AmlError::ConversionImpossible {
                from: resolved.acpi_type(),
                to: target,
            })
        }
        AcpiObjectType::DebugObject => {
            log_debug_store(&resolved);
            Ok(Data::Debug)
        }
        _ => Ok(deep_copy(&resolved)),
    }
}

/// Follow `Reference`/`PackageElement`/`FieldUnit` indirection down to the
/// concrete `Data` value a conversion should actually operate on.
pub fn resolve_through_indirection(state: &mut State, src: &Data) -> AmlResult<Data> {
    match src {
        Data::PackageElement(handle) => {
            if !handle.is_valid() {
                return Err(AmlError::IndexOutOfBounds {
                    index: handle.index,
                    len: handle.package.borrow().element_count() as u64,
                });
            }
            let inner = handle.package.borrow().elements[handle.index as usize]
                .borrow()
                .clone();
            resolve_through_indirection(state, &inner)
        }
        Data::FieldUnit(obj) => {
            let bytes = crate::field_io::read_field_raw(state, obj)?;
            let bit_count = crate::field_io::field_bit_count(obj);
            Ok(bytes_to_integer_or_buffer(&bytes, bit_count, state))
        }
        other => Ok(other.clone()),
    }
}

fn bytes_to_integer_or_buffer(bytes: &[u8], bit_count: u64, state: &State) -> Data {
    let int_width = integer_width_bytes(state);
    if (bit_count as usize + 7) / 8 <= int_width {
        let mut arr = [0u8; 8];
        arr[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
        Data::Integer(u64::from_le_bytes(arr) & state.integer_width().mask())
    } else {
        Data::Buffer(new_buffer_ref(BufferData::from_bytes(bytes.to_vec())))
    }
}

fn log_debug_store(value: &Data) {
    match value {
        Data::Integer(i) => tracing::debug!(value = format!("{i:#x}"), "Debug store: integer"),
        Data::String(s) => {
            let bytes = s.borrow();
            tracing::debug!(value = %String::from_utf8_lossy(bytes.as_slice()), "Debug store: string")
        }
        Data::Buffer(b) => {
            let bytes = b.borrow();
            tracing::debug!(value = ?bytes.as_slice(), "Debug store: buffer")
        }
        Data::Package(p) => tracing::debug!(elements = p.borrow().element_count(), "Debug store: package"),
        other => tracing::debug!(ty = ?other.acpi_type(), "Debug store"),
    }
}

/// Integer conversion (`spec.md` §4.6 table, "To Integer" column).
pub fn to_integer(state: &mut State, src: &Data, explicit: bool) -> AmlResult<Data> {
    let mask = state.integer_width().mask();
    match src {
        Data::Integer(i) => Ok(Data::Integer(*i & mask)),
        Data::String(s) => {
            let bytes = s.borrow();
            let text = std::str::from_utf8(bytes.as_slice()).unwrap_or("");
            if text.is_empty() {
                return Err(AmlError::EmptyConversionSource);
            }
            let value = parse_integer_string(text, explicit)?;
            Ok(Data::Integer(value & mask))
        }
        Data::Buffer(b) => {
            let bytes = b.borrow();
            if bytes.size == 0 {
                return Err(AmlError::EmptyConversionSource);
            }
            let width = integer_width_bytes(state);
            let mut arr = [0u8; 8];
            let n = bytes.size.min(width);
            arr[..n].copy_from_slice(&bytes.as_slice()[..n]);
            Ok(Data::Integer(u64::from_le_bytes(arr) & mask))
        }
        Data::FieldUnit(_) => {
            let resolved = resolve_through_indirection(state, src)?;
            if matches!(resolved, Data::FieldUnit(_)) {
                return Err(AmlError::ConversionImpossible {
                    from: src.acpi_type(),
                    to: AcpiObjectType::Integer,
                });
            }
            to_integer(state, &resolved, explicit)
        }
        other => Err(AmlError::ConversionImpossible {
            from: other.acpi_type(),
            to: AcpiObjectType::Integer,
        }),
    }
}

/// Parse a `String` operand as an integer: implicit conversion is
/// hex-without-prefix; explicit (`ToInteger`) conversion accepts a leading
/// `0x`/`0X` for hex, else decimal (`spec.md` §4.6).
fn parse_integer_string(text: &str, explicit: bool) -> AmlResult<u64> {
    let trimmed = text.trim();
    if explicit {
        if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16).map_err(|_| AmlError::EmptyConversionSource);
        }
        trimmed.parse::<u64>().map_err(|_| AmlError::EmptyConversionSource)
    } else {
        u64::from_str_radix(trimmed, 16).map_err(|_| AmlError::EmptyConversionSource)
    }
}

/// String conversion (`spec.md` §4.6 table, "To String" column).
pub fn to_string(state: &mut State, src: &Data, explicit_hex_or_dec: bool) -> AmlResult<Data> {
    match src {
        Data::Integer(i) => {
            let width = integer_width_bytes(state);
            let text = format!("{:0width$X}", i, width = width * 2);
            Ok(string_data(text))
        }
        Data::String(s) => {
            let bytes = s.borrow().clone();
            Ok(Data::String(new_buffer_ref(bytes)))
        }
        Data::Buffer(b) => {
            let bytes = b.borrow();
            let text = if explicit_hex_or_dec {
                bytes
                    .as_slice()
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            } else {
                bytes
                    .as_slice()
                    .iter()
                    .map(|b| format!("{b:02X}"))
                    .collect::<Vec<_>>()
                    .join(HEX_STRING_SEPARATOR)
            };
            Ok(string_data(text))
        }
        other => {
            let resolved = resolve_through_indirection(state, other)?;
            if matches!(resolved, Data::FieldUnit(_)) {
                return Err(AmlError::ConversionImpossible {
                    from: other.acpi_type(),
                    to: AcpiObjectType::String,
                });
            }
            to_string(state, &resolved, explicit_hex_or_dec)
        }
    }
}

/// `ToHexString`/`ToDecimalString` explicit variants differ only in the
/// buffer-element separator/radix (`spec.md` §4.7).
pub fn to_hex_string(state: &mut State, src: &Data) -> AmlResult<Data> {
    match src {
        Data::Buffer(_) => to_string(state, src, false),
        Data::Integer(i) => Ok(string_data(format!("{i:#X}"))),
        other => to_string(state, other, false),
    }
}

pub fn to_decimal_string(state: &mut State, src: &Data) -> AmlResult<Data> {
    match src {
        Data::Buffer(_) => to_string(state, src, true),
        Data::Integer(i) => Ok(string_data(i.to_string())),
        other => to_string(state, other, true),
    }
}

fn string_data(text: String) -> Data {
    Data::String(new_buffer_ref(BufferData::from_bytes(text.into_bytes())))
}

/// Buffer conversion (`spec.md` §4.6 table, "To Buffer" column).
pub fn to_buffer(state: &mut State, src: &Data, _explicit: bool) -> AmlResult<Data> {
    match src {
        Data::Integer(i) => {
            let width = integer_width_bytes(state);
            let mut bytes = i.to_le_bytes().to_vec();
            bytes.truncate(width);
            Ok(Data::Buffer(new_buffer_ref(BufferData::from_bytes(bytes))))
        }
        Data::String(s) => {
            let bytes = s.borrow();
            // Buffer conversion of a string includes the NUL terminator.
            let mut v = bytes.as_slice().to_vec();
            v.push(0);
            Ok(Data::Buffer(new_buffer_ref(BufferData::from_bytes(v))))
        }
        Data::Buffer(b) => {
            let data = b.borrow().clone();
            Ok(Data::Buffer(new_buffer_ref(data)))
        }
        other => {
            let resolved = resolve_through_indirection(state, other)?;
            if matches!(resolved, Data::FieldUnit(_)) {
                return Err(AmlError::ConversionImpossible {
                    from: other.acpi_type(),
                    to: AcpiObjectType::Buffer,
                });
            }
            to_buffer(state, &resolved, _explicit)
        }
    }
}

/// Stores through a `Reference` indirection are transparent: they target
/// the referenced object's value slot (`spec.md` §4.6 "services stores
/// through a reference").
pub fn store_into_target(state: &mut State, target: &Data, value: &Data) -> AmlResult<()> {
    match target {
        Data::Reference(obj) => store_into_object(state, obj, value),
        Data::FieldUnit(obj) => crate::field_io::write_field_from_data(state, obj, value),
        Data::PackageElement(handle) => {
            if !handle.is_valid() {
                return Err(AmlError::IndexOutOfBounds {
                    index: handle.index,
                    len: handle.package.borrow().element_count() as u64,
                });
            }
            let mut slot = handle.package.borrow().elements[handle.index as usize].borrow_mut();
            implicit_store(state, value, &mut slot)
        }
        _ => Err(AmlError::WrongType(target.acpi_type())),
    }
}

pub fn store_into_object(
    state: &mut State,
    obj: &crate::object::ObjectRef,
    value: &Data,
) -> AmlResult<()> {
    let is_field = matches!(
        &obj.borrow().kind,
        ObjectKind::Field(_) | ObjectKind::BankField(_) | ObjectKind::IndexField(_) | ObjectKind::BufferField(_)
    );
    if is_field {
        return crate::field_io::write_field_from_data(state, obj, value);
    }
    let kind_is_name = matches!(&obj.borrow().kind, ObjectKind::Name(_));
    if kind_is_name {
        let borrowed = obj.borrow();
        if let ObjectKind::Name(cell) = &borrowed.kind {
            let mut slot = cell.borrow_mut();
            return implicit_store(state, value, &mut slot);
        }
    }
    Err(AmlError::WrongType(obj.borrow().kind.acpi_type()))
}

/// Guard against storing a package as its own element (`spec.md` §9
/// "Avoid self-referential packages").
pub fn check_not_self_referential(
    pkg: &crate::data::PackageRef,
    value: &Data,
) -> AmlResult<()> {
    if let Data::Package(inner) = value {
        if Rc::ptr_eq(inner, pkg) {
            return Err(AmlError::SelfReferentialPackage);
        }
    }
    Ok(())
}

/// `SizeOf` (`spec.md` §4.7): buffer/string byte length, package element
/// count, recursing through references.
pub fn size_of(state: &mut State, value: &Data) -> AmlResult<u64> {
    match value {
        Data::Buffer(b) => Ok(b.borrow().size as u64),
        Data::String(s) => Ok(s.borrow().size as u64),
        Data::Package(p) => Ok(p.borrow().element_count() as u64),
        Data::Reference(obj) => {
            let data = object_value(obj)?;
            size_of(state, &data)
        }
        other => Err(AmlError::WrongType(other.acpi_type())),
    }
}

fn object_value(obj: &crate::object::ObjectRef) -> AmlResult<Data> {
    let borrowed = obj.borrow();
    match &borrowed.kind {
        ObjectKind::Name(cell) => Ok(cell.borrow().clone()),
        _ => Err(AmlError::WrongType(borrowed.kind.acpi_type())),
    }
}

/// `ObjectType` (`spec.md` §4.7): the ACPI object-type integer for a value.
pub fn object_type_of(value: &Data) -> u64 {
    let ty = match value {
        Data::Reference(obj) => obj.borrow().kind.acpi_type(),
        other => other.acpi_type(),
    };
    ty as u64
}

/// Construct a fresh `Object::Name` bound to `value`, used by places that
/// need an owned object handle for a transient `Data` (e.g. `RefOf` over a
/// literal). Not part of the `spec.md` table directly, but required
/// plumbing for `Reference` construction.
pub fn name_object(value: Data) -> crate::object::ObjectRef {
    Object::new(ObjectKind::Name(std::cell::RefCell::new(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{InterpreterConfig, State};

    fn fresh_state() -> State {
        State::new(InterpreterConfig::default())
    }

    #[test]
    fn integer_to_hex_string_width_sized() {
        let mut st = fresh_state();
        let result = to_string(&mut st, &Data::Integer(0x11), false).unwrap();
        if let Data::String(s) = result {
            assert_eq!(std::str::from_utf8(s.borrow().as_slice()).unwrap(), "0000000000000011");
        } else {
            panic!("expected string");
        }
    }

    #[test]
    fn buffer_to_integer_le_truncated_to_width() {
        let mut st = fresh_state();
        let buf = Data::Buffer(new_buffer_ref(BufferData::from_bytes(vec![
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99,
        ])));
        let result = to_integer(&mut st, &buf, false).unwrap();
        assert_eq!(result_as_int(&result), 0x8877665544332211);
    }

    #[test]
    fn empty_string_to_integer_is_error() {
        let mut st = fresh_state();
        let empty = Data::String(new_buffer_ref(BufferData::from_bytes(vec![])));
        assert!(to_integer(&mut st, &empty, false).is_err());
    }

    #[test]
    fn self_referential_package_rejected() {
        let pkg = new_package_ref(PackageData::with_len(1));
        let err = check_not_self_referential(&pkg, &Data::Package(pkg.clone()));
        assert!(err.is_err());
    }

    fn result_as_int(d: &Data) -> u64 {
        match d {
            Data::Integer(i) => *i,
            _ => panic!("not an integer"),
        }
    }
}
