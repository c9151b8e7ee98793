//! End-to-end scenarios driving [`State`] through hand-assembled AML
//! bytecode against a [`support::mock_host::MockHost`], exercising the
//! whole interpreter rather than a single opcode handler.
//!
//! Every table here is built with the small byte-builder helpers below
//! instead of literal arrays, so the wire-format invariants (`PkgLength`
//! counts itself, named-field bit counts use the same VLE encoding with a
//! different meaning, a bare relative name ascends the scope stack) stay
//! visible at the call site rather than baked into opaque hex.

mod support;

use aml::{Data, InterpreterConfig, State};
use support::mock_host::MockHost;

const HEADER_LEN: usize = 36;

/// A 36-byte `AML_DESCRIPTION_HEADER` good enough for `State::load_table`:
/// only the signature and the revision byte (offset 8) are consulted.
fn header(signature: &[u8; 4], revision: u8) -> Vec<u8> {
    let mut h = vec![0u8; HEADER_LEN];
    h[0..4].copy_from_slice(signature);
    h[8] = revision;
    h
}

fn table(signature: &[u8; 4], revision: u8, body: Vec<u8>) -> Vec<u8> {
    let mut bytes = header(signature, revision);
    bytes.extend(body);
    bytes
}

fn new_state() -> (State, MockHost) {
    let host = MockHost::new();
    let mut state = State::new(InterpreterConfig::default());
    state.set_host(Box::new(MockHost { shared: host.handle() }));
    (state, host)
}

// --- byte-builder helpers -------------------------------------------------

/// A single `NameSeg`: four ASCII bytes, `_`-padded.
fn seg(name: &str) -> [u8; 4] {
    let bytes = name.as_bytes();
    assert!(bytes.len() <= 4);
    let mut out = [b'_'; 4];
    out[..bytes.len()].copy_from_slice(bytes);
    out
}

/// A single-segment relative `NameString` (no prefix at all).
fn name1(n: &str) -> Vec<u8> {
    seg(n).to_vec()
}

/// A root-prefixed single-segment `NameString`.
fn root_name1(n: &str) -> Vec<u8> {
    let mut v = vec![b'\\'];
    v.extend_from_slice(&seg(n));
    v
}

fn byte_const(v: u8) -> Vec<u8> {
    vec![0x0A, v]
}

fn word_const(v: u16) -> Vec<u8> {
    let mut out = vec![0x0B];
    out.extend_from_slice(&v.to_le_bytes());
    out
}

fn dword_const(v: u32) -> Vec<u8> {
    let mut out = vec![0x0C];
    out.extend_from_slice(&v.to_le_bytes());
    out
}

/// Wrap `body` in a `PkgLength` that counts itself plus `body`, as every
/// `TermObj` with a nested block does (`Method`/`Scope`/`Field`/...).
fn pkg_wrap(body: Vec<u8>) -> Vec<u8> {
    let mut total = body.len() as u32 + 1;
    loop {
        let enc = aml_opcode::PkgLength::encode(total);
        let encoded_bytes = enc.as_slice().len() as u32;
        if encoded_bytes + body.len() as u32 == total {
            let mut out = enc.as_slice().to_vec();
            out.extend(body);
            return out;
        }
        total = encoded_bytes + body.len() as u32;
    }
}

/// The other `PkgLength` use in the grammar: a named field element's raw
/// bit count, which is *not* self-inclusive.
fn bit_count(n: u32) -> Vec<u8> {
    aml_opcode::PkgLength::encode(n).as_slice().to_vec()
}

fn name_op(name: &str, value: Vec<u8>) -> Vec<u8> {
    let mut out = vec![0x08];
    out.extend_from_slice(&seg(name));
    out.extend(value);
    out
}

fn method_op(name: &str, flags: u8, body: Vec<u8>) -> Vec<u8> {
    let mut inner = seg(name).to_vec();
    inner.push(flags);
    inner.extend(body);
    let mut out = vec![0x14];
    out.extend(pkg_wrap(inner));
    out
}

fn return_op(value: Vec<u8>) -> Vec<u8> {
    let mut out = vec![0xA4];
    out.extend(value);
    out
}

fn add_op(a: Vec<u8>, b: Vec<u8>, target: Vec<u8>) -> Vec<u8> {
    let mut out = vec![0x72];
    out.extend(a);
    out.extend(b);
    out.extend(target);
    out
}

fn store_op(value: Vec<u8>, target: Vec<u8>) -> Vec<u8> {
    let mut out = vec![0x70];
    out.extend(value);
    out.extend(target);
    out
}

fn null_name() -> Vec<u8> {
    vec![0x00]
}

fn op_region_op(name: &str, space: u8, offset: u32, length: u32) -> Vec<u8> {
    let mut out = vec![0x5B, 0x80];
    out.extend_from_slice(&seg(name));
    out.push(space);
    out.extend(byte_const(offset as u8));
    out.extend(byte_const(length as u8));
    out
}

fn field_op(region_name: &str, flags: u8, elements: Vec<u8>) -> Vec<u8> {
    let mut inner = seg(region_name).to_vec();
    inner.push(flags);
    inner.extend(elements);
    let mut out = vec![0x5B, 0x81];
    out.extend(pkg_wrap(inner));
    out
}

fn named_field_element(name: &str, bits: u32) -> Vec<u8> {
    let mut out = seg(name).to_vec();
    out.extend(bit_count(bits));
    out
}

fn mutex_op(name: &str, sync_level: u8) -> Vec<u8> {
    let mut out = vec![0x5B, 0x01];
    out.extend_from_slice(&seg(name));
    out.push(sync_level);
    out
}

fn acquire_op(name: Vec<u8>, timeout: u16) -> Vec<u8> {
    let mut out = vec![0x5B, 0x23];
    out.extend(name);
    out.extend_from_slice(&timeout.to_le_bytes());
    out
}

fn invoke(state: &mut State, absolute_path: &str) -> aml::AmlResult<Data> {
    state.invoke_named_method(absolute_path, &[])
}

// --- scenario 1: integer path ---------------------------------------------

/// `Name(INT0, 0x11); Method(TEST) { Return(Add(INT0, 0x22)) } `, `TEST()`
/// returns `0x33`.
#[test]
fn integer_arithmetic_through_a_method() {
    let mut body = Vec::new();
    body.extend(name_op("INT0", byte_const(0x11)));
    body.extend(method_op(
        "TEST",
        0,
        return_op(add_op(name1("INT0"), byte_const(0x22), null_name())),
    ));

    let (mut state, _host) = new_state();
    state.load_table(table(b"SSDT", 2, body)).unwrap();
    state.finish_initial_load().unwrap();

    let result = invoke(&mut state, "\\TEST").unwrap();
    assert!(matches!(result, Data::Integer(0x33)), "{result:?}");
}

// --- scenario 2: field round trip -----------------------------------------

/// A byte-addressed `SystemMemory` region split into an 8-bit and a 24-bit
/// field; writing both and reading the second back gives the written
/// value, and the first field's byte is left untouched by the second's
/// write (`spec.md` §4.5.2 "Preserve").
#[test]
fn field_round_trip_preserves_neighboring_bits() {
    let mut body = Vec::new();
    body.extend(op_region_op("OPR0", 0x00, 0, 4));
    body.extend(field_op(
        "OPR0",
        0x01, // ByteAcc, NoLock, Preserve
        {
            let mut elements = Vec::new();
            elements.extend(named_field_element("OFS0", 8));
            elements.extend(named_field_element("OFS1", 24));
            elements
        },
    ));
    body.extend(method_op("TEST", 0, {
        let mut m = Vec::new();
        m.extend(store_op(byte_const(0xAA), name1("OFS0")));
        m.extend(store_op(dword_const(0x0011_2233), name1("OFS1")));
        m.extend(return_op(name1("OFS1")));
        m
    }));

    let (mut state, host) = new_state();
    state.load_table(table(b"SSDT", 2, body)).unwrap();
    state.finish_initial_load().unwrap();

    let result = invoke(&mut state, "\\TEST").unwrap();
    assert!(matches!(result, Data::Integer(0x11_2233)), "{result:?}");
    assert_eq!(host.handle().borrow().memory[0], 0xAA);
}

// --- scenario 3: mutex auto-release ----------------------------------------

/// `Acquire(MTX0, 0xFFFF)` inside a method that returns without a matching
/// `Release`: the method-invocation epilogue releases every mutex still
/// held by the frame (`spec.md` §4.11 step 8), so the host sees a balanced
/// acquire/release pair even though the AML never called `Release` itself.
#[test]
fn mutex_is_auto_released_when_a_method_returns() {
    let mut body = Vec::new();
    body.extend(mutex_op("MTX0", 0));
    body.extend(method_op(
        "TEST",
        0,
        acquire_op(root_name1("MTX0"), 0xFFFF),
    ));

    let (mut state, host) = new_state();
    state.load_table(table(b"SSDT", 2, body)).unwrap();
    state.finish_initial_load().unwrap();

    invoke(&mut state, "\\TEST").unwrap();

    let log = host.handle().borrow().mutex_log.clone();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].1, true, "Acquire logged first");
    assert_eq!(log[1].1, false, "auto-release logged second");
    assert_eq!(log[0].0, log[1].0, "same mutex handle both times");
}

// --- scenario 4: global lock on a Lock-ruled field -------------------------

/// A field declared with `Lock` wraps every read and write in an acquire
/// and release of the `_GL` global-lock mutex (`spec.md` §4.5.6); two field
/// accesses (one write, one read) leave two balanced acquire/release pairs
/// in the host log, all against the same global-lock handle.
#[test]
fn lock_ruled_field_access_is_wrapped_in_the_global_lock() {
    let mut body = Vec::new();
    body.extend(op_region_op("OPR1", 0x00, 0, 4));
    body.extend(field_op(
        "OPR1",
        0x11, // ByteAcc, Lock, Preserve
        named_field_element("OFS2", 8),
    ));
    body.extend(method_op("TEST", 0, {
        let mut m = Vec::new();
        m.extend(store_op(byte_const(0x5A), name1("OFS2")));
        m.extend(return_op(name1("OFS2")));
        m
    }));

    let (mut state, host) = new_state();
    let global_lock_handle = state.global_lock_handle();
    state.load_table(table(b"SSDT", 2, body)).unwrap();
    state.finish_initial_load().unwrap();

    let result = invoke(&mut state, "\\TEST").unwrap();
    assert!(matches!(result, Data::Integer(0x5A)), "{result:?}");

    let log = host.handle().borrow().mutex_log.clone();
    assert_eq!(log.len(), 4, "one acquire/release pair per field access");
    for (handle, _) in &log {
        assert_eq!(*handle, global_lock_handle);
    }
    assert_eq!(
        log.iter().filter(|(_, acquiring)| *acquiring).count(),
        log.iter().filter(|(_, acquiring)| !*acquiring).count(),
        "acquires and releases balance"
    );
}

// --- scenario 5: two-pass forward reference --------------------------------

/// `Method(CALL) { Return(METH()) }` appears *before* `Method(METH)` in the
/// same table; the namespace pass discovers `METH` ahead of the full pass
/// evaluating `CALL`'s body, so the forward call resolves (`spec.md` §2
/// "Control flow").
#[test]
fn forward_reference_to_a_later_method_resolves() {
    let mut body = Vec::new();
    body.extend(method_op("CALL", 0, return_op(name1("METH"))));
    body.extend(method_op("METH", 0, return_op(byte_const(0x07))));

    let (mut state, _host) = new_state();
    state.load_table(table(b"SSDT", 2, body)).unwrap();
    state.finish_initial_load().unwrap();

    let result = invoke(&mut state, "\\CALL").unwrap();
    assert!(matches!(result, Data::Integer(0x07)), "{result:?}");
}

// --- scenario 6: LoadTable round trip ---------------------------------------

/// A second, host-resident SSDT defines `\X` as `0x55AA`; `LoadTable`
/// pulls it in by signature/OEM id/OEM table id, the newly loaded table's
/// own namespace pass binds `\X`, and the opcode's own return value is the
/// canonical AML boolean `Ones`, not a DDB handle (`spec.md` §8 "the
/// `LoadTable` return value is `Ones`").
#[test]
fn load_table_pulls_in_a_second_table_and_returns_ones() {
    let loaded_body = name_op("X___", dword_const(0x0000_55AA));
    let loaded_table = table(b"SSDT", 2, loaded_body);

    let mut body = Vec::new();
    body.extend(method_op("TEST", 0, {
        // LoadTable(Signature, OemId, OemTableId, RootPath, ParameterPath, ParameterData)
        let mut load_table_call = vec![0x5B, 0x1F];
        load_table_call.extend(str_const("SSDT"));
        load_table_call.extend(str_const(""));
        load_table_call.extend(str_const(""));
        load_table_call.extend(str_const("\\"));
        load_table_call.extend(str_const(""));
        load_table_call.extend(byte_const(0));
        return_op(load_table_call)
    }));

    let (mut state, host) = new_state();
    host.register_table(*b"SSDT", *b"\0\0\0\0\0\0", *b"\0\0\0\0\0\0\0\0", loaded_table);

    state.load_table(table(b"DSDT", 2, body)).unwrap();
    state.finish_initial_load().unwrap();

    let result = invoke(&mut state, "\\TEST").unwrap();
    assert!(matches!(result, Data::Integer(u64::MAX)), "{result:?}");

    let node = state.namespace().get_absolute("\\X___").unwrap();
    let obj = node.borrow().object.borrow().clone().unwrap();
    let value = match &obj.borrow().kind {
        aml::object::ObjectKind::Name(data) => data.borrow().clone(),
        other => panic!("unexpected kind {other:?}"),
    };
    assert!(matches!(value, Data::Integer(0x55AA)), "{value:?}");
}

fn str_const(s: &str) -> Vec<u8> {
    let mut out = vec![0x0D];
    out.extend_from_slice(s.as_bytes());
    out.push(0x00);
    out
}
