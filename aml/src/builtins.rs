//! Built-in root-scope names (`SPEC_FULL.md` §2): `_OSI`, `_OS`, `_REV`, and
//! the implicit predefined root scopes (`\_SB`, `\_GPE`, `\_PR`, `\_TZ`,
//! `\_SI`) every DSDT is free to populate without first declaring a `Scope`
//! for them.
//!
//! Modeled on how real firmware environments seed these before the first
//! table ever loads: `install` runs once from [`crate::state::State::new`].

use std::{cell::RefCell, rc::Rc};

use aml_opcode::{NamePrefix, NameSeg, NameString, ScopeFlags};

use crate::{
    data::{new_buffer_ref, BufferData, Data},
    error::AmlResult,
    namespace::CreateMode,
    object::{MethodBody, MethodObject, Object, ObjectKind},
    state::State,
};

/// Value reported by the `Revision` keyword and the legacy `\_REV` name.
/// ACPICA and every interpreter derived from it report a small integer here,
/// never the full spec version; `2` matches the value real-world DSDTs
/// actually branch on.
pub const INTERPRETER_REVISION: u64 = 2;

/// Reported by `\_OS`. OEM tables frequently string-compare this against
/// `"Microsoft Windows NT"` as a compatibility check rather than querying
/// `_OSI`; every open-source interpreter that wants those code paths to
/// behave hard-codes the same string.
const OS_NAME: &str = "Microsoft Windows NT";

/// Default `_OSI` query table (`SPEC_FULL.md` §2): the `"Windows 20xx"`
/// strings OEM firmware checks for feature-gating, plus `"Linux"`.
/// Embedders override this through [`crate::state::InterpreterConfig::
/// osi_supported_strings`].
pub fn default_osi_strings() -> Vec<String> {
    [
        "Windows 2000",
        "Windows 2001",
        "Windows 2001 SP1",
        "Windows 2001 SP2",
        "Windows 2006",
        "Windows 2009",
        "Windows 2012",
        "Windows 2015",
        "Windows 2020",
        "Linux",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn root_name(seg: &str) -> NameString {
    NameString {
        prefix: NamePrefix { is_root: true, parent_count: 0 },
        segments: vec![NameSeg::from_str(seg).expect("built-in segment name is valid")],
    }
}

fn declare_implicit_scope(state: &mut State, seg: &str) {
    let name = root_name(seg);
    let node = state
        .namespace_mut()
        .create_node(&name, ScopeFlags::empty(), CreateMode::Create)
        .expect("implicit root scope name is unique at State::new time");
    state.namespace().bind(&node, Object::new(ObjectKind::Scope));
    node.borrow().is_pre_parsed.set(true);
    node.borrow().is_evaluated.set(true);
}

fn install_native_method(
    state: &mut State,
    seg: &str,
    arg_count: u8,
    routine: Rc<dyn Fn(&mut State, &[Data]) -> AmlResult<Data>>,
) {
    let name = root_name(seg);
    let node = state
        .namespace_mut()
        .create_node(&name, ScopeFlags::empty(), CreateMode::Create)
        .expect("built-in method name is unique at State::new time");
    let obj = Object::new(ObjectKind::Method(MethodObject {
        arg_count,
        serialized: false,
        sync_level: 0,
        body: MethodBody::Native(routine),
    }));
    state.namespace().bind(&node, obj);
    node.borrow().is_pre_parsed.set(true);
    node.borrow().is_evaluated.set(true);
}

fn install_name(state: &mut State, seg: &str, value: Data) {
    let name = root_name(seg);
    let node = state
        .namespace_mut()
        .create_node(&name, ScopeFlags::empty(), CreateMode::Create)
        .expect("built-in name is unique at State::new time");
    state.namespace().bind(&node, Object::new(ObjectKind::Name(RefCell::new(value))));
    node.borrow().is_pre_parsed.set(true);
    node.borrow().is_evaluated.set(true);
}

/// `_OSI(String) -> Integer` (`SPEC_FULL.md` §2): `Ones` if the queried
/// string is in `config.osi_supported_strings`, `Zero` otherwise.
fn osi_query(state: &mut State, args: &[Data]) -> AmlResult<Data> {
    let queried = args.first().cloned().unwrap_or(Data::None);
    let Data::String(s) = crate::convert::to_string(state, &queried, false)? else {
        unreachable!("to_string always returns Data::String");
    };
    let text = std::str::from_utf8(s.borrow().as_slice()).unwrap_or("").to_string();
    let supported = state.config.osi_supported_strings.iter().any(|known| *known == text);
    let mask = state.integer_width().mask();
    Ok(Data::Integer(if supported { mask } else { 0 }))
}

/// Seed the namespace with the implicit root scopes and the `_OSI`/`_OS`/
/// `_REV` built-ins before any table is loaded.
pub fn install(state: &mut State) {
    for seg in ["_SB_", "_GPE", "_PR_", "_TZ_", "_SI_"] {
        declare_implicit_scope(state, seg);
    }

    install_native_method(state, "_OSI", 1, Rc::new(osi_query));
    install_name(
        state,
        "_OS_",
        Data::String(new_buffer_ref(BufferData::from_bytes(OS_NAME.as_bytes().to_vec()))),
    );
    install_name(state, "_REV", Data::Integer(INTERPRETER_REVISION));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InterpreterConfig;

    #[test]
    fn osi_reports_configured_strings_supported() {
        let mut state = State::new(InterpreterConfig::default());
        let node = state.namespace().get_absolute("\\_OSI").unwrap();
        let obj = node.borrow().object.borrow().clone().unwrap();
        let result = osi_query(&mut state, &[Data::String(new_buffer_ref(BufferData::from_bytes(b"Linux".to_vec())))]).unwrap();
        assert!(matches!(result, Data::Integer(i) if i != 0));
        let _ = obj;
    }

    #[test]
    fn osi_reports_unknown_string_unsupported() {
        let mut state = State::new(InterpreterConfig::default());
        let result = osi_query(
            &mut state,
            &[Data::String(new_buffer_ref(BufferData::from_bytes(b"Not A Real OS".to_vec())))],
        )
        .unwrap();
        assert!(matches!(result, Data::Integer(0)));
    }

    #[test]
    fn implicit_root_scopes_are_scope_like() {
        let state = State::new(InterpreterConfig::default());
        for path in ["\\_SB_", "\\_GPE", "\\_PR_", "\\_TZ_", "\\_SI_"] {
            let node = state.namespace().get_absolute(path).unwrap_or_else(|| panic!("{path} missing"));
            let obj = node.borrow().object.borrow().clone().unwrap();
            assert!(obj.borrow().kind.is_scope_like());
        }
    }

    #[test]
    fn os_and_rev_names_are_preset() {
        let state = State::new(InterpreterConfig::default());
        let os_node = state.namespace().get_absolute("\\_OS_").unwrap();
        let os_obj = os_node.borrow().object.borrow().clone().unwrap();
        let ObjectKind::Name(cell) = &os_obj.borrow().kind else {
            panic!("_OS is not a Name object");
        };
        assert!(matches!(&*cell.borrow(), Data::String(_)));

        let rev_node = state.namespace().get_absolute("\\_REV").unwrap();
        let rev_obj = rev_node.borrow().object.borrow().clone().unwrap();
        let ObjectKind::Name(cell) = &rev_obj.borrow().kind else {
            panic!("_REV is not a Name object");
        };
        assert!(matches!(&*cell.borrow(), Data::Integer(i) if *i == INTERPRETER_REVISION));
    }
}
