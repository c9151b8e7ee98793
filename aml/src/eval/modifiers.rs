//! Namespace modifier opcodes: `Scope`, `Name`, `Alias` (`spec.md` §4.10).
//!
//! Dispatched here instead of `eval::named` because `Opcode::
//! is_namespace_modifier_opcode` is checked first in `termlist::eval_term_obj`
//! (`spec.md` §4.9's literal opcode list double-lists `Alias`/`Name` under
//! both namespace modifiers and named objects; this module owns them).

use std::{cell::RefCell, rc::Rc};

use aml_opcode::{Decoder, Opcode, ScopeFlags};

use crate::{
    data::Data,
    error::{AmlError, AmlResult},
    eval::{
        expr,
        termlist::{eval_term_list, Pass},
    },
    namespace::CreateMode,
    object::{Object, ObjectKind},
    state::State,
};

fn compute_pkg_end(decoder: &Decoder<'_>, pkg: aml_opcode::PkgLength) -> usize {
    (decoder.cursor() - pkg.encoded_bytes as usize) + pkg.total_length as usize
}

pub fn eval(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::Scope => eval_scope(state, decoder, pass),
        Opcode::Name => eval_name(state, decoder, pass),
        Opcode::Alias => eval_alias(state, decoder, pass),
        other => unreachable!("modifiers::eval called with non-modifier opcode {other:?}"),
    }
}

/// `DefScope := ScopeOp PkgLength NameString TermList` (`spec.md` §4.10):
/// the target must already name a `Scope`/`Device`/`Processor`/
/// `ThermalZone`/`PowerResource` node (the implicit roots are predeclared
/// by `crate::builtins::install`, or it was declared earlier in this same
/// definition block).
fn eval_scope(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let name = decoder.consume_name_string()?;
    let body_start = decoder.cursor();
    decoder.set_cursor(body_end);

    let node = state.namespace().search(&name)?;
    let is_scope_like = node
        .borrow()
        .object
        .borrow()
        .as_ref()
        .map(|o| o.borrow().kind.is_scope_like())
        .unwrap_or(false);
    if !is_scope_like {
        return Err(AmlError::NotAScope(name.to_display_string()));
    }
    let absolute = node.borrow().absolute_name.clone();

    state.namespace_mut().push_absolute_scope(absolute, ScopeFlags::empty());
    let window = decoder.sub_window(body_start, body_end - body_start)?;
    let result = eval_term_list(state, window, pass);
    state.namespace_mut().pop_scope();
    result
}

/// A `Buffer`/`Package`/`VarPackage` `DataRefObject` has its own nested
/// `PkgLength`; anything else is a fixed-shape `TermArg` leaf that
/// `Decoder::skip_term_arg_span` already knows how to skip. Used by the
/// namespace pass to advance past a `Name`'s value without evaluating it
/// (mirrors `termlist::skip_bare_term`).
fn skip_value_span(decoder: &mut Decoder<'_>) -> AmlResult<()> {
    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::Buffer | Opcode::Package | Opcode::VarPackage => {
            decoder.consume_opcode()?;
            let pkg = decoder.consume_pkg_length()?;
            let body_end = compute_pkg_end(decoder, pkg);
            decoder.set_cursor(body_end);
        }
        _ => decoder.skip_term_arg_span()?,
    }
    Ok(())
}

/// `DefName := NameOp NameString DataRefObject` (`spec.md` §4.10): the
/// namespace pass creates the node (reserving the name for forward
/// references) without evaluating the value; the full pass locates the
/// pre-parsed node and binds the real value.
fn eval_name(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let name = decoder.consume_name_string()?;
    match pass {
        Pass::Namespace => {
            skip_value_span(decoder)?;
            let node = state.namespace_mut().create_node(&name, ScopeFlags::empty(), CreateMode::Create)?;
            let obj = Object::new(ObjectKind::Name(RefCell::new(Data::None)));
            state.namespace().bind(&node, obj);
            node.borrow().is_pre_parsed.set(true);
        }
        Pass::Full => {
            let value = expr::eval_expr(state, decoder)?;
            let node = state.namespace().search(&name)?;
            let obj = node
                .borrow()
                .object
                .borrow()
                .clone()
                .ok_or_else(|| AmlError::NameNotFound(name.to_display_string()))?;
            if let ObjectKind::Name(cell) = &obj.borrow().kind {
                *cell.borrow_mut() = value;
            }
            node.borrow().is_evaluated.set(true);
        }
    }
    Ok(())
}

/// `DefAlias := AliasOp NameString NameString` (`spec.md` §4.10): the
/// source must already exist (aliases can't forward-reference), so this
/// only runs meaningful work on the namespace pass, exactly like every
/// other named object's node creation.
fn eval_alias(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let source_name = decoder.consume_name_string()?;
    let alias_name = decoder.consume_name_string()?;

    if pass == Pass::Namespace {
        let source_node = state.namespace().search(&source_name)?;
        let node = state.namespace_mut().create_node(&alias_name, ScopeFlags::empty(), CreateMode::Create)?;
        let obj = Object::new(ObjectKind::Alias(Rc::downgrade(&source_node)));
        state.namespace().bind(&node, obj);
        node.borrow().is_pre_parsed.set(true);
        node.borrow().is_evaluated.set(true);
    }
    Ok(())
}
