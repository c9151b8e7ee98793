//! `TermList` evaluation driver (`spec.md` §4.1 grammar root, §4.7-§4.10).
//!
//! A `TermList` is just "zero or more `TermObj`s back to back until the
//! window runs out"; every other construct (method bodies, `Scope`/`Device`
//! bodies, `If`/`While` bodies) bounds a `Decoder` window and hands it to
//! [`eval_term_list`].

use aml_opcode::{Decoder, Opcode};

use crate::{
    error::AmlResult,
    state::{InterruptionEvent, State},
};

/// Which of the two passes over a freshly loaded definition block is
/// running (`spec.md` §2 "Control flow", §4.9).
///
/// `Namespace` only discovers named objects (so forward references resolve)
/// without evaluating operand expressions or running conditionals;
/// `Full` does the real work, in the same textual order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Namespace,
    Full,
}

/// Walk every `TermObj` in `decoder`'s current window, dispatching each to
/// its opcode-class handler. Stops early (without consuming the rest of the
/// window) the moment a control-flow interruption becomes pending, so an
/// enclosing `If`/`While`/method body unwinds promptly (`spec.md` §4.8).
pub fn eval_term_list(state: &mut State, mut decoder: Decoder<'_>, pass: Pass) -> AmlResult<()> {
    while !decoder.is_at_end() {
        if state.pending_interruption().is_some() {
            break;
        }
        eval_term_obj(state, &mut decoder, pass)?;
    }
    Ok(())
}

fn eval_term_obj(state: &mut State, decoder: &mut Decoder<'_>, pass: Pass) -> AmlResult<()> {
    let (op, _) = decoder.peek_opcode()?;

    if op.is_namespace_modifier_opcode() {
        return crate::eval::modifiers::eval(state, decoder, pass);
    }
    if op.is_named_object_opcode() {
        return crate::eval::named::eval(state, decoder, pass);
    }
    if op.is_statement_opcode() {
        if pass == Pass::Namespace {
            return crate::eval::stmt::skip(state, decoder);
        }
        return crate::eval::stmt::eval(state, decoder);
    }
    if pass == Pass::Namespace {
        // A bare expression term at namespace-pass time can't declare new
        // names by itself, but it may be an `If`/`While` guard we've
        // already skipped into, or a stray computational leaf; skip its
        // span structurally rather than executing it.
        return skip_bare_term(decoder);
    }
    // A standalone expression statement (e.g. a bare method call for its
    // side effects) evaluates for effect; the result is discarded.
    let _ = crate::eval::expr::eval_expr(state, decoder)?;
    Ok(())
}

fn skip_bare_term(decoder: &mut Decoder<'_>) -> AmlResult<()> {
    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::Buffer | Opcode::Package | Opcode::VarPackage => {
            decoder.consume_opcode()?;
            let pkg = decoder.consume_pkg_length()?;
            let body_end = (decoder.cursor() - (pkg.encoded_bytes as usize)) + pkg.total_length as usize;
            decoder.set_cursor(body_end);
        }
        _ => decoder.skip_term_arg_span()?,
    }
    Ok(())
}

/// Run `decoder`'s window to completion, honoring `Break`/`Continue` as loop
/// control for the caller (used by `While`'s body) and letting `Return`
/// propagate untouched (`spec.md` §4.8).
pub fn run_loop_body(state: &mut State, decoder: Decoder<'_>) -> AmlResult<Option<InterruptionEvent>> {
    eval_term_list(state, decoder, Pass::Full)?;
    Ok(state.pending_interruption())
}
