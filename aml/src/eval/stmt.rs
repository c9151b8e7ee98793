//! Statement opcodes: `If`/`Else`/`While`, loop control, `Return`, and the
//! handful of host-effecting one-liners (`Notify`, `Sleep`, `Stall`,
//! `Fatal`, mutex/event `Release`/`Reset`/`Signal`, `Load`/`Unload`)
//! (`spec.md` §4.8).

use aml_opcode::{Decoder, Opcode};

use crate::{
    data::Data,
    error::{AmlError, AmlResult},
    eval::expr::{self, Target},
    state::{InterruptionEvent, State},
};

fn compute_pkg_end(decoder: &Decoder<'_>, pkg: aml_opcode::PkgLength) -> usize {
    (decoder.cursor() - pkg.encoded_bytes as usize) + pkg.total_length as usize
}

fn truthy(state: &mut State, value: &Data) -> AmlResult<bool> {
    match crate::convert::to_integer(state, value, false)? {
        Data::Integer(i) => Ok(i != 0),
        _ => Ok(false),
    }
}

fn integer_of(state: &mut State, value: &Data) -> AmlResult<u64> {
    match crate::convert::to_integer(state, value, false)? {
        Data::Integer(i) => Ok(i),
        _ => Ok(0),
    }
}

/// Execute one statement (`spec.md` §4.8), the `Pass::Full` path.
pub fn eval(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::If => eval_if(state, decoder),
        Opcode::While => eval_while(state, decoder),
        Opcode::Break => {
            decoder.consume_opcode()?;
            state.set_pending_interruption(Some(InterruptionEvent::Break));
            Ok(())
        }
        Opcode::Continue => {
            decoder.consume_opcode()?;
            state.set_pending_interruption(Some(InterruptionEvent::Continue));
            Ok(())
        }
        Opcode::Return => eval_return(state, decoder),
        Opcode::Notify => eval_notify(state, decoder),
        Opcode::Sleep => eval_sleep(state, decoder),
        Opcode::Stall => eval_stall(state, decoder),
        Opcode::Fatal => eval_fatal(state, decoder),
        Opcode::BreakPoint => {
            decoder.consume_opcode()?;
            tracing::debug!("BreakPoint hit");
            Ok(())
        }
        Opcode::Noop => {
            decoder.consume_opcode()?;
            Ok(())
        }
        Opcode::Release => eval_release(state, decoder),
        Opcode::Reset => eval_reset(state, decoder),
        Opcode::Signal => eval_signal(state, decoder),
        Opcode::Load => eval_load(state, decoder),
        Opcode::Unload => eval_unload(state, decoder),
        _ => Err(AmlError::Decoder(aml_opcode::DecodeError::InvalidOpcode(0))),
    }
}

/// Structurally skip a statement during the namespace-discovery pass
/// (`spec.md` §4.9). `If`/`While` predicates are never evaluated here, but
/// their bodies are walked at `Pass::Namespace` (see
/// [`namespace_walk_if_else`]/[`namespace_walk_while`]) so named objects
/// declared only inside a conditional block are still discovered before the
/// full pass runs (`spec.md` §4.8/§4.9, `DESIGN.md`).
pub fn skip(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    let (op, _) = decoder.peek_opcode()?;
    match op {
        Opcode::If => namespace_walk_if_else(state, decoder),
        Opcode::While => namespace_walk_while(state, decoder),
        Opcode::Break | Opcode::Continue | Opcode::BreakPoint | Opcode::Noop => {
            decoder.consume_opcode()?;
            Ok(())
        }
        Opcode::Notify => {
            decoder.consume_opcode()?;
            decoder.skip_term_arg_span()?;
            decoder.skip_term_arg_span()?;
            Ok(())
        }
        Opcode::Return
        | Opcode::Sleep
        | Opcode::Stall
        | Opcode::Release
        | Opcode::Reset
        | Opcode::Signal
        | Opcode::Unload => {
            decoder.consume_opcode()?;
            decoder.skip_term_arg_span()?;
            Ok(())
        }
        Opcode::Fatal => {
            decoder.consume_opcode()?;
            decoder.consume_byte()?;
            decoder.consume_dword()?;
            decoder.skip_term_arg_span()?;
            Ok(())
        }
        Opcode::Load => {
            decoder.consume_opcode()?;
            decoder.consume_name_string()?;
            decoder.skip_term_arg_span()?;
            Ok(())
        }
        _ => Err(AmlError::Decoder(aml_opcode::DecodeError::InvalidOpcode(0))),
    }
}

/// Walk both arms of an `If`/`Else` during the namespace pass without
/// evaluating the predicate, so named objects declared in either arm are
/// discovered regardless of which branch the full pass ends up taking
/// (`spec.md` §4.8).
fn namespace_walk_if_else(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    decoder.skip_term_arg_span()?;
    let body_start = decoder.cursor();
    decoder.set_cursor(body_end);
    let window = decoder.sub_window(body_start, body_end - body_start)?;
    crate::eval::termlist::eval_term_list(state, window, crate::eval::termlist::Pass::Namespace)?;

    if decoder.peek_opcode().map(|(o, _)| o == Opcode::Else).unwrap_or(false) {
        decoder.consume_opcode()?;
        let else_pkg = decoder.consume_pkg_length()?;
        let else_end = compute_pkg_end(decoder, else_pkg);
        let else_start = decoder.cursor();
        decoder.set_cursor(else_end);
        let window = decoder.sub_window(else_start, else_end - else_start)?;
        crate::eval::termlist::eval_term_list(state, window, crate::eval::termlist::Pass::Namespace)?;
    }
    Ok(())
}

/// Walk a `While` body during the namespace pass without evaluating the
/// predicate (`spec.md` §4.8), mirroring [`namespace_walk_if_else`].
fn namespace_walk_while(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    decoder.skip_term_arg_span()?;
    let body_start = decoder.cursor();
    decoder.set_cursor(body_end);
    let window = decoder.sub_window(body_start, body_end - body_start)?;
    crate::eval::termlist::eval_term_list(state, window, crate::eval::termlist::Pass::Namespace)
}

fn eval_if(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let predicate = expr::eval_expr(state, decoder)?;
    let taken = truthy(state, &predicate)?;
    let body_start = decoder.cursor();
    decoder.set_cursor(body_end);

    let else_span = if decoder.peek_opcode().map(|(o, _)| o == Opcode::Else).unwrap_or(false) {
        decoder.consume_opcode()?;
        let else_pkg = decoder.consume_pkg_length()?;
        let else_end = compute_pkg_end(decoder, else_pkg);
        let else_start = decoder.cursor();
        decoder.set_cursor(else_end);
        Some((else_start, else_end))
    } else {
        None
    };

    if taken {
        let window = decoder.sub_window(body_start, body_end - body_start)?;
        crate::eval::termlist::eval_term_list(state, window, crate::eval::termlist::Pass::Full)?;
    } else if let Some((start, end)) = else_span {
        let window = decoder.sub_window(start, end - start)?;
        crate::eval::termlist::eval_term_list(state, window, crate::eval::termlist::Pass::Full)?;
    }
    Ok(())
}

fn eval_while(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let pkg = decoder.consume_pkg_length()?;
    let body_end = compute_pkg_end(decoder, pkg);
    let predicate_start = decoder.cursor();

    state.enter_while_loop();
    let mut iterations: u64 = 0;
    let result = loop {
        let mut probe = decoder.clone();
        probe.set_cursor(predicate_start);
        let predicate = match expr::eval_expr(state, &mut probe) {
            Ok(v) => v,
            Err(e) => break Err(e),
        };
        let keep_going = match truthy(state, &predicate) {
            Ok(v) => v,
            Err(e) => break Err(e),
        };
        if !keep_going {
            break Ok(());
        }

        let body_start = probe.cursor();
        let window = match probe.sub_window(body_start, body_end - body_start) {
            Ok(w) => w,
            Err(e) => break Err(AmlError::from(e)),
        };
        match crate::eval::termlist::run_loop_body(state, window) {
            Ok(Some(InterruptionEvent::Break)) => {
                state.set_pending_interruption(None);
                break Ok(());
            }
            Ok(Some(InterruptionEvent::Continue)) => {
                state.set_pending_interruption(None);
            }
            Ok(Some(InterruptionEvent::Return)) => break Ok(()),
            Ok(None) => {}
            Err(e) => break Err(e),
        }

        iterations += 1;
        if iterations >= state.config.max_loop_iterations {
            break Err(AmlError::LoopWatchdogExceeded);
        }
    };
    state.exit_while_loop();
    decoder.set_cursor(body_end);
    result
}

fn eval_return(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let value = expr::eval_expr(state, decoder)?;
    if let Some(frame) = state.current_method_frame_mut() {
        frame.return_slot = value;
    }
    state.set_pending_interruption(Some(InterruptionEvent::Return));
    Ok(())
}

fn resolved_object(target: Target) -> Option<crate::object::ObjectRef> {
    match target {
        Target::Object(Data::Reference(obj)) => Some(obj),
        _ => None,
    }
}

fn eval_notify(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let target = expr::parse_target(state, decoder)?;
    let value = expr::eval_expr(state, decoder)?;
    let code = integer_of(state, &value)?;
    if let Some(obj) = resolved_object(target) {
        let path = obj
            .borrow()
            .node
            .borrow()
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(|n| n.borrow().absolute_name.clone())
            .unwrap_or_default();
        state.host_mut().object_notification(&path, code)?;
    }
    Ok(())
}

fn eval_sleep(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let value = expr::eval_expr(state, decoder)?;
    let ms = integer_of(state, &value)?;
    state.host_mut().sleep(ms)?;
    Ok(())
}

fn eval_stall(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let value = expr::eval_expr(state, decoder)?;
    let us = integer_of(state, &value)?;
    state.host_mut().stall(us)?;
    Ok(())
}

fn eval_fatal(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let fatal_type = decoder.consume_byte()?;
    let code = decoder.consume_dword()?;
    let arg_value = expr::eval_expr(state, decoder)?;
    let arg = integer_of(state, &arg_value)?;
    Err(AmlError::Fatal { fatal_type, code, arg })
}

fn eval_release(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let target = expr::parse_target(state, decoder)?;
    if let Some(obj) = resolved_object(target) {
        let handle = expr::mutex_handle_of(state, &obj)?;
        state.host_mut().mutex_release(handle)?;
        if let Some(frame) = state.current_method_frame_mut() {
            frame.record_mutex_release(handle);
        }
    }
    Ok(())
}

fn eval_reset(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let target = expr::parse_target(state, decoder)?;
    if let Some(obj) = resolved_object(target) {
        let handle = expr::event_handle_of(state, &obj)?;
        state.host_mut().event_reset(handle)?;
    }
    Ok(())
}

fn eval_signal(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let target = expr::parse_target(state, decoder)?;
    if let Some(obj) = resolved_object(target) {
        let handle = expr::event_handle_of(state, &obj)?;
        state.host_mut().event_signal(handle)?;
    }
    Ok(())
}

/// `Load` (`spec.md` §4.8): read raw table bytes out of an already-present
/// named object (typically a field over a firmware-mapped buffer), then run
/// it through the normal two-pass load path.
fn eval_load(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let name = decoder.consume_name_string()?;
    let node = state.namespace().search(&name)?;
    let obj = node
        .borrow()
        .object
        .borrow()
        .clone()
        .ok_or_else(|| AmlError::NameNotFound(name.to_display_string()))?;
    let value = expr::read_object_value(state, &obj)?;
    let bytes = match crate::convert::to_buffer(state, &value, false)? {
        Data::Buffer(b) => b.borrow().as_slice().to_vec(),
        _ => Vec::new(),
    };
    let target = expr::parse_target(state, decoder)?;
    state.load_table(bytes)?;
    let handle = Data::Integer(state.tables.len() as u64);
    expr::store_result(state, &target, &handle)?;
    Ok(())
}

/// `Unload` (`spec.md` §4.8): dynamic table unload is not supported; logged
/// and otherwise a no-op (`SPEC_FULL.md` §2 Non-goals).
fn eval_unload(state: &mut State, decoder: &mut Decoder<'_>) -> AmlResult<()> {
    decoder.consume_opcode()?;
    let _handle = expr::parse_target(state, decoder)?;
    tracing::debug!("Unload requested; dynamic table unload is not supported");
    Ok(())
}
