//! Method scope frame and invocation machinery (`spec.md` §3.5, §4.11).

use aml_opcode::ScopeFlags;

use crate::{
    data::Data,
    error::{AmlError, AmlResult},
    object::{MethodBody, ObjectKind, ObjectRef},
    state::{InterruptionEvent, State},
};

/// One entry in a frame's mutex chain: a mutex touched during the call and
/// how many times it was acquired under this frame, so the frame can
/// release exactly that many times on pop (`spec.md` §3.5, §5).
pub struct MutexAcquisition {
    pub handle: u64,
    pub count: u32,
}

/// `spec.md` §3.5 "Method scope frame".
pub struct MethodFrame {
    pub absolute_path: String,
    pub args: [Data; 7],
    pub locals: [Data; 8],
    pub mutex_chain: Vec<MutexAcquisition>,
    pub return_slot: Data,
}

impl MethodFrame {
    fn new(absolute_path: String) -> Self {
        MethodFrame {
            absolute_path,
            args: Default::default(),
            locals: Default::default(),
            mutex_chain: Vec::new(),
            return_slot: Data::None,
        }
    }

    pub fn record_mutex_acquire(&mut self, handle: u64) {
        if let Some(entry) = self.mutex_chain.iter_mut().find(|m| m.handle == handle) {
            entry.count += 1;
        } else {
            self.mutex_chain.push(MutexAcquisition { handle, count: 1 });
        }
    }

    pub fn record_mutex_release(&mut self, handle: u64) {
        if let Some(entry) = self.mutex_chain.iter_mut().find(|m| m.handle == handle) {
            entry.count = entry.count.saturating_sub(1);
        }
    }
}

/// `spec.md` §4.11 "Method invocation". `args` is owned by the caller;
/// the first `arg_count` entries are deep-copied into the new frame's
/// `Arg` slots.
#[tracing::instrument(skip(state, args), fields(args = args.len()))]
pub fn invoke(state: &mut State, object: &ObjectRef, args: &[Data]) -> AmlResult<Data> {
    let (absolute_path, arg_count, body_snapshot) = {
        let borrowed = object.borrow();
        let ObjectKind::Method(m) = &borrowed.kind else {
            return Err(AmlError::WrongType(borrowed.kind.acpi_type()));
        };
        let path = borrowed
            .node
            .borrow()
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(|n| n.borrow().absolute_name.clone())
            .unwrap_or_else(|| "<native>".to_string());
        (path, m.arg_count, clone_body(&m.body))
    };

    tracing::debug!(method = %absolute_path, "invoking method");

    let mut frame = MethodFrame::new(absolute_path.clone());
    for (i, arg) in args.iter().take(arg_count as usize).enumerate() {
        frame.args[i] = arg.duplicate();
    }

    state.snapshots.begin();
    state.namespace_mut().push_absolute_scope(
        absolute_path.clone(),
        ScopeFlags::TEMPORARY,
    );
    state.method_frames.push(frame);

    let run_result = match body_snapshot {
        BodySnapshot::Native(native) => native(state, args),
        BodySnapshot::Bytecode { table, start, end } => run_bytecode_body(state, &table, start, end),
    };

    let interruption = state.pending_interruption();
    state.set_pending_interruption(None);

    state.namespace_mut().pop_scope();

    let mut frame = state
        .method_frames
        .pop()
        .expect("frame pushed above must still be present");

    let final_result: AmlResult<()> = match (&run_result, interruption) {
        (Ok(()), Some(InterruptionEvent::Return) | None) => Ok(()),
        (Ok(()), Some(other)) => {
            tracing::warn!(?other, "loop control left pending at method exit");
            Err(AmlError::InterruptionMisuse)
        }
        (Err(_), _) => Ok(()),
    };

    match (&run_result, &final_result) {
        (Ok(()), Ok(())) => {
            state.snapshots.commit();
        }
        _ => {
            state.snapshots.rollback(state.namespace_mut());
        }
    }

    // Release every mutex this frame acquired, `count` times each, so
    // methods cannot leak ownership (`spec.md` §4.11 step 8, §5).
    for acquisition in &frame.mutex_chain {
        for _ in 0..acquisition.count {
            let _ = state.host_mut().mutex_release(acquisition.handle);
        }
    }

    run_result?;
    final_result?;

    Ok(std::mem::take(&mut frame.return_slot))
}

enum BodySnapshot {
    Native(std::rc::Rc<dyn Fn(&mut State, &[Data]) -> AmlResult<Data>>),
    Bytecode {
        table: std::rc::Rc<Vec<u8>>,
        start: usize,
        end: usize,
    },
}

fn clone_body(body: &MethodBody) -> BodySnapshot {
    match body {
        MethodBody::Native(f) => BodySnapshot::Native(f.clone()),
        MethodBody::Bytecode { table, start, end } => BodySnapshot::Bytecode {
            table: table.clone(),
            start: *start,
            end: *end,
        },
    }
}

/// Methods are re-parsed on every invocation rather than once at table
/// load, so a body run needs its own namespace pass first: any `Name`,
/// `OperationRegion`, `Field`, `Mutex`, `Event`, or `CreateXField` declared
/// in the body must exist in the namespace before the full pass reaches the
/// statement that uses it (`spec.md` §4.11 step 5). The scope pushed in
/// `invoke` is `Temporary`, so every node the namespace pass creates here is
/// released again when that scope pops.
fn run_bytecode_body(state: &mut State, table: &std::rc::Rc<Vec<u8>>, start: usize, end: usize) -> AmlResult<()> {
    let namespace_decoder = aml_opcode::Decoder::at(table.as_slice(), start, end);
    crate::eval::termlist::eval_term_list(state, namespace_decoder, crate::eval::termlist::Pass::Namespace)?;

    let decoder = aml_opcode::Decoder::at(table.as_slice(), start, end);
    crate::eval::termlist::eval_term_list(state, decoder, crate::eval::termlist::Pass::Full)?;
    Ok(())
}

/// Read an `Arg`/`Local` slot, auto-dereferencing a `Reference` value
/// except when the caller is specifically a `DerefOf` (`spec.md` §4.11).
pub fn read_arg_or_local(state: &mut State, slot: &Data, auto_deref: bool) -> AmlResult<Data> {
    if auto_deref {
        if let Data::Reference(obj) = slot {
            return crate::eval::expr::read_object_value(state, obj);
        }
    }
    Ok(slot.clone())
}

/// Writing into an `Arg` that holds a reference dereferences to the
/// target; writing into a `Local` always replaces the slot
/// (`spec.md` §4.11).
pub fn write_arg(state: &mut State, slot: &mut Data, value: &Data) -> AmlResult<()> {
    if let Data::Reference(obj) = slot {
        let obj = obj.clone();
        return crate::convert::store_into_object(state, &obj, value);
    }
    crate::convert::implicit_store(state, value, slot)
}

pub fn write_local(_state: &mut State, slot: &mut Data, value: Data) {
    *slot = value;
}
