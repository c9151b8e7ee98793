//! Device lifecycle: `_STA`, `_INI`, `_REG` broadcast (`spec.md` §4.13).

use aml_opcode::{DeviceStatus, NameSeg};

use crate::{
    data::Data,
    error::AmlResult,
    object::{ObjectKind, ObjectRef},
    region::RegionSpace,
    state::State,
};

fn find_child_method(state: &State, node: &crate::namespace::node::NodeRef, seg: &str) -> Option<ObjectRef> {
    let name = NameSeg::from_str(seg).ok()?;
    let child_path = format!("{}.{}", node.borrow().absolute_name, name.as_str());
    let child_path = if node.borrow().absolute_name == "\\" {
        format!("\\{}", name.as_str())
    } else {
        child_path
    };
    state
        .namespace()
        .get_absolute(&child_path)
        .and_then(|n| n.borrow().object.borrow().clone())
        .filter(|o| matches!(o.borrow().kind, ObjectKind::Method(_)))
}

/// `_STA` (`spec.md` §4.13): call the child `_STA` method if present,
/// otherwise default to all flags set.
pub fn evaluate_sta(state: &mut State, node: &crate::namespace::node::NodeRef) -> AmlResult<DeviceStatus> {
    let Some(method) = find_child_method(state, node, "_STA") else {
        return Ok(DeviceStatus::default());
    };
    let result = crate::method::invoke(state, &method, &[])?;
    let bits = match result {
        Data::Integer(i) => i as u32,
        _ => DeviceStatus::default().bits(),
    };
    Ok(DeviceStatus::from_bits_truncate(bits))
}

/// `_INI` (`spec.md` §4.13): depth-first traversal; devices/processors/
/// thermal zones whose `_STA` is `Present & Functioning` get `_INI` called
/// and are marked initialized; `Functioning` clear skips the whole subtree.
pub fn run_init_traversal(state: &mut State) -> AmlResult<()> {
    let nodes = state.namespace().iter_tree_dfs();
    run_init_recursive(state, &nodes, 0, usize::MAX)
}

fn run_init_recursive(
    state: &mut State,
    nodes: &[crate::namespace::node::NodeRef],
    _start: usize,
    _end: usize,
) -> AmlResult<()> {
    for node in nodes {
        let is_device_like = {
            let obj = node.borrow().object.borrow().clone();
            obj.map(|o| {
                matches!(
                    o.borrow().kind,
                    ObjectKind::Device(_) | ObjectKind::Processor(_) | ObjectKind::ThermalZone
                )
            })
            .unwrap_or(false)
        };
        if !is_device_like {
            continue;
        }
        let sta = evaluate_sta(state, node)?;
        if !sta.contains(DeviceStatus::FUNCTIONING) {
            tracing::debug!(node = %node.borrow().absolute_name, "skipping non-functioning subtree");
            continue;
        }
        if sta.contains(DeviceStatus::PRESENT) {
            if let Some(ini) = find_child_method(state, node, "_INI") {
                crate::method::invoke(state, &ini, &[])?;
                let obj = node.borrow().object.borrow().clone();
                if let Some(obj) = obj {
                    obj.borrow().is_initialized_device.set(true);
                }
            }
            let path = node.borrow().absolute_name.clone();
            let _ = state.host_mut().on_device_initialized(&path, sta.bits());
        }
    }
    Ok(())
}

/// Unconditionally invokes `\_INI` and `\_SB_._INI` (if present) ahead of
/// the ordinary traversal, then runs [`run_init_traversal`]
/// (`spec.md` §4.13 "Optionally ... on by default at initial load
/// completion").
pub fn run_unconditional_init_bootstrap(state: &mut State) -> AmlResult<()> {
    for path in ["\\_INI", "\\_SB_._INI"] {
        if let Some(node) = state.namespace().get_absolute(path) {
            if let Some(obj) = node.borrow().object.borrow().clone() {
                if matches!(obj.borrow().kind, ObjectKind::Method(_)) {
                    tracing::debug!(%path, "running unconditional bootstrap init");
                    crate::method::invoke(state, &obj, &[])?;
                }
            }
        }
    }
    run_init_traversal(state)
}

/// `_REG` broadcast (`spec.md` §4.13): DFS the tree; for each scope-like
/// node with a `_REG` child taking two args, call it with
/// `(space_type, enabled)`, skipping nodes already broadcast for this
/// space and eliding the three always-available spaces entirely.
pub fn broadcast_reg(state: &mut State, space: RegionSpace, enabled: bool) -> AmlResult<()> {
    if space.reg_broadcast_elided() {
        return Ok(());
    }
    let nodes = state.namespace().iter_tree_dfs();
    for node in nodes {
        let obj = node.borrow().object.borrow().clone();
        let Some(obj) = obj else { continue };
        let is_scope_like = obj.borrow().kind.is_scope_like();
        let has_children = node.borrow().first_child.borrow().is_some();
        if !is_scope_like && !has_children {
            continue;
        }
        if obj.borrow().has_broadcast(space) {
            continue;
        }
        if let Some(reg) = find_child_method(state, &node, "_REG") {
            let args = [Data::Integer(space.to_byte() as u64), Data::Integer(enabled as u64)];
            crate::method::invoke(state, &reg, &args)?;
        }
        obj.borrow().mark_broadcast(space);
    }
    Ok(())
}
