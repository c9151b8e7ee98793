//! Allocation snapshot/rollback (`spec.md` §2 item 1, §3.6, §4.12).
//!
//! The original hand-rolls a bump arena with a savepoint journal; Rust's
//! allocator already gives us safe, individually-freeable allocations, so
//! this module keeps only the journal half: a stack of "snapshot items"
//! recording which namespace nodes and object references were created or
//! taken since a savepoint, so a failed method invocation or table load can
//! be unwound (`spec.md` §4.12).

/// One undoable action recorded since the most recent `begin` call.
enum SnapshotItem {
    /// A namespace node was created at this absolute path.
    NodeCreated(String),
    /// A strong reference to an object was taken (e.g. a `Data::Reference`
    /// stored into a `Local`); unwinding just drops the clone.
    ObjectRefTaken(crate::object::ObjectRef),
}

/// One nesting level of the snapshot stack (`spec.md` §3.6).
struct SnapshotLevel {
    items: Vec<SnapshotItem>,
}

/// `spec.md` §4.12: "Snapshots nest; rollback undoes back to the most
/// recent begin."
#[derive(Default)]
pub struct SnapshotStack {
    levels: Vec<SnapshotLevel>,
}

impl SnapshotStack {
    pub fn new() -> Self {
        SnapshotStack { levels: Vec::new() }
    }

    pub fn begin(&mut self) {
        self.levels.push(SnapshotLevel { items: Vec::new() });
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn record_node_created(&mut self, absolute: String) {
        if let Some(level) = self.levels.last_mut() {
            level.items.push(SnapshotItem::NodeCreated(absolute));
        }
    }

    pub fn record_object_ref(&mut self, obj: crate::object::ObjectRef) {
        if let Some(level) = self.levels.last_mut() {
            level.items.push(SnapshotItem::ObjectRefTaken(obj));
        }
    }

    /// `spec.md` §4.12 "Commit drops the items without undoing them; at
    /// outermost commit, the snapshot arena is fully reclaimed."
    pub fn commit(&mut self) {
        self.levels.pop();
    }

    /// `spec.md` §4.12 "Rollback undoes back to the most recent begin": walk
    /// the current level's items LIFO, releasing nodes created under it.
    pub fn rollback(&mut self, namespace: &mut crate::namespace::Namespace) {
        let Some(level) = self.levels.pop() else {
            return;
        };
        for item in level.items.into_iter().rev() {
            match item {
                SnapshotItem::NodeCreated(absolute) => {
                    namespace.remove_node(&absolute);
                }
                SnapshotItem::ObjectRefTaken(_obj) => {
                    // Dropping `_obj` here releases the strong reference
                    // this snapshot level took.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{CreateMode, Namespace};
    use aml_opcode::{Decoder, ScopeFlags};

    #[test]
    fn rollback_removes_nodes_created_under_it() {
        let mut ns = Namespace::new();
        let mut snap = SnapshotStack::new();
        snap.begin();

        let mut d = Decoder::new(b"FOO_");
        let name = d.consume_name_string().unwrap();
        ns.create_node(&name, ScopeFlags::empty(), CreateMode::Create)
            .unwrap();
        snap.record_node_created("\\FOO_".to_string());
        assert!(ns.get_absolute("\\FOO_").is_some());

        snap.rollback(&mut ns);
        assert!(ns.get_absolute("\\FOO_").is_none());
    }

    #[test]
    fn commit_keeps_nodes_and_pops_level() {
        let mut snap = SnapshotStack::new();
        snap.begin();
        snap.begin();
        assert_eq!(snap.depth(), 2);
        snap.commit();
        assert_eq!(snap.depth(), 1);
    }
}
