//! `NamespaceNode` (`spec.md` §3.4).

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use aml_opcode::{NameSeg, ScopeFlags};

use crate::object::ObjectRef;

pub type NodeRef = Rc<RefCell<NamespaceNode>>;
pub type WeakNodeRef = Weak<RefCell<NamespaceNode>>;

#[derive(Debug)]
pub struct NamespaceNode {
    /// Absolute, root-prefixed, fully expanded dotted name, e.g. `\_SB_.PCI0`.
    pub absolute_name: String,
    pub local_name: NameSeg,
    pub object: RefCell<Option<ObjectRef>>,
    pub flags: Cell<ScopeFlags>,
    pub is_pre_parsed: Cell<bool>,
    pub is_evaluated: Cell<bool>,
    pub parent: RefCell<Option<WeakNodeRef>>,
    pub first_child: RefCell<Option<NodeRef>>,
    pub next_sibling: RefCell<Option<NodeRef>>,
}

impl NamespaceNode {
    pub fn new(absolute_name: String, local_name: NameSeg, flags: ScopeFlags) -> NodeRef {
        Rc::new(RefCell::new(NamespaceNode {
            absolute_name,
            local_name,
            object: RefCell::new(None),
            flags: Cell::new(flags),
            is_pre_parsed: Cell::new(false),
            is_evaluated: Cell::new(false),
            parent: RefCell::new(None),
            first_child: RefCell::new(None),
            next_sibling: RefCell::new(None),
        }))
    }

    pub fn is_temporary(&self) -> bool {
        self.flags.get().contains(ScopeFlags::TEMPORARY)
    }

    pub fn is_boundary(&self) -> bool {
        self.flags.get().contains(ScopeFlags::BOUNDARY)
    }
}

/// Bind `object`'s non-owning back-pointer to `node`, and `node`'s strong
/// slot to `object` (`spec.md` §3.3 "a strong back-pointer (non-owning) to
/// its namespace node").
pub fn bind(node: &NodeRef, object: ObjectRef) {
    *object.borrow().node.borrow_mut() = Some(Rc::downgrade(node));
    *node.borrow().object.borrow_mut() = Some(object);
}
