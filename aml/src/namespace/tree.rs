//! One-shot hierarchical tree build over the flat name map
//! (`spec.md` §4.3 "Tree build").

use super::node::NodeRef;
use super::path;

/// Link every node to its parent by stripping one segment off its absolute
/// path, and thread first-child/next-sibling lists. Returns the resulting
/// max depth. Safe to call again after a dynamic `Load` extends the
/// namespace: already-linked nodes are skipped.
pub fn build_or_extend(
    nodes_in_creation_order: &[NodeRef],
    lookup: impl Fn(&str) -> Option<NodeRef>,
) -> usize {
    let mut max_depth = 0usize;
    for node in nodes_in_creation_order {
        if node.borrow().parent.borrow().is_some() {
            continue;
        }
        let absolute = node.borrow().absolute_name.clone();
        if absolute == "\\" {
            continue; // root has no parent
        }
        let Some(parent_path) = path::parent_of(&absolute) else {
            continue;
        };
        let Some(parent) = lookup(&parent_path) else {
            continue;
        };
        *node.borrow().parent.borrow_mut() = Some(std::rc::Rc::downgrade(&parent));

        let mut depth = 1usize;
        let mut cursor = parent.clone();
        loop {
            let next_depth = {
                let cursor_ref = cursor.borrow();
                let p = cursor_ref.parent.borrow().as_ref().and_then(|w| w.upgrade());
                p
            };
            match next_depth {
                Some(p) => {
                    cursor = p;
                    depth += 1;
                }
                None => break,
            }
        }
        max_depth = max_depth.max(depth);

        // thread into parent's child list
        let existing_first = parent.borrow().first_child.borrow().clone();
        *node.borrow().next_sibling.borrow_mut() = existing_first;
        *parent.borrow().first_child.borrow_mut() = Some(node.clone());
    }
    max_depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::node::NamespaceNode;
    use aml_opcode::{NameSeg, ScopeFlags};
    use std::collections::HashMap;

    #[test]
    fn links_parent_child() {
        let root = NamespaceNode::new("\\".into(), NameSeg::from_str("____").unwrap(), ScopeFlags::empty());
        let sb = NamespaceNode::new(
            "\\_SB_".into(),
            NameSeg::from_str("_SB_").unwrap(),
            ScopeFlags::empty(),
        );
        let pci0 = NamespaceNode::new(
            "\\_SB_.PCI0".into(),
            NameSeg::from_str("PCI0").unwrap(),
            ScopeFlags::empty(),
        );
        let mut map = HashMap::new();
        map.insert("\\".to_string(), root.clone());
        map.insert("\\_SB_".to_string(), sb.clone());
        map.insert("\\_SB_.PCI0".to_string(), pci0.clone());
        let nodes = vec![root, sb.clone(), pci0.clone()];
        let depth = build_or_extend(&nodes, |p| map.get(p).cloned());
        assert_eq!(depth, 2);
        assert!(pci0.borrow().parent.borrow().as_ref().unwrap().upgrade().is_some());
        assert!(std::rc::Rc::ptr_eq(
            &sb.borrow().first_child.borrow().as_ref().unwrap(),
            &pci0
        ));
    }
}
