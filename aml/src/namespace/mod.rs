//! The namespace: flat name map, scope stack and tree build
//! (`spec.md` §3.4, §4.3).

pub mod node;
pub mod path;
pub mod scope_stack;
pub mod tree;

use aml_opcode::{NameString, ScopeFlags};
use hashbrown::HashMap;

use crate::error::{AmlError, AmlResult};
use node::{bind, NamespaceNode, NodeRef};
use scope_stack::ScopeStack;

/// Whether `Create` semantics are requested: make missing parent nodes
/// along the way, or fail if the target (or any ancestor) is missing
/// (`spec.md` §4.3 "Push scope").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Create,
    MustExist,
}

pub struct Namespace {
    flat: HashMap<String, NodeRef>,
    root: NodeRef,
    scopes: ScopeStack,
    /// Creation order, needed by [`tree::build_or_extend`] to link parents
    /// before children regardless of insertion order within a pass.
    creation_order: Vec<NodeRef>,
    /// Count of currently-pushed `Temporary` scope frames, including any
    /// nested non-`Temporary` frames pushed underneath one (e.g. a `Scope`
    /// block evaluated inside a method body). Any node created while this
    /// is nonzero is itself flagged `Temporary` regardless of the flags the
    /// caller passed to [`Namespace::create_node`], so it is released when
    /// the enclosing method frame's scope pops (`spec.md` §3.5, §4.3, §4.11).
    temporary_depth: u32,
}

impl Namespace {
    pub fn new() -> Self {
        let root = NamespaceNode::new(
            "\\".to_string(),
            aml_opcode::NameSeg::ROOT,
            ScopeFlags::empty(),
        );
        let mut flat = HashMap::new();
        flat.insert("\\".to_string(), root.clone());
        let mut ns = Namespace {
            flat,
            root: root.clone(),
            scopes: ScopeStack::new(),
            creation_order: vec![root],
            temporary_depth: 0,
        };
        ns.scopes.push("\\".to_string(), ScopeFlags::empty());
        ns
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn get_absolute(&self, absolute: &str) -> Option<NodeRef> {
        self.flat.get(absolute).cloned()
    }

    pub fn current_scope_path(&self) -> String {
        self.scopes.current_path().to_string()
    }

    /// `spec.md` §4.3 "Search": resolve prefix, then segment-by-segment,
    /// with single-segment relative names ascending the scope stack until
    /// they hit a `Boundary` frame or the root.
    pub fn search(&self, name: &NameString) -> AmlResult<NodeRef> {
        if name.is_null() {
            return Err(AmlError::NameNotFound("<null>".to_string()));
        }
        let current = self.scopes.current_path().to_string();

        // Absolute names (rooted, or with >1 segment, or any parent-prefix)
        // resolve directly against the computed candidate path; only a bare
        // single-segment relative name ascends the scope stack.
        let is_plain_relative =
            !name.prefix.is_root && name.prefix.parent_count == 0 && name.segments.len() <= 1;

        if !is_plain_relative {
            let candidate = path::resolve_candidate(&current, name);
            return self
                .flat
                .get(&candidate)
                .cloned()
                .ok_or_else(|| AmlError::NameNotFound(candidate));
        }

        if name.segments.is_empty() {
            // Bare prefix (only possible here with no root/parent, i.e. a
            // null name) was already rejected above.
            return self
                .flat
                .get(&current)
                .cloned()
                .ok_or_else(|| AmlError::NameNotFound(current));
        }

        let seg = name.segments[0].as_str();
        for scope in path::ancestors(&current) {
            let candidate = path::join(&scope, seg);
            if let Some(node) = self.flat.get(&candidate) {
                return Ok(node.clone());
            }
            if let Some(scope_node) = self.flat.get(&scope) {
                if scope_node.borrow().is_boundary() && scope != current {
                    break;
                }
            }
        }
        Err(AmlError::NameNotFound(format!(
            "{seg} (relative to {current})"
        )))
    }

    /// Flags a freshly-created node should actually carry: `flags` plus
    /// `Temporary` whenever we're nested under a `Temporary` scope frame,
    /// regardless of what the specific caller passed in.
    fn effective_node_flags(&self, flags: ScopeFlags) -> ScopeFlags {
        if self.temporary_depth > 0 {
            flags | ScopeFlags::TEMPORARY
        } else {
            flags
        }
    }

    /// `spec.md` §4.3 "Create node": normalize to an absolute path, insert
    /// into the flat map, fail on collision.
    pub fn create_node(
        &mut self,
        name: &NameString,
        flags: ScopeFlags,
        mode: CreateMode,
    ) -> AmlResult<NodeRef> {
        let current = self.scopes.current_path().to_string();
        let absolute = path::resolve_candidate(&current, name);
        if self.flat.contains_key(&absolute) {
            return Err(AmlError::NameCollision(absolute));
        }
        if mode == CreateMode::Create {
            self.ensure_parent_chain(&absolute)?;
        }
        let local = absolute
            .rsplit('.')
            .next()
            .unwrap_or(&absolute)
            .trim_start_matches('\\');
        let local_seg = if local.is_empty() {
            aml_opcode::NameSeg::ROOT
        } else {
            aml_opcode::NameSeg::from_str(local).unwrap_or(aml_opcode::NameSeg::ROOT)
        };
        let node = NamespaceNode::new(absolute.clone(), local_seg, self.effective_node_flags(flags));
        self.flat.insert(absolute.clone(), node.clone());
        self.creation_order.push(node.clone());
        self.scopes.record_created(absolute);
        Ok(node)
    }

    fn ensure_parent_chain(&mut self, absolute: &str) -> AmlResult<()> {
        let Some(parent) = path::parent_of(absolute) else {
            return Ok(());
        };
        if self.flat.contains_key(&parent) {
            return Ok(());
        }
        self.ensure_parent_chain(&parent)?;
        let local = parent.rsplit('.').next().unwrap_or(&parent).trim_start_matches('\\');
        let local_seg = aml_opcode::NameSeg::from_str(local).unwrap_or(aml_opcode::NameSeg::ROOT);
        let node = NamespaceNode::new(parent.clone(), local_seg, self.effective_node_flags(ScopeFlags::empty()));
        self.flat.insert(parent.clone(), node.clone());
        self.creation_order.push(node);
        Ok(())
    }

    /// `spec.md` §4.3 "Push scope": resolve (or, with `Create`, build) the
    /// target node, then push a stack frame over its absolute path.
    pub fn push_scope(
        &mut self,
        name: &NameString,
        flags: ScopeFlags,
        mode: CreateMode,
    ) -> AmlResult<String> {
        let current = self.scopes.current_path().to_string();
        let absolute = path::resolve_candidate(&current, name);
        if !self.flat.contains_key(&absolute) {
            if mode == CreateMode::Create {
                self.ensure_parent_chain(&absolute)?;
                let local =
                    absolute.rsplit('.').next().unwrap_or(&absolute).trim_start_matches('\\');
                let local_seg =
                    aml_opcode::NameSeg::from_str(local).unwrap_or(aml_opcode::NameSeg::ROOT);
                let node =
                    NamespaceNode::new(absolute.clone(), local_seg, self.effective_node_flags(ScopeFlags::empty()));
                self.flat.insert(absolute.clone(), node.clone());
                self.creation_order.push(node);
            } else {
                return Err(AmlError::NameNotFound(absolute));
            }
        }
        if flags.contains(ScopeFlags::TEMPORARY) {
            self.temporary_depth += 1;
        }
        self.scopes.push(absolute.clone(), flags);
        Ok(absolute)
    }

    /// `spec.md` §4.3 "Pop scope": pop; if the frame was `Temporary`,
    /// release every node created under it whose own flags are `Temporary`.
    pub fn pop_scope(&mut self) {
        let Some(frame) = self.scopes.pop() else {
            return;
        };
        if frame.flags.contains(ScopeFlags::TEMPORARY) {
            self.temporary_depth = self.temporary_depth.saturating_sub(1);
        }
        if !frame.flags.contains(ScopeFlags::TEMPORARY) {
            return;
        }
        for absolute in frame.created_nodes {
            let is_temp = self
                .flat
                .get(&absolute)
                .map(|n| n.borrow().is_temporary())
                .unwrap_or(false);
            if is_temp {
                self.flat.remove(&absolute);
                self.creation_order.retain(|n| n.borrow().absolute_name != absolute);
            }
        }
    }

    pub fn push_absolute_scope(&mut self, absolute: String, flags: ScopeFlags) {
        if flags.contains(ScopeFlags::TEMPORARY) {
            self.temporary_depth += 1;
        }
        self.scopes.push(absolute, flags);
    }

    /// Re-run the tree build over every node created since the last call
    /// (`spec.md` §4.3 "Tree build" — "Subsequent dynamic loads extend the
    /// tree in place").
    pub fn rebuild_tree(&mut self) -> usize {
        let flat = &self.flat;
        tree::build_or_extend(&self.creation_order, |p| flat.get(p).cloned())
    }

    pub fn bind(&self, node: &NodeRef, object: crate::object::ObjectRef) {
        bind(node, object);
    }

    pub fn node_count(&self) -> usize {
        self.flat.len()
    }

    /// Remove a single node by absolute path, used by snapshot rollback
    /// (`spec.md` §4.12). Unlinks it from the flat map and the creation
    /// order; does not attempt to unlink it from the tree (rolled-back
    /// nodes are always pre-tree-build, per `spec.md` §4.11 step 5).
    pub fn remove_node(&mut self, absolute: &str) {
        self.flat.remove(absolute);
        self.creation_order
            .retain(|n| n.borrow().absolute_name != absolute);
    }

    pub fn iter_tree_dfs(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        fn visit(node: &NodeRef, out: &mut Vec<NodeRef>) {
            out.push(node.clone());
            let mut child = node.borrow().first_child.borrow().clone();
            while let Some(c) = child {
                visit(&c, out);
                child = c.borrow().next_sibling.borrow().clone();
            }
        }
        visit(&self.root, &mut out);
        out
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aml_opcode::Decoder;

    fn parse_name(s: &str) -> NameString {
        let bytes = s.as_bytes();
        let mut full = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\\' || bytes[i] == b'^' {
                full.push(bytes[i]);
                i += 1;
                continue;
            }
            break;
        }
        let rest: Vec<&str> = s[i..].split('.').filter(|s| !s.is_empty()).collect();
        match rest.len() {
            0 => full.push(0x00),
            1 => full.extend_from_slice(pad4(rest[0]).as_bytes()),
            2 => {
                full.push(0x2E);
                full.extend_from_slice(pad4(rest[0]).as_bytes());
                full.extend_from_slice(pad4(rest[1]).as_bytes());
            }
            n => {
                full.push(0x2F);
                full.push(n as u8);
                for seg in rest {
                    full.extend_from_slice(pad4(seg).as_bytes());
                }
            }
        }
        let mut d = Decoder::new(&full);
        d.consume_name_string().unwrap()
    }

    fn pad4(s: &str) -> String {
        let mut out = s.to_string();
        while out.len() < 4 {
            out.push('_');
        }
        out
    }

    #[test]
    fn create_and_search_absolute() {
        let mut ns = Namespace::new();
        let name = parse_name("\\_SB_.PCI0");
        ns.create_node(&name, ScopeFlags::empty(), CreateMode::Create)
            .unwrap();
        let found = ns.search(&name).unwrap();
        assert_eq!(found.borrow().absolute_name, "\\_SB_.PCI0");
    }

    #[test]
    fn relative_single_segment_ascends() {
        let mut ns = Namespace::new();
        let sb = parse_name("\\_SB_");
        ns.create_node(&sb, ScopeFlags::empty(), CreateMode::Create)
            .unwrap();
        let foo = parse_name("\\_SB_.FOO_");
        ns.create_node(&foo, ScopeFlags::empty(), CreateMode::Create)
            .unwrap();
        ns.push_absolute_scope("\\_SB_".to_string(), ScopeFlags::empty());
        let rel = parse_name("FOO_");
        let found = ns.search(&rel).unwrap();
        assert_eq!(found.borrow().absolute_name, "\\_SB_.FOO_");
    }

    #[test]
    fn duplicate_create_fails() {
        let mut ns = Namespace::new();
        let name = parse_name("\\FOO_");
        ns.create_node(&name, ScopeFlags::empty(), CreateMode::Create)
            .unwrap();
        assert!(ns
            .create_node(&name, ScopeFlags::empty(), CreateMode::Create)
            .is_err());
    }

    #[test]
    fn temporary_scope_pop_releases_nodes() {
        let mut ns = Namespace::new();
        ns.push_scope(
            &parse_name("\\_MT0"),
            ScopeFlags::TEMPORARY,
            CreateMode::Create,
        )
        .unwrap();
        let local = parse_name("LOC0");
        ns.create_node(&local, ScopeFlags::TEMPORARY, CreateMode::Create)
            .unwrap();
        assert!(ns.get_absolute("\\_MT0.LOC0").is_some());
        ns.pop_scope();
        assert!(ns.get_absolute("\\_MT0.LOC0").is_none());
    }
}
