//! Scope stack (`spec.md` §3.4 "Scope stack", §4.3 "Push scope"/"Pop scope").

use aml_opcode::ScopeFlags;

use super::node::NodeRef;

#[derive(Debug, Clone)]
pub struct ScopeFrame {
    pub absolute_path: String,
    pub flags: ScopeFlags,
    /// Absolute paths of every node created while this frame was on top of
    /// the stack. On pop, any of these still flagged `Temporary` are
    /// released (`spec.md` §4.3 "Pop scope").
    pub created_nodes: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack { frames: Vec::new() }
    }

    pub fn push(&mut self, absolute_path: String, flags: ScopeFlags) {
        self.frames.push(ScopeFrame {
            absolute_path,
            flags,
            created_nodes: Vec::new(),
        });
    }

    pub fn pop(&mut self) -> Option<ScopeFrame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&ScopeFrame> {
        self.frames.last()
    }

    pub fn record_created(&mut self, absolute_path: String) {
        if let Some(frame) = self.frames.last_mut() {
            frame.created_nodes.push(absolute_path);
        }
    }

    pub fn current_path(&self) -> &str {
        self.frames.last().map(|f| f.absolute_path.as_str()).unwrap_or("\\")
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Nodes whose `ScopeFlags::BOUNDARY` is set stop upward relative-name
/// resolution from propagating past them (`spec.md` §3.4 "Lookup").
pub fn blocks_upward_search(node: &NodeRef) -> bool {
    node.borrow().is_boundary()
}
