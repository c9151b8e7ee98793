//! Absolute-path string helpers for `NameString` resolution
//! (`spec.md` §3.4 "Lookup").
//!
//! Paths are stored as `\`-rooted, `.`-separated strings, e.g.
//! `\_SB_.PCI0._STA`; the root itself is the literal string `\`.

/// Strip the last segment off an absolute path, returning the parent's
/// absolute path. `None` for the root (it has no parent).
pub fn parent_of(absolute: &str) -> Option<String> {
    if absolute == "\\" {
        return None;
    }
    match absolute.rfind('.') {
        Some(idx) => Some(absolute[..idx].to_string()),
        None => Some("\\".to_string()),
    }
}

/// Join a scope's absolute path with one more `NameSeg`.
pub fn join(scope: &str, seg: &str) -> String {
    if scope == "\\" {
        format!("\\{seg}")
    } else {
        format!("{scope}.{seg}")
    }
}

/// Resolve a decoded `NameString` against a current scope path, per
/// `spec.md` §3.1/§3.4: an explicit root prefix anchors at `\`; each `^`
/// strips one segment off the current scope; the remaining segments are
/// appended. Returns the *candidate* absolute path — the caller still has
/// to walk upward on a miss for a bare single-segment relative name
/// (`spec.md` §3.4 "Lookup", single-segment ascent).
pub fn resolve_candidate(current_scope: &str, name: &aml_opcode::NameString) -> String {
    let mut base = if name.prefix.is_root {
        "\\".to_string()
    } else {
        let mut scope = current_scope.to_string();
        for _ in 0..name.prefix.parent_count {
            scope = parent_of(&scope).unwrap_or_else(|| "\\".to_string());
        }
        scope
    };
    for seg in &name.segments {
        base = join(&base, seg.as_str());
    }
    base
}

/// Every ancestor scope of `scope`, starting at `scope` itself and ending
/// at the root, used to walk upward one segment at a time for
/// single-segment relative lookups (`spec.md` §3.4).
pub fn ancestors(scope: &str) -> Vec<String> {
    let mut out = vec![scope.to_string()];
    let mut cur = scope.to_string();
    while let Some(parent) = parent_of(&cur) {
        out.push(parent.clone());
        cur = parent;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_strips_one_segment() {
        assert_eq!(parent_of("\\_SB_.PCI0"), Some("\\_SB_".to_string()));
        assert_eq!(parent_of("\\_SB_"), Some("\\".to_string()));
        assert_eq!(parent_of("\\"), None);
    }

    #[test]
    fn ancestors_walks_to_root() {
        assert_eq!(
            ancestors("\\_SB_.PCI0"),
            vec!["\\_SB_.PCI0", "\\_SB_", "\\"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }
}
