use std::path::Path;

use tree_sitter::Node;

use crate::graph::Position;

/// Source text for a node, trimmed.
pub fn node_text(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    source.get(start..end).unwrap_or("").trim().to_string()
}

/// 1-based position of a node's start, tagged with the file it came from.
pub fn node_pos(node: Node<'_>, file: &str) -> Position {
    let start = node.start_position();
    Position::new(file, start.row as i64 + 1, start.column as i64 + 1)
}

/// Strips the quotes from a Go string literal, handling both interpreted
/// (`"..."`) and raw (`` `...` ``) forms.
pub fn unquote_go_string(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        return Some(trimmed[1..trimmed.len() - 1].to_string());
    }
    if trimmed.starts_with('`') && trimmed.ends_with('`') && trimmed.len() >= 2 {
        return Some(trimmed[1..trimmed.len() - 1].to_string());
    }
    None
}

/// Relative path rendered with forward slashes regardless of platform.
pub fn unix_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unquote_handles_both_string_forms() {
        assert_eq!(unquote_go_string("\"/users\"").as_deref(), Some("/users"));
        assert_eq!(unquote_go_string("`raw`").as_deref(), Some("raw"));
        assert_eq!(unquote_go_string("ident"), None);
        assert_eq!(unquote_go_string(""), None);
    }

    #[test]
    fn unix_path_joins_components() {
        let p: PathBuf = ["internal", "api", "routes.go"].iter().collect();
        assert_eq!(unix_path(&p), "internal/api/routes.go");
    }
}
