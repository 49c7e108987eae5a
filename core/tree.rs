use crate::error::{AppError, Result};
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "lowercase"))]
pub enum NodeKind {
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct TreeNode {
    pub name: String,
    #[cfg_attr(feature = "serde_support", serde(rename = "type"))]
    pub kind: NodeKind,
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Vec::is_empty")
    )]
    pub children: Vec<TreeNode>,
}

/// Directories before files, then case-sensitive ordinal by name.
fn node_order(a: &TreeNode, b: &TreeNode) -> Ordering {
    match (a.kind, b.kind) {
        (NodeKind::Directory, NodeKind::File) => Ordering::Less,
        (NodeKind::File, NodeKind::Directory) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    }
}

/// Builds a nested tree from `/`-separated relative file paths.
///
/// A trailing `/` marks a directory. Every level comes back sorted.
pub fn build_tree_from_paths(relative_paths: &[String]) -> Vec<TreeNode> {
    log::debug!(
        "Building tree structure from {} paths...",
        relative_paths.len()
    );
    let mut root_nodes: Vec<TreeNode> = Vec::new();

    for rel_path_str in relative_paths {
        let is_dir = rel_path_str.ends_with('/');
        let components: Vec<&str> = rel_path_str
            .split(['/', '\\'])
            .filter(|c| !c.is_empty() && *c != ".")
            .collect();

        if components.is_empty() {
            continue;
        }
        if let Err(e) = insert_node(&mut root_nodes, &components, is_dir) {
            log::error!(
                "Error inserting node into tree for path \"{}\": {}",
                rel_path_str,
                e
            );
        }
    }

    sort_nodes(&mut root_nodes);
    root_nodes
}

fn sort_nodes(nodes: &mut [TreeNode]) {
    nodes.sort_by(node_order);
    for node in nodes.iter_mut() {
        sort_nodes(&mut node.children);
    }
}

fn insert_node(
    current_level_nodes: &mut Vec<TreeNode>,
    components: &[&str],
    is_dir_at_end: bool,
) -> Result<()> {
    let Some((component_name, remaining_components)) = components.split_first() else {
        return Ok(());
    };
    let is_last_component = remaining_components.is_empty();

    let position = current_level_nodes
        .iter()
        .position(|node| node.name == *component_name);

    match position {
        Some(index) => {
            let existing_node = &mut current_level_nodes[index];
            if !is_last_component {
                if existing_node.kind == NodeKind::File {
                    return Err(AppError::InvalidArgument(format!(
                        "Tree conflict: Trying to create children within file component {}",
                        component_name
                    )));
                }
                insert_node(
                    &mut existing_node.children,
                    remaining_components,
                    is_dir_at_end,
                )?;
            } else if is_dir_at_end && existing_node.kind == NodeKind::File {
                existing_node.kind = NodeKind::Directory;
            }
        }
        None => {
            let kind = if is_last_component && !is_dir_at_end {
                NodeKind::File
            } else {
                NodeKind::Directory
            };
            let mut new_node = TreeNode {
                name: component_name.to_string(),
                kind,
                children: Vec::new(),
            };
            if !is_last_component {
                insert_node(&mut new_node.children, remaining_components, is_dir_at_end)?;
            }
            current_level_nodes.push(new_node);
        }
    }
    Ok(())
}

/// Renders sorted nodes as an ASCII tree, one entry per line.
pub fn render_ascii_tree(nodes: &[TreeNode]) -> String {
    let mut out = String::new();
    render_level(nodes, "", &mut out);
    out
}

fn render_level(nodes: &[TreeNode], prefix: &str, out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i + 1 == nodes.len();
        out.push_str(prefix);
        out.push_str(if is_last { "└── " } else { "├── " });
        out.push_str(&node.name);
        out.push('\n');
        if !node.children.is_empty() {
            let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            render_level(&node.children, &child_prefix, out);
        }
    }
}

/// Tree view of the included files, or `None` when fewer than two files are
/// included.
pub fn summarize_paths(relative_paths: &[String]) -> Option<String> {
    if relative_paths.len() < 2 {
        return None;
    }
    Some(render_ascii_tree(&build_tree_from_paths(relative_paths)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn directories_sort_before_files() {
        let nodes = build_tree_from_paths(&paths(&["b.txt", "a/", "a/c.txt"]));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "a");
        assert_eq!(nodes[0].kind, NodeKind::Directory);
        assert_eq!(nodes[0].children[0].name, "c.txt");
        assert_eq!(nodes[1].name, "b.txt");
        assert_eq!(nodes[1].kind, NodeKind::File);
    }

    #[test]
    fn renders_connectors() {
        let rendered = render_ascii_tree(&build_tree_from_paths(&paths(&[
            "src/main.rs",
            "src/util/io.rs",
            "README.md",
            "Cargo.toml",
        ])));
        assert_eq!(
            rendered,
            "├── src\n\
             │   ├── util\n\
             │   │   └── io.rs\n\
             │   └── main.rs\n\
             ├── Cargo.toml\n\
             └── README.md\n"
        );
    }

    #[test]
    fn ordering_is_case_sensitive_ordinal() {
        let nodes = build_tree_from_paths(&paths(&["b.rs", "B.rs", "a.rs"]));
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["B.rs", "a.rs", "b.rs"]);
    }

    #[test]
    fn file_used_as_parent_is_skipped() {
        let nodes = build_tree_from_paths(&paths(&["a", "a/b.txt"]));
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].children.is_empty());
    }

    #[test]
    fn single_file_has_no_tree() {
        assert_eq!(summarize_paths(&paths(&["only.rs"])), None);
        assert!(summarize_paths(&paths(&["a.rs", "b.rs"])).is_some());
    }
}
