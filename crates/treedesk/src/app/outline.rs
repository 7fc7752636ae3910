//! ASCII outline of the tree.

use crate::app::tree::PathTree;
use crate::domain::model::join_path;

/// Render every node with its icon, one per line.
///
/// Example output:
/// ```text
/// 🏠 Workspace
/// ├── 📁 Documents
/// │   └── 📄 Welcome
/// └── 👥 Organigram
/// ```
pub fn render_outline(tree: &PathTree) -> String {
    let mut output = String::new();
    for name in tree.child_names("").unwrap_or_default() {
        render_node(&mut output, tree, name, "", "", true);
    }
    output
}

fn render_node(
    output: &mut String,
    tree: &PathTree,
    path: &str,
    prefix: &str,
    branch: &str,
    is_root: bool,
) {
    let Ok(node) = tree.resolve(path) else {
        return;
    };
    let icon = node.icon().unwrap_or_else(|| node.kind().default_icon());

    output.push_str(prefix);
    output.push_str(branch);
    output.push_str(icon);
    output.push(' ');
    output.push_str(node.name());
    output.push('\n');

    let child_prefix = if is_root {
        String::new()
    } else if branch == LAST {
        format!("{prefix}    ")
    } else {
        format!("{prefix}│   ")
    };

    let names = tree.child_names(path).unwrap_or_default();
    for (i, name) in names.iter().enumerate() {
        let child_branch = if i + 1 == names.len() { LAST } else { MIDDLE };
        render_node(
            output,
            tree,
            &join_path(path, name),
            &child_prefix,
            child_branch,
            false,
        );
    }
}

const MIDDLE: &str = "├── ";
const LAST: &str = "└── ";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::NodeTemplate;

    #[test]
    fn renders_empty_tree_as_nothing() {
        assert_eq!(render_outline(&PathTree::new()), "");
    }

    #[test]
    fn renders_nested_children_with_guides() {
        let mut tree = PathTree::new();
        tree.add("", "A", &NodeTemplate::folder()).unwrap();
        tree.add("A", "B", &NodeTemplate::folder()).unwrap();
        tree.add("A/B", "Doc", &NodeTemplate::document()).unwrap();
        tree.add("A", "C", &NodeTemplate::organigram()).unwrap();

        assert_eq!(
            render_outline(&tree),
            "📁 A\n├── 📁 B\n│   └── 📄 Doc\n└── 👥 C\n"
        );
    }
}
