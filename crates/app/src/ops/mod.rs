pub mod fetch;
pub mod init;
pub mod object;
pub mod share;
pub mod version;

pub use fetch::Fetch;
pub use init::Init;
pub use object::Object;
pub use share::Shares;
pub use version::Version;

use common::object::ObjectNode;

/// Indented listing of a tree, one node per line
pub(crate) fn render_tree(node: &ObjectNode) -> String {
    node.walk()
        .skip(1)
        .map(|(path, node)| {
            let depth = path.components().count().saturating_sub(1);
            let size = node
                .size()
                .map(|size| format!("{} B", size))
                .unwrap_or_else(|| "? B".to_string());
            let suffix = if node.is_dir() { "/" } else { "" };
            format!(
                "{}{}{} ({}, {})",
                "  ".repeat(depth),
                node.name(),
                suffix,
                size,
                node.hash().short()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
