use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ContentHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    File,
    Directory,
}

impl ObjectKind {
    pub fn is_dir(&self) -> bool {
        matches!(self, ObjectKind::Directory)
    }
}

/// Whether `name` can name a link: exactly one normal path
///  component, so joining it onto a directory stays inside it
pub fn is_valid_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    );
    single && !name.contains(['/', '\\'])
}

/// A named edge out of a directory, as the store lists it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLink {
    pub name: String,
    pub hash: ContentHash,
    pub kind: ObjectKind,
    /// Cumulative size of the linked content in bytes
    pub size: u64,
}

impl ObjectLink {
    pub fn new(name: impl Into<String>, hash: ContentHash, kind: ObjectKind, size: u64) -> Self {
        Self {
            name: name.into(),
            hash,
            kind,
            size,
        }
    }
}

/**
 * Object nodes
 * ============
 * An ObjectNode is one position in a resolved graph: a hash,
 *  the name of the edge that led to it, and for directories
 *  the nodes below it.
 * Nodes are plain values. A resolution pass produces a fresh tree,
 *  nothing is shared between passes or mutated in place by the
 *  graph components.
 * For directories, `children == None` means the listing for that
 *  hash is not known yet. Files never carry children.
 * Trees can be arbitrarily deep, so nothing here recurses: drop,
 *  clone, comparison and serde all work on a depth-first listing.
 *  The serialized form is that listing, one flat entry per node.
 */
pub struct ObjectNode {
    hash: ContentHash,
    name: String,
    kind: ObjectKind,
    size: Option<u64>,
    children: Option<BTreeMap<String, ObjectNode>>,
}

impl ObjectNode {
    /// An unresolved directory, typically a root
    pub fn directory(hash: ContentHash) -> Self {
        Self {
            hash,
            name: String::new(),
            kind: ObjectKind::Directory,
            size: None,
            children: None,
        }
    }

    pub fn file(hash: ContentHash, name: impl Into<String>, size: u64) -> Self {
        Self {
            hash,
            name: name.into(),
            kind: ObjectKind::File,
            size: Some(size),
            children: None,
        }
    }

    pub fn from_link(link: &ObjectLink) -> Self {
        Self {
            hash: link.hash.clone(),
            name: link.name.clone(),
            kind: link.kind,
            size: Some(link.size),
            children: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Attach a listing. Ignored for files.
    pub fn with_children(mut self, children: BTreeMap<String, ObjectNode>) -> Self {
        if self.kind.is_dir() {
            self.children = Some(children);
        }
        self
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_file(&self) -> bool {
        !self.kind.is_dir()
    }

    pub fn children(&self) -> Option<&BTreeMap<String, ObjectNode>> {
        self.children.as_ref()
    }

    pub(crate) fn children_mut(&mut self) -> &mut BTreeMap<String, ObjectNode> {
        self.children.get_or_insert_with(BTreeMap::new)
    }

    /// Detach the listing, leaving this node unresolved
    pub fn take_children(&mut self) -> Option<BTreeMap<String, ObjectNode>> {
        self.children.take()
    }

    pub fn child(&self, name: &str) -> Option<&ObjectNode> {
        self.children.as_ref().and_then(|children| children.get(name))
    }

    /// Whether the shape below this node is fully known
    pub fn is_resolved(&self) -> bool {
        self.preorder()
            .all(|(_, node)| node.is_file() || node.children.is_some())
    }

    /// Depth-first walk over this node and everything below it,
    ///  yielding the path of each node relative to this one.
    ///  The node itself is yielded with an empty path.
    pub fn walk(&self) -> impl Iterator<Item = (PathBuf, &ObjectNode)> {
        let mut stack = vec![(PathBuf::new(), self)];
        std::iter::from_fn(move || {
            let (path, node) = stack.pop()?;
            if let Some(children) = &node.children {
                // reversed so that siblings come out in name order
                for (name, child) in children.iter().rev() {
                    stack.push((path.join(name), child));
                }
            }
            Some((path, node))
        })
    }

    // Same walk as `walk`, with depths instead of paths
    fn preorder(&self) -> impl Iterator<Item = (usize, &ObjectNode)> {
        let mut stack = vec![(0, self)];
        std::iter::from_fn(move || {
            let (depth, node) = stack.pop()?;
            if let Some(children) = &node.children {
                for child in children.values().rev() {
                    stack.push((depth + 1, child));
                }
            }
            Some((depth, node))
        })
    }

    // Everything but the nodes below, a known listing stays known
    fn shallow(&self) -> Self {
        Self {
            hash: self.hash.clone(),
            name: self.name.clone(),
            kind: self.kind,
            size: self.size,
            children: self.children.as_ref().map(|_| BTreeMap::new()),
        }
    }

    fn same_entry(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.name == other.name
            && self.kind == other.kind
            && self.size == other.size
            && self.children.is_some() == other.children.is_some()
    }
}

// Hang `rest`, given depth-first with depths relative to `root`,
//  back under `root`
fn assemble<I>(mut root: ObjectNode, rest: I) -> ObjectNode
where
    I: IntoIterator<Item = (usize, ObjectNode)>,
{
    // parents always land before their children, `None` is the root
    let mut arena: Vec<(ObjectNode, Option<usize>)> = Vec::new();
    // arena index of the latest node at each depth
    let mut path: Vec<usize> = Vec::new();
    for (depth, node) in rest {
        path.truncate(depth.saturating_sub(1));
        arena.push((node, path.last().copied()));
        path.push(arena.len() - 1);
    }

    while let Some((node, parent)) = arena.pop() {
        let parent = match parent {
            Some(index) => &mut arena[index].0,
            None => &mut root,
        };
        parent.children_mut().insert(node.name.clone(), node);
    }
    root
}

impl Drop for ObjectNode {
    fn drop(&mut self) {
        let Some(children) = self.children.take() else {
            return;
        };
        let mut pending = vec![children];
        while let Some(children) = pending.pop() {
            for mut child in children.into_values() {
                if let Some(grandchildren) = child.children.take() {
                    pending.push(grandchildren);
                }
            }
        }
    }
}

impl Clone for ObjectNode {
    fn clone(&self) -> Self {
        let rest = self
            .preorder()
            .skip(1)
            .map(|(depth, node)| (depth, node.shallow()));
        assemble(self.shallow(), rest)
    }
}

impl PartialEq for ObjectNode {
    fn eq(&self, other: &Self) -> bool {
        let mut ours = self.preorder();
        let mut theirs = other.preorder();
        loop {
            match (ours.next(), theirs.next()) {
                (None, None) => return true,
                (Some((a_depth, a)), Some((b_depth, b))) if a_depth == b_depth && a.same_entry(b) => {}
                _ => return false,
            }
        }
    }
}

impl Eq for ObjectNode {}

impl fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectNode")
            .field("hash", &self.hash)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field(
                "children",
                &self.children.as_ref().map(|children| children.keys().collect::<Vec<_>>()),
            )
            .finish()
    }
}

#[derive(Serialize)]
struct FlatEntryRef<'a> {
    depth: usize,
    name: &'a str,
    hash: &'a ContentHash,
    kind: ObjectKind,
    size: Option<u64>,
    listed: bool,
}

#[derive(Deserialize)]
struct FlatEntry {
    depth: usize,
    name: String,
    hash: ContentHash,
    kind: ObjectKind,
    size: Option<u64>,
    listed: bool,
}

impl FlatEntry {
    fn into_node(self) -> ObjectNode {
        ObjectNode {
            children: (self.listed && self.kind.is_dir()).then(BTreeMap::new),
            hash: self.hash,
            name: self.name,
            kind: self.kind,
            size: self.size,
        }
    }
}

impl Serialize for ObjectNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.preorder().map(|(depth, node)| FlatEntryRef {
            depth,
            name: &node.name,
            hash: &node.hash,
            kind: node.kind,
            size: node.size,
            listed: node.children.is_some(),
        }))
    }
}

impl<'de> Deserialize<'de> for ObjectNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut entries = Vec::<FlatEntry>::deserialize(deserializer)?.into_iter();
        let root = match entries.next() {
            Some(entry) if entry.depth == 0 => entry.into_node(),
            _ => return Err(D::Error::custom("object tree must start with its root")),
        };

        // whether the latest node at each depth has a listing
        let mut listed = vec![root.children.is_some()];
        let mut rest = Vec::with_capacity(entries.len());
        for entry in entries {
            let depth = entry.depth;
            if depth == 0 || depth > listed.len() || !listed[depth - 1] {
                return Err(D::Error::custom(format!(
                    "object {:?} at depth {} has no listed parent",
                    entry.name, depth
                )));
            }
            listed.truncate(depth);
            let node = entry.into_node();
            listed.push(node.children.is_some());
            rest.push((depth, node));
        }
        Ok(assemble(root, rest))
    }
}
