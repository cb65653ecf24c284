use std::fmt;

pub type Version = usize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Red,
    Black,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "R"),
            Color::Black => write!(f, "N"),
        }
    }
}

/// Handle into the arena that owns every node ever created. Handles are
/// never invalidated: a removed node stays in the arena so that old
/// versions can keep reaching it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// A child or parent reference. `None` is the NIL sentinel.
pub(crate) type Link = Option<NodeId>;

/// Append-only record of every value one field ever held, tagged with the
/// version that wrote it. Versions are strictly increasing; two writes
/// under the same mutation version coalesce into the last entry.
#[derive(Debug, Clone, Default)]
struct FieldHistory<T> {
    entries: Vec<(Version, T)>,
}

impl<T: Copy> FieldHistory<T> {
    /// Value the field held at `version`: the latest entry at or before it.
    fn get(&self, version: Version) -> Option<T> {
        let idx = self.entries.partition_point(|&(v, _)| v <= version);
        if idx == 0 {
            None
        } else {
            Some(self.entries[idx - 1].1)
        }
    }

    fn set(&mut self, value: T, version: Version) {
        if let Some(last) = self.entries.last_mut() {
            assert!(
                last.0 <= version,
                "history write at version {version} behind sealed version {}",
                last.0
            );
            if last.0 == version {
                last.1 = value;
                return;
            }
        }
        self.entries.push((version, value));
    }
}

#[derive(Debug, Clone)]
struct Node<K> {
    key: K,
    birth: Version,
    death: Option<Version>,
    color: FieldHistory<Color>,
    left: FieldHistory<Link>,
    right: FieldHistory<Link>,
    parent: FieldHistory<Link>,
}

/// Arena holding every node of every version, with point-in-time access to
/// the versioned fields.
#[derive(Debug, Default)]
pub(crate) struct NodeStore<K> {
    nodes: Vec<Node<K>>,
}

impl<K: Ord + Copy> NodeStore<K> {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Creates a node born at `version`. New nodes enter the tree red.
    pub(crate) fn alloc(&mut self, key: K, version: Version) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut color = FieldHistory::default();
        color.set(Color::Red, version);
        self.nodes.push(Node {
            key,
            birth: version,
            death: None,
            color,
            left: FieldHistory::default(),
            right: FieldHistory::default(),
            parent: FieldHistory::default(),
        });
        id
    }

    pub(crate) fn key(&self, id: NodeId) -> K {
        self.nodes[id.0].key
    }

    pub(crate) fn color(&self, id: NodeId, version: Version) -> Color {
        self.nodes[id.0].color.get(version).unwrap_or(Color::Red)
    }

    pub(crate) fn left(&self, id: NodeId, version: Version) -> Link {
        self.nodes[id.0].left.get(version).flatten()
    }

    pub(crate) fn right(&self, id: NodeId, version: Version) -> Link {
        self.nodes[id.0].right.get(version).flatten()
    }

    pub(crate) fn parent(&self, id: NodeId, version: Version) -> Link {
        self.nodes[id.0].parent.get(version).flatten()
    }

    pub(crate) fn set_color(&mut self, id: NodeId, color: Color, version: Version) {
        if self.color(id, version) == color {
            return;
        }
        self.nodes[id.0].color.set(color, version);
    }

    pub(crate) fn set_left(&mut self, id: NodeId, left: Link, version: Version) {
        self.nodes[id.0].left.set(left, version);
    }

    pub(crate) fn set_right(&mut self, id: NodeId, right: Link, version: Version) {
        self.nodes[id.0].right.set(right, version);
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Link, version: Version) {
        self.nodes[id.0].parent.set(parent, version);
    }

    /// Marks the node absent for every version from `version` on.
    pub(crate) fn kill(&mut self, id: NodeId, version: Version) {
        let node = &mut self.nodes[id.0];
        assert!(
            node.death.is_none(),
            "node killed twice, second death at version {version}"
        );
        node.death = Some(version);
    }

    pub(crate) fn is_live(&self, id: NodeId, version: Version) -> bool {
        let node = &self.nodes[id.0];
        version >= node.birth && node.death.map_or(true, |d| version < d)
    }
}
