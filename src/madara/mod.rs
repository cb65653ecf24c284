use std::cmp::Ordering;
use std::fmt::Debug;

use anyhow::{bail, Result};

pub mod cli;
pub mod parser;
pub mod processor;
mod store;

pub use store::{Color, Version};

use store::{Link, NodeId, NodeStore};

/// Total number of versions a tree may hold, counting the empty version 0.
pub const MAX_VERSIONS: usize = 100;

/// One visited node of an in-order traversal: its key, its distance in
/// edges from the root of the queried version, and its color there.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NodeEntry<K> {
    pub key: K,
    pub depth: usize,
    pub color: Color,
}

impl<K> NodeEntry<K> {
    pub fn new(key: K, depth: usize, color: Color) -> Self {
        Self { key, depth, color }
    }
}

/// A partially persistent red-black tree over `Ord` keys.
///
/// Every insert or remove publishes a new version; any published version
/// stays readable forever. Only the latest version can be mutated. Nodes
/// are shared between versions: a mutation rewrites the touched fields
/// under the new version and leaves every older record in place.
#[derive(Debug)]
pub struct Madara<K: Ord + Copy + Debug> {
    store: NodeStore<K>,
    roots: Vec<Link>,
    max_versions: usize,
    len: usize,
}

impl<K: Ord + Copy + Debug> Default for Madara<K> {
    fn default() -> Self {
        Self::new(MAX_VERSIONS)
    }
}

impl<K: Ord + Copy + Debug> Madara<K> {
    /// Creates an empty tree. Version 0 is the empty version; up to
    /// `max_versions - 1` mutations fit before the budget runs out.
    pub fn new(max_versions: usize) -> Self {
        let mut roots = Vec::with_capacity(max_versions);
        roots.push(None);
        Self {
            store: NodeStore::new(),
            roots,
            max_versions,
            len: 0,
        }
    }

    /// Number of keys in the latest version.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The largest published version.
    pub fn current_version(&self) -> Version {
        self.roots.len() - 1
    }

    /// Number of published versions, the empty version 0 included.
    pub fn version_count(&self) -> usize {
        self.roots.len()
    }

    fn root_at(&self, version: Version) -> Result<Link> {
        if version > self.current_version() {
            bail!(
                "version {version} out of range, latest is {}",
                self.current_version()
            );
        }
        Ok(self.roots[version])
    }

    fn next_version(&self) -> Result<Version> {
        if self.roots.len() >= self.max_versions {
            bail!("version budget of {} exhausted", self.max_versions);
        }
        Ok(self.roots.len())
    }

    fn publish(&mut self, root: Link) {
        self.roots.push(root);
        debug_assert!(self.check_tree(self.current_version()).is_ok());
    }

    fn find(&self, key: K, root: Link, version: Version) -> Link {
        let mut cur = root;
        while let Some(id) = cur {
            cur = match key.cmp(&self.store.key(id)) {
                Ordering::Less => self.store.left(id, version),
                Ordering::Greater => self.store.right(id, version),
                Ordering::Equal => return cur,
            };
        }
        None
    }

    /// Whether `key` is present at `version`.
    pub fn contains(&self, key: K, version: Version) -> Result<bool> {
        let root = self.root_at(version)?;
        Ok(self.find(key, root, version).is_some())
    }

    /// Inserts `key`, publishing a new version. Inserting a key that is
    /// already present changes no membership but still consumes a version.
    pub fn insert(&mut self, key: K) -> Result<()> {
        let version = self.next_version()?;
        let mut root = self.roots[version - 1];

        let mut parent = None;
        let mut cur = root;
        while let Some(id) = cur {
            parent = cur;
            cur = match key.cmp(&self.store.key(id)) {
                Ordering::Less => self.store.left(id, version),
                Ordering::Greater => self.store.right(id, version),
                Ordering::Equal => {
                    self.publish(root);
                    return Ok(());
                }
            };
        }

        let node = self.store.alloc(key, version);
        match parent {
            None => root = Some(node),
            Some(p) => {
                self.store.set_parent(node, parent, version);
                if key < self.store.key(p) {
                    self.store.set_left(p, Some(node), version);
                } else {
                    self.store.set_right(p, Some(node), version);
                }
            }
        }

        self.insert_fixup(node, &mut root, version);
        self.len += 1;
        self.publish(root);
        Ok(())
    }

    /// Removes `key`, publishing a new version. Removing an absent key
    /// changes no membership but still consumes a version.
    pub fn remove(&mut self, key: K) -> Result<()> {
        let version = self.next_version()?;
        let mut root = self.roots[version - 1];

        let Some(target) = self.find(key, root, version) else {
            self.publish(root);
            return Ok(());
        };

        self.remove_node(target, &mut root, version);
        self.len -= 1;
        self.publish(root);
        Ok(())
    }

    /// Smallest key strictly greater than `key` at `version`, or `None`
    /// when every key is at most `key`.
    pub fn successor(&self, key: K, version: Version) -> Result<Option<K>> {
        let root = self.root_at(version)?;
        let mut best = None;
        let mut cur = root;
        while let Some(id) = cur {
            if self.store.key(id) > key {
                best = Some(self.store.key(id));
                cur = self.store.left(id, version);
            } else {
                cur = self.store.right(id, version);
            }
        }
        Ok(best)
    }

    /// Lazy in-order traversal of `version`, ascending by key.
    pub fn inorder(&self, version: Version) -> Result<InorderIter<'_, K>> {
        let root = self.root_at(version)?;
        let mut iter = InorderIter {
            store: &self.store,
            version,
            stack: Vec::new(),
        };
        iter.push_left_spine(root, 0);
        Ok(iter)
    }

    fn is_red(&self, link: Link, version: Version) -> bool {
        link.is_some_and(|id| self.store.color(id, version) == Color::Red)
    }

    fn is_black(&self, link: Link, version: Version) -> bool {
        !self.is_red(link, version)
    }

    fn min_node(&self, mut id: NodeId, version: Version) -> NodeId {
        while let Some(left) = self.store.left(id, version) {
            id = left;
        }
        id
    }

    fn rotate_left(&mut self, x: NodeId, root: &mut Link, version: Version) {
        let Some(y) = self.store.right(x, version) else {
            return;
        };
        let inner = self.store.left(y, version);
        self.store.set_right(x, inner, version);
        if let Some(inner) = inner {
            self.store.set_parent(inner, Some(x), version);
        }
        let up = self.store.parent(x, version);
        self.store.set_parent(y, up, version);
        match up {
            None => *root = Some(y),
            Some(p) => {
                if self.store.left(p, version) == Some(x) {
                    self.store.set_left(p, Some(y), version);
                } else {
                    self.store.set_right(p, Some(y), version);
                }
            }
        }
        self.store.set_left(y, Some(x), version);
        self.store.set_parent(x, Some(y), version);
    }

    fn rotate_right(&mut self, x: NodeId, root: &mut Link, version: Version) {
        let Some(y) = self.store.left(x, version) else {
            return;
        };
        let inner = self.store.right(y, version);
        self.store.set_left(x, inner, version);
        if let Some(inner) = inner {
            self.store.set_parent(inner, Some(x), version);
        }
        let up = self.store.parent(x, version);
        self.store.set_parent(y, up, version);
        match up {
            None => *root = Some(y),
            Some(p) => {
                if self.store.right(p, version) == Some(x) {
                    self.store.set_right(p, Some(y), version);
                } else {
                    self.store.set_left(p, Some(y), version);
                }
            }
        }
        self.store.set_right(y, Some(x), version);
        self.store.set_parent(x, Some(y), version);
    }

    fn insert_fixup(&mut self, node: NodeId, root: &mut Link, version: Version) {
        let mut cabra = node;
        loop {
            let Some(parent) = self.store.parent(cabra, version) else {
                break;
            };
            if self.store.color(parent, version) == Color::Black {
                break;
            }
            let Some(grand) = self.store.parent(parent, version) else {
                break;
            };

            if Some(parent) == self.store.left(grand, version) {
                let uncle = self.store.right(grand, version);

                // Case 1
                if self.is_red(uncle, version) {
                    self.store.set_color(parent, Color::Black, version);
                    if let Some(uncle) = uncle {
                        self.store.set_color(uncle, Color::Black, version);
                    }
                    self.store.set_color(grand, Color::Red, version);
                    cabra = grand;
                    continue;
                }

                // Case 2
                if Some(cabra) == self.store.right(parent, version) {
                    cabra = parent;
                    self.rotate_left(cabra, root, version);
                }

                // Case 3
                if let Some(parent) = self.store.parent(cabra, version) {
                    self.store.set_color(parent, Color::Black, version);
                    if let Some(grand) = self.store.parent(parent, version) {
                        self.store.set_color(grand, Color::Red, version);
                        self.rotate_right(grand, root, version);
                    }
                }
            } else {
                let uncle = self.store.left(grand, version);

                // Case 4
                if self.is_red(uncle, version) {
                    self.store.set_color(parent, Color::Black, version);
                    if let Some(uncle) = uncle {
                        self.store.set_color(uncle, Color::Black, version);
                    }
                    self.store.set_color(grand, Color::Red, version);
                    cabra = grand;
                    continue;
                }

                // Case 5
                if Some(cabra) == self.store.left(parent, version) {
                    cabra = parent;
                    self.rotate_right(cabra, root, version);
                }

                // Case 6
                if let Some(parent) = self.store.parent(cabra, version) {
                    self.store.set_color(parent, Color::Black, version);
                    if let Some(grand) = self.store.parent(parent, version) {
                        self.store.set_color(grand, Color::Red, version);
                        self.rotate_left(grand, root, version);
                    }
                }
            }
        }

        if let Some(root) = *root {
            self.store.set_color(root, Color::Black, version);
        }
    }

    /// Points the parent of `from` at `to` instead, or re-roots the tree
    /// when `from` was the root. `to`'s parent link follows suit.
    fn transplant(&mut self, from: NodeId, to: Link, root: &mut Link, version: Version) {
        let up = self.store.parent(from, version);
        match up {
            None => *root = to,
            Some(p) => {
                if self.store.left(p, version) == Some(from) {
                    self.store.set_left(p, to, version);
                } else {
                    self.store.set_right(p, to, version);
                }
            }
        }
        if let Some(to) = to {
            self.store.set_parent(to, up, version);
        }
    }

    fn remove_node(&mut self, z: NodeId, root: &mut Link, version: Version) {
        let left = self.store.left(z, version);
        let right = self.store.right(z, version);

        let (spliced_color, fix_child, fix_parent) = match (left, right) {
            (None, _) => {
                let up = self.store.parent(z, version);
                self.transplant(z, right, root, version);
                (self.store.color(z, version), right, up)
            }
            (_, None) => {
                let up = self.store.parent(z, version);
                self.transplant(z, left, root, version);
                (self.store.color(z, version), left, up)
            }
            (Some(l), Some(r)) => {
                // The in-order successor takes z's place structurally; z's
                // key never moves between nodes.
                let succ = self.min_node(r, version);
                let succ_color = self.store.color(succ, version);
                let x = self.store.right(succ, version);
                let x_parent;
                if self.store.parent(succ, version) == Some(z) {
                    x_parent = Some(succ);
                } else {
                    x_parent = self.store.parent(succ, version);
                    self.transplant(succ, x, root, version);
                    self.store.set_right(succ, Some(r), version);
                    self.store.set_parent(r, Some(succ), version);
                }
                self.transplant(z, Some(succ), root, version);
                self.store.set_left(succ, Some(l), version);
                self.store.set_parent(l, Some(succ), version);
                let z_color = self.store.color(z, version);
                self.store.set_color(succ, z_color, version);
                (succ_color, x, x_parent)
            }
        };

        self.store.kill(z, version);

        if spliced_color == Color::Black {
            self.remove_fixup(fix_child, fix_parent, root, version);
        }
    }

    fn remove_fixup(&mut self, x: Link, x_parent: Link, root: &mut Link, version: Version) {
        let mut cabra = x;
        let mut up = x_parent;
        while cabra != *root && self.is_black(cabra, version) {
            let Some(p) = up else {
                break;
            };
            if cabra == self.store.left(p, version) {
                let mut sibling = self.store.right(p, version);

                // Case 1
                if self.is_red(sibling, version) {
                    if let Some(s) = sibling {
                        self.store.set_color(s, Color::Black, version);
                    }
                    self.store.set_color(p, Color::Red, version);
                    self.rotate_left(p, root, version);
                    sibling = self.store.right(p, version);
                }

                let Some(s) = sibling else {
                    cabra = Some(p);
                    up = self.store.parent(p, version);
                    continue;
                };

                let near = self.store.left(s, version);
                let far = self.store.right(s, version);
                if self.is_black(near, version) && self.is_black(far, version) {
                    // Case 2
                    self.store.set_color(s, Color::Red, version);
                    cabra = Some(p);
                    up = self.store.parent(p, version);
                } else {
                    let mut s = s;
                    if self.is_black(far, version) {
                        // Case 3
                        if let Some(near) = near {
                            self.store.set_color(near, Color::Black, version);
                        }
                        self.store.set_color(s, Color::Red, version);
                        self.rotate_right(s, root, version);
                        if let Some(next) = self.store.right(p, version) {
                            s = next;
                        }
                    }

                    // Case 4
                    let p_color = self.store.color(p, version);
                    self.store.set_color(s, p_color, version);
                    self.store.set_color(p, Color::Black, version);
                    if let Some(far) = self.store.right(s, version) {
                        self.store.set_color(far, Color::Black, version);
                    }
                    self.rotate_left(p, root, version);
                    cabra = *root;
                    up = None;
                }
            } else {
                let mut sibling = self.store.left(p, version);

                // Case 5
                if self.is_red(sibling, version) {
                    if let Some(s) = sibling {
                        self.store.set_color(s, Color::Black, version);
                    }
                    self.store.set_color(p, Color::Red, version);
                    self.rotate_right(p, root, version);
                    sibling = self.store.left(p, version);
                }

                let Some(s) = sibling else {
                    cabra = Some(p);
                    up = self.store.parent(p, version);
                    continue;
                };

                let near = self.store.right(s, version);
                let far = self.store.left(s, version);
                if self.is_black(near, version) && self.is_black(far, version) {
                    // Case 6
                    self.store.set_color(s, Color::Red, version);
                    cabra = Some(p);
                    up = self.store.parent(p, version);
                } else {
                    let mut s = s;
                    if self.is_black(far, version) {
                        // Case 7
                        if let Some(near) = near {
                            self.store.set_color(near, Color::Black, version);
                        }
                        self.store.set_color(s, Color::Red, version);
                        self.rotate_left(s, root, version);
                        if let Some(next) = self.store.left(p, version) {
                            s = next;
                        }
                    }

                    // Case 8
                    let p_color = self.store.color(p, version);
                    self.store.set_color(s, p_color, version);
                    self.store.set_color(p, Color::Black, version);
                    if let Some(far) = self.store.left(s, version) {
                        self.store.set_color(far, Color::Black, version);
                    }
                    self.rotate_right(p, root, version);
                    cabra = *root;
                    up = None;
                }
            }
        }

        if let Some(cabra) = cabra {
            self.store.set_color(cabra, Color::Black, version);
        }
    }

    /// Walks the whole tree of `version` and reports the first red-black,
    /// ordering, liveness or linkage breach it finds.
    pub fn check_tree(&self, version: Version) -> Result<()> {
        let root = self.root_at(version)?;
        if self.is_red(root, version) {
            bail!("root is red at version {version}");
        }
        if let Some(id) = root {
            if self.store.parent(id, version).is_some() {
                bail!("root has a parent at version {version}");
            }
        }
        self.check_subtree(root, version, None, None)?;
        Ok(())
    }

    fn check_subtree(
        &self,
        link: Link,
        version: Version,
        low: Option<K>,
        high: Option<K>,
    ) -> Result<usize> {
        let Some(id) = link else {
            // NIL counts as one black node.
            return Ok(1);
        };
        let key = self.store.key(id);
        if !self.store.is_live(id, version) {
            bail!("dead node {key:?} reachable at version {version}");
        }
        if let Some(low) = low {
            if key <= low {
                bail!("key {key:?} breaks ordering under {low:?}");
            }
        }
        if let Some(high) = high {
            if key >= high {
                bail!("key {key:?} breaks ordering under {high:?}");
            }
        }
        let left = self.store.left(id, version);
        let right = self.store.right(id, version);
        for child in [left, right].into_iter().flatten() {
            if self.store.parent(child, version) != Some(id) {
                bail!(
                    "parent of {:?} does not point back to {key:?}",
                    self.store.key(child)
                );
            }
        }
        let color = self.store.color(id, version);
        if color == Color::Red && (self.is_red(left, version) || self.is_red(right, version)) {
            bail!("red node {key:?} has a red child at version {version}");
        }
        let left_height = self.check_subtree(left, version, low, Some(key))?;
        let right_height = self.check_subtree(right, version, Some(key), high)?;
        if left_height != right_height {
            bail!("black height differs under {key:?} at version {version}");
        }
        Ok(left_height + usize::from(color == Color::Black))
    }
}

/// Iterator behind [`Madara::inorder`]. Descends lazily, holding the left
/// spine still to visit on an explicit stack.
pub struct InorderIter<'a, K: Ord + Copy> {
    store: &'a NodeStore<K>,
    version: Version,
    stack: Vec<(NodeId, usize)>,
}

impl<'a, K: Ord + Copy> InorderIter<'a, K> {
    fn push_left_spine(&mut self, mut link: Link, mut depth: usize) {
        while let Some(id) = link {
            self.stack.push((id, depth));
            link = self.store.left(id, self.version);
            depth += 1;
        }
    }
}

impl<'a, K: Ord + Copy> Iterator for InorderIter<'a, K> {
    type Item = NodeEntry<K>;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let entry = NodeEntry::new(
            self.store.key(id),
            depth,
            self.store.color(id, self.version),
        );
        self.push_left_spine(self.store.right(id, self.version), depth + 1);
        Some(entry)
    }
}
