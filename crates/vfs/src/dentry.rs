//! TEAM_202: Dentry (Directory Entry Cache) Implementation
//!
//! The dentry cache (dcache) caches path→inode lookups to avoid
//! repeated filesystem traversals.
//!
//! TEAM_436: Dentries live in a generational arena owned by the
//! [`DentryTree`]. Parent and child links are [`DentryId`]s, so the tree has
//! no reference cycles and a dropped entry turns outstanding ids stale
//! instead of dangling. Every dentry is positive: a name is only attached
//! once the filesystem has produced its inode.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use los_utils::{Arena, ArenaId};

use crate::error::{VfsError, VfsResult};
use crate::inode::InodeRef;
use crate::superblock::Superblock;

/// Stable handle to a cached dentry.
pub type DentryId = ArenaId;

/// TEAM_202: Directory Entry Cache Entry
pub struct Dentry {
    /// Name of this entry (e.g., "foo" in "/bar/foo"); "/" for volume roots
    pub name: String,
    pub inode: InodeRef,
    /// Parent dentry on the same volume (None for a volume root)
    pub parent: Option<DentryId>,
    pub sb: Arc<Superblock>,
    children: Vec<DentryId>,
    /// Open files referencing this dentry
    pins: AtomicUsize,
}

impl Dentry {
    fn new(name: &str, inode: InodeRef, parent: Option<DentryId>, sb: Arc<Superblock>) -> Self {
        Self {
            name: String::from(name),
            inode,
            parent,
            sb,
            children: Vec::new(),
            pins: AtomicUsize::new(0),
        }
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[DentryId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn pins(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }

    pub fn pin(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unpin(&self) {
        let _ = self
            .pins
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

impl core::fmt::Debug for Dentry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dentry")
            .field("name", &self.name)
            .field("ino", &self.inode.ino)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .field("pins", &self.pins())
            .finish()
    }
}

/// TEAM_436: Arena of every cached dentry across all mounted volumes.
#[derive(Default)]
pub struct DentryTree {
    arena: Arena<Dentry>,
}

impl DentryTree {
    pub const fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    /// Allocate a parentless dentry for a volume root.
    pub fn alloc_root(&mut self, name: &str, inode: InodeRef, sb: Arc<Superblock>) -> DentryId {
        self.arena.insert(Dentry::new(name, inode, None, sb))
    }

    /// `NotFound` for ids that were pruned or unmounted.
    pub fn get(&self, id: DentryId) -> VfsResult<&Dentry> {
        self.arena.get(id).ok_or(VfsError::NotFound)
    }

    pub fn contains(&self, id: DentryId) -> bool {
        self.arena.contains(id)
    }

    /// Exact-name search of `parent`'s children.
    pub fn find_child(&self, parent: DentryId, name: &str) -> Option<DentryId> {
        let parent = self.arena.get(parent)?;
        parent
            .children
            .iter()
            .copied()
            .find(|&child| self.arena.get(child).is_some_and(|d| d.name == name))
    }

    /// Append a new child named `name` to `parent`, on the parent's volume.
    pub fn attach(&mut self, parent: DentryId, name: &str, inode: InodeRef) -> VfsResult<DentryId> {
        if self.find_child(parent, name).is_some() {
            return Err(VfsError::AlreadyExists);
        }
        let sb = self.get(parent)?.sb.clone();
        let id = self.arena.insert(Dentry::new(name, inode, Some(parent), sb));
        if let Some(p) = self.arena.get_mut(parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    fn detach_from_parent(&mut self, id: DentryId, parent: Option<DentryId>) {
        if let Some(p) = parent.and_then(|p| self.arena.get_mut(p)) {
            p.children.retain(|&c| c != id);
        }
    }

    /// Drop `root` and everything below it. Returns the number removed.
    pub fn remove_subtree(&mut self, root: DentryId) -> usize {
        let Some(parent) = self.arena.get(root).map(|d| d.parent) else {
            return 0;
        };
        self.detach_from_parent(root, parent);

        let mut removed = 0;
        let mut stack = alloc::vec![root];
        while let Some(id) = stack.pop() {
            if let Some(dentry) = self.arena.remove(id) {
                stack.extend(dentry.children);
                removed += 1;
            }
        }
        removed
    }

    /// Evict unpinned leaves that are not volume roots, repeating until
    /// nothing qualifies. `keep` vetoes individual entries.
    ///
    /// TEAM_445: A child of a directory whose inode cannot `lookup` is never
    /// evicted; dropping it would lose the name for good.
    pub fn prune(&mut self, keep: impl Fn(DentryId, &Dentry) -> bool) -> usize {
        let mut pruned = 0;
        loop {
            let victims: Vec<(DentryId, Option<DentryId>)> = self
                .arena
                .iter()
                .filter(|(id, d)| {
                    !d.is_root()
                        && d.children.is_empty()
                        && d.pins() == 0
                        && self.parent_can_lookup(d)
                        && !keep(*id, *d)
                })
                .map(|(id, d)| (id, d.parent))
                .collect();
            if victims.is_empty() {
                return pruned;
            }
            for (id, parent) in victims {
                self.detach_from_parent(id, parent);
                self.arena.remove(id);
                pruned += 1;
            }
        }
    }

    fn parent_can_lookup(&self, dentry: &Dentry) -> bool {
        dentry
            .parent
            .and_then(|p| self.arena.get(p))
            .is_some_and(|p| p.inode.ops.can_lookup())
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DentryId, &Dentry)> {
        self.arena.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::Inode;
    use crate::mode::{S_IFDIR, S_IFREG};
    use crate::ops::InodeOps;

    struct NoOps;
    impl InodeOps for NoOps {}

    /// Directories that can find their entries again.
    struct Findable;
    impl InodeOps for Findable {
        fn can_lookup(&self) -> bool {
            true
        }
    }

    fn tree_with_root() -> (DentryTree, DentryId, Arc<Superblock>) {
        let sb = Superblock::builder("t", "d").build().unwrap();
        let mut tree = DentryTree::new();
        let root = tree.alloc_root("/", inode(&sb, 1, S_IFDIR), sb.clone());
        (tree, root, sb)
    }

    fn inode(sb: &Arc<Superblock>, ino: u64, mode: u32) -> InodeRef {
        Arc::new(Inode::new(sb, ino, mode, Arc::new(Findable)))
    }

    #[test]
    fn test_attach_and_find() {
        let (mut tree, root, sb) = tree_with_root();
        let a = tree.attach(root, "a", inode(&sb, 2, S_IFDIR)).unwrap();
        let b = tree.attach(root, "b", inode(&sb, 3, S_IFREG)).unwrap();
        assert_eq!(tree.find_child(root, "a"), Some(a));
        assert_eq!(tree.find_child(root, "b"), Some(b));
        assert_eq!(tree.find_child(root, "c"), None);
        assert_eq!(tree.get(root).unwrap().children(), &[a, b]);
        assert_eq!(tree.get(a).unwrap().parent, Some(root));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (mut tree, root, sb) = tree_with_root();
        tree.attach(root, "a", inode(&sb, 2, S_IFREG)).unwrap();
        assert_eq!(
            tree.attach(root, "a", inode(&sb, 3, S_IFREG)).unwrap_err(),
            VfsError::AlreadyExists
        );
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_prune_skips_pinned_and_roots() {
        let (mut tree, root, sb) = tree_with_root();
        let a = tree.attach(root, "a", inode(&sb, 2, S_IFDIR)).unwrap();
        let b = tree.attach(a, "b", inode(&sb, 3, S_IFREG)).unwrap();
        let c = tree.attach(root, "c", inode(&sb, 4, S_IFREG)).unwrap();
        tree.get(b).unwrap().pin();

        // c goes; a survives because its child b is pinned
        assert_eq!(tree.prune(|_, _| false), 1);
        assert!(!tree.contains(c));
        assert!(tree.contains(a));

        tree.get(b).unwrap().unpin();
        // b, then a on the next round
        assert_eq!(tree.prune(|_, _| false), 2);
        assert_eq!(tree.len(), 1);
        assert!(tree.get(root).unwrap().children().is_empty());
    }

    #[test]
    fn test_prune_respects_keep() {
        let (mut tree, root, sb) = tree_with_root();
        let a = tree.attach(root, "a", inode(&sb, 2, S_IFDIR)).unwrap();
        assert_eq!(tree.prune(|id, _| id == a), 0);
        assert!(tree.contains(a));
    }

    #[test]
    fn test_prune_keeps_children_of_create_only_dirs() {
        let (mut tree, root, sb) = tree_with_root();
        let dir = Arc::new(Inode::new(&sb, 2, S_IFDIR, Arc::new(NoOps)));
        let a = tree.attach(root, "a", dir).unwrap();
        let b = tree.attach(a, "b", inode(&sb, 3, S_IFREG)).unwrap();

        assert_eq!(tree.prune(|_, _| false), 0);
        assert!(tree.contains(a));
        assert!(tree.contains(b));
    }

    #[test]
    fn test_remove_subtree_stales_ids() {
        let (mut tree, root, sb) = tree_with_root();
        let a = tree.attach(root, "a", inode(&sb, 2, S_IFDIR)).unwrap();
        let b = tree.attach(a, "b", inode(&sb, 3, S_IFREG)).unwrap();
        assert_eq!(tree.remove_subtree(a), 2);
        assert_eq!(tree.get(b).unwrap_err(), VfsError::NotFound);
        assert_eq!(tree.find_child(root, "a"), None);
    }

    #[test]
    fn test_unpin_saturates() {
        let (tree, root, _sb) = tree_with_root();
        let d = tree.get(root).unwrap();
        d.unpin();
        assert_eq!(d.pins(), 0);
    }
}
