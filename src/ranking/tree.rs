//! Order-Statistics AVL Tree
//!
//! `RankedSet` is the authoritative in-memory ranking. Every node carries its
//! height (for AVL balancing) and the size of its subtree, which turns rank
//! lookup and rank-range selection into O(log n) descents instead of full
//! traversals.
//!
//! ## Structure
//! - The tree is keyed by `RankKey` (points desc, registration seq asc, subject id asc).
//! - A side index `SubjectId -> RankKey` locates a subject's node without a scan.
//! - A score change moves an entry: the old node is removed and the entry is
//!   re-inserted under its new key.

use super::types::{InsertOutcome, RankEntry, RankKey, RankedEntry, SubjectId};

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

type Link = Option<Box<Node>>;

struct Node {
    entry: RankEntry,
    height: u32,
    size: usize,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(entry: RankEntry) -> Box<Self> {
        Box::new(Self {
            entry,
            height: 1,
            size: 1,
            left: None,
            right: None,
        })
    }

    fn key(&self) -> RankKey {
        self.entry.key()
    }

    fn update_stats(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.size = 1 + size(&self.left) + size(&self.right);
    }

    fn balance(&self) -> i64 {
        height(&self.left) as i64 - height(&self.right) as i64
    }
}

fn height(link: &Link) -> u32 {
    link.as_ref().map_or(0, |node| node.height)
}

fn size(link: &Link) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = node
        .left
        .take()
        .expect("right rotation requires a left child");
    node.left = pivot.right.take();
    node.update_stats();
    pivot.right = Some(node);
    pivot.update_stats();
    pivot
}

fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = node
        .right
        .take()
        .expect("left rotation requires a right child");
    node.right = pivot.left.take();
    node.update_stats();
    pivot.left = Some(node);
    pivot.update_stats();
    pivot
}

/// Refreshes the node's counters and restores the AVL property at this level.
fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.update_stats();
    let balance = node.balance();

    if balance > 1 {
        // Left-Right case collapses into Left-Left after one rotation.
        if node.left.as_ref().is_some_and(|left| left.balance() < 0) {
            node.left = node.left.take().map(rotate_left);
        }
        return rotate_right(node);
    }

    if balance < -1 {
        // Right-Left case collapses into Right-Right after one rotation.
        if node.right.as_ref().is_some_and(|right| right.balance() > 0) {
            node.right = node.right.take().map(rotate_right);
        }
        return rotate_left(node);
    }

    node
}

fn insert_node(link: Link, entry: RankEntry) -> Box<Node> {
    let Some(mut node) = link else {
        return Node::leaf(entry);
    };

    match entry.key().cmp(&node.key()) {
        Ordering::Less => node.left = Some(insert_node(node.left.take(), entry)),
        Ordering::Greater => node.right = Some(insert_node(node.right.take(), entry)),
        Ordering::Equal => panic!(
            "duplicate rank key {:?} reached the insert path",
            entry.key()
        ),
    }

    rebalance(node)
}

/// Detaches the minimum node of a subtree, returning the remaining subtree and the node.
fn remove_min(mut node: Box<Node>) -> (Link, Box<Node>) {
    match node.left.take() {
        None => {
            let right = node.right.take();
            (right, node)
        }
        Some(left) => {
            let (rest, min) = remove_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn remove_node(link: Link, key: &RankKey) -> (Link, Option<RankEntry>) {
    let Some(mut node) = link else {
        return (None, None);
    };

    match key.cmp(&node.key()) {
        Ordering::Less => {
            let (left, removed) = remove_node(node.left.take(), key);
            node.left = left;
            (Some(rebalance(node)), removed)
        }
        Ordering::Greater => {
            let (right, removed) = remove_node(node.right.take(), key);
            node.right = right;
            (Some(rebalance(node)), removed)
        }
        Ordering::Equal => {
            let left = node.left.take();
            let right = node.right.take();

            let replacement = match (left, right) {
                (None, right) => right,
                (left, None) => left,
                (Some(left), Some(right)) => {
                    // In-order successor takes the removed node's place.
                    let (rest, mut successor) = remove_min(right);
                    successor.left = Some(left);
                    successor.right = rest;
                    Some(rebalance(successor))
                }
            };

            let Node { entry, .. } = *node;
            (replacement, Some(entry))
        }
    }
}

/// Appends every entry whose rank lies in `[start, end]`.
///
/// `offset` is the number of entries ordered before this subtree.
fn collect_range(link: &Link, start: usize, end: usize, offset: usize, out: &mut Vec<RankedEntry>) {
    let Some(node) = link else {
        return;
    };

    let node_rank = offset + size(&node.left) + 1;

    if start < node_rank {
        collect_range(&node.left, start, end, offset, out);
    }

    if (start..=end).contains(&node_rank) {
        out.push(RankedEntry {
            rank: node_rank as u64,
            entry: node.entry.clone(),
        });
    }

    if node_rank < end {
        collect_range(&node.right, start, end, node_rank, out);
    }
}

/// Builds a perfectly balanced subtree from the next `count` in-order entries.
fn build_balanced<I: Iterator<Item = RankEntry>>(count: usize, entries: &mut I) -> Link {
    if count == 0 {
        return None;
    }

    let left_count = count / 2;
    let left = build_balanced(left_count, entries);
    let entry = entries
        .next()
        .expect("bulk build consumed more entries than supplied");
    let right = build_balanced(count - left_count - 1, entries);

    let mut node = Node::leaf(entry);
    node.left = left;
    node.right = right;
    node.update_stats();
    Some(node)
}

/// Height-balanced order-statistics tree holding the canonical ranking.
#[derive(Default)]
pub struct RankedSet {
    root: Link,
    /// Subject -> current sort key, used to find a subject's node.
    index: HashMap<SubjectId, RankKey>,
    /// Highest registration sequence ever inserted.
    max_sequence: u64,
}

impl RankedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from entries already in strict rank order, in O(n).
    ///
    /// # Panics
    /// If the input is not strictly ordered or contains a subject twice.
    pub fn from_sorted(entries: Vec<RankEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        let mut max_sequence = 0;

        for (pos, entry) in entries.iter().enumerate() {
            if pos > 0 {
                assert!(
                    entries[pos - 1].key() < entry.key(),
                    "bulk build input is not in strict rank order at position {}",
                    pos
                );
            }
            let previous = index.insert(entry.subject_id, entry.key());
            assert!(
                previous.is_none(),
                "duplicate subject {} in bulk build input",
                entry.subject_id
            );
            max_sequence = max_sequence.max(entry.registration_seq);
        }

        let count = entries.len();
        let root = build_balanced(count, &mut entries.into_iter());

        Self {
            root,
            index,
            max_sequence,
        }
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains(&self, subject_id: SubjectId) -> bool {
        self.index.contains_key(&subject_id)
    }

    pub fn max_sequence(&self) -> u64 {
        self.max_sequence
    }

    pub fn get(&self, subject_id: SubjectId) -> Option<&RankEntry> {
        let key = self.index.get(&subject_id)?;
        self.find(key)
    }

    fn find(&self, key: &RankKey) -> Option<&RankEntry> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(&node.key()) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return Some(&node.entry),
            }
        }
        None
    }

    /// Inserts a subject, or moves it to its new sort position if it already exists.
    ///
    /// Registration sequence and baseline rank are immutable once a subject
    /// exists: the stored values are carried over and whatever the caller
    /// passed for them is ignored.
    pub fn insert(&mut self, mut entry: RankEntry) -> InsertOutcome {
        let Some(old_key) = self.index.get(&entry.subject_id).copied() else {
            self.attach(entry);
            return InsertOutcome::Inserted;
        };

        let current = self
            .find(&old_key)
            .expect("subject index points at a missing node");
        entry.registration_seq = current.registration_seq;
        entry.baseline_rank = current.baseline_rank;

        if *current == entry {
            return InsertOutcome::Unchanged;
        }

        let (root, removed) = remove_node(self.root.take(), &old_key);
        self.root = root;
        assert!(
            removed.is_some(),
            "subject {} indexed but not removable",
            entry.subject_id
        );

        self.attach(entry);
        InsertOutcome::Updated
    }

    fn attach(&mut self, entry: RankEntry) {
        self.max_sequence = self.max_sequence.max(entry.registration_seq);
        self.index.insert(entry.subject_id, entry.key());
        self.root = Some(insert_node(self.root.take(), entry));
    }

    /// Removes a subject. `None` signals that it was not present.
    pub fn delete(&mut self, subject_id: SubjectId) -> Option<RankEntry> {
        let key = self.index.remove(&subject_id)?;
        let (root, removed) = remove_node(self.root.take(), &key);
        self.root = root;
        assert!(
            removed.is_some(),
            "subject {} indexed but not removable",
            subject_id
        );
        removed
    }

    /// Number of entries strictly ordered before `key`.
    ///
    /// The key does not need to be present, which lets callers ask where a
    /// hypothetical score would land.
    pub fn position_of(&self, key: &RankKey) -> usize {
        let mut before = 0;
        let mut current = self.root.as_deref();

        while let Some(node) = current {
            match key.cmp(&node.key()) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Equal => return before + size(&node.left),
                Ordering::Greater => {
                    before += size(&node.left) + 1;
                    current = node.right.as_deref();
                }
            }
        }

        before
    }

    /// 1-based rank of a subject, `None` if unknown.
    pub fn rank_of(&self, subject_id: SubjectId) -> Option<u64> {
        let key = self.index.get(&subject_id)?;
        Some(self.position_of(key) as u64 + 1)
    }

    /// The entry holding `rank`, if the rank exists.
    pub fn entry_at(&self, rank: u64) -> Option<RankedEntry> {
        if rank == 0 || rank > self.len() as u64 {
            return None;
        }

        let mut target = rank as usize;
        let mut current = self.root.as_deref();

        while let Some(node) = current {
            let left_size = size(&node.left);
            match target.cmp(&(left_size + 1)) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Equal => {
                    return Some(RankedEntry {
                        rank,
                        entry: node.entry.clone(),
                    });
                }
                Ordering::Greater => {
                    target -= left_size + 1;
                    current = node.right.as_deref();
                }
            }
        }

        None
    }

    /// Entries with ranks in the inclusive range, clipped to `[1, len]`.
    pub fn select_range(&self, start_rank: u64, end_rank: u64) -> Vec<RankedEntry> {
        let start = start_rank.max(1) as usize;
        let end = (end_rank as usize).min(self.len());

        if start > end {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(end - start + 1);
        collect_range(&self.root, start, end, 0, &mut out);
        out
    }

    /// The contiguous window of up to `2 * window + 1` entries centred on a subject.
    pub fn around(&self, subject_id: SubjectId, window: u64) -> Option<Vec<RankedEntry>> {
        let rank = self.rank_of(subject_id)?;
        let start = rank.saturating_sub(window).max(1);
        let end = rank.saturating_add(window);
        Some(self.select_range(start, end))
    }

    /// In-order (best rank first) iterator over the entries.
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            stack: Vec::new(),
            remaining: self.len(),
        };
        iter.push_left(self.root.as_deref());
        iter
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        fn check(link: &Link, lower: Option<RankKey>, upper: Option<RankKey>) -> (u32, usize) {
            let Some(node) = link else {
                return (0, 0);
            };
            let key = node.key();
            if let Some(lower) = lower {
                assert!(lower < key, "ordering violated: {:?} !< {:?}", lower, key);
            }
            if let Some(upper) = upper {
                assert!(key < upper, "ordering violated: {:?} !< {:?}", key, upper);
            }
            let (lh, ls) = check(&node.left, lower, Some(key));
            let (rh, rs) = check(&node.right, Some(key), upper);
            assert!((lh as i64 - rh as i64).abs() <= 1, "AVL balance violated at {:?}", key);
            assert_eq!(node.height, 1 + lh.max(rh), "stale height at {:?}", key);
            assert_eq!(node.size, 1 + ls + rs, "stale size at {:?}", key);
            (node.height, node.size)
        }

        let (_, total) = check(&self.root, None, None);
        assert_eq!(total, self.index.len(), "index and tree disagree on size");
        for (subject_id, key) in &self.index {
            let entry = self.find(key).expect("indexed key missing from tree");
            assert_eq!(entry.subject_id, *subject_id);
        }
    }
}

impl fmt::Debug for RankedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankedSet")
            .field("len", &self.len())
            .field("height", &height(&self.root))
            .field("max_sequence", &self.max_sequence)
            .finish()
    }
}

/// Iterator over entries in rank order.
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
    remaining: usize,
}

impl<'a> Iter<'a> {
    fn push_left(&mut self, mut current: Option<&'a Node>) {
        while let Some(node) = current {
            self.stack.push(node);
            current = node.left.as_deref();
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RankEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        self.remaining -= 1;
        Some(&node.entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}
