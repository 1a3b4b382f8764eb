//! Bitset-backed ordered set of selected indices.
//!
//! [`SelectionIndexSet`] stores one bit per row index and exposes the set
//! bits as an ascending, rank-addressable sequence. It is the storage layer
//! under [`MultipleSelectionModel`](super::MultipleSelectionModel).
//!
//! # Ranks
//!
//! The rank of a selected index is its position in the ascending sequence.
//! Sequential rank access (`r`, `r + 1`, ...) is served from a cached cursor;
//! arbitrary rank queries walk a Fenwick tree of per-word population counts.
//!
//! # Notifications
//!
//! Every mutating call emits at most one [`SelectionChange`] on
//! [`SelectionIndexSet::changed`]. Between [`begin_atomic`] and the matching
//! [`end_atomic`] nothing is emitted; the closing call publishes the net
//! before/after difference of the whole batch.
//!
//! [`begin_atomic`]: SelectionIndexSet::begin_atomic
//! [`end_atomic`]: SelectionIndexSet::end_atomic
//!
//! # Example
//!
//! ```
//! use trellis::model::{SelectionIndexSet, ShiftRecord};
//!
//! let mut set = SelectionIndexSet::new();
//! set.set_many([2, 5, 9]);
//!
//! // Three rows removed starting at row 3.
//! set.shift(&[ShiftRecord::new(3, -3)]);
//! assert_eq!(set.to_vec(), vec![2, 6]);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use trellis_core::logging::targets;
use trellis_core::{Result, Signal, TrellisError};

const WORD_BITS: usize = 64;

// =========================================================================
// Shift records
// =========================================================================

/// One contiguous index shift caused by a data mutation.
///
/// `delta > 0` means `delta` rows were inserted at `position`; `delta < 0`
/// means `-delta` rows were removed starting at `position`. Records with a
/// zero delta or a negative position are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShiftRecord {
    /// First index affected by the shift.
    pub position: isize,
    /// Signed distance every index at or above `position` moves.
    pub delta: isize,
}

impl ShiftRecord {
    /// Creates a shift record.
    pub const fn new(position: isize, delta: isize) -> Self {
        Self { position, delta }
    }

    /// A record for `count` rows inserted at `at`.
    pub fn inserted(at: usize, count: usize) -> Self {
        Self::new(to_signed(at), to_signed(count))
    }

    /// A record for `count` rows removed starting at `at`.
    pub fn removed(at: usize, count: usize) -> Self {
        Self::new(to_signed(at), -to_signed(count))
    }

    /// Returns `true` if applying this record can move anything.
    pub fn is_effective(&self) -> bool {
        self.delta != 0 && self.position >= 0
    }
}

fn to_signed(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

// =========================================================================
// Change description
// =========================================================================

/// One contiguous run of a [`SelectionChange`].
///
/// `added` occupy ranks `from..to` of the new sequence; `removed` were
/// removed at rank `from`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubChange {
    /// First rank affected in the new sequence.
    pub from: usize,
    /// One past the last rank occupied by `added`.
    pub to: usize,
    /// Indices that became selected.
    pub added: Vec<usize>,
    /// Indices that stopped being selected.
    pub removed: Vec<usize>,
}

/// The net effect of one logical mutation of a [`SelectionIndexSet`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionChange {
    sub_changes: Vec<SubChange>,
}

impl SelectionChange {
    /// The individual runs, in ascending index order.
    pub fn sub_changes(&self) -> &[SubChange] {
        &self.sub_changes
    }

    /// All newly selected indices, ascending.
    pub fn added_indices(&self) -> Vec<usize> {
        self.sub_changes
            .iter()
            .flat_map(|c| c.added.iter().copied())
            .collect()
    }

    /// All deselected indices, ascending.
    pub fn removed_indices(&self) -> Vec<usize> {
        self.sub_changes
            .iter()
            .flat_map(|c| c.removed.iter().copied())
            .collect()
    }

    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.sub_changes.is_empty()
    }
}

// =========================================================================
// Fenwick tree over word population counts
// =========================================================================

#[derive(Debug, Default)]
struct PopcountTree {
    /// 1-based; `tree[0]` is unused.
    tree: Vec<usize>,
}

impl PopcountTree {
    fn rebuild(&mut self, words: &[u64]) {
        let n = words.len();
        self.tree.clear();
        self.tree.resize(n + 1, 0);
        for (i, word) in words.iter().enumerate() {
            self.tree[i + 1] = word.count_ones() as usize;
        }
        for i in 1..=n {
            let parent = i + (i & i.wrapping_neg());
            if parent <= n {
                self.tree[parent] += self.tree[i];
            }
        }
    }

    fn len(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    fn add(&mut self, word: usize, delta: isize) {
        let n = self.len();
        let mut i = word + 1;
        while i <= n {
            self.tree[i] = self.tree[i].wrapping_add_signed(delta);
            i += i & i.wrapping_neg();
        }
    }

    /// Number of set bits in words `0..words`.
    fn prefix(&self, words: usize) -> usize {
        let mut sum = 0;
        let mut i = words.min(self.len());
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }

    /// Locates the word holding the bit of the given rank.
    ///
    /// Returns `(word, rank_within_word)`. The caller guarantees
    /// `rank < total`.
    fn locate(&self, rank: usize) -> (usize, usize) {
        let n = self.len();
        let mut pos = 0;
        let mut remaining = rank;
        let mut step = if n == 0 { 0 } else { 1 << (usize::BITS - 1 - n.leading_zeros()) };
        while step > 0 {
            let next = pos + step;
            if next <= n && self.tree[next] <= remaining {
                pos = next;
                remaining -= self.tree[next];
            }
            step >>= 1;
        }
        (pos, remaining)
    }
}

fn nth_set_bit(mut word: u64, n: usize) -> u32 {
    for _ in 0..n {
        word &= word - 1;
    }
    word.trailing_zeros()
}

fn low_mask(bits: usize) -> u64 {
    if bits >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

// =========================================================================
// SelectionIndexSet
// =========================================================================

/// An ordered set of selected indices backed by a growable bitset.
///
/// Indices above the current item count may be set transiently (for
/// example while a shift is being applied); the set itself has no notion
/// of an item count.
///
/// # Signals
///
/// - `changed`: emitted once per logical mutation with the net change
pub struct SelectionIndexSet {
    words: Vec<u64>,
    counts: PopcountTree,
    cardinality: usize,
    /// Last `(rank, index)` pair served by `index_at_rank`.
    cursor: Mutex<Option<(usize, usize)>>,
    atomic_depth: usize,
    /// Original value of every word modified in the current batch.
    journal: BTreeMap<usize, u64>,

    /// Emitted with the net change after each mutation or atomic batch.
    pub changed: Signal<SelectionChange>,
}

impl Default for SelectionIndexSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionIndexSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            counts: PopcountTree::default(),
            cardinality: 0,
            cursor: Mutex::new(None),
            atomic_depth: 0,
            journal: BTreeMap::new(),
            changed: Signal::new(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns `true` if `index` is selected. Indices beyond the allocated
    /// bits are simply not selected.
    pub fn is_selected(&self, index: usize) -> bool {
        let word = index / WORD_BITS;
        self.words
            .get(word)
            .is_some_and(|w| w & (1u64 << (index % WORD_BITS)) != 0)
    }

    /// Number of selected indices.
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Returns `true` if no index is selected.
    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Returns `true` while an atomic batch is open.
    pub fn is_atomic(&self) -> bool {
        self.atomic_depth > 0
    }

    /// Returns the selected index with the given rank.
    ///
    /// # Errors
    ///
    /// [`TrellisError::IndexOutOfRange`] if `rank >= cardinality()`.
    pub fn index_at_rank(&self, rank: usize) -> Result<usize> {
        if rank >= self.cardinality {
            return Err(TrellisError::IndexOutOfRange {
                index: rank,
                len: self.cardinality,
            });
        }

        let mut cursor = self.cursor.lock();
        let cached = match *cursor {
            Some((r, index)) if r == rank => Some(index),
            Some((r, index)) if r + 1 == rank => self.next_set_after(index),
            Some((r, index)) if rank + 1 == r => self.prev_set_before(index),
            _ => None,
        };
        let index = match cached {
            Some(index) => index,
            None => {
                let (word, within) = self.counts.locate(rank);
                word * WORD_BITS + nth_set_bit(self.words[word], within) as usize
            }
        };
        *cursor = Some((rank, index));
        Ok(index)
    }

    /// Returns the rank of `index`, or `None` if it is not selected.
    pub fn rank_of(&self, index: usize) -> Option<usize> {
        self.is_selected(index).then(|| self.count_below(index))
    }

    /// Iterates over the selected indices in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        self.iter_from(0)
    }

    /// Iterates over the selected indices `>= start` in ascending order.
    pub fn iter_from(&self, start: usize) -> Iter<'_> {
        let word = start / WORD_BITS;
        let current = self
            .words
            .get(word)
            .map_or(0, |w| w & !low_mask(start % WORD_BITS));
        Iter {
            words: &self.words,
            word,
            current,
        }
    }

    /// Collects the selected indices into a vector.
    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }

    /// Number of selected indices strictly below `index`.
    fn count_below(&self, index: usize) -> usize {
        let word = index / WORD_BITS;
        match self.words.get(word) {
            Some(w) => {
                self.counts.prefix(word) + (w & low_mask(index % WORD_BITS)).count_ones() as usize
            }
            None => self.cardinality,
        }
    }

    fn next_set_after(&self, index: usize) -> Option<usize> {
        index.checked_add(1).and_then(|start| self.iter_from(start).next())
    }

    fn prev_set_before(&self, index: usize) -> Option<usize> {
        if index == 0 {
            return None;
        }
        let last = index - 1;
        let mut word = last / WORD_BITS;
        let mut bits = self.words.get(word)? & low_mask(last % WORD_BITS + 1);
        loop {
            if bits != 0 {
                return Some(word * WORD_BITS + (WORD_BITS - 1 - bits.leading_zeros() as usize));
            }
            if word == 0 {
                return None;
            }
            word -= 1;
            bits = self.words[word];
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Selects `index`.
    pub fn set(&mut self, index: usize) {
        self.set_value(index, true);
    }

    /// Deselects `index`.
    pub fn clear(&mut self, index: usize) {
        self.set_value(index, false);
    }

    /// Selects or deselects `index`.
    pub fn set_value(&mut self, index: usize, is_set: bool) {
        self.begin_atomic();
        self.write_bit(index, is_set);
        self.end_atomic();
    }

    /// Selects or deselects every index in `from..to`.
    pub fn set_range(&mut self, from: usize, to: usize, is_set: bool) {
        if from >= to {
            return;
        }
        self.begin_atomic();
        let first_word = from / WORD_BITS;
        let last_word = (to - 1) / WORD_BITS;
        if is_set {
            self.ensure_word(last_word);
        }
        for word in first_word..(last_word + 1).min(self.words.len()) {
            let lo = if word == first_word { from % WORD_BITS } else { 0 };
            let hi = if word == last_word {
                (to - 1) % WORD_BITS + 1
            } else {
                WORD_BITS
            };
            let mask = low_mask(hi) & !low_mask(lo);
            let old = self.words[word];
            let new = if is_set { old | mask } else { old & !mask };
            self.store_word(word, new);
        }
        self.end_atomic();
    }

    /// Selects every index yielded by `indices`.
    pub fn set_many<I>(&mut self, indices: I)
    where
        I: IntoIterator<Item = usize>,
    {
        self.begin_atomic();
        for index in indices {
            self.write_bit(index, true);
        }
        self.end_atomic();
    }

    /// Deselects everything.
    pub fn clear_all(&mut self) {
        if self.is_empty() {
            return;
        }
        self.begin_atomic();
        for word in 0..self.words.len() {
            self.store_word(word, 0);
        }
        self.end_atomic();
    }

    /// Opens (or nests) an atomic batch.
    pub fn begin_atomic(&mut self) {
        self.atomic_depth += 1;
    }

    /// Closes one level of atomic batching.
    ///
    /// When the outermost batch closes, the net difference against the state
    /// at `begin_atomic` is emitted on `changed`, if there is any.
    pub fn end_atomic(&mut self) {
        if self.atomic_depth == 0 {
            tracing::warn!(target: targets::SELECTION, "end_atomic without begin_atomic");
            return;
        }
        self.atomic_depth -= 1;
        if self.atomic_depth > 0 {
            return;
        }
        let journal = std::mem::take(&mut self.journal);
        let change = self.diff(&journal);
        if !change.is_empty() {
            tracing::trace!(
                target: targets::SELECTION,
                added = change.added_indices().len(),
                removed = change.removed_indices().len(),
                "selection index set changed"
            );
            self.changed.emit(change);
        }
    }

    /// Moves selected indices according to a batch of shift records.
    ///
    /// Records are applied from the highest position to the lowest. For each
    /// one, every selected index at or above its position moves by its delta;
    /// targets below zero are dropped. Returns `true` if at least one index
    /// was relocated.
    pub fn shift(&mut self, records: &[ShiftRecord]) -> bool {
        let mut effective: Vec<ShiftRecord> =
            records.iter().copied().filter(ShiftRecord::is_effective).collect();
        if effective.is_empty() || self.is_empty() {
            return false;
        }
        effective.sort_by(|a, b| b.position.cmp(&a.position));

        self.begin_atomic();
        let mut moved = false;
        for record in effective {
            let start = record.position.unsigned_abs();
            let bits: Vec<usize> = self.iter_from(start).collect();
            let distance = record.delta.unsigned_abs();
            if record.delta > 0 {
                for &index in bits.iter().rev() {
                    self.write_bit(index, false);
                    self.write_bit(index.saturating_add(distance), true);
                    moved = true;
                }
            } else {
                for index in bits {
                    self.write_bit(index, false);
                    if let Some(target) = index.checked_sub(distance) {
                        self.write_bit(target, true);
                        moved = true;
                    }
                }
            }
        }
        self.end_atomic();
        moved
    }

    /// Relocates every selected index through `permutation`, where
    /// `permutation[old] == new`. Indices outside the permutation stay put.
    pub fn remap(&mut self, permutation: &[usize]) {
        if self.is_empty() {
            return;
        }
        let selected = self.to_vec();
        self.begin_atomic();
        for &index in &selected {
            self.write_bit(index, false);
        }
        for index in selected {
            let target = permutation.get(index).copied().unwrap_or(index);
            self.write_bit(target, true);
        }
        self.end_atomic();
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn ensure_word(&mut self, word: usize) {
        if word < self.words.len() {
            return;
        }
        let len = (word + 1).next_power_of_two();
        self.words.resize(len, 0);
        self.counts.rebuild(&self.words);
    }

    fn write_bit(&mut self, index: usize, value: bool) -> bool {
        let word = index / WORD_BITS;
        if value {
            self.ensure_word(word);
        } else if word >= self.words.len() {
            return false;
        }
        let mask = 1u64 << (index % WORD_BITS);
        let old = self.words[word];
        let new = if value { old | mask } else { old & !mask };
        self.store_word(word, new)
    }

    fn store_word(&mut self, word: usize, new: u64) -> bool {
        let old = self.words[word];
        if old == new {
            return false;
        }
        debug_assert!(self.atomic_depth > 0, "mutation outside of a batch");
        self.journal.entry(word).or_insert(old);
        self.words[word] = new;

        let before = old.count_ones() as usize;
        let after = new.count_ones() as usize;
        self.counts.add(word, after as isize - before as isize);
        self.cardinality = self.cardinality + after - before;
        *self.cursor.get_mut() = None;
        true
    }

    fn diff(&self, journal: &BTreeMap<usize, u64>) -> SelectionChange {
        let mut sub_changes: Vec<SubChange> = Vec::new();
        let mut last_changed: Option<usize> = None;

        for (&word, &old) in journal {
            let new = self.words[word];
            let mut changed = old ^ new;
            while changed != 0 {
                let bit = changed.trailing_zeros() as usize;
                changed &= changed - 1;
                let index = word * WORD_BITS + bit;
                let added = new & (1u64 << bit) != 0;

                // A selected index between two changes splits the run.
                let contiguous = match (last_changed, sub_changes.last()) {
                    (Some(prev), Some(_)) => self.count_below(index) == self.count_below(prev + 1),
                    _ => false,
                };
                if !contiguous {
                    let from = self.count_below(index);
                    sub_changes.push(SubChange {
                        from,
                        to: from,
                        ..SubChange::default()
                    });
                }
                if let Some(run) = sub_changes.last_mut() {
                    if added {
                        run.added.push(index);
                        run.to += 1;
                    } else {
                        run.removed.push(index);
                    }
                }
                last_changed = Some(index);
            }
        }

        SelectionChange { sub_changes }
    }
}

impl fmt::Debug for SelectionIndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionIndexSet")
            .field("indices", &self.to_vec())
            .field("atomic_depth", &self.atomic_depth)
            .finish()
    }
}

/// Ascending iterator over the indices of a [`SelectionIndexSet`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    words: &'a [u64],
    word: usize,
    current: u64,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word * WORD_BITS + bit);
            }
            self.word += 1;
            self.current = *self.words.get(self.word)?;
        }
    }
}

impl<'a> IntoIterator for &'a SelectionIndexSet {
    type Item = usize;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

static_assertions::assert_impl_all!(SelectionIndexSet: Send, Sync);
