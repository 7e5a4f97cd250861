//! HashTable: chained hash engine over an arena of circular bucket chains.
//!
//! Every element is a [`Link`](crate::link) in one slot arena. The table
//! itself is a vector of bucket heads; resizing relinks the existing links
//! into a new head vector and never copies or rehashes a value, because
//! each link keeps the hash computed when it was added.
//!
//! Equal elements are kept adjacent inside their bucket: under
//! [`Duplicates::Allow`] a new element is linked directly in front of the
//! first equal one. `count_all`, `remove_all` and `find_next` rely on it.

use crate::cursor::{Cursors, Iter};
use crate::error::{Error, Violation};
use crate::link::{self, LinkKey, Links};
use crate::policy::{Duplicates, Keep, Update};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use tracing::{debug, trace};

/// Table shape and duplicate policy, fixed at construction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HashConfig {
    /// Bucket count allocated by the first insertion.
    pub starting_capacity: usize,
    /// Largest tolerated `len / capacity` before the table grows.
    pub load_factor: f32,
    pub duplicates: Duplicates,
}

impl HashConfig {
    pub const DEFAULT_CAPACITY: usize = 31;
    pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;
    /// Smallest accepted load factor. Below it every insertion would ask
    /// for hundreds of empty buckets.
    pub const MIN_LOAD_FACTOR: f32 = 0.01;

    pub fn with_starting_capacity(mut self, capacity: usize) -> Self {
        self.starting_capacity = capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn with_duplicates(mut self, duplicates: Duplicates) -> Self {
        self.duplicates = duplicates;
        self
    }

    fn validated(mut self) -> Result<Self, Error> {
        if !self.load_factor.is_finite() || self.load_factor < Self::MIN_LOAD_FACTOR {
            return Err(Error::InvalidLoadFactor(self.load_factor));
        }
        self.starting_capacity = self.starting_capacity.max(1);
        Ok(self)
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            starting_capacity: Self::DEFAULT_CAPACITY,
            load_factor: Self::DEFAULT_LOAD_FACTOR,
            duplicates: Duplicates::Reject,
        }
    }
}

/// Cursor into a [`HashTable`]: a bucket index plus the link in it.
///
/// The end position is `(capacity, None)`. Positions are invalidated by
/// removal of their element and, for the bucket part, by a resize; an
/// element position stays usable across resizes because the engine
/// re-derives the bucket from the element's stored hash.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Position {
    bucket: usize,
    link: Option<LinkKey>,
}

impl Position {
    pub fn is_end(&self) -> bool {
        self.link.is_none()
    }

    pub fn bucket(&self) -> usize {
        self.bucket
    }
}

#[derive(Clone)]
pub struct HashTable<T, S = DefaultHashBuilder, U = Keep> {
    hasher: S,
    update: U,
    config: HashConfig,
    buckets: Vec<Option<LinkKey>>,
    links: Links<T>,
    reentrancy: DebugReentrancy,
}

impl<T> HashTable<T>
where
    T: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    pub fn with_config(config: HashConfig) -> Result<Self, Error> {
        Self::from_parts(config, DefaultHashBuilder::default(), Keep)
    }
}

impl<T> Default for HashTable<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> HashTable<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            update: Keep,
            config: HashConfig::default(),
            buckets: Vec::new(),
            links: Links::with_key(),
            reentrancy: DebugReentrancy::new(),
        }
    }
}

// Structural operations: no user code runs here.
impl<T, S, U> HashTable<T, S, U> {
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// Reserve arena slots for at least `additional` more elements. Bucket
    /// capacity is unaffected.
    pub fn reserve(&mut self, additional: usize) {
        self.links.reserve(additional);
    }

    /// Mutable access to an element. The element's hash and equality must
    /// not change while it is stored.
    pub fn get_mut(&mut self, at: Position) -> Option<&mut T> {
        at.link
            .and_then(|k| self.links.get_mut(k))
            .map(|l| &mut l.value)
    }

    /// Remove the element at `at`, returning the position that followed it.
    pub fn remove(&mut self, at: Position) -> Result<Position, Error> {
        self.take(at).map(|(_, next)| next)
    }

    /// Remove and return the element at `at` along with the position that
    /// followed it.
    pub fn take(&mut self, at: Position) -> Result<(T, Position), Error> {
        let key = at.link.ok_or(Error::EndPosition)?;
        if !self.links.contains_key(key) {
            return Err(Error::StalePosition);
        }
        let next = self.step_forward(key);
        let value = self.free(key).ok_or(Error::StalePosition)?;
        Ok((value, next))
    }

    /// Grow to `capacity` buckets and relink every element. No-op unless
    /// `capacity` exceeds the current bucket count.
    pub fn resize(&mut self, capacity: usize) {
        let old = self.buckets.len();
        if capacity <= old {
            return;
        }
        let mut buckets = vec![None; capacity];
        for b in 0..old {
            let Some(head) = self.buckets[b] else {
                continue;
            };
            let mut at = head;
            loop {
                let next = self.links[at].next;
                let dst = (self.links[at].hash % capacity as u64) as usize;
                link::push_front(&mut self.links, &mut buckets[dst], at);
                if next == head {
                    break;
                }
                at = next;
            }
        }
        self.buckets = buckets;
        debug!(from = old, to = capacity, len = self.links.len(), "resized hash table");
    }

    /// Drop every element and release the bucket vector; the next `add`
    /// starts over at the configured starting capacity.
    pub fn clear(&mut self) {
        let len = self.links.len();
        self.links.clear();
        self.buckets = Vec::new();
        debug!(len, "cleared hash table");
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn first_from(&self, bucket: usize) -> Position {
        for b in bucket..self.buckets.len() {
            if let Some(head) = self.buckets[b] {
                return Position {
                    bucket: b,
                    link: Some(head),
                };
            }
        }
        self.end_position()
    }

    /// Last element in buckets `< bucket`.
    fn last_before(&self, bucket: usize) -> Position {
        for b in (0..bucket).rev() {
            if let Some(head) = self.buckets[b] {
                return Position {
                    bucket: b,
                    link: Some(link::tail(&self.links, head)),
                };
            }
        }
        self.end_position()
    }

    fn step_forward(&self, key: LinkKey) -> Position {
        let bucket = self.bucket_of(self.links[key].hash);
        let head = match self.buckets[bucket] {
            Some(h) => h,
            None => return self.end_position(),
        };
        match link::chain_next(&self.links, head, key) {
            Some(next) => Position {
                bucket,
                link: Some(next),
            },
            None => self.first_from(bucket + 1),
        }
    }

    fn step_back(&self, key: LinkKey) -> Position {
        let bucket = self.bucket_of(self.links[key].hash);
        let head = match self.buckets[bucket] {
            Some(h) => h,
            None => return self.end_position(),
        };
        match link::chain_prev(&self.links, head, key) {
            Some(prev) => Position {
                bucket,
                link: Some(prev),
            },
            None => self.last_before(bucket),
        }
    }

    #[inline]
    fn end_position(&self) -> Position {
        Position {
            bucket: self.buckets.len(),
            link: None,
        }
    }

    /// Unlink `key` from its bucket and release its slot.
    fn free(&mut self, key: LinkKey) -> Option<T> {
        let bucket = self.bucket_of(self.links.get(key)?.hash);
        link::unlink(&mut self.links, &mut self.buckets[bucket], key);
        self.links.remove(key).map(|l| l.value)
    }

    fn check_load_factor(&mut self) {
        let len = self.links.len();
        let load_factor = self.config.load_factor;
        if len as f32 / self.buckets.len() as f32 > load_factor {
            // f64 to usize saturates, so the target can never wrap.
            let target = (2.0 * len as f64 / f64::from(load_factor)) as usize;
            self.resize(target.saturating_add(1));
        }
    }
}

impl<T, S, U> HashTable<T, S, U>
where
    T: Hash + Eq,
    S: BuildHasher,
    U: Update<T>,
{
    /// Build a table from explicit parts. Fails on an invalid load factor.
    pub fn from_parts(config: HashConfig, hasher: S, update: U) -> Result<Self, Error> {
        Ok(Self {
            hasher,
            update,
            config: config.validated()?,
            buckets: Vec::new(),
            links: Links::with_key(),
            reentrancy: DebugReentrancy::new(),
        })
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Insert `value`. Returns `false` when an equal element was already
    /// present and duplicates are rejected; the update strategy then
    /// receives the incoming value.
    pub fn add(&mut self, value: T) -> bool {
        let _g = self.reentrancy.enter();
        if self.buckets.is_empty() {
            self.resize(self.config.starting_capacity);
        }
        let hash = self.make_hash(&value);
        let bucket = self.bucket_of(hash);
        let equal = link::find_in(&self.links, self.buckets[bucket], |l| {
            l.hash == hash && l.value == value
        });
        match (equal, self.config.duplicates) {
            (Some(existing), Duplicates::Reject) => {
                self.update.update(&mut self.links[existing].value, value);
                return false;
            }
            (Some(existing), Duplicates::Allow) => {
                let key = link::alloc(&mut self.links, value, hash);
                link::insert_before(&mut self.links, &mut self.buckets[bucket], existing, key);
            }
            (None, _) => {
                let key = link::alloc(&mut self.links, value, hash);
                link::push_front(&mut self.links, &mut self.buckets[bucket], key);
            }
        }
        self.check_load_factor();
        true
    }

    fn locate<Q>(&self, q: &Q) -> Option<(usize, LinkKey)>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let hash = self.make_hash(q);
        let bucket = self.bucket_of(hash);
        link::find_in(&self.links, self.buckets[bucket], |l| {
            l.hash == hash && l.value.borrow() == q
        })
        .map(|k| (bucket, k))
    }

    /// Position of the first element equal to `q`, or `end()`.
    pub fn find<Q>(&self, q: &Q) -> Position
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        match self.locate(q) {
            Some((bucket, key)) => Position {
                bucket,
                link: Some(key),
            },
            None => self.end_position(),
        }
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.locate(q).is_some()
    }

    /// Next element after `at` in its bucket that equals the element at
    /// `at`, or `end()`. Together with `find` this enumerates duplicates.
    pub fn find_next(&self, at: Position) -> Position {
        let _g = self.reentrancy.enter();
        let Some(key) = at.link.filter(|&k| self.links.contains_key(k)) else {
            return self.end_position();
        };
        let current = &self.links[key];
        let bucket = self.bucket_of(current.hash);
        let Some(head) = self.buckets[bucket] else {
            return self.end_position();
        };
        let mut next = link::chain_next(&self.links, head, key);
        while let Some(k) = next {
            let l = &self.links[k];
            if l.hash == current.hash && l.value == current.value {
                return Position {
                    bucket,
                    link: Some(k),
                };
            }
            next = link::chain_next(&self.links, head, k);
        }
        self.end_position()
    }

    /// Keys of the run of elements equal to `q`.
    fn run_of<Q>(&self, q: &Q) -> Vec<LinkKey>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Some((bucket, first)) = self.locate(q) else {
            return Vec::new();
        };
        let head = self.buckets[bucket].unwrap_or(first);
        let hash = self.links[first].hash;
        let mut run = vec![first];
        let mut next = link::chain_next(&self.links, head, first);
        while let Some(k) = next {
            let l = &self.links[k];
            if l.hash != hash || l.value.borrow() != q {
                break;
            }
            run.push(k);
            next = link::chain_next(&self.links, head, k);
        }
        run
    }

    /// Number of elements equal to `q`.
    pub fn count_all<Q>(&self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.run_of(q).len()
    }

    /// Remove every element equal to `q`; returns how many were removed.
    pub fn remove_all<Q>(&mut self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let run = self.run_of(q);
        for &k in &run {
            self.free(k);
        }
        run.len()
    }

    /// Remove one element equal to `q` and return it.
    pub fn remove_value<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let (_, key) = self.locate(q)?;
        self.free(key)
    }

    /// Visit every element in iteration order; elements for which `visit`
    /// returns `true` are removed. Returns the number removed.
    pub fn purge<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(&mut T) -> bool,
    {
        let _g = self.reentrancy.enter();
        let mut removed = 0;
        let mut at = self.first_from(0);
        while let Some(key) = at.link {
            let next = self.step_forward(key);
            if visit(&mut self.links[key].value) {
                self.free(key);
                removed += 1;
            }
            at = next;
        }
        trace!(removed, "purged hash table");
        removed
    }

    /// Keep only elements that also appear in `subset`, returning how many
    /// were dropped.
    ///
    /// Found links are moved, not copied, into a fresh head vector of the
    /// same capacity; whatever is left behind in the old heads is freed.
    /// With duplicates allowed each occurrence in `subset` keeps one
    /// matching element.
    pub fn intersect<'q, Q, I>(&mut self, subset: I) -> usize
    where
        I: IntoIterator<Item = &'q Q>,
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'q,
    {
        let _g = self.reentrancy.enter();
        let before = self.links.len();
        if before == 0 {
            return 0;
        }
        let mut kept = vec![None; self.buckets.len()];
        for q in subset {
            let hash = self.make_hash(q);
            let bucket = self.bucket_of(hash);
            let Some(key) = link::find_in(&self.links, self.buckets[bucket], |l| {
                l.hash == hash && l.value.borrow() == q
            }) else {
                continue;
            };
            link::unlink(&mut self.links, &mut self.buckets[bucket], key);
            let links = &self.links;
            let equal = link::find_in(links, kept[bucket], |l| {
                l.hash == hash && l.value == links[key].value
            });
            match equal {
                Some(existing) => {
                    link::insert_before(&mut self.links, &mut kept[bucket], existing, key)
                }
                None => link::push_front(&mut self.links, &mut kept[bucket], key),
            }
        }
        let leftovers = core::mem::replace(&mut self.buckets, kept);
        for head in leftovers {
            let doomed: Vec<LinkKey> = link::chain(&self.links, head).collect();
            for k in doomed {
                self.links.remove(k);
            }
        }
        let removed = before - self.links.len();
        debug!(kept = self.links.len(), removed, "intersected hash table");
        removed
    }

    /// Verify chain links, bucket placement, duplicate runs, the element
    /// count and the load factor. Intended for tests.
    pub fn check(&self) -> Result<(), Violation> {
        let _g = self.reentrancy.enter();
        let mut found = 0;
        for (bucket, &head) in self.buckets.iter().enumerate() {
            let Some(head) = head else {
                continue;
            };
            let mut run: Vec<LinkKey> = Vec::new();
            let mut at = head;
            loop {
                let Some(l) = self.links.get(at) else {
                    return Err(Violation::BrokenChain { bucket });
                };
                if self.links.get(l.next).map(|n| n.prev) != Some(at) {
                    return Err(Violation::BrokenChain { bucket });
                }
                if self.make_hash(&l.value) != l.hash || self.bucket_of(l.hash) != bucket {
                    return Err(Violation::Misplaced { bucket });
                }
                run.push(at);
                found += 1;
                if found > self.links.len() {
                    return Err(Violation::BrokenChain { bucket });
                }
                at = l.next;
                if at == head {
                    break;
                }
            }
            self.check_runs(bucket, &run)?;
        }
        if found != self.links.len() {
            return Err(Violation::Count {
                expected: self.links.len(),
                found,
            });
        }
        if !self.buckets.is_empty()
            && found as f32 / self.buckets.len() as f32 > self.config.load_factor
        {
            return Err(Violation::LoadFactor {
                count: found,
                capacity: self.buckets.len(),
            });
        }
        Ok(())
    }

    fn check_runs(&self, bucket: usize, chain: &[LinkKey]) -> Result<(), Violation> {
        let value = |i: usize| &self.links[chain[i]].value;
        for i in 0..chain.len() {
            let equal: Vec<usize> = (0..chain.len()).filter(|&j| value(j) == value(i)).collect();
            if equal.len() > 1 && !self.config.duplicates.allowed() {
                return Err(Violation::Duplicate {
                    path: format!("bucket {bucket}"),
                });
            }
            if equal.last().map(|&last| last - equal[0] + 1) != Some(equal.len()) {
                return Err(Violation::SplitRun { bucket });
            }
        }
        Ok(())
    }
}

impl<T, S, U> Cursors for HashTable<T, S, U> {
    type Item = T;
    type Cursor = Position;

    fn begin(&self) -> Position {
        self.first_from(0)
    }

    fn end(&self) -> Position {
        self.end_position()
    }

    fn advance(&self, at: Position) -> Position {
        match at.link.filter(|&k| self.links.contains_key(k)) {
            Some(key) => self.step_forward(key),
            None => self.end_position(),
        }
    }

    fn retreat(&self, at: Position) -> Position {
        match at.link {
            None => self.last_before(self.buckets.len()),
            Some(key) if self.links.contains_key(key) => self.step_back(key),
            Some(_) => self.end_position(),
        }
    }

    fn get(&self, at: Position) -> Option<&T> {
        at.link.and_then(|k| self.links.get(k)).map(|l| &l.value)
    }

    fn len(&self) -> usize {
        self.links.len()
    }
}

impl<'a, T, S, U> IntoIterator for &'a HashTable<T, S, U> {
    type Item = &'a T;
    type IntoIter = Iter<'a, HashTable<T, S, U>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, S, U> Extend<T> for HashTable<T, S, U>
where
    T: Hash + Eq,
    S: BuildHasher,
    U: Update<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<T> FromIterator<T> for HashTable<T>
where
    T: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = HashTable::new();
        table.extend(iter);
        table
    }
}

impl<T: fmt::Debug, S, U> fmt::Debug for HashTable<T, S, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
