//! Closed intervals and merged interval sets over unsigned integer domains.

use std::fmt;

/// An unsigned integer domain an interval set can range over.
pub trait Bound: Copy + Ord + fmt::Debug + Send + Sync {
    /// Smallest value of the domain.
    const MIN: Self;
    /// Largest value of the domain.
    const MAX: Self;

    /// The next value, or `None` at the top of the domain.
    fn successor(self) -> Option<Self>;
}

macro_rules! impl_bound {
    ($($t:ty),*) => {
        $(
            impl Bound for $t {
                const MIN: Self = <$t>::MIN;
                const MAX: Self = <$t>::MAX;

                fn successor(self) -> Option<Self> {
                    self.checked_add(1)
                }
            }
        )*
    };
}

impl_bound!(u16, u32, u128);

/// A closed range `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval<T> {
    low: T,
    high: T,
}

impl<T: Bound> Interval<T> {
    /// Create an interval.
    ///
    /// # Panics
    /// Panics if `low > high`. Callers validate user input before getting here.
    pub fn new(low: T, high: T) -> Self {
        assert!(low <= high, "interval bounds reversed: {low:?} > {high:?}");
        Self { low, high }
    }

    /// Create an interval, returning `None` if `low > high`.
    pub fn try_new(low: T, high: T) -> Option<Self> {
        (low <= high).then_some(Self { low, high })
    }

    /// Interval holding exactly one value.
    pub fn single(value: T) -> Self {
        Self {
            low: value,
            high: value,
        }
    }

    /// Interval spanning the whole domain.
    pub fn full() -> Self {
        Self {
            low: T::MIN,
            high: T::MAX,
        }
    }

    pub fn low(&self) -> T {
        self.low
    }

    pub fn high(&self) -> T {
        self.high
    }

    /// Check if `other` lies entirely inside this interval.
    pub fn covers(&self, other: &Interval<T>) -> bool {
        self.low <= other.low && other.high <= self.high
    }

    /// Check if the two intervals share at least one value.
    pub fn overlaps(&self, other: &Interval<T>) -> bool {
        self.low <= other.high && other.low <= self.high
    }

    /// Overlapping or directly adjacent (`[1,4]` and `[5,9]`).
    fn touches(&self, other: &Interval<T>) -> bool {
        self.overlaps(other)
            || self.high.successor() == Some(other.low)
            || other.high.successor() == Some(self.low)
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// A sorted sequence of non-overlapping, non-adjacent intervals.
///
/// Every constructor merges, so two sets holding the same values are
/// structurally equal. The set spanning the whole domain is the canonical
/// form of "any".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntervalSet<T> {
    ranges: Vec<Interval<T>>,
}

impl<T: Bound> Default for IntervalSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Bound> IntervalSet<T> {
    /// The empty set.
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// The set spanning the whole domain.
    pub fn full() -> Self {
        Self {
            ranges: vec![Interval::full()],
        }
    }

    /// Build a merged set from arbitrary intervals.
    pub fn from_intervals<I: IntoIterator<Item = Interval<T>>>(intervals: I) -> Self {
        let mut ranges: Vec<Interval<T>> = intervals.into_iter().collect();
        ranges.sort_unstable_by_key(|r| (r.low, r.high));
        Self {
            ranges: merge_sorted(ranges),
        }
    }

    /// The merged intervals, ascending by `low`.
    pub fn intervals(&self) -> &[Interval<T>] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint intervals.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Add an interval, keeping the set merged.
    pub fn insert(&mut self, interval: Interval<T>) {
        let pos = self
            .ranges
            .binary_search_by_key(&(interval.low, interval.high), |r| (r.low, r.high))
            .unwrap_or_else(|e| e);
        self.ranges.insert(pos, interval);
        self.ranges = merge_sorted(std::mem::take(&mut self.ranges));
    }

    /// Union of two sets.
    pub fn union(&self, other: &IntervalSet<T>) -> IntervalSet<T> {
        Self::from_intervals(self.ranges.iter().chain(other.ranges.iter()).copied())
    }

    /// Re-merge the set. A no-op on any set built through this API.
    pub fn merged(&self) -> IntervalSet<T> {
        Self::from_intervals(self.ranges.iter().copied())
    }

    /// Check if every value of `other` is in this set (`other ⊆ self`).
    ///
    /// Linear sweep over both sets. Because intervals are merged, a covered
    /// interval of `other` always sits inside a single interval of `self`.
    pub fn contains(&self, other: &IntervalSet<T>) -> bool {
        let mut i = 0;
        for b in &other.ranges {
            while i < self.ranges.len() && self.ranges[i].high < b.low {
                i += 1;
            }
            match self.ranges.get(i) {
                Some(a) if a.covers(b) => {}
                _ => return false,
            }
        }
        true
    }

    /// Check if the two sets share at least one value.
    pub fn intersects(&self, other: &IntervalSet<T>) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a, b) = (&self.ranges[i], &other.ranges[j]);
            if a.overlaps(b) {
                return true;
            }
            if a.high < b.high {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// Check if this set is exactly the whole domain.
    pub fn is_full(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0] == Interval::full()
    }

    /// Mutual containment.
    pub fn equals(&self, other: &IntervalSet<T>) -> bool {
        self.contains(other) && other.contains(self)
    }

    /// Check if a single value is in the set.
    pub fn contains_value(&self, value: T) -> bool {
        let idx = self.ranges.partition_point(|r| r.high < value);
        self.ranges.get(idx).is_some_and(|r| r.low <= value)
    }
}

impl<T: Bound> FromIterator<Interval<T>> for IntervalSet<T> {
    fn from_iter<I: IntoIterator<Item = Interval<T>>>(iter: I) -> Self {
        Self::from_intervals(iter)
    }
}

impl<T: fmt::Display> fmt::Display for IntervalSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, range) in self.ranges.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{range}")?;
        }
        f.write_str("}")
    }
}

/// Merge intervals already sorted by `low`.
fn merge_sorted<T: Bound>(sorted: Vec<Interval<T>>) -> Vec<Interval<T>> {
    let mut merged: Vec<Interval<T>> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if last.touches(&range) => {
                if range.high > last.high {
                    last.high = range.high;
                }
            }
            _ => merged.push(range),
        }
    }
    merged
}
