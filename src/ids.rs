//
// ids.rs
// Dicom-Pseudonymizer-rs
//
// Random fixed-width numeric identifiers that never repeat within an exclusion set.
//

use std::collections::HashSet;

use rand::Rng;

use crate::error::{PseudonymError, Result};

/// Inclusive numeric range whose bounds share the same digit width.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IdRange {
    lo: u32,
    hi: u32,
}

impl IdRange {
    /// Provider ("triplet") identifiers.
    pub const PROVIDER: IdRange = IdRange { lo: 100, hi: 999 };
    /// Patient ("sextuplet") identifiers.
    pub const PATIENT: IdRange = IdRange {
        lo: 100_000,
        hi: 999_999,
    };

    pub fn new(lo: u32, hi: u32) -> Option<Self> {
        if lo > hi || digits(lo) != digits(hi) {
            return None;
        }
        Some(Self { lo, hi })
    }

    pub fn lo(&self) -> u32 {
        self.lo
    }

    pub fn hi(&self) -> u32 {
        self.hi
    }

    pub fn capacity(&self) -> usize {
        (self.hi - self.lo) as usize + 1
    }

    pub fn contains(&self, id: &str) -> bool {
        id.len() == digits(self.lo)
            && id
                .parse::<u32>()
                .map_or(false, |n| (self.lo..=self.hi).contains(&n))
    }
}

fn digits(n: u32) -> usize {
    n.to_string().len()
}

/// Draw an identifier from `range` that is not in `existing`.
///
/// Retries until it succeeds. If `existing` covers the whole range this never returns,
/// so callers must keep the exclusion set small relative to the range. [`IdGenerator`]
/// tracks occupancy and reports exhaustion instead.
pub fn generate_unique_id<R: Rng + ?Sized>(
    rng: &mut R,
    existing: &HashSet<String>,
    range: IdRange,
) -> String {
    loop {
        let candidate = rng.gen_range(range.lo..=range.hi).to_string();
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
}

/// Stateful generator that grows its exclusion set with every id it hands out.
pub struct IdGenerator<R> {
    rng: R,
    range: IdRange,
    used: HashSet<String>,
    // Number of entries of `used` that fall inside `range`.
    occupied: usize,
}

impl<R: Rng> IdGenerator<R> {
    pub fn new(rng: R, range: IdRange) -> Self {
        Self {
            rng,
            range,
            used: HashSet::new(),
            occupied: 0,
        }
    }

    /// Mark identifiers as taken without handing them out, e.g. the original codes.
    pub fn exclude<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.insert(id.into());
        }
    }

    pub fn next_id(&mut self) -> Result<String> {
        if self.occupied >= self.range.capacity() {
            return Err(PseudonymError::IdPoolExhausted {
                lo: self.range.lo,
                hi: self.range.hi,
            });
        }
        let id = generate_unique_id(&mut self.rng, &self.used, self.range);
        self.insert(id.clone());
        Ok(id)
    }

    pub fn used(&self) -> &HashSet<String> {
        &self.used
    }

    fn insert(&mut self, id: String) {
        let in_range = self.range.contains(&id);
        if self.used.insert(id) && in_range {
            self.occupied += 1;
        }
    }
}
