//! # Push Identifiers
//!
//! Sortable, time-ordered, collision-resistant identifiers. Each id is an
//! 8-character base-64 encoding of the millisecond timestamp followed by a
//! 12-character suffix. The alphabet is in ASCII order, so lexicographic
//! order of ids matches generation order.

use crate::model::RemoteId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Base-64 alphabet in ascending ASCII order.
pub const PUSH_CHARS: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_CHARS: usize = 8;
const SUFFIX_CHARS: usize = 12;

/// Length of every generated identifier.
pub const PUSH_ID_LEN: usize = TIME_CHARS + SUFFIX_CHARS;

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Stateful identifier generator.
///
/// Construct one per run and pass it by `&mut` to every writer. Ids from the
/// same generator are strictly increasing: within one millisecond the suffix
/// is incremented instead of redrawn, and the effective clock never moves
/// backwards.
#[derive(Debug)]
pub struct PushIdGenerator<C: Clock = SystemClock> {
    clock: C,
    rng: StdRng,
    last_millis: Option<u64>,
    last_suffix: [u8; SUFFIX_CHARS],
}

impl PushIdGenerator<SystemClock> {
    /// Generator on the wall clock, seeded from the OS.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for PushIdGenerator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> PushIdGenerator<C> {
    pub fn with_clock(clock: C) -> Self {
        Self::with_clock_and_rng(clock, StdRng::from_os_rng())
    }

    /// Deterministic generator for tests and benches.
    pub fn with_seed(clock: C, seed: u64) -> Self {
        Self::with_clock_and_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn with_clock_and_rng(clock: C, rng: StdRng) -> Self {
        Self {
            clock,
            rng,
            last_millis: None,
            last_suffix: [0; SUFFIX_CHARS],
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Produce the next identifier.
    pub fn generate(&mut self) -> RemoteId {
        let now = self.clock.now_millis();
        let millis = match self.last_millis {
            Some(last) if now <= last => {
                if increment_suffix(&mut self.last_suffix) {
                    last
                } else {
                    // Suffix wrapped to all zeros: move to the next millisecond.
                    last.wrapping_add(1)
                }
            }
            _ => {
                for slot in self.last_suffix.iter_mut() {
                    *slot = self.rng.random_range(0..64u8);
                }
                now
            }
        };
        self.last_millis = Some(millis);
        RemoteId(encode(millis, &self.last_suffix))
    }
}

/// Add one to the suffix with carry. Returns `false` when it overflowed.
fn increment_suffix(suffix: &mut [u8; SUFFIX_CHARS]) -> bool {
    for slot in suffix.iter_mut().rev() {
        if *slot == 63 {
            *slot = 0;
        } else {
            *slot += 1;
            return true;
        }
    }
    false
}

fn encode(millis: u64, suffix: &[u8; SUFFIX_CHARS]) -> String {
    let mut out = [0u8; PUSH_ID_LEN];
    let mut now = millis;
    for slot in out[..TIME_CHARS].iter_mut().rev() {
        *slot = PUSH_CHARS[(now % 64) as usize];
        now /= 64;
    }
    for (slot, idx) in out[TIME_CHARS..].iter_mut().zip(suffix.iter()) {
        *slot = PUSH_CHARS[*idx as usize];
    }
    out.iter().map(|b| *b as char).collect()
}

/// Timestamp prefix of an id produced by this module, in milliseconds.
pub fn decode_millis(id: &str) -> Option<u64> {
    let prefix = id.as_bytes().get(..TIME_CHARS)?;
    prefix.iter().try_fold(0u64, |acc, byte| {
        let digit = PUSH_CHARS.iter().position(|c| c == byte)?;
        Some(acc * 64 + digit as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedClock(Cell<u64>);

    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0.get()
        }
    }

    #[test]
    fn test_alphabet_is_sorted() {
        assert!(PUSH_CHARS.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_same_millisecond_ids_increase() {
        let mut generator = PushIdGenerator::with_seed(FixedClock(Cell::new(1_700_000_000_000)), 7);
        let ids: Vec<RemoteId> = (0..500).map(|_| generator.generate()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        assert!(ids.iter().all(|id| id.as_str().len() == PUSH_ID_LEN));
    }

    #[test]
    fn test_timestamp_prefix_round_trips() {
        let millis = 1_761_811_200_123;
        let mut generator = PushIdGenerator::with_seed(FixedClock(Cell::new(millis)), 1);
        let id = generator.generate();
        assert_eq!(decode_millis(id.as_str()), Some(millis));
    }

    #[test]
    fn test_clock_going_backwards_keeps_order() {
        let clock = FixedClock(Cell::new(5_000));
        let mut generator = PushIdGenerator::with_seed(clock, 3);
        let first = generator.generate();
        generator.clock().0.set(4_000);
        let second = generator.generate();
        assert!(first < second);
        assert_eq!(decode_millis(second.as_str()), Some(5_000));
    }

    #[test]
    fn test_suffix_overflow_advances_millisecond() {
        let mut generator = PushIdGenerator::with_seed(FixedClock(Cell::new(9_000)), 3);
        let _ = generator.generate();
        generator.last_suffix = [63; SUFFIX_CHARS];
        let before = encode(9_000, &generator.last_suffix);
        let after = generator.generate();
        assert!(before.as_str() < after.as_str());
        assert_eq!(decode_millis(after.as_str()), Some(9_001));
        assert!(after.as_str().ends_with("------------"));
    }

    #[test]
    fn test_new_millisecond_draws_fresh_suffix() {
        let mut generator = PushIdGenerator::with_seed(FixedClock(Cell::new(10)), 11);
        let first = generator.generate();
        generator.clock().0.set(11);
        let second = generator.generate();
        assert!(first < second);
        assert_eq!(decode_millis(second.as_str()), Some(11));
    }
}
