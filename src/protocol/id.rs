//! Correlation id generation.
//!
//! Ids only need to be distinct among the calls currently pending on one
//! exchanger, so a short random token is enough. The pending-call table
//! re-draws on the rare collision. [`SequentialIds`] trades the short
//! token for guaranteed uniqueness.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use super::CorrelationId;

/// Number of base-36 digits in a random id.
pub const RANDOM_ID_LEN: usize = 8;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of correlation ids.
pub trait IdGenerator: Send + Sync + 'static {
    /// Produce the next id.
    fn generate(&self) -> CorrelationId;
}

/// Short base-36 tokens drawn from a random fraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> CorrelationId {
        let fraction: f64 = rand::thread_rng().gen();
        base36_fraction(fraction, RANDOM_ID_LEN)
    }
}

/// Expand the first `len` base-36 digits of `fraction` (in `[0, 1)`).
fn base36_fraction(mut fraction: f64, len: usize) -> String {
    let mut id = String::with_capacity(len);
    for _ in 0..len {
        fraction *= 36.0;
        let digit = (fraction.floor() as usize).min(35);
        fraction -= digit as f64;
        id.push(DIGITS[digit] as char);
    }
    id
}

/// Monotonically increasing ids, unique for the generator's lifetime.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Start counting from zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> CorrelationId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let mut digits = Vec::new();
        let mut rest = n;
        loop {
            digits.push(DIGITS[(rest % 36) as usize]);
            rest /= 36;
            if rest == 0 {
                break;
            }
        }
        digits.iter().rev().map(|&b| b as char).collect()
    }
}

/// Which id generator an exchanger uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdStrategy {
    /// [`RandomIds`].
    #[default]
    Random,
    /// [`SequentialIds`].
    Sequential,
}

impl IdStrategy {
    /// Build the generator for this strategy.
    pub fn generator(self) -> Box<dyn IdGenerator> {
        match self {
            IdStrategy::Random => Box::new(RandomIds),
            IdStrategy::Sequential => Box::new(SequentialIds::new()),
        }
    }
}
