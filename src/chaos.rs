/// Chaos-based sequence generation using the Logistic Map
/// x(n+1) = r * x(n) * (1 - x(n)), chaotic for r in [3.57, 4.0]
///
/// Encryption and decryption regenerate the same sequence from the key, so
/// every step here must stay bit-for-bit deterministic.

use crate::error::{CipherError, Result};
use sha2::{Digest, Sha256};

/// Lower edge of the chaotic regime of the logistic map
pub const R_CHAOTIC_MIN: f64 = 3.57;
/// Upper edge; beyond it orbits leave the unit interval
pub const R_CHAOTIC_MAX: f64 = 4.0;

/// Lower/upper edge of the band the key-mixing cipher iterates out of
const BAND_LOW: f64 = 0.2;
const BAND_HIGH: f64 = 0.8;

/// Consecutive identical bytes after warm-up that count as a collapse
const COLLAPSE_WINDOW: usize = 16;

/// Key of the simple chaotic cipher: control parameter `r` and seed `x0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticKey {
    r: f64,
    x0: f64,
}

impl LogisticKey {
    /// Build a key. `r` must be finite and `x0` must lie strictly inside
    /// (0, 1). An `r` outside the chaotic regime is accepted here and
    /// reported by [`LogisticKey::diagnose`].
    pub fn new(r: f64, x0: f64) -> Result<Self> {
        if !r.is_finite() {
            return Err(CipherError::InvalidKey(format!("r must be finite, got {r}")));
        }
        if !(x0 > 0.0 && x0 < 1.0) {
            return Err(CipherError::InvalidKey(format!("x0 must lie in (0, 1), got {x0}")));
        }
        Ok(Self { r, x0 })
    }

    /// Derive a key from a passphrase
    ///
    /// SHA-256 of the passphrase; the first 8 bytes map to x0 in [0.05, 0.95],
    /// the next 8 to r in [3.8, 4.0] for strong chaos.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let hash = Sha256::digest(passphrase.as_bytes());
        let mut x0_bytes = [0u8; 8];
        let mut r_bytes = [0u8; 8];
        x0_bytes.copy_from_slice(&hash[0..8]);
        r_bytes.copy_from_slice(&hash[8..16]);

        let x0 = (u64::from_be_bytes(x0_bytes) as f64 / u64::MAX as f64) * 0.9 + 0.05;
        let r = (u64::from_be_bytes(r_bytes) as f64 / u64::MAX as f64) * 0.2 + 3.8;
        Self { r, x0 }
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    /// Check that this key drives the map chaotically.
    ///
    /// Returns `DegenerateSequence` when `r` is outside [3.57, 4.0], or when
    /// the orbit after `warmup` iterations has left (0, 1) or settled on a
    /// fixed point (the byte stream would be constant).
    pub fn diagnose(&self, warmup: usize) -> Result<()> {
        if !(R_CHAOTIC_MIN..=R_CHAOTIC_MAX).contains(&self.r) {
            return Err(CipherError::DegenerateSequence(format!(
                "r = {} lies outside the chaotic regime [{R_CHAOTIC_MIN}, {R_CHAOTIC_MAX}]",
                self.r
            )));
        }

        let mut map = LogisticMap::warmed(self, warmup);
        let state = map.state();
        if !(state > 0.0 && state < 1.0) {
            return Err(CipherError::DegenerateSequence(format!(
                "orbit collapsed to {state} after {warmup} iterations"
            )));
        }

        let first = map.next_byte();
        if (1..COLLAPSE_WINDOW).all(|_| map.next_byte() == first) {
            return Err(CipherError::DegenerateSequence(format!(
                "orbit settled on a fixed point near {}",
                map.state()
            )));
        }
        Ok(())
    }
}

/// Logistic Map chaos generator
pub struct LogisticMap {
    state: f64,
    r: f64,
    iteration: usize,
}

impl LogisticMap {
    /// Start at `x0` without discarding anything
    pub fn new(key: &LogisticKey) -> Self {
        Self {
            state: key.x0,
            r: key.r,
            iteration: 0,
        }
    }

    /// Start at `x0` and skip the transient period
    pub fn warmed(key: &LogisticKey, warmup: usize) -> Self {
        let mut map = Self::new(key);
        for _ in 0..warmup {
            map.next();
        }
        map
    }

    /// Generate next chaotic value
    pub fn next(&mut self) -> f64 {
        self.state = self.r * self.state * (1.0 - self.state);
        self.iteration += 1;
        self.state
    }

    /// Advance once and quantize to a byte: floor(x * 256) mod 256
    pub fn next_byte(&mut self) -> u8 {
        quantize(self.next())
    }

    pub fn state(&self) -> f64 {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

#[inline]
fn quantize(x: f64) -> u8 {
    // NaN and infinities saturate in the cast; the result stays a byte
    ((x * 256.0).floor() as i64).rem_euclid(256) as u8
}

/// Warm up for `warmup` iterations, then emit `len` bytes
pub fn logistic_sequence(key: &LogisticKey, len: usize, warmup: usize) -> Vec<u8> {
    let mut map = LogisticMap::warmed(key, warmup);
    (0..len).map(|_| map.next_byte()).collect()
}

/// Iterate the fully chaotic map (r = 4) while `x` stays inside (0.2, 0.8),
/// at most `limit` times. Returns the last value when the bound is hit.
pub fn escape_band(mut x: f64, limit: usize) -> f64 {
    let mut count = 0;
    while x > BAND_LOW && x < BAND_HIGH && count < limit {
        x = 4.0 * x * (1.0 - x);
        count += 1;
    }
    x
}
