/// Key derivation for the key-mixing chaotic cipher
///
/// Arbitrary-length key material is normalized to a 13-byte [`KeyVector`].
/// From it we derive the initial state of two coupled chaotic maps and the
/// initial feedback value. The vector is then rolled after every pixel so
/// successive pixels see a shifting key. All of this runs identically on the
/// encrypt and decrypt paths; any float op here has to be reproduced in the
/// same order on both sides.

use crate::chaos::escape_band;
use crate::error::{CipherError, Result};
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 13;

/// Positions that absorb overflow bytes of long keys
const FOLD_SPAN: usize = 12;

/// Weights applied to the four bytes of each parameter group
const GROUP_WEIGHTS: [f64; 4] = [0.1, 0.01, 0.001, 0.0001];

const SCALE: f64 = 10_000.0;

/// 13-byte key vector, owned by one cipher invocation and wiped on drop
#[derive(Clone)]
pub struct KeyVector(Zeroizing<[u8; KEY_LEN]>);

impl std::fmt::Debug for KeyVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyVector(..)")
    }
}

impl KeyVector {
    /// Stretch or fold raw key bytes to exactly 13.
    ///
    /// Short keys grow by `next = (sum + len * k[0]) mod 256`, folding each
    /// new byte into the running sum. Long keys add every byte past index 12
    /// onto positions `0..12` (cyclically) and are then truncated.
    pub fn normalize(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() {
            return Err(CipherError::InvalidKey("key material is empty".into()));
        }

        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        if raw.len() <= KEY_LEN {
            out[..raw.len()].copy_from_slice(raw);
            let mut sum: u64 = raw.iter().map(|&b| b as u64).sum();
            for len in raw.len()..KEY_LEN {
                let next = ((sum + len as u64 * out[0] as u64) % 256) as u8;
                out[len] = next;
                sum = (sum + next as u64) % 256;
            }
        } else {
            out.copy_from_slice(&raw[..KEY_LEN]);
            for (i, &extra) in raw[KEY_LEN..].iter().enumerate() {
                let slot = i % FOLD_SPAN;
                out[slot] = out[slot].wrapping_add(extra);
            }
        }
        Ok(Self(out))
    }

    pub fn from_array(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Derive the chaotic seeds and per-round scalars
    pub fn derive(&self) -> Result<DerivedParams> {
        let k = &*self.0;

        let mut groups = [0.0f64; 3];
        let mut product = 1.0f64;
        for (g, chunk) in groups.iter_mut().zip(k[..12].chunks_exact(4)) {
            *g = chunk
                .iter()
                .zip(GROUP_WEIGHTS)
                .map(|(&b, w)| b as f64 * w)
                .sum();
            product = (product * *g).rem_euclid(1.0);
        }

        let sum: u32 = k.iter().map(|&b| b as u32).sum();
        if sum == 0 {
            return Err(CipherError::InvalidKey("key vector is all zeros".into()));
        }
        let xor = k[1..].iter().fold(k[0], |acc, &b| acc ^ b);
        let ratio = xor as f64 / sum as f64;

        let last = k[12] as f64 / 256.0;
        let lx = (product + last).rem_euclid(1.0);
        let ly = (ratio + last).rem_euclid(1.0);

        let group_sum: f64 = groups.iter().sum();
        let sx = round_half_even(((group_sum + lx) * SCALE).rem_euclid(256.0));
        let sy = round_half_even((ratio + xor as f64 + ly * SCALE).rem_euclid(256.0));

        Ok(DerivedParams { sx, sy, lx, ly })
    }

    /// Rolling key schedule: each of the first 12 bytes absorbs byte 12,
    /// which in turn absorbs the updated byte
    pub fn roll(&mut self) {
        let k = &mut *self.0;
        for i in 0..FOLD_SPAN {
            k[i] = k[i].wrapping_add(k[12]);
            k[12] ^= k[i];
        }
    }

    #[inline]
    fn get(&self, i: usize) -> u32 {
        self.0[i] as u32
    }
}

/// Values derived once per invocation from the normalized key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedParams {
    /// Integer seeds in 0..=256
    pub sx: i64,
    pub sy: i64,
    /// Fractional per-round keys in [0, 1)
    pub lx: f64,
    pub ly: f64,
}

impl DerivedParams {
    /// Starting point of both maps: `4 * S * (1 - S)`
    pub fn initial_chaos(&self) -> ChaosState {
        let seed = |s: i64| {
            let s = s as f64;
            4.0 * s * (1.0 - s)
        };
        ChaosState { x: seed(self.sx), y: seed(self.sy) }
    }

    /// Feedback value preceding the first pixel
    pub fn initial_feedback(&self) -> u32 {
        round_half_even((self.lx * self.ly * SCALE).rem_euclid(256.0)) as u32
    }
}

/// Coupled map state, mutated once per pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaosState {
    pub x: f64,
    pub y: f64,
}

/// Byte masks for one pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelMasks {
    /// `((k4 + C1) ^ (k5 + C2))`, each term mod 256
    pub confusion: u8,
    /// Added to the plaintext before masking
    pub offset: u8,
    /// Added to the previous ciphertext before masking
    pub feedback: u8,
}

/// Everything one key-mixing invocation mutates, owned exclusively by it
pub struct MixingSchedule {
    key: KeyVector,
    params: DerivedParams,
    chaos: ChaosState,
    band_limit: usize,
}

impl MixingSchedule {
    pub fn new(key: KeyVector, band_limit: usize) -> Result<Self> {
        let params = key.derive()?;
        let chaos = params.initial_chaos();
        Ok(Self { key, params, chaos, band_limit })
    }

    pub fn params(&self) -> &DerivedParams {
        &self.params
    }

    pub fn chaos(&self) -> ChaosState {
        self.chaos
    }

    /// Push both maps out of the (0.2, 0.8) band and build this pixel's masks
    pub fn masks(&mut self) -> PixelMasks {
        self.chaos.x = escape_band(self.chaos.x, self.band_limit);
        self.chaos.y = escape_band(self.chaos.y, self.band_limit);

        let xr = round_half_even((self.chaos.x * SCALE).rem_euclid(256.0)) as u32;
        let yr = round_half_even((self.chaos.y * SCALE).rem_euclid(256.0)) as u32;
        let (sx, sy) = (self.params.sx as u32, self.params.sy as u32);
        let k = &self.key;

        let c1 = xr ^ ((k.get(0) + xr) % 256) ^ ((sx + k.get(1)) % 256);
        let c2 = xr ^ ((k.get(2) + yr) % 256) ^ ((sy + k.get(3)) % 256);
        let confusion = ((k.get(4) + c1) % 256) ^ ((k.get(5) + c2) % 256);

        PixelMasks {
            confusion: confusion as u8,
            offset: k.get(6) as u8,
            feedback: k.get(7) as u8,
        }
    }

    /// Feed the pixel's (first-channel) ciphertext back into the maps, then
    /// roll the key
    pub fn advance(&mut self, cipher: u8) {
        let step = |x: f64| {
            (x + cipher as f64 / 256.0 + self.key.get(8) as f64 / 256.0 + self.key.get(9) as f64 / 256.0)
                .rem_euclid(1.0)
        };
        let x = step(self.chaos.x);
        // y is seeded from the freshly updated x
        let y = step(x);
        self.chaos = ChaosState { x, y };
        self.key.roll();
    }
}

/// Round to nearest, ties to even
#[inline]
fn round_half_even(x: f64) -> i64 {
    x.round_ties_even() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_short_key() {
        // "test" = [116, 101, 115, 116], sum = 448
        let key = KeyVector::normalize(b"test").unwrap();
        let k = key.as_bytes();
        assert_eq!(&k[..4], b"test");

        let mut sum: u64 = 448;
        let mut expected = b"test".to_vec();
        for len in 4..13 {
            let next = ((sum + len as u64 * 116) % 256) as u8;
            expected.push(next);
            sum = (sum + next as u64) % 256;
        }
        assert_eq!(&k[..], &expected[..]);
        // first extension byte: (448 + 4 * 116) % 256 = 912 % 256
        assert_eq!(k[4], (912 % 256) as u8);
    }

    #[test]
    fn test_normalize_exact_length_is_untouched() {
        let raw: Vec<u8> = (1..=13).collect();
        let key = KeyVector::normalize(&raw).unwrap();
        assert_eq!(&key.as_bytes()[..], &raw[..]);
    }

    #[test]
    fn test_normalize_long_key_folds() {
        let mut raw: Vec<u8> = vec![10; 13];
        raw.extend_from_slice(&[1, 2, 3]);
        // 12 extra bytes wrap back onto slot 0
        raw.extend(std::iter::repeat(5).take(10));
        let key = KeyVector::normalize(&raw).unwrap();
        let k = key.as_bytes();
        assert_eq!(k[0], 10 + 1 + 5);
        assert_eq!(k[1], 10 + 2);
        assert_eq!(k[2], 10 + 3);
        assert_eq!(k[3], 10 + 5);
        assert_eq!(k[11], 10 + 5);
        assert_eq!(k[12], 10);
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(KeyVector::normalize(b""), Err(CipherError::InvalidKey(_))));
    }

    #[test]
    fn test_all_zero_vector_is_invalid() {
        let key = KeyVector::normalize(&[0]).unwrap();
        assert_eq!(key.as_bytes(), &[0u8; 13]);
        assert!(matches!(key.derive(), Err(CipherError::InvalidKey(_))));
    }

    #[test]
    fn test_derive_is_reproducible() {
        let a = KeyVector::normalize(b"secret key").unwrap().derive().unwrap();
        let b = KeyVector::normalize(b"secret key").unwrap().derive().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.lx.to_bits(), b.lx.to_bits());
        assert!((0.0..1.0).contains(&a.lx));
        assert!((0.0..1.0).contains(&a.ly));
        assert!((0..=256).contains(&a.sx));
        assert!((0..=256).contains(&a.sy));
    }

    #[test]
    fn test_derive_by_hand() {
        let key = KeyVector::from_array([1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0, 128]);
        let p = key.derive().unwrap();

        let g0 = 1.0 * 0.1 + 2.0 * 0.01 + 3.0 * 0.001 + 4.0 * 0.0001;
        // the other two groups are zero, so the running product is zero and
        // lx is just k12 / 256
        let lx = 0.5;
        assert_eq!(p.lx, lx);

        // sum = 138, xor = 1 ^ 2 ^ 3 ^ 4 ^ 128 = 132
        let ratio = 132.0 / 138.0;
        let ly = (ratio + 0.5f64).rem_euclid(1.0);
        assert_eq!(p.ly, ly);
        assert_eq!(p.sx, ((g0 + lx) * 10_000.0).rem_euclid(256.0).round_ties_even() as i64);
    }

    #[test]
    fn test_roll_matches_schedule() {
        let mut key = KeyVector::normalize(b"roll").unwrap();
        let before = *key.as_bytes();
        key.roll();
        let after = *key.as_bytes();
        assert_ne!(before, after);

        let mut expected = before;
        for i in 0..12 {
            expected[i] = expected[i].wrapping_add(expected[12]);
            expected[12] ^= expected[i];
        }
        assert_eq!(after, expected);
    }

    #[test]
    fn test_schedule_is_deterministic() {
        let run = || {
            let mut s = MixingSchedule::new(KeyVector::normalize(b"abc").unwrap(), 100).unwrap();
            let mut out = Vec::new();
            for c in 0..50u8 {
                out.push(s.masks());
                s.advance(c.wrapping_mul(31));
            }
            out
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_advance_keeps_state_in_unit_interval() {
        let mut s = MixingSchedule::new(KeyVector::normalize(b"unit").unwrap(), 100).unwrap();
        for c in 0..=255u8 {
            s.masks();
            s.advance(c);
            let st = s.chaos();
            assert!((0.0..=1.0).contains(&st.x));
            assert!((0.0..=1.0).contains(&st.y));
        }
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(0.5), 0);
        assert_eq!(round_half_even(1.5), 2);
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(255.5), 256);
        assert_eq!(round_half_even(0.6), 1);
    }
}
