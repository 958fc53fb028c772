/// Position permutations over pixel grids
///
/// Two families live here:
///
/// - the Arnold cat map, a closed-form area-preserving bijection on an
///   `N x N` grid with integer coefficients (exact modular arithmetic, no
///   floating point);
/// - a Fisher-Yates style swap schedule driven by a chaotic byte sequence.
///
/// Both are applied as gathers: `out[p] = in[source(p)]`, reading from the
/// previous buffer and writing a fresh one, so no pass ever aliases its input.

use rayon::prelude::*;

/// 2x2 integer matrix with entries already reduced modulo the grid side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CatMatrix {
    m: [[u64; 2]; 2],
    n: u64,
}

impl CatMatrix {
    fn reduce(entries: [[i128; 2]; 2], n: u64) -> Self {
        let r = |v: i128| v.rem_euclid(n as i128) as u64;
        Self {
            m: [
                [r(entries[0][0]), r(entries[0][1])],
                [r(entries[1][0]), r(entries[1][1])],
            ],
            n,
        }
    }

    /// (x, y) -> (x + b*y, a*x + (a*b + 1)*y) mod N
    fn forward(a: i64, b: i64, n: u64) -> Self {
        let (a, b) = (a as i128, b as i128);
        Self::reduce([[1, b], [a, a * b + 1]], n)
    }

    /// (x, y) -> ((a*b + 1)*x - b*y, -a*x + y) mod N
    fn inverse(a: i64, b: i64, n: u64) -> Self {
        let (a, b) = (a as i128, b as i128);
        Self::reduce([[a * b + 1, -b], [-a, 1]], n)
    }

    #[inline]
    fn apply(&self, x: u64, y: u64) -> (u64, u64) {
        let n = self.n as u128;
        let (x, y) = (x as u128, y as u128);
        let nx = (self.m[0][0] as u128 * x + self.m[0][1] as u128 * y) % n;
        let ny = (self.m[1][0] as u128 * x + self.m[1][1] as u128 * y) % n;
        (nx as u64, ny as u64)
    }
}

/// Direction of a cat-map pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

/// One whole-image cat-map pass over a square `side x side` buffer with
/// `channels` interleaved bytes per pixel. Returns a new buffer.
pub fn cat_map_pass(
    pixels: &[u8],
    side: usize,
    channels: usize,
    a: i64,
    b: i64,
    direction: Direction,
) -> Vec<u8> {
    debug_assert_eq!(pixels.len(), side * side * channels);
    let n = side as u64;
    let matrix = match direction {
        Direction::Forward => CatMatrix::forward(a, b, n),
        Direction::Inverse => CatMatrix::inverse(a, b, n),
    };

    let row_len = side * channels;
    let mut out = vec![0u8; pixels.len()];
    out.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        for x in 0..side {
            let (sx, sy) = matrix.apply(x as u64, y as u64);
            let src = (sy as usize * side + sx as usize) * channels;
            row[x * channels..(x + 1) * channels].copy_from_slice(&pixels[src..src + channels]);
        }
    });
    out
}

/// Run `iterations` cat-map passes, each reading the previous pass's output
pub fn cat_map(
    pixels: Vec<u8>,
    side: usize,
    channels: usize,
    a: i64,
    b: i64,
    iterations: u32,
    direction: Direction,
) -> Vec<u8> {
    (0..iterations).fold(pixels, |current, _| {
        cat_map_pass(&current, side, channels, a, b, direction)
    })
}

/// Ordered sequence of pixel positions; always a bijection on `[0, len)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationIndex(Vec<usize>);

impl PermutationIndex {
    pub fn identity(len: usize) -> Self {
        Self((0..len).collect())
    }

    /// Identity index shuffled by the encrypting swap schedule
    pub fn forward(seq: &[u8]) -> Self {
        let mut index = Self::identity(seq.len());
        index.forward_pass(seq);
        index
    }

    /// Identity index shuffled by the decrypting swap schedule. Gathering
    /// with this undoes a gather with [`PermutationIndex::forward`] built
    /// from the same sequence.
    pub fn inverse(seq: &[u8]) -> Self {
        let mut index = Self::identity(seq.len());
        index.inverse_pass(seq);
        index
    }

    /// Swap `i` with `seq[i] mod (i + 1)` for `i` from `len - 1` down to 1.
    ///
    /// # Panics
    /// If `seq` is shorter than the index.
    pub fn forward_pass(&mut self, seq: &[u8]) {
        for i in (1..self.0.len()).rev() {
            let j = seq[i] as usize % (i + 1);
            self.0.swap(i, j);
        }
    }

    /// Same swap rule as [`PermutationIndex::forward_pass`], `i` running
    /// from 1 up to `len - 1`. The loop direction is what makes it the
    /// inverse; it must not be changed.
    ///
    /// # Panics
    /// If `seq` is shorter than the index.
    pub fn inverse_pass(&mut self, seq: &[u8]) {
        for i in 1..self.0.len() {
            let j = seq[i] as usize % (i + 1);
            self.0.swap(i, j);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &p)| i == p)
    }

    pub fn is_bijection(&self) -> bool {
        let mut seen = vec![false; self.0.len()];
        self.0.iter().all(|&p| p < seen.len() && !std::mem::replace(&mut seen[p], true))
    }

    /// Reorder whole pixels: `out[i] = in[index[i]]`
    pub fn gather(&self, pixels: &[u8], channels: usize) -> Vec<u8> {
        debug_assert_eq!(pixels.len(), self.0.len() * channels);
        let mut out = Vec::with_capacity(pixels.len());
        for &src in &self.0 {
            out.extend_from_slice(&pixels[src * channels..(src + 1) * channels]);
        }
        out
    }
}
