/// Tunables for the chaotic generators and the block codec
///
/// Both structs serialize with serde so callers can keep cipher settings next
/// to the rest of their configuration.

use serde::{Deserialize, Serialize};

/// Iterations discarded before the logistic generator emits anything
pub const DEFAULT_WARMUP: usize = 200;

/// Upper bound for the "iterate while inside (0.2, 0.8)" loops
pub const DEFAULT_BAND_ITERATION_LIMIT: usize = 100;

/// Bytes reserved per block for OAEP (SHA-1: 2 * 20 + 2)
pub const DEFAULT_PADDING_OVERHEAD: usize = 42;

/// Cap on header-declared payload size accepted by the decoder
pub const DEFAULT_MAX_DECODED_BYTES: usize = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    /// Transient iterations thrown away before sampling
    pub warmup: usize,
    /// Bound on each band-escape loop of the key-mixing cipher
    pub band_iteration_limit: usize,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            band_iteration_limit: DEFAULT_BAND_ITERATION_LIMIT,
        }
    }
}

/// What the block codec does with a ciphertext block the asymmetric
/// primitive refuses to decrypt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockFailurePolicy {
    /// Drop the block from the output stream; later bytes shift forward
    #[default]
    Skip,
    /// Substitute a block of zero bytes so later bytes keep their offsets
    ZeroFill,
    /// Fail the whole call with `CipherError::BlockFailure`
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockCodecConfig {
    /// Bytes of each modulus-sized block reserved for asymmetric padding
    pub padding_overhead: usize,
    pub on_block_failure: BlockFailurePolicy,
    /// Headers claiming more pixel bytes than this are treated as malformed
    pub max_decoded_bytes: usize,
}

impl Default for BlockCodecConfig {
    fn default() -> Self {
        Self {
            padding_overhead: DEFAULT_PADDING_OVERHEAD,
            on_block_failure: BlockFailurePolicy::Skip,
            max_decoded_bytes: DEFAULT_MAX_DECODED_BYTES,
        }
    }
}
