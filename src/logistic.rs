/// Logistic chaos permutation-diffusion cipher
///
/// Encryption shuffles pixel positions with a chaos-driven swap schedule and
/// then XOR-diffuses every byte with feedback. Decryption undoes the
/// diffusion first (it was applied last) and then un-shuffles.

use crate::buffer::Image;
use crate::chaos::{logistic_sequence, LogisticKey};
use crate::config::ChaosConfig;
use crate::diffusion::{diffuse, undiffuse};
use crate::error::Result;
use crate::permute::PermutationIndex;
use crate::ImageCipher;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticCipher {
    config: ChaosConfig,
}

impl LogisticCipher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ChaosConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Byte stream for `image`: `W*H*channels` bytes. The shuffle sequence is
    /// its first `W*H` bytes, since both come from the same seed and warm-up.
    fn keystream(&self, image: &Image, key: &LogisticKey) -> Vec<u8> {
        if let Err(err) = key.diagnose(self.config.warmup) {
            warn!(%err, "continuing with a degenerate chaotic key");
        }
        let len = image.pixel_count() * image.channels() as usize;
        logistic_sequence(key, len, self.config.warmup)
    }
}

impl ImageCipher for LogisticCipher {
    type EncryptKey = LogisticKey;
    type DecryptKey = LogisticKey;

    fn encrypt(&self, image: Image, key: &LogisticKey) -> Result<Image> {
        image.ensure_cipherable()?;
        let started = Instant::now();
        let channels = image.channels() as usize;

        let stream = self.keystream(&image, key);
        let shuffle_seq = &stream[..image.pixel_count()];

        let shuffled = PermutationIndex::forward(shuffle_seq).gather(image.pixels(), channels);
        let diffused = diffuse(shuffled, &stream);

        debug!(
            width = image.width(),
            height = image.height(),
            channels,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "logistic encrypt done"
        );
        image.with_pixels(diffused)
    }

    fn decrypt(&self, image: Image, key: &LogisticKey) -> Result<Image> {
        image.ensure_cipherable()?;
        let started = Instant::now();
        let channels = image.channels() as usize;

        let stream = self.keystream(&image, key);
        let shuffle_seq = &stream[..image.pixel_count()];

        let shuffled = undiffuse(image.pixels().to_vec(), &stream);
        let restored = PermutationIndex::inverse(shuffle_seq).gather(&shuffled, channels);

        debug!(
            width = image.width(),
            height = image.height(),
            channels,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "logistic decrypt done"
        );
        image.with_pixels(restored)
    }
}
