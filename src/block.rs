/// Block codec: carries an image through a block-oriented asymmetric cipher
///
/// Encryption frames the image as a 12-byte big-endian header
/// `(height, width, channels)` followed by the raw pixels, pads the stream
/// to the plaintext block size, encrypts each block independently and packs
/// the ciphertext into a 3-channel image of computed dimensions.
///
/// Decryption is deliberately forgiving: blocks that fail to decrypt are
/// handled by the configured [`BlockFailurePolicy`], a malformed header falls
/// back to the cipher image's own geometry, and missing payload bytes are
/// filled with noise. The caller always gets an image unless the policy is
/// `Abort`.

use crate::buffer::{byte_len, Image};
use crate::config::{BlockCodecConfig, BlockFailurePolicy};
use crate::error::{CipherError, Result};
use crate::ImageCipher;
use rand::RngCore;
use rayon::prelude::*;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::{debug, warn};

pub const HEADER_LEN: usize = 12;

/// Channels of the image the ciphertext is packed into
const CIPHER_IMAGE_CHANNELS: u8 = 3;

/// Largest channel count a decoded header may claim
const MAX_HEADER_CHANNELS: u32 = 4;

/// Public half of an asymmetric primitive working on fixed-size blocks
pub trait BlockEncrypt {
    /// Size of one ciphertext block in bytes
    fn modulus_bytes(&self) -> usize;
    fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>>;
}

/// Private half of an asymmetric primitive working on fixed-size blocks
pub trait BlockDecrypt {
    fn modulus_bytes(&self) -> usize;
    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>>;
}

/// Geometry stored in front of the pixel bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

impl FrameHeader {
    pub fn for_image(image: &Image) -> Self {
        Self {
            height: image.height(),
            width: image.width(),
            channels: image.channels() as u32,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.height.to_be_bytes());
        out[4..8].copy_from_slice(&self.width.to_be_bytes());
        out[8..12].copy_from_slice(&self.channels.to_be_bytes());
        out
    }

    /// Read the first 12 bytes; `None` if there are fewer
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let field = |i: usize| -> Option<u32> {
            let raw: [u8; 4] = bytes.get(i..i + 4)?.try_into().ok()?;
            Some(u32::from_be_bytes(raw))
        };
        Some(Self {
            height: field(0)?,
            width: field(4)?,
            channels: field(8)?,
        })
    }

    /// Payload byte count if the header describes something decodable
    fn payload_len(&self, max_bytes: usize) -> Option<usize> {
        if self.height == 0 || self.width == 0 || self.channels == 0 {
            return None;
        }
        if self.channels > MAX_HEADER_CHANNELS {
            return None;
        }
        byte_len(self.width, self.height, self.channels as u8).filter(|&len| len <= max_bytes)
    }
}

/// Header followed by the raw row-major pixels
pub fn frame(image: &Image) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + image.pixels().len());
    out.extend_from_slice(&FrameHeader::for_image(image).to_bytes());
    out.extend_from_slice(image.pixels());
    out
}

/// Pad `data` up to a multiple of `block_size`, returning the pad length.
///
/// Every pad byte holds the pad length (its low byte for blocks wider than
/// 256). A stream that is already aligned gets no padding at all.
pub fn pad(data: &mut Vec<u8>, block_size: usize) -> usize {
    let pad_len = block_size - data.len() % block_size;
    if pad_len < block_size {
        data.resize(data.len() + pad_len, pad_len as u8);
        pad_len
    } else {
        0
    }
}

/// `(height, width)` of the 3-channel image holding `total` ciphertext bytes:
/// `height = floor(sqrt(total / 3)) + 1`, `width = ceil(total / (3 * height))`
pub fn reshape_dims(total: usize) -> (usize, usize) {
    let height = (total as f64 / 3.0).sqrt() as usize + 1;
    let width = total.div_ceil(height * CIPHER_IMAGE_CHANNELS as usize);
    (height, width)
}

/// Zero-extend ciphertext to the reshaped geometry and wrap it as an image
pub(crate) fn to_cipher_image(mut ciphertext: Vec<u8>) -> Result<Image> {
    let (height, width) = reshape_dims(ciphertext.len());
    ciphertext.resize(height * width * CIPHER_IMAGE_CHANNELS as usize, 0);
    let too_big = |len| CipherError::InvalidDimensions {
        width: u32::MAX,
        height: u32::MAX,
        channels: CIPHER_IMAGE_CHANNELS,
        len,
    };
    let width = u32::try_from(width).map_err(|_| too_big(ciphertext.len()))?;
    let height = u32::try_from(height).map_err(|_| too_big(ciphertext.len()))?;
    Image::new(width, height, CIPHER_IMAGE_CHANNELS, ciphertext)
}

enum BlockOutcome {
    Plain(Vec<u8>),
    /// Zero bytes appended by the reshape, never real ciphertext
    Filler,
    Failed,
}

/// Image cipher over a block-oriented asymmetric primitive
#[derive(Debug, Clone, Copy)]
pub struct BlockCodec<E, D> {
    config: BlockCodecConfig,
    _keys: PhantomData<fn() -> (E, D)>,
}

impl<E, D> Default for BlockCodec<E, D> {
    fn default() -> Self {
        Self::with_config(BlockCodecConfig::default())
    }
}

impl<E, D> BlockCodec<E, D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BlockCodecConfig) -> Self {
        Self { config, _keys: PhantomData }
    }

    pub fn config(&self) -> &BlockCodecConfig {
        &self.config
    }

    /// Plaintext bytes per block for a given ciphertext block size
    pub fn block_size(&self, modulus_bytes: usize) -> Result<usize> {
        modulus_bytes
            .checked_sub(self.config.padding_overhead)
            .filter(|&size| size > 0)
            .ok_or_else(|| {
                CipherError::InvalidKey(format!(
                    "{modulus_bytes}-byte blocks leave no room after {} bytes of padding overhead",
                    self.config.padding_overhead
                ))
            })
    }
}

impl<E: BlockEncrypt + Sync, D> BlockCodec<E, D> {
    /// Pad and encrypt a byte stream block by block
    pub fn seal(&self, mut data: Vec<u8>, key: &E) -> Result<Vec<u8>> {
        let block_size = self.block_size(key.modulus_bytes())?;
        let pad_len = pad(&mut data, block_size);

        let blocks = data
            .par_chunks(block_size)
            .map(|block| key.encrypt_block(block))
            .collect::<Result<Vec<_>>>()?;

        debug!(blocks = blocks.len(), block_size, pad_len, "sealed stream");
        Ok(blocks.concat())
    }
}

impl<E, D: BlockDecrypt + Sync> BlockCodec<E, D> {
    /// Decrypt every ciphertext block, applying the failure policy. Padding
    /// is left in place.
    pub fn open(&self, data: &[u8], key: &D) -> Result<Vec<u8>> {
        let encrypted_size = key.modulus_bytes();
        let block_size = self.block_size(encrypted_size)?;

        let outcomes: Vec<BlockOutcome> = data
            .par_chunks(encrypted_size)
            .map(|chunk| {
                if chunk.len() < encrypted_size || chunk.iter().all(|&b| b == 0) {
                    return BlockOutcome::Filler;
                }
                match key.decrypt_block(chunk) {
                    Ok(plain) => BlockOutcome::Plain(plain),
                    Err(_) => BlockOutcome::Failed,
                }
            })
            .collect();

        let mut out = Vec::with_capacity(outcomes.len() * block_size);
        let mut failed = 0usize;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                BlockOutcome::Plain(plain) => out.extend_from_slice(&plain),
                BlockOutcome::Filler => {}
                BlockOutcome::Failed => {
                    failed += 1;
                    match self.config.on_block_failure {
                        BlockFailurePolicy::Skip => {}
                        BlockFailurePolicy::ZeroFill => out.resize(out.len() + block_size, 0),
                        BlockFailurePolicy::Abort => return Err(CipherError::BlockFailure { index }),
                    }
                }
            }
        }

        if failed > 0 {
            warn!(failed, policy = ?self.config.on_block_failure, "blocks failed to decrypt");
        }
        Ok(out)
    }
}

impl<E, D> ImageCipher for BlockCodec<E, D>
where
    E: BlockEncrypt + Sync,
    D: BlockDecrypt + Sync,
{
    type EncryptKey = E;
    type DecryptKey = D;

    fn encrypt(&self, image: Image, key: &E) -> Result<Image> {
        image.ensure_cipherable()?;
        let started = Instant::now();

        let ciphertext = self.seal(frame(&image), key)?;
        let total = ciphertext.len();
        let cipher_image = to_cipher_image(ciphertext)?;

        debug!(
            total,
            width = cipher_image.width(),
            height = cipher_image.height(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "block encrypt done"
        );
        Ok(cipher_image)
    }

    fn decrypt(&self, image: Image, key: &D) -> Result<Image> {
        image.ensure_cipherable()?;
        let started = Instant::now();

        let plain = self.open(image.pixels(), key)?;
        let fallback = FrameHeader::for_image(&image);

        let header = match FrameHeader::parse(&plain) {
            Some(header) if header.payload_len(self.config.max_decoded_bytes).is_some() => header,
            other => {
                warn!(?other, ?fallback, "unusable frame header, using cipher image geometry");
                fallback
            }
        };
        // fallback geometry comes from a valid image, so this cannot be None
        let expected = header
            .payload_len(usize::MAX)
            .unwrap_or(image.pixels().len());

        let mut payload = plain.get(HEADER_LEN..).unwrap_or_default().to_vec();
        if payload.len() < expected {
            let missing = expected - payload.len();
            warn!(missing, "payload shorter than header claims, filling with noise");
            let start = payload.len();
            payload.resize(expected, 0);
            rand::thread_rng().fill_bytes(&mut payload[start..]);
        }
        payload.truncate(expected);

        let decoded = match Image::new(header.width, header.height, header.channels as u8, payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(%err, "could not rebuild image, returning noise");
                Image::noise(fallback.width, fallback.height, fallback.channels as u8)?
            }
        };

        debug!(
            width = decoded.width(),
            height = decoded.height(),
            channels = decoded.channels(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "block decrypt done"
        );
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULUS: usize = 58;
    const BLOCK: usize = MODULUS - 42;
    const MARKER: u8 = 0xA5;

    /// Toy primitive: marker, length, masked data, zero tail
    struct ToyKey;

    impl BlockEncrypt for ToyKey {
        fn modulus_bytes(&self) -> usize {
            MODULUS
        }

        fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
            assert!(block.len() <= BLOCK);
            let mut out = vec![0u8; MODULUS];
            out[0] = MARKER;
            out[1] = block.len() as u8;
            for (o, b) in out[2..].iter_mut().zip(block) {
                *o = b ^ 0x5C;
            }
            Ok(out)
        }
    }

    impl BlockDecrypt for ToyKey {
        fn modulus_bytes(&self) -> usize {
            MODULUS
        }

        fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
            if block.len() != MODULUS || block[0] != MARKER || block[1] as usize > BLOCK {
                return Err(CipherError::Backend("bad block".into()));
            }
            let len = block[1] as usize;
            Ok(block[2..2 + len].iter().map(|b| b ^ 0x5C).collect())
        }
    }

    type ToyCodec = BlockCodec<ToyKey, ToyKey>;

    fn codec(policy: BlockFailurePolicy) -> ToyCodec {
        ToyCodec::with_config(BlockCodecConfig { on_block_failure: policy, ..Default::default() })
    }

    fn ramp(width: u32, height: u32, channels: u8) -> Image {
        let len = (width * height * channels as u32) as usize;
        Image::new(width, height, channels, (0..len).map(|i| (i % 251) as u8).collect()).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let header = FrameHeader { height: 0x0102_0304, width: 5, channels: 3 };
        let bytes = header.to_bytes();
        assert_eq!(bytes, [1, 2, 3, 4, 0, 0, 0, 5, 0, 0, 0, 3]);
        assert_eq!(FrameHeader::parse(&bytes), Some(header));
        assert_eq!(FrameHeader::parse(&bytes[..11]), None);
    }

    #[test]
    fn test_padding_boundary() {
        let mut aligned = vec![7u8; 32];
        assert_eq!(pad(&mut aligned, 16), 0);
        assert_eq!(aligned.len(), 32);

        let mut one_over = vec![7u8; 33];
        assert_eq!(pad(&mut one_over, 16), 15);
        assert_eq!(one_over.len(), 48);
        assert!(one_over[33..].iter().all(|&b| b == 15));

        let mut empty = Vec::new();
        assert_eq!(pad(&mut empty, 16), 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_wide_block_pad_keeps_low_byte() {
        // 299 bytes of padding do not fit a byte; each holds 299 mod 256
        let mut data = vec![7u8; 1];
        assert_eq!(pad(&mut data, 300), 299);
        assert_eq!(data.len(), 300);
        assert!(data[1..].iter().all(|&b| b == 43));
    }

    #[test]
    fn test_reshape_dims_formula() {
        // 3 toy blocks: sqrt(58) = 7.6 -> 8 rows, ceil(174 / 24) = 8 columns
        assert_eq!(reshape_dims(174), (8, 8));
        assert_eq!(reshape_dims(1), (1, 1));
        // 256-byte RSA-2048 block
        assert_eq!(reshape_dims(256), (10, 9));
    }

    #[test]
    fn test_seal_open_lengths() {
        let codec = codec(BlockFailurePolicy::Abort);
        for len in [0, BLOCK - 1, BLOCK, BLOCK + 1, 10 * BLOCK] {
            let data: Vec<u8> = (0..len).map(|i| (i * 3) as u8).collect();
            let sealed = codec.seal(data.clone(), &ToyKey).unwrap();
            assert_eq!(sealed.len() % MODULUS, 0);

            let opened = codec.open(&sealed, &ToyKey).unwrap();
            assert_eq!(opened.len(), data.len().div_ceil(BLOCK) * BLOCK, "len {len}");
            assert_eq!(&opened[..len], &data[..]);
        }
    }

    #[test]
    fn test_image_round_trip_across_block_boundaries() {
        let codec = codec(BlockFailurePolicy::Abort);
        // frame lengths 31, 32, 33 around the 16-byte block boundary
        for n in [19, 20, 21] {
            let img = ramp(n, 1, 1);
            let enc = codec.encrypt(img.clone(), &ToyKey).unwrap();
            assert_eq!(enc.channels(), 3);
            assert_eq!(codec.decrypt(enc, &ToyKey).unwrap(), img);
        }
        let color = ramp(9, 5, 3);
        let enc = codec.encrypt(color.clone(), &ToyKey).unwrap();
        assert_eq!(codec.decrypt(enc, &ToyKey).unwrap(), color);
    }

    /// 1x60 gray image -> 72-byte frame -> 5 blocks; corrupt block 2
    fn corrupted() -> (Image, Image) {
        let img = ramp(60, 1, 1);
        let mut enc = codec(BlockFailurePolicy::Skip).encrypt(img.clone(), &ToyKey).unwrap();
        enc.pixels_mut()[2 * MODULUS] ^= 0xFF;
        (img, enc)
    }

    #[test]
    fn test_skip_policy_drops_block() {
        let (img, enc) = corrupted();
        let dec = codec(BlockFailurePolicy::Skip).decrypt(enc, &ToyKey).unwrap();
        assert_eq!((dec.width(), dec.height(), dec.channels()), (60, 1, 1));
        // block 0 holds the header and 4 pixels, block 1 the next 16
        assert_eq!(&dec.pixels()[..20], &img.pixels()[..20]);
        // later bytes shifted forward by a whole block
        assert_eq!(&dec.pixels()[20..44], &img.pixels()[36..60]);
    }

    #[test]
    fn test_zero_fill_policy_keeps_offsets() {
        let (img, enc) = corrupted();
        let dec = codec(BlockFailurePolicy::ZeroFill).decrypt(enc, &ToyKey).unwrap();
        assert_eq!(&dec.pixels()[..20], &img.pixels()[..20]);
        assert!(dec.pixels()[20..36].iter().all(|&b| b == 0));
        assert_eq!(&dec.pixels()[36..], &img.pixels()[36..]);
    }

    #[test]
    fn test_abort_policy_reports_index() {
        let (_, enc) = corrupted();
        let err = codec(BlockFailurePolicy::Abort).decrypt(enc, &ToyKey);
        assert!(matches!(err, Err(CipherError::BlockFailure { index: 2 })));
    }

    #[test]
    fn test_lost_header_falls_back_to_cipher_geometry() {
        let img = ramp(60, 1, 1);
        let codec = codec(BlockFailurePolicy::Skip);
        let mut enc = codec.encrypt(img, &ToyKey).unwrap();
        enc.pixels_mut()[0] ^= 0xFF;
        let (w, h) = (enc.width(), enc.height());

        let dec = codec.decrypt(enc, &ToyKey).unwrap();
        assert_eq!((dec.width(), dec.height(), dec.channels()), (w, h, 3));
    }

    #[test]
    fn test_oversized_header_falls_back() {
        let codec = codec(BlockFailurePolicy::Skip);
        let header = FrameHeader { height: 100_000, width: 100_000, channels: 4 };
        let sealed = codec.seal(header.to_bytes().to_vec(), &ToyKey).unwrap();
        let enc = to_cipher_image(sealed).unwrap();
        let (w, h) = (enc.width(), enc.height());

        let dec = codec.decrypt(enc, &ToyKey).unwrap();
        assert_eq!((dec.width(), dec.height(), dec.channels()), (w, h, 3));
    }

    #[test]
    fn test_zero_or_wide_header_fields_fall_back() {
        let codec = codec(BlockFailurePolicy::Skip);
        let valid = FrameHeader { height: 4, width: 4, channels: 1 };
        for header in [
            FrameHeader { height: 0, ..valid },
            FrameHeader { width: 0, ..valid },
            FrameHeader { channels: 0, ..valid },
            FrameHeader { channels: 5, ..valid },
        ] {
            let mut stream = header.to_bytes().to_vec();
            stream.extend_from_slice(&[1u8; 16]);
            let enc = to_cipher_image(codec.seal(stream, &ToyKey).unwrap()).unwrap();
            let (w, h) = (enc.width(), enc.height());

            let dec = codec.decrypt(enc, &ToyKey).unwrap();
            assert_eq!((dec.width(), dec.height(), dec.channels()), (w, h, 3), "{header:?}");
        }
    }

    #[test]
    fn test_short_payload_is_noise_filled() {
        let codec = codec(BlockFailurePolicy::Skip);
        let mut stream = FrameHeader { height: 4, width: 4, channels: 1 }.to_bytes().to_vec();
        stream.extend_from_slice(&[9, 9, 9, 9]);
        let enc = to_cipher_image(codec.seal(stream, &ToyKey).unwrap()).unwrap();

        let dec = codec.decrypt(enc, &ToyKey).unwrap();
        assert_eq!((dec.width(), dec.height(), dec.channels()), (4, 4, 1));
        assert_eq!(&dec.pixels()[..4], &[9, 9, 9, 9]);
    }

    #[test]
    fn test_block_size_needs_room() {
        let tiny = ToyCodec::with_config(BlockCodecConfig { padding_overhead: MODULUS, ..Default::default() });
        assert!(matches!(tiny.block_size(MODULUS), Err(CipherError::InvalidKey(_))));
        assert!(matches!(tiny.seal(vec![1, 2, 3], &ToyKey), Err(CipherError::InvalidKey(_))));
    }
}
