//! # pixcrypt
//!
//! Image encryption over raw pixel buffers: position scrambling, chaotic
//! permutation-diffusion, key-mixed chaotic masking and an RSA block codec.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pixcrypt::{Image, ImageCipher, LogisticCipher, LogisticKey};
//!
//! # fn main() -> anyhow::Result<()> {
//! let img = image::open("photo.png")?;
//! let plain = Image::try_from(&img)?;
//!
//! let key = LogisticKey::from_passphrase("correct horse battery staple");
//! let cipher = LogisticCipher::new();
//!
//! let encrypted = cipher.encrypt(plain.clone(), &key)?;
//! let decrypted = cipher.decrypt(encrypted, &key)?;
//! assert_eq!(decrypted, plain);
//! # Ok(())
//! # }
//! ```
//!
//! ## Ciphers
//!
//! - [`ArnoldCat`]: Arnold cat map, moves pixels without changing them
//! - [`LogisticCipher`]: logistic-map shuffle followed by XOR feedback diffusion
//! - [`KeyMixingCipher`]: two coupled chaotic maps and a rolling 13-byte key
//! - [`RsaBlockCodec`]: RSA-OAEP over a framed pixel stream
//!
//! All of them take and return an [`Image`] holding 1 or 3 channels of
//! 8-bit samples. Codecs for image files stay outside; see
//! [`Image::into_dynamic`] and the `TryFrom<&DynamicImage>` impl.

pub mod arnold;
pub mod block;
pub mod buffer;
pub mod chaos;
pub mod config;
pub mod diffusion;
pub mod error;
pub mod keymix;
pub mod keymixing;
pub mod logistic;
pub mod permute;
pub mod rsa_block;

// Re-export main types for convenience
pub use arnold::{ArnoldCat, ArnoldKey};
pub use block::{BlockCodec, BlockDecrypt, BlockEncrypt};
pub use buffer::{Image, PixelFormat};
pub use chaos::LogisticKey;
pub use config::{BlockCodecConfig, BlockFailurePolicy, ChaosConfig};
pub use error::{CipherError, Result};
pub use keymix::KeyVector;
pub use keymixing::KeyMixingCipher;
pub use logistic::LogisticCipher;
pub use rsa_block::{generate_keypair, RsaBlockCodec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A reversible transformation of an [`Image`]
///
/// Symmetric ciphers use the same key type for both directions; the block
/// codec takes a public key to encrypt and a private key to decrypt.
/// Images are consumed so implementations can reuse their buffers.
pub trait ImageCipher {
    type EncryptKey;
    type DecryptKey;

    fn encrypt(&self, image: Image, key: &Self::EncryptKey) -> Result<Image>;
    fn decrypt(&self, image: Image, key: &Self::DecryptKey) -> Result<Image>;
}
