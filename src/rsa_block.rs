/// RSA-OAEP (SHA-1) as the block primitive of [`BlockCodec`]
///
/// OAEP with a 20-byte digest costs 42 bytes per block, which is the default
/// padding overhead of the codec.

use crate::block::{BlockCodec, BlockDecrypt, BlockEncrypt};
use crate::error::Result;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use std::time::Instant;
use tracing::debug;

/// Block codec over RSA key pairs
pub type RsaBlockCodec = BlockCodec<RsaPublicKey, RsaPrivateKey>;

impl BlockEncrypt for RsaPublicKey {
    fn modulus_bytes(&self) -> usize {
        self.size()
    }

    fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        Ok(self.encrypt(&mut rng, Oaep::new::<Sha1>(), block)?)
    }
}

impl BlockDecrypt for RsaPrivateKey {
    fn modulus_bytes(&self) -> usize {
        self.size()
    }

    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        Ok(self.decrypt(Oaep::new::<Sha1>(), block)?)
    }
}

/// Generate a fresh key pair with a modulus of `bits` bits
pub fn generate_keypair(bits: u32) -> Result<(RsaPublicKey, RsaPrivateKey)> {
    let started = Instant::now();
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, bits as usize)?;
    let public = RsaPublicKey::from(&private);
    debug!(bits, elapsed_ms = started.elapsed().as_millis() as u64, "generated rsa key pair");
    Ok((public, private))
}
