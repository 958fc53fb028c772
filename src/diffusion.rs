/// XOR feedback diffusion
///
/// `c[k] = p[k] ^ seq[k] ^ prev`, where `prev` is the previous ciphertext byte
/// (0 for the first). Decryption walks the same order and takes `prev` from
/// the ciphertext it is consuming, so each step inverts independently.
///
/// The chain is strictly sequential; splitting it across threads would change
/// the cipher.

/// Diffuse `values` in buffer order (row-major, channel-minor) with feedback
pub fn diffuse(mut values: Vec<u8>, seq: &[u8]) -> Vec<u8> {
    debug_assert!(seq.len() >= values.len());
    let mut prev = 0u8;
    for (value, &s) in values.iter_mut().zip(seq) {
        *value ^= s ^ prev;
        prev = *value;
    }
    values
}

/// Undo [`diffuse`] given the identical sequence
pub fn undiffuse(mut values: Vec<u8>, seq: &[u8]) -> Vec<u8> {
    debug_assert!(seq.len() >= values.len());
    let mut prev = 0u8;
    for (value, &s) in values.iter_mut().zip(seq) {
        let cipher = *value;
        *value = cipher ^ s ^ prev;
        prev = cipher;
    }
    values
}
