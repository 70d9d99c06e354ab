//! Pluggable payload encryption

use sealsave_core::EncryptionAlgorithm;
use zeroize::Zeroizing;

use crate::aes_cbc_hmac::AesCbcHmacProvider;
use crate::aes_gcm::AesGcmProvider;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::SecretKey;

/// Authenticated encryption of a whole payload.
///
/// Implementations must authenticate before releasing any plaintext and
/// report authentication failures as [`CryptoError::Tamper`].
pub trait EncryptionProvider: Send + Sync {
    /// Selector recorded in the container flags.
    fn algorithm(&self) -> EncryptionAlgorithm;

    /// Encrypt `plaintext`. Each call produces a different blob.
    fn encrypt(
        &self,
        plaintext: &[u8],
        enc_key: &SecretKey,
        mac_key: &SecretKey,
    ) -> CryptoResult<Vec<u8>>;

    /// Verify and decrypt a blob produced by [`encrypt`](Self::encrypt).
    fn decrypt(
        &self,
        blob: &[u8],
        enc_key: &SecretKey,
        mac_key: &SecretKey,
    ) -> CryptoResult<Zeroizing<Vec<u8>>>;
}

/// Build the provider for `algorithm`.
///
/// The pass-through provider is only reachable when the crate is built with
/// `insecure-dev` and the caller opts in with `allow_insecure`.
pub fn provider_for(
    algorithm: EncryptionAlgorithm,
    allow_insecure: bool,
) -> CryptoResult<Box<dyn EncryptionProvider>> {
    match algorithm {
        EncryptionAlgorithm::AesCbcHmac => Ok(Box::new(AesCbcHmacProvider)),
        EncryptionAlgorithm::AesGcm => Ok(Box::new(AesGcmProvider)),
        EncryptionAlgorithm::None => insecure_provider(allow_insecure),
    }
}

#[cfg(feature = "insecure-dev")]
fn insecure_provider(allow_insecure: bool) -> CryptoResult<Box<dyn EncryptionProvider>> {
    if !allow_insecure {
        return Err(CryptoError::Unsupported(
            "algorithm 'none' requires allow_insecure".into(),
        ));
    }
    tracing::warn!("using pass-through encryption provider: saves are NOT protected");
    Ok(Box::new(crate::null::NullProvider))
}

#[cfg(not(feature = "insecure-dev"))]
fn insecure_provider(_allow_insecure: bool) -> CryptoResult<Box<dyn EncryptionProvider>> {
    Err(CryptoError::Unsupported(
        "algorithm 'none' is not compiled into this build (feature insecure-dev)".into(),
    ))
}
