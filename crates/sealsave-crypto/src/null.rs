//! Pass-through provider for local debugging of save contents.

use sealsave_core::EncryptionAlgorithm;
use zeroize::Zeroizing;

use crate::error::CryptoResult;
use crate::keys::SecretKey;
use crate::provider::EncryptionProvider;

#[derive(Debug, Clone, Copy, Default)]
pub struct NullProvider;

impl EncryptionProvider for NullProvider {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::None
    }

    fn encrypt(&self, plaintext: &[u8], _: &SecretKey, _: &SecretKey) -> CryptoResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(
        &self,
        blob: &[u8],
        _: &SecretKey,
        _: &SecretKey,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(blob.to_vec()))
    }
}
