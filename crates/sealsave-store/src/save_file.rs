//! Save file I/O
//!
//! Writes go to `<path>.tmp`, are flushed and synced, then renamed over the
//! target. The rename replaces any existing file in one step, so readers see
//! either the previous committed container or the new one, never a partial
//! write. On failure the temp file is removed and the target is untouched.

use std::path::{Path, PathBuf};

use sealsave_core::format::{build_flags, decode_header, Header, HEADER_SIZE};
use sealsave_crypto::{EncryptionProvider, SecretKey};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use zeroize::Zeroizing;

use crate::error::{SaveError, SaveResult};

/// zstd level for compressed payloads
const COMPRESSION_LEVEL: i32 = 3;

/// A container read from disk: validated header plus the opaque payload.
#[derive(Debug, Clone)]
pub struct Container {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Container {
    /// Verify and decrypt the payload, then undo compression if the header says so.
    pub fn decrypt(
        &self,
        provider: &dyn EncryptionProvider,
        enc_key: &SecretKey,
        mac_key: &SecretKey,
    ) -> SaveResult<Zeroizing<Vec<u8>>> {
        let algorithm = self.header.algorithm()?;
        if algorithm != provider.algorithm() {
            return Err(SaveError::Format(format!(
                "container was written with {algorithm}, provider is {}",
                provider.algorithm()
            )));
        }

        let plaintext = provider.decrypt(&self.payload, enc_key, mac_key)?;
        if self.header.compressed() {
            decompress(&plaintext)
        } else {
            Ok(plaintext)
        }
    }
}

/// Encrypt `plaintext` and atomically replace `path` with the new container.
pub async fn write(
    path: &Path,
    plaintext: &[u8],
    enc_key: &SecretKey,
    mac_key: &SecretKey,
    version: u16,
    provider: &dyn EncryptionProvider,
    compress: bool,
) -> SaveResult<()> {
    write_with_hook(
        path,
        plaintext,
        enc_key,
        mac_key,
        version,
        provider,
        compress,
        |_| Ok(()),
    )
    .await
}

/// [`write`] with a callback run after the temp file is durable and before
/// it is renamed into place.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn write_with_hook<F>(
    path: &Path,
    plaintext: &[u8],
    enc_key: &SecretKey,
    mac_key: &SecretKey,
    version: u16,
    provider: &dyn EncryptionProvider,
    compress: bool,
    before_commit: F,
) -> SaveResult<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    let blob = if compress {
        let packed = compress_payload(plaintext)?;
        provider.encrypt(&packed, enc_key, mac_key)?
    } else {
        provider.encrypt(plaintext, enc_key, mac_key)?
    };
    let header = Header::new(version, build_flags(compress, provider.algorithm()));

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = tmp_path(path);
    let result: std::io::Result<()> = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&header.encode()).await?;
        file.write_all(&blob).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        before_commit(&tmp)?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %tmp.display(), "failed to remove temp file: {cleanup}");
            }
        }
        return Err(e.into());
    }

    tracing::debug!(
        path = %path.display(),
        version,
        algorithm = %provider.algorithm(),
        bytes = HEADER_SIZE + blob.len(),
        "save file committed"
    );
    Ok(())
}

/// Read and decrypt `path` with `provider`, returning `(plaintext, version)`.
pub async fn read(
    path: &Path,
    enc_key: &SecretKey,
    mac_key: &SecretKey,
    provider: &dyn EncryptionProvider,
) -> SaveResult<(Zeroizing<Vec<u8>>, u16)> {
    let container = read_container(path).await?;
    let plaintext = container.decrypt(provider, enc_key, mac_key)?;
    Ok((plaintext, container.header.version))
}

/// Read `path` and validate its header without decrypting.
pub async fn read_container(path: &Path) -> SaveResult<Container> {
    let bytes = tokio::fs::read(path).await.map_err(|e| not_found_or(path, e))?;
    let header = decode_header(&bytes)?;
    header.algorithm()?;
    Ok(Container {
        header,
        payload: bytes[HEADER_SIZE..].to_vec(),
    })
}

/// Read only the header of `path`.
pub async fn read_header(path: &Path) -> SaveResult<Header> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| not_found_or(path, e))?;
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    file.take(HEADER_SIZE as u64).read_to_end(&mut buf).await?;
    let header = decode_header(&buf)?;
    header.algorithm()?;
    Ok(header)
}

/// `<path>.tmp`
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

fn not_found_or(path: &Path, e: std::io::Error) -> SaveError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SaveError::NotFound {
            slot: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
        }
    } else {
        e.into()
    }
}

fn compress_payload(plaintext: &[u8]) -> SaveResult<Zeroizing<Vec<u8>>> {
    zstd::encode_all(plaintext, COMPRESSION_LEVEL)
        .map(Zeroizing::new)
        .map_err(|e| SaveError::Format(format!("zstd compress: {e}")))
}

fn decompress(plaintext: &[u8]) -> SaveResult<Zeroizing<Vec<u8>>> {
    zstd::decode_all(plaintext)
        .map(Zeroizing::new)
        .map_err(|e| SaveError::Format(format!("zstd decompress: {e}")))
}
