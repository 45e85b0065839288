use std::{
    fmt::Debug,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

use crate::errors::error::{err_msg, RevocationErrorKind, RevocationResult};

/// Transfer of the tails file between the issuer and a publicly reachable
/// tails server. The file itself is immutable once generated; only its
/// location changes, so both operations are keyed by content, never rewritten
/// in place.
#[async_trait]
pub trait TailsClient: Debug + Send + Sync {
    /// Uploads the locally generated tails file and returns the public URI
    /// holders can fetch it from.
    async fn upload(&self, local_path: &Path) -> RevocationResult<String>;

    /// Fetches the tails file into `dest_dir`, returning the local path.
    async fn download(&self, uri: &str, dest_dir: &Path) -> RevocationResult<PathBuf>;
}

/// Tails "server" backed by a local directory, addressing files by name with
/// `file://` URIs. Useful for tests and single-host deployments.
#[derive(Debug)]
pub struct LocalDirTailsClient {
    base_dir: PathBuf,
}

impl LocalDirTailsClient {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl TailsClient for LocalDirTailsClient {
    async fn upload(&self, local_path: &Path) -> RevocationResult<String> {
        let file_name = local_path.file_name().ok_or_else(|| {
            err_msg(
                RevocationErrorKind::InvalidInput,
                format!("Tails path has no file name: {:?}", local_path),
            )
        })?;
        std::fs::create_dir_all(&self.base_dir)?;
        let target = self.base_dir.join(file_name);
        std::fs::copy(local_path, &target)?;
        // The localhost authority keeps the uri acceptable to the
        // scheme-host-path validation applied before publication.
        let uri = format!("file://localhost{}", target.display());
        debug!("upload >>> tails file {:?} published at {}", local_path, uri);
        Ok(uri)
    }

    async fn download(&self, uri: &str, dest_dir: &Path) -> RevocationResult<PathBuf> {
        let source = uri
            .strip_prefix("file://localhost")
            .or_else(|| uri.strip_prefix("file://"))
            .ok_or_else(|| {
                err_msg(
                    RevocationErrorKind::InvalidUrl,
                    format!("Unsupported tails uri scheme: {}", uri),
                )
            })?;
        let source = Path::new(source);
        let file_name = source.file_name().ok_or_else(|| {
            err_msg(
                RevocationErrorKind::InvalidUrl,
                format!("Tails uri has no file name: {}", uri),
            )
        })?;
        std::fs::create_dir_all(dest_dir)?;
        let target = dest_dir.join(file_name);
        std::fs::copy(source, &target)?;
        Ok(target)
    }
}
