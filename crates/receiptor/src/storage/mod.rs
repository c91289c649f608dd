//! Document storage: where accepted receipts are filed.

pub mod filesystem;
pub mod path;
pub mod render;

use thiserror::Error;

pub use filesystem::LocalFileStore;
pub use path::{upload_filename, upload_folder, UNMAPPED_CARD_FOLDER};
pub use render::{render_text_pdf, RenderError};

/// Errors from [`FileStore::upload`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    /// The store is not linked or its credentials were revoked.
    #[error("File store not connected: {0}")]
    NotConnected(String),

    /// The upload was attempted and failed.
    #[error("Upload failed: {0}")]
    Failed(String),
}

/// Remote document storage (a Drive folder tree, a local directory...).
pub trait FileStore: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Stores `content` as `folder/filename` and returns the remote file id.
    ///
    /// `folder` is a `/`-separated path whose segments are already
    /// sanitized. Uploading the same target twice must not create a second
    /// copy.
    fn upload(&self, content: &[u8], folder: &str, filename: &str) -> Result<String, UploadError>;
}
