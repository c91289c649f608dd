use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{FileStore, UploadError};

/// [`FileStore`] writing under a local directory.
///
/// The remote id is the `/`-joined path relative to the root.
pub struct LocalFileStore {
    root: PathBuf,
    connected: AtomicBool,
}

impl LocalFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            connected: AtomicBool::new(true),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Simulates linking or unlinking the store.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Resolves a remote id back to a local path.
    pub fn path_of(&self, remote_id: &str) -> PathBuf {
        remote_id
            .split('/')
            .fold(self.root.clone(), |acc, seg| acc.join(seg))
    }

    fn target_dir(&self, folder: &str) -> Result<PathBuf, UploadError> {
        let mut dir = self.root.clone();
        for segment in folder.split('/').filter(|s| !s.is_empty()) {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) => dir.push(segment),
                _ => {
                    return Err(UploadError::Failed(format!(
                        "invalid folder segment '{}'",
                        segment
                    )))
                }
            }
        }
        Ok(dir)
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), UploadError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| {
                UploadError::Failed(format!("create directory {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

impl FileStore for LocalFileStore {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn upload(&self, content: &[u8], folder: &str, filename: &str) -> Result<String, UploadError> {
        if !self.is_connected() {
            return Err(UploadError::NotConnected(format!(
                "{} is not linked",
                self.root.display()
            )));
        }
        if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
            return Err(UploadError::Failed(format!("invalid filename '{}'", filename)));
        }

        let dir = self.target_dir(folder)?;
        self.ensure_directory(&dir)?;
        let path = dir.join(filename);
        let remote_id = folder
            .split('/')
            .filter(|s| !s.is_empty())
            .chain(std::iter::once(filename))
            .collect::<Vec<_>>()
            .join("/");

        // O_CREAT | O_EXCL so concurrent uploads of one receipt collapse to one file.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(content).map_err(|e| {
                    UploadError::Failed(format!("write {}: {}", path.display(), e))
                })?;
                log::debug!("Stored {} ({} bytes)", remote_id, content.len());
                Ok(remote_id)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let existing = std::fs::read(&path).map_err(|e| {
                    UploadError::Failed(format!("read {}: {}", path.display(), e))
                })?;
                if existing != content {
                    // Same receipt, new rendering: replace through a temp file.
                    let tmp = dir.join(format!(".{}.tmp", filename));
                    std::fs::write(&tmp, content).map_err(|e| {
                        UploadError::Failed(format!("write {}: {}", tmp.display(), e))
                    })?;
                    std::fs::rename(&tmp, &path).map_err(|e| {
                        UploadError::Failed(format!("replace {}: {}", path.display(), e))
                    })?;
                    log::debug!("Replaced {}", remote_id);
                }
                Ok(remote_id)
            }
            Err(e) => Err(UploadError::Failed(format!(
                "create {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
