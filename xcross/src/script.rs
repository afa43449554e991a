use crate::error::Error;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// File name prefix for transport scripts. The suffix is a random v4 UUID.
pub const SCRIPT_PREFIX: &str = "__ahuszagh_xcross_uuid_";

/// The formatted command, written where the container's shell can read it.
///
/// The file is removed when the value is dropped.
#[derive(Debug)]
pub struct TransportScript {
    path: PathBuf,
    name: String,
}

impl TransportScript {
    /// Create a uniquely named script in `dir` containing exactly `contents`.
    pub fn write(dir: &Path, contents: &str) -> Result<Self, Error> {
        let name = format!("{}{}", SCRIPT_PREFIX, Uuid::new_v4().simple());
        Self::write_named(dir, name, contents)
    }

    fn write_named(dir: &Path, name: String, contents: &str) -> Result<Self, Error> {
        let path = dir.join(&name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => Error::ScriptExists { path: path.clone() },
                _ => Error::Io {
                    message: format!("Failed to create script {}: {}", path.display(), err),
                },
            })?;

        // From here on the file is ours to delete, whatever happens next.
        let script = Self { path, name };

        file.write_all(contents.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|err| Error::Io {
                message: format!("Failed to write script {}: {}", script.path.display(), err),
            })?;

        // The container reads the script as a different, unprivileged user.
        #[cfg(unix)]
        fs::set_permissions(&script.path, fs::Permissions::from_mode(0o644)).map_err(|err| {
            Error::Io {
                message: format!(
                    "Failed to set permissions on script {}: {}",
                    script.path.display(),
                    err
                ),
            }
        })?;

        debug!(path = %script.path.display(), "wrote transport script");
        Ok(script)
    }

    /// File name, relative to the directory the script was written to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransportScript {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed transport script"),
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove transport script"
            ),
        }
    }
}
