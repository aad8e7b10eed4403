// Token cache: one plaintext file per application in the cache directory.
// An unreadable-because-missing file is a cache miss, not an error.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AuthError;

#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// `<dir>/.<lowercased app name>.conf`. Path separators and `..` in the
    /// name are replaced so the file always lands directly inside `dir`.
    pub fn for_app(dir: &Path, app_name: &str) -> Self {
        let file_name = format!(".{}.conf", file_stem(app_name));
        TokenCache {
            path: dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token. Returns `None` when the file is absent or holds
    /// only whitespace.
    pub fn load(&self) -> Result<Option<String>, AuthError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cached token");
                return Ok(None);
            }
            Err(e) => return Err(self.error(e)),
        };
        let token = data.trim();
        if token.is_empty() {
            debug!(path = %self.path.display(), "cached token file is empty");
            return Ok(None);
        }
        Ok(Some(token.to_string()))
    }

    /// Persist the token, replacing any previous contents.
    pub fn store(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.error(e))?;
            }
        }
        let mut file = open_private(&self.path).map_err(|e| self.error(e))?;
        file.write_all(token.as_bytes()).map_err(|e| self.error(e))?;
        debug!(path = %self.path.display(), "token cached");
        Ok(())
    }

    fn error(&self, source: io::Error) -> AuthError {
        AuthError::Cache {
            path: self.path.clone(),
            source,
        }
    }
}

fn file_stem(app_name: &str) -> String {
    let stem: String = app_name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    stem.replace("..", "_")
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
