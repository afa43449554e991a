//! Host/container path mapping.
//!
//! The shared directory is bind-mounted at [`CONTAINER_ROOT`]. The current
//! working directory must live below it so the container can `cd` to the
//! same place. On hosts whose separator is not `/`, command tokens that name
//! existing paths inside the shared directory are rewritten to POSIX form.
//!
//! The rewrite is a heuristic: a literal word that happens to match an
//! existing file containing the separator is rewritten as well.

use crate::error::Error;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};
use tracing::debug;

/// Mount point of the shared directory inside the container.
pub const CONTAINER_ROOT: &str = "/src";

/// A validated bind mount between the host and the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedDir {
    host: PathBuf,
    relative_cwd: PathBuf,
}

impl SharedDir {
    /// Resolve `dir` (absolute or relative to `current_dir`) and make sure
    /// `current_dir` is inside it.
    pub fn resolve(dir: &Path, current_dir: &Path) -> Result<Self, Error> {
        let host = dunce::canonicalize(current_dir.join(dir)).map_err(|_| Error::InvalidSharedDir {
            path: dir.to_path_buf(),
        })?;
        if !host.is_dir() {
            return Err(Error::InvalidSharedDir {
                path: dir.to_path_buf(),
            });
        }

        let current_dir = dunce::canonicalize(current_dir).map_err(|err| Error::Io {
            message: format!(
                "Failed to resolve current directory {}: {}",
                current_dir.display(),
                err
            ),
        })?;
        let relative_cwd = current_dir
            .strip_prefix(&host)
            .map(Path::to_path_buf)
            .map_err(|_| Error::OutsideSharedDir {
                shared_dir: host.clone(),
                current_dir: current_dir.clone(),
            })?;

        Ok(Self { host, relative_cwd })
    }

    /// Canonical host side of the mount, without a `\\?\` verbatim prefix.
    pub fn host(&self) -> &Path {
        &self.host
    }

    pub fn container(&self) -> &'static str {
        CONTAINER_ROOT
    }

    /// Host working directory, canonicalized.
    pub fn current_dir(&self) -> PathBuf {
        self.host.join(&self.relative_cwd)
    }

    /// Argument for the engine's `--volume` flag.
    pub fn volume(&self) -> String {
        format!("{}:{}", self.host.display(), CONTAINER_ROOT)
    }

    /// Container-side working directory, quoted for the container shell.
    pub fn container_workdir(&self) -> String {
        format!("{}/{}", CONTAINER_ROOT, shell_quote(&to_posix(&self.relative_cwd)))
    }
}

/// Rewrites host-style path tokens into container-relative POSIX paths.
#[derive(Debug, Clone)]
pub struct PathNormalizer<'a> {
    shared_dir: &'a Path,
    current_dir: &'a Path,
    separator: char,
}

impl<'a> PathNormalizer<'a> {
    /// Normalizer for this host's separator. Inert on POSIX hosts.
    pub fn native(shared_dir: &'a Path, current_dir: &'a Path) -> Self {
        Self::with_separator(shared_dir, current_dir, MAIN_SEPARATOR)
    }

    /// Normalizer for tokens written with `separator`, which is translated to
    /// the host separator before the token is looked up on disk.
    pub fn with_separator(shared_dir: &'a Path, current_dir: &'a Path, separator: char) -> Self {
        Self {
            shared_dir,
            current_dir,
            separator,
        }
    }

    pub fn is_active(&self) -> bool {
        self.separator != '/'
    }

    /// Return `token` rewritten as a quoted POSIX path, or unchanged.
    pub fn normalize(&self, token: &str) -> String {
        self.rewrite(token).unwrap_or_else(|| token.to_string())
    }

    fn rewrite(&self, token: &str) -> Option<String> {
        if !self.is_active() || !token.contains(self.separator) {
            return None;
        }

        let native = if self.separator == MAIN_SEPARATOR {
            token.to_string()
        } else {
            token.replace(self.separator, MAIN_SEPARATOR_STR)
        };
        let resolved = dunce::canonicalize(self.current_dir.join(native)).ok()?;
        if !resolved.starts_with(self.shared_dir) {
            debug!(token, "path lies outside the shared directory, leaving as-is");
            return None;
        }

        let relative = relative_path(&resolved, self.current_dir);
        let rewritten = shell_quote(&to_posix(&relative));
        debug!(token, rewritten = %rewritten, "normalized path argument");
        Some(rewritten)
    }
}

/// Wrap `value` in single quotes, escaping embedded quotes as `'\''`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Lexical path from `base` to `path`. Both must be absolute and canonical.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push(Component::ParentDir);
    }
    for part in &path_parts[common..] {
        relative.push(part);
    }
    if relative.as_os_str().is_empty() {
        relative.push(Component::CurDir);
    }
    relative
}

/// Join the components of a relative path with `/`.
pub fn to_posix(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir => Some(".".to_string()),
            Component::RootDir | Component::Prefix(_) => None,
        })
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Layout {
        _temp: TempDir,
        shared: PathBuf,
        cwd: PathBuf,
        outside: PathBuf,
    }

    fn layout() -> Layout {
        let temp = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp.path()).unwrap();
        let shared = root.join("shared");
        let cwd = shared.join("project").join("build");
        let outside = root.join("outside");
        fs::create_dir_all(&cwd).unwrap();
        fs::create_dir_all(shared.join("project").join("env").join("shared")).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(shared.join("project").join("main.cc"), b"int main() {}\n").unwrap();
        Layout {
            _temp: temp,
            shared,
            cwd,
            outside,
        }
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("${a}bc"), "'${a}bc'");
    }

    #[test]
    fn relative_path_walks_up_and_down() {
        let base = Path::new("/a/b/c");
        assert_eq!(relative_path(Path::new("/a/b/c"), base), PathBuf::from("."));
        assert_eq!(relative_path(Path::new("/a"), base), PathBuf::from("../.."));
        assert_eq!(
            relative_path(Path::new("/a/x/y"), base),
            PathBuf::from("../../x/y")
        );
        assert_eq!(relative_path(Path::new("/a/b/c/d"), base), PathBuf::from("d"));
    }

    #[test]
    fn native_normalizer_is_inert_on_posix_hosts() {
        let layout = layout();
        let normalizer = PathNormalizer::native(&layout.shared, &layout.cwd);
        if MAIN_SEPARATOR == '/' {
            assert!(!normalizer.is_active());
            assert_eq!(normalizer.normalize("../main.cc"), "../main.cc");
            assert_eq!(normalizer.normalize("..\\main.cc"), "..\\main.cc");
        }
    }

    #[test]
    fn foreign_separator_rewrites_paths_inside_shared_dir() {
        let layout = layout();
        let normalizer = PathNormalizer::with_separator(&layout.shared, &layout.cwd, '\\');

        assert_eq!(normalizer.normalize("cmake"), "cmake");
        assert_eq!(normalizer.normalize("..\\.."), "'../..'");
        assert_eq!(normalizer.normalize("..\\main.cc"), "'../main.cc'");
        assert_eq!(normalizer.normalize("..\\env\\shared"), "'../env/shared'");
        assert_eq!(normalizer.normalize(".\\"), "'.'");
    }

    #[test]
    fn foreign_separator_leaves_missing_and_outside_paths() {
        let layout = layout();
        let normalizer = PathNormalizer::with_separator(&layout.shared, &layout.cwd, '\\');

        assert_eq!(normalizer.normalize("..\\missing.cc"), "..\\missing.cc");
        assert_eq!(normalizer.normalize("..\\..\\..\\outside"), "..\\..\\..\\outside");
        assert!(layout.outside.is_dir());
    }

    #[test]
    fn shared_dir_computes_container_workdir() {
        let layout = layout();
        let shared = SharedDir::resolve(&layout.shared, &layout.cwd).unwrap();
        assert_eq!(shared.host(), layout.shared.as_path());
        assert_eq!(shared.container_workdir(), "/src/'project/build'");
        assert_eq!(
            shared.volume(),
            format!("{}:/src", layout.shared.display())
        );
        assert_eq!(shared.current_dir(), layout.cwd);
    }

    #[test]
    fn shared_dir_accepts_relative_dir_and_itself() {
        let layout = layout();
        let shared = SharedDir::resolve(Path::new("../.."), &layout.cwd).unwrap();
        assert_eq!(shared.host(), layout.shared.as_path());

        let same = SharedDir::resolve(&layout.cwd, &layout.cwd).unwrap();
        assert_eq!(same.container_workdir(), "/src/'.'");
    }

    #[test]
    fn shared_dir_rejects_non_parent_and_missing_dirs() {
        let layout = layout();
        let err = SharedDir::resolve(&layout.outside, &layout.cwd).unwrap_err();
        assert!(matches!(err, Error::OutsideSharedDir { .. }));

        let err = SharedDir::resolve(&layout.shared.join("nope"), &layout.cwd).unwrap_err();
        assert!(matches!(err, Error::InvalidSharedDir { .. }));

        let err =
            SharedDir::resolve(&layout.shared.join("project").join("main.cc"), &layout.cwd)
                .unwrap_err();
        assert!(matches!(err, Error::InvalidSharedDir { .. }));
    }

    #[cfg(windows)]
    #[test]
    fn volume_uses_plain_drive_paths() {
        let layout = layout();
        let shared = SharedDir::resolve(&layout.shared, &layout.cwd).unwrap();
        let volume = shared.volume();
        assert!(!volume.starts_with(r"\\?\"), "{}", volume);
        assert!(volume.ends_with(":/src"));
        assert_eq!(shared.container_workdir(), "/src/'project/build'");
    }
}
