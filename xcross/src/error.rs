use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for every tool-level rejection: bad identifiers, unsafe commands,
/// unusable shared directories and transport failures.
pub const EXIT_REJECTED: i32 = 126;

/// Exit code when the container engine itself cannot be started.
pub const EXIT_LAUNCH_FAILED: i32 = 127;

/// The user-supplied value that failed its allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Target,
    Server,
    Username,
    Repository,
    ImageVersion,
    Cpu,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IdentifierKind::Target => "target",
            IdentifierKind::Server => "registry server",
            IdentifierKind::Username => "Docker Hub username",
            IdentifierKind::Repository => "Docker Hub repository",
            IdentifierKind::ImageVersion => "image version",
            IdentifierKind::Cpu => "CPU model",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Must provide a valid target")]
    MissingTarget,

    #[error("Must provide a valid {kind} (got '{value}')")]
    InvalidIdentifier { kind: IdentifierKind, value: String },

    #[error("`dir` is not a directory: {path}")]
    InvalidSharedDir { path: PathBuf },

    #[error("`dir` must be a parent of the current working directory")]
    OutsideSharedDir {
        shared_dir: PathBuf,
        current_dir: PathBuf,
    },

    #[error("Invalid control characters present in '{token}': use a quoted string instead")]
    ControlCharacters { token: String },

    #[error(
        "file {name} already exists. if you believe this is an error, delete {name}",
        name = .path.display()
    )]
    ScriptExists { path: PathBuf },

    #[error("{message}")]
    Io { message: String },

    #[error("Failed to launch container engine '{engine}': {source}")]
    Launch {
        engine: String,
        source: std::io::Error,
    },
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Launch { .. } => EXIT_LAUNCH_FAILED,
            _ => EXIT_REJECTED,
        }
    }
}
