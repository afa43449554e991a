//! Command-line options and their resolution into a validated [`Invocation`].
//!
//! Every option may fall back to a `CROSS_*` environment variable and then to
//! a built-in default. Resolution reads the environment from an
//! [`EnvSnapshot`] so it can be exercised without touching the process
//! environment.

use crate::command::ImageCommand;
use crate::error::Error;
use crate::identifier;
use crate::paths::SharedDir;
use clap::Parser;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_USERNAME: &str = "ahuszagh";
pub const DEFAULT_REPOSITORY: &str = "cross";
pub const DEFAULT_DOCKER: &str = "docker";

pub const ENV_TARGET: &str = "CROSS_TARGET";
pub const ENV_DIR: &str = "CROSS_DIR";
pub const ENV_CPU: &str = "CROSS_CPU";
pub const ENV_SERVER: &str = "CROSS_SERVER";
pub const ENV_USERNAME: &str = "CROSS_USERNAME";
pub const ENV_REPOSITORY: &str = "CROSS_REPOSITORY";
pub const ENV_VERSION: &str = "CROSS_VERSION";
pub const ENV_DOCKER: &str = "CROSS_DOCKER";

/// Cross-compile C/C++ with a single command.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "xcross", version)]
pub struct Options {
    /// Build command to run in the image. A single quoted argument is run as
    /// shell syntax; a list of arguments may not contain shell control
    /// characters.
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Target triple of the cross-compiled architecture [env: CROSS_TARGET]
    #[arg(long)]
    pub target: Option<String>,

    /// Directory shared with the image; must contain the current directory
    /// [env: CROSS_DIR] [default: /]
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Pass an environment variable through to the image. Repeatable and
    /// comma-separated; a bare NAME uses the value from this shell.
    #[arg(short = 'E', long = "env", value_name = "VAR[=VALUE]")]
    pub env: Vec<String>,

    /// CPU model for the compiler and emulator [env: CROSS_CPU]
    #[arg(long)]
    pub cpu: Option<String>,

    /// Registry server hosting the image; empty for none [env: CROSS_SERVER]
    #[arg(long)]
    pub server: Option<String>,

    /// Registry username; empty for none [env: CROSS_USERNAME] [default: ahuszagh]
    #[arg(long)]
    pub username: Option<String>,

    /// Image repository [env: CROSS_REPOSITORY] [default: cross]
    #[arg(long)]
    pub repository: Option<String>,

    /// Image version appended to the tag [env: CROSS_VERSION]
    #[arg(long = "image-version")]
    pub image_version: Option<String>,

    /// Path or name of the container engine [env: CROSS_DOCKER] [default: docker]
    #[arg(long, visible_alias = "engine")]
    pub docker: Option<String>,
}

/// A copy of the environment variables relevant to option resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        let vars = env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Everything needed for one run, fully defaulted and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub target: String,
    pub server: String,
    pub username: String,
    pub repository: String,
    pub image_version: String,
    pub cpu: Option<String>,
    pub env: Vec<String>,
    pub shared_dir: SharedDir,
    pub docker: String,
    pub command: ImageCommand,
}

/// Apply environment fallbacks and defaults to `options`, then validate.
///
/// Options that may legitimately be empty (`server`, `username`,
/// `image_version`) only fall back when absent; the rest also fall back
/// when given as an empty string.
pub fn resolve(
    options: Options,
    env: &EnvSnapshot,
    current_dir: &Path,
) -> Result<Invocation, Error> {
    let target = non_empty(options.target)
        .or_else(|| env_value(env, ENV_TARGET))
        .ok_or(Error::MissingTarget)?;
    let server = options
        .server
        .or_else(|| env_value(env, ENV_SERVER))
        .unwrap_or_default();
    let username = options
        .username
        .or_else(|| env_value(env, ENV_USERNAME))
        .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
    let repository = non_empty(options.repository)
        .or_else(|| non_empty(env_value(env, ENV_REPOSITORY)))
        .unwrap_or_else(|| DEFAULT_REPOSITORY.to_string());
    let image_version = options
        .image_version
        .or_else(|| env_value(env, ENV_VERSION))
        .unwrap_or_default();
    let cpu = non_empty(options.cpu).or_else(|| non_empty(env_value(env, ENV_CPU)));
    let docker = non_empty(options.docker)
        .or_else(|| non_empty(env_value(env, ENV_DOCKER)))
        .unwrap_or_else(|| DEFAULT_DOCKER.to_string());

    identifier::validate_target(&target)?;
    identifier::validate_server(&server)?;
    identifier::validate_username(&username)?;
    identifier::validate_repository(&repository)?;
    identifier::validate_image_version(&image_version)?;
    if let Some(cpu) = &cpu {
        identifier::validate_cpu(cpu)?;
    }

    let dir = options
        .dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .or_else(|| non_empty(env_value(env, ENV_DIR)).map(PathBuf::from))
        .unwrap_or_else(|| filesystem_root(current_dir));
    let shared_dir = SharedDir::resolve(&dir, current_dir)?;

    let env = split_env(&options.env);
    let command = ImageCommand::from_args(options.command);

    let invocation = Invocation {
        target,
        server,
        username,
        repository,
        image_version,
        cpu,
        env,
        shared_dir,
        docker,
        command,
    };
    debug!(?invocation, "resolved invocation");
    Ok(invocation)
}

/// Flatten repeated, comma-separated `-E` values into one entry per variable.
pub fn split_env(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_value(env: &EnvSnapshot, key: &str) -> Option<String> {
    env.get(key).map(str::to_string)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn filesystem_root(current_dir: &Path) -> PathBuf {
    current_dir
        .ancestors()
        .last()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"))
}
