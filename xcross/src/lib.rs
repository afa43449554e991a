//! Run a build command inside the cross-compilation image for a target
//! triple, as if it ran on the host.
//!
//! The pipeline is linear: resolve and validate the [`Invocation`], format the
//! command for the container shell, hand it over through a
//! [`TransportScript`] in the shared directory, then run the container engine
//! and return its exit code. The script is removed on every path once it has
//! been written.

pub mod command;
pub mod config;
pub mod docker;
pub mod error;
pub mod identifier;
pub mod paths;
pub mod script;

pub use command::ImageCommand;
pub use config::{resolve, EnvSnapshot, Invocation, Options};
pub use docker::{DockerCommand, ImageReference};
pub use error::{Error, EXIT_LAUNCH_FAILED, EXIT_REJECTED};
pub use paths::{PathNormalizer, SharedDir};
pub use script::TransportScript;

use std::io::{self, IsTerminal};
use tracing::debug;

/// Execute `invocation` and return the exit code this process should exit with.
pub fn run(invocation: &Invocation) -> Result<i32, Error> {
    let current_dir = invocation.shared_dir.current_dir();
    let normalizer = PathNormalizer::native(invocation.shared_dir.host(), &current_dir);
    let line = invocation.command.format(&normalizer)?;

    let script = if invocation.command.is_interactive() {
        None
    } else {
        Some(TransportScript::write(&current_dir, &line)?)
    };

    let tty = io::stdin().is_terminal() && io::stdout().is_terminal();
    let docker = DockerCommand::new(invocation, script.as_ref().map(TransportScript::name), tty);
    debug!(
        image = %ImageReference::from_invocation(invocation),
        engine = docker.program(),
        "running in container"
    );

    // `script` outlives the child and is dropped on both return paths.
    docker.status()
}
