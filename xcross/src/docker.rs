use crate::config::Invocation;
use crate::error::Error;
use crate::paths::shell_quote;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// Unprivileged account the toolchain images run builds as.
pub const CONTAINER_USER: &str = "crosstoolng";

/// Shell used inside the container, both for the outer `-c` and the script.
pub const CONTAINER_SHELL: &str = "/bin/bash";

/// `[server/][username/]repository:target[-version]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageReference<'a> {
    pub server: &'a str,
    pub username: &'a str,
    pub repository: &'a str,
    pub target: &'a str,
    pub version: &'a str,
}

impl<'a> ImageReference<'a> {
    pub fn from_invocation(invocation: &'a Invocation) -> Self {
        Self {
            server: &invocation.server,
            username: &invocation.username,
            repository: &invocation.repository,
            target: &invocation.target,
            version: &invocation.image_version,
        }
    }
}

impl fmt::Display for ImageReference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.server.is_empty() {
            write!(f, "{}/", self.server)?;
        }
        if !self.username.is_empty() {
            write!(f, "{}/", self.username)?;
        }
        write!(f, "{}:{}", self.repository, self.target)?;
        if !self.version.is_empty() {
            write!(f, "-{}", self.version)?;
        }
        Ok(())
    }
}

/// A fully assembled container engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerCommand {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
}

impl DockerCommand {
    /// Build `<engine> run ...` for `invocation`.
    ///
    /// With `script` set, the container runs that transport script (by file
    /// name, from the container-side working directory). Without it, the
    /// container starts an interactive shell.
    pub fn new(invocation: &Invocation, script: Option<&str>, tty: bool) -> Self {
        let mut args: Vec<String> = vec!["run".into(), "--rm".into()];
        if tty {
            args.push("-t".into());
        }
        if script.is_none() {
            args.push("-i".into());
        }

        // Values need no escaping: the engine receives them as plain argv.
        for var in &invocation.env {
            args.push("--env".into());
            args.push(var.clone());
        }

        args.push("--volume".into());
        args.push(invocation.shared_dir.volume());
        args.push(ImageReference::from_invocation(invocation).to_string());

        args.push(CONTAINER_SHELL.into());
        args.push("-c".into());
        args.push(container_command(invocation, script));

        Self {
            program: invocation.docker.clone(),
            args,
            workdir: invocation.shared_dir.current_dir(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Host directory the engine is started from.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The engine process, inheriting this process's standard streams.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.workdir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        command
    }

    /// Run the engine to completion and return the exit code to propagate.
    pub fn status(&self) -> Result<i32, Error> {
        debug!(command = %self.command_line(), "launching container engine");
        let status = self
            .to_command()
            .status()
            .map_err(|source| Error::Launch {
                engine: self.program.clone(),
                source,
            })?;
        let code = exit_code(status);
        debug!(code, "container engine exited");
        Ok(code)
    }

    /// Human-readable command line, for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains([' ', '"', '\'']) {
                line.push_str(&shell_quote(arg));
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// `cd` into the mapped working directory, then drop to the build user.
fn container_command(invocation: &Invocation, script: Option<&str>) -> String {
    let mut user_command = match script {
        Some(name) => format!("{} {}", CONTAINER_SHELL, shell_quote(name)),
        None => CONTAINER_SHELL.to_string(),
    };
    if let Some(cpu) = &invocation.cpu {
        user_command = format!("export CPU={}; {}", shell_quote(cpu), user_command);
    }
    format!(
        "cd {} && su {} -c \"{}\"",
        invocation.shared_dir.container_workdir(),
        CONTAINER_USER,
        user_command
    )
}

/// Exit code of the child, with signals reported the way shells do.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ImageCommand;
    use crate::paths::SharedDir;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        invocation: Invocation,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        let cwd = root.join("project");
        fs::create_dir_all(&cwd).unwrap();
        let invocation = Invocation {
            target: "alpha-unknown-linux-gnu".to_string(),
            server: String::new(),
            username: "ahuszagh".to_string(),
            repository: "cross".to_string(),
            image_version: String::new(),
            cpu: None,
            env: vec![],
            shared_dir: SharedDir::resolve(&root, &cwd).unwrap(),
            docker: "docker".to_string(),
            command: ImageCommand::Preformatted("make".to_string()),
        };
        Fixture {
            _temp: temp,
            invocation,
        }
    }

    fn image(server: &str, username: &str, version: &str) -> String {
        ImageReference {
            server,
            username,
            repository: "cross",
            target: "alpha-unknown-linux-gnu",
            version,
        }
        .to_string()
    }

    #[test]
    fn image_reference_segments() {
        assert_eq!(image("", "ahuszagh", ""), "ahuszagh/cross:alpha-unknown-linux-gnu");
        assert_eq!(image("", "", ""), "cross:alpha-unknown-linux-gnu");
        assert_eq!(
            image("docker.io", "ahuszagh", ""),
            "docker.io/ahuszagh/cross:alpha-unknown-linux-gnu"
        );
        assert_eq!(image("", "", "0.1"), "cross:alpha-unknown-linux-gnu-0.1");
    }

    #[test]
    fn builds_run_command_for_script() {
        let fixture = fixture();
        let docker = DockerCommand::new(&fixture.invocation, Some("__script"), false);
        let volume = fixture.invocation.shared_dir.volume();

        assert_eq!(docker.program(), "docker");
        assert_eq!(
            docker.args(),
            &[
                "run",
                "--rm",
                "--volume",
                volume.as_str(),
                "ahuszagh/cross:alpha-unknown-linux-gnu",
                "/bin/bash",
                "-c",
                "cd /src/'project' && su crosstoolng -c \"/bin/bash '__script'\"",
            ]
        );
    }

    #[test]
    fn forwards_environment_and_cpu() {
        let mut fixture = fixture();
        fixture.invocation.env = vec!["CC=/usr/bin/cc".to_string(), "AR".to_string()];
        fixture.invocation.cpu = Some("e500mc".to_string());
        let docker = DockerCommand::new(&fixture.invocation, Some("__script"), true);
        let args = docker.args();

        assert_eq!(&args[..3], &["run", "--rm", "-t"]);
        assert_eq!(&args[3..7], &["--env", "CC=/usr/bin/cc", "--env", "AR"]);
        assert_eq!(
            args.last().unwrap(),
            "cd /src/'project' && su crosstoolng -c \"export CPU='e500mc'; /bin/bash '__script'\""
        );
    }

    #[test]
    fn interactive_mode_keeps_stdin_open() {
        let fixture = fixture();
        let docker = DockerCommand::new(&fixture.invocation, None, true);
        let args = docker.args();

        assert!(args.contains(&"-i".to_string()));
        assert_eq!(
            args.last().unwrap(),
            "cd /src/'project' && su crosstoolng -c \"/bin/bash\""
        );
    }

    #[test]
    fn command_line_quotes_arguments_with_spaces() {
        let fixture = fixture();
        let docker = DockerCommand::new(&fixture.invocation, Some("s"), false);
        let line = docker.command_line();
        assert!(line.starts_with("docker run --rm --volume "));
        assert!(line.ends_with("'\\''s'\\''\"'"));
    }

    #[test]
    fn missing_engine_is_a_launch_error() {
        let mut fixture = fixture();
        fixture.invocation.docker = "xcross-test-no-such-engine".to_string();
        let docker = DockerCommand::new(&fixture.invocation, Some("s"), false);
        let err = docker.status().unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
        assert_eq!(err.exit_code(), 127);
    }

    #[cfg(unix)]
    #[test]
    fn exit_codes_pass_through() {
        let status = Command::new("/bin/sh").args(["-c", "exit 3"]).status().unwrap();
        assert_eq!(exit_code(status), 3);

        let status = Command::new("/bin/sh").args(["-c", "kill -9 $$"]).status().unwrap();
        assert_eq!(exit_code(status), 137);
    }
}
