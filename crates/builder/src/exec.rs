//! External command execution
//!
//! Every external collaborator (stitch tool, git-copy-branch, archive and
//! navigation generators, rsync, rm) is invoked through this module:
//! a program plus a structured argument list handed directly to process
//! creation, never through shell interpolation.

use docbuild_errors::BuildError;
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;

/// Captured result of an external operation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// One external command: program and argument vector
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `arg` only when `condition` holds
    #[must_use]
    pub fn arg_if(self, condition: bool, arg: impl Into<OsString>) -> Self {
        if condition {
            self.arg(arg)
        } else {
            self
        }
    }

    /// Path argument convenience
    #[must_use]
    pub fn path_arg(self, path: impl AsRef<Path>) -> Self {
        self.arg(path.as_ref().as_os_str())
    }

    /// Single-line rendering for logs and failure mails
    #[must_use]
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }

    /// Run the command to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is NOT an error here; callers inspect
    /// `CommandOutput::success`. Only spawn failures error out.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::SpawnFailed` when the process cannot be started.
    pub async fn run(&self) -> Result<CommandOutput, BuildError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| BuildError::SpawnFailed {
                command: self.display(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run the command and treat a non-zero exit as an error.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::SpawnFailed` when the process cannot be
    /// started, or `BuildError::ExternalOperationFailed` on non-zero exit.
    pub async fn run_checked(&self) -> Result<CommandOutput, BuildError> {
        let output = self.run().await?;
        if output.success {
            Ok(output)
        } else {
            Err(BuildError::ExternalOperationFailed {
                command: self.display(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let cmd = ExternalCommand::new("rsync")
            .arg("-lr")
            .arg("/tmp/a/")
            .arg("/tmp/b");
        assert_eq!(cmd.display(), "rsync -lr /tmp/a/ /tmp/b");
    }

    #[test]
    fn arg_if_skips_when_false() {
        let cmd = ExternalCommand::new("tool").arg_if(false, "--internal-mode");
        assert_eq!(cmd.display(), "tool");
        let cmd = ExternalCommand::new("tool").arg_if(true, "--internal-mode");
        assert_eq!(cmd.display(), "tool --internal-mode");
    }

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let out = ExternalCommand::new("sh")
            .arg("-c")
            .arg("echo captured; exit 3")
            .run()
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "captured");
    }

    #[tokio::test]
    async fn run_checked_errors_on_nonzero() {
        let err = ExternalCommand::new("false").run_checked().await.unwrap_err();
        assert!(matches!(
            err,
            BuildError::ExternalOperationFailed { .. }
        ));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let err = ExternalCommand::new("/nonexistent/docbuild-tool")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::SpawnFailed { .. }));
    }
}
