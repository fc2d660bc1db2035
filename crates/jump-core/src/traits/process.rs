//! Local process launching

use async_trait::async_trait;
use std::fmt;

/// How a launched process is wired to the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// Share the caller's stdin/stdout/stderr
    Inherit,
    /// Null stdin, captured stdout and stderr
    Capture,
}

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdio: StdioMode,
}

impl LaunchSpec {
    /// An invocation sharing the caller's terminal
    pub fn inherit(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdio: StdioMode::Inherit,
        }
    }

    /// An invocation whose output is captured
    pub fn capture(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdio: StdioMode::Capture,
        }
    }

    /// Whether `flag` is immediately followed by `value` in the arguments
    pub fn has_arg_pair(&self, flag: &str, value: &str) -> bool {
        self.args
            .windows(2)
            .any(|pair| pair[0] == flag && pair[1] == value)
    }

    /// Value following the first occurrence of `flag`
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured stdout (empty for inherited stdio)
    pub stdout: String,
    /// Captured stderr (empty for inherited stdio)
    pub stderr: String,
}

impl LaunchOutput {
    /// A successful exit with no output
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    /// A failed exit with a stderr message
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable exit status
    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit status: {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs local programs to completion
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Run `spec` and wait for it to exit
    ///
    /// Only a failure to start the program is an `Err`; a non-zero exit is
    /// reported through [`LaunchOutput`].
    async fn run(&self, spec: &LaunchSpec) -> std::io::Result<LaunchOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_spaced_args() {
        let spec = LaunchSpec::inherit(
            "ssh",
            vec!["-t".to_string(), "read -r -d '' _".to_string()],
        );
        assert_eq!(spec.to_string(), "ssh -t \"read -r -d '' _\"");
    }

    #[test]
    fn test_arg_helpers() {
        let spec = LaunchSpec::capture(
            "ssh",
            ["-S", "/tmp/1-control-socket", "-O", "exit"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert!(spec.has_arg_pair("-O", "exit"));
        assert!(!spec.has_arg_pair("-O", "check"));
        assert_eq!(spec.arg_after("-S"), Some("/tmp/1-control-socket"));
        assert_eq!(spec.arg_after("-L"), None);
    }

    #[test]
    fn test_output_status() {
        assert!(LaunchOutput::ok().success());
        let failed = LaunchOutput::failed(255, "boom");
        assert!(!failed.success());
        assert_eq!(failed.status_text(), "exit status: 255");
        assert_eq!(LaunchOutput::default().status_text(), "terminated by signal");
    }
}
