//! Remote grant script
//!
//! A grant is a short, ordered list of steps executed as root on the target.
//! Keeping the steps as data lets the same script be rendered to POSIX shell
//! for the real command channel and interpreted by test doubles.

use std::fmt::Write;
use std::time::Duration;

use crate::types::AccessGrant;

/// Trust store file name inside `~user/.ssh`
pub const TRUST_STORE: &str = "authorized_keys";

/// One step of a grant script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Create `~user/.ssh` owned by the user and enter it
    EnsureTrustDir { user: String },
    /// Append `line` unless a line containing `key` is already present
    InsertIfAbsent {
        user: String,
        key: String,
        line: String,
    },
    /// Wait out the grant lifetime
    Sleep(Duration),
    /// Drop every line containing `key`, leaving the file owned by `user`
    RemoveMatching { user: String, key: String },
}

/// A self-cleaning grant script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScript {
    steps: Vec<ScriptStep>,
}

impl RemoteScript {
    /// Build the insert / sleep / remove script for a grant
    pub fn for_grant(grant: &AccessGrant) -> Self {
        Self {
            steps: vec![
                ScriptStep::EnsureTrustDir {
                    user: grant.remote_user.clone(),
                },
                ScriptStep::InsertIfAbsent {
                    user: grant.remote_user.clone(),
                    key: grant.public_key.clone(),
                    line: grant.trust_line(),
                },
                ScriptStep::Sleep(grant.ttl),
                ScriptStep::RemoveMatching {
                    user: grant.remote_user.clone(),
                    key: grant.public_key.clone(),
                },
            ],
        }
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Total time the script spends sleeping
    pub fn duration(&self) -> Duration {
        self.steps
            .iter()
            .map(|step| match step {
                ScriptStep::Sleep(d) => *d,
                _ => Duration::ZERO,
            })
            .sum()
    }

    /// Render as a POSIX shell script
    ///
    /// User names are emitted unquoted so `~user` expands; callers must have
    /// validated them. Every other value is single-quoted.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            match step {
                ScriptStep::EnsureTrustDir { user } => {
                    let _ = writeln!(out, "mkdir -p ~{}/.ssh", user);
                    let _ = writeln!(out, "chown -R {0}:{0} ~{0}/.ssh", user);
                    let _ = writeln!(out, "chmod 700 ~{}/.ssh", user);
                    let _ = writeln!(out, "cd ~{}/.ssh || exit 1", user);
                }
                ScriptStep::InsertIfAbsent { user, key, line } => {
                    lock(&mut out);
                    let _ = writeln!(out, "touch {}", TRUST_STORE);
                    let _ = writeln!(
                        out,
                        "grep -qF {} {} || printf '%s\\n' {} >> {}",
                        shell_quote(key),
                        TRUST_STORE,
                        shell_quote(line),
                        TRUST_STORE
                    );
                    let _ = writeln!(out, "chown {0}:{0} {1}", user, TRUST_STORE);
                    let _ = writeln!(out, "chmod 600 {}", TRUST_STORE);
                    unlock(&mut out);
                }
                ScriptStep::Sleep(ttl) => {
                    let _ = writeln!(out, "sleep {}", ttl.as_secs());
                }
                ScriptStep::RemoveMatching { user, key } => {
                    // Per-run temp file and an atomic rename: overlapping
                    // cleanups never observe a truncated trust store
                    lock(&mut out);
                    let _ = writeln!(
                        out,
                        "tmp=$(mktemp .tmp.{}.XXXXXX) || exit 1",
                        TRUST_STORE
                    );
                    let _ = writeln!(
                        out,
                        "grep -vF {} {} > \"$tmp\"",
                        shell_quote(key),
                        TRUST_STORE
                    );
                    // grep exits 1 when no line is left, 2 on read errors
                    let _ = writeln!(out, "if [ $? -gt 1 ]; then rm -f \"$tmp\"; exit 1; fi");
                    let _ = writeln!(out, "chown {0}:{0} \"$tmp\"", user);
                    let _ = writeln!(out, "chmod 600 \"$tmp\"");
                    let _ = writeln!(out, "mv -f \"$tmp\" {}", TRUST_STORE);
                    unlock(&mut out);
                }
            }
        }
        out
    }
}

/// Serialize trust store edits across concurrent grants on `~user/.ssh`
///
/// The lock is advisory and skipped on hosts without `flock`; it is released
/// when the descriptor closes, including when the script is killed.
fn lock(out: &mut String) {
    let _ = writeln!(out, "exec 9<.");
    let _ = writeln!(out, "command -v flock >/dev/null && flock 9");
}

fn unlock(out: &mut String) {
    let _ = writeln!(out, "exec 9<&-");
}

/// Quote a value for POSIX `sh`
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}


#[cfg(all(test, unix))]
mod shell_tests {
    use std::path::{Path, PathBuf};
    use std::process::{Child, Command};
    use std::thread;

    use tempfile::TempDir;

    use super::*;
    use crate::types::TargetId;

    const OTHER: &str = "ssh-ed25519 AAAAC3Nz operator@laptop";

    /// Run a rendered grant under `sh` with `~ec2-user` pointing into `home`
    fn spawn(home: &Path, key: &str, tag: &str, ttl_secs: u64) -> Child {
        let grant = AccessGrant {
            target: TargetId::new("i-0abc"),
            remote_user: "ec2-user".to_string(),
            public_key: key.to_string(),
            identity_tag: tag.to_string(),
            ttl: Duration::from_secs(ttl_secs),
        };
        // chown to a missing user fails without aborting the script
        let text = RemoteScript::for_grant(&grant)
            .render()
            .replace("~ec2-user", &home.display().to_string());
        Command::new("sh")
            .arg("-c")
            .arg(text)
            .stderr(std::process::Stdio::null())
            .spawn()
            .unwrap()
    }

    fn store(home: &Path) -> PathBuf {
        home.join(".ssh").join(TRUST_STORE)
    }

    fn lines(home: &Path) -> Vec<String> {
        std::fs::read_to_string(store(home))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn seed(home: &Path) {
        std::fs::create_dir_all(home.join(".ssh")).unwrap();
        std::fs::write(store(home), format!("{}\n", OTHER)).unwrap();
    }

    fn leftovers(home: &Path) -> Vec<String> {
        std::fs::read_dir(home.join(".ssh"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != TRUST_STORE)
            .collect()
    }

    #[test]
    fn test_key_present_during_ttl_then_removed() {
        let home = TempDir::new().unwrap();
        seed(home.path());

        let mut child = spawn(home.path(), "ssh-rsa AAAAB3Nza ec2-ssm", "alice", 2);
        thread::sleep(Duration::from_millis(1000));
        assert_eq!(
            lines(home.path()),
            vec![OTHER.to_string(), "ssh-rsa AAAAB3Nza ec2-ssm alice".to_string()]
        );

        assert!(child.wait().unwrap().success());
        assert_eq!(lines(home.path()), vec![OTHER.to_string()]);
        assert!(leftovers(home.path()).is_empty());
    }

    #[test]
    fn test_creates_missing_trust_store() {
        let home = TempDir::new().unwrap();

        let mut child = spawn(home.path(), "ssh-rsa AAAAB3Nza ec2-ssm", "alice", 1);
        assert!(child.wait().unwrap().success());
        assert!(lines(home.path()).is_empty());

        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(store(home.path())).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_concurrent_grants_for_same_key_insert_once() {
        let home = TempDir::new().unwrap();
        seed(home.path());

        let mut first = spawn(home.path(), "ssh-rsa AAAAB3Nza ec2-ssm", "alice", 2);
        thread::sleep(Duration::from_millis(200));
        let mut second = spawn(home.path(), "ssh-rsa AAAAB3Nza ec2-ssm", "alice", 2);
        thread::sleep(Duration::from_millis(800));
        let granted = lines(home.path())
            .iter()
            .filter(|l| l.contains("AAAAB3Nza"))
            .count();
        assert_eq!(granted, 1);

        assert!(first.wait().unwrap().success());
        assert!(second.wait().unwrap().success());
        assert_eq!(lines(home.path()), vec![OTHER.to_string()]);
    }

    #[test]
    fn test_overlapping_cleanups_keep_unrelated_keys() {
        let home = TempDir::new().unwrap();
        seed(home.path());

        // Distinct keys expiring together, each with its own cleanup
        let mut children: Vec<Child> = (0..8)
            .map(|i| {
                spawn(
                    home.path(),
                    &format!("ssh-rsa AAAAKEY{} ec2-ssm", i),
                    "alice",
                    1,
                )
            })
            .collect();
        for child in &mut children {
            assert!(child.wait().unwrap().success());
        }

        assert_eq!(lines(home.path()), vec![OTHER.to_string()]);
        assert!(leftovers(home.path()).is_empty());
    }
}
