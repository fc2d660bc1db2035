//! Local SSH key pair used for grants
//!
//! One RSA key pair per operator environment, generated on first use and
//! never rotated. Concurrent first runs may race on generation; the loser's
//! `ssh-keygen` fails and that invocation reports `KeyGeneration`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use jump_core::config::BrokerConfig;
use jump_core::{BrokerError, KeyPair};

/// Owns the broker key pair on disk
#[derive(Debug, Clone)]
pub struct KeyStore {
    private_key_path: PathBuf,
    comment: String,
    keygen_program: String,
}

impl KeyStore {
    /// Key store for `<dir>/<name>` (+ `.pub`)
    pub fn new(dir: impl AsRef<Path>, name: &str, comment: impl Into<String>) -> Self {
        Self {
            private_key_path: dir.as_ref().join(name),
            comment: comment.into(),
            keygen_program: "ssh-keygen".to_string(),
        }
    }

    /// Key store at the configured location
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(&config.key_dir, &config.key_name, config.key_comment.clone())
    }

    /// Use a different key generation program
    pub fn with_keygen_program(mut self, program: impl Into<String>) -> Self {
        self.keygen_program = program.into();
        self
    }

    /// Path of the private key
    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    /// Path of the public key
    pub fn public_key_path(&self) -> PathBuf {
        let mut name = self.private_key_path.as_os_str().to_owned();
        name.push(".pub");
        PathBuf::from(name)
    }

    /// Return the key pair, generating it when neither half exists
    ///
    /// A lone private or public key is an error; regenerating would need to
    /// overwrite the surviving half.
    pub fn ensure_key_pair(&self) -> Result<KeyPair, BrokerError> {
        let public_key_path = self.public_key_path();
        match (self.private_key_path.exists(), public_key_path.exists()) {
            (false, false) => self.generate()?,
            (true, true) => {}
            (true, false) => {
                return Err(BrokerError::KeyGeneration(format!(
                    "{} has no public key; recreate it with `ssh-keygen -y -f {} > {}` or remove it",
                    self.private_key_path.display(),
                    self.private_key_path.display(),
                    public_key_path.display()
                )));
            }
            (false, true) => {
                return Err(BrokerError::KeyGeneration(format!(
                    "{} has no private key; remove it to generate a new pair",
                    public_key_path.display()
                )));
            }
        }

        let public_key = fs::read_to_string(&public_key_path)
            .map_err(|e| {
                BrokerError::KeyGeneration(format!(
                    "failed to read {}: {}",
                    public_key_path.display(),
                    e
                ))
            })?
            .trim()
            .to_string();

        if public_key.is_empty() {
            return Err(BrokerError::KeyGeneration(format!(
                "public key {} is empty",
                public_key_path.display()
            )));
        }

        Ok(KeyPair {
            private_key_path: self.private_key_path.clone(),
            public_key_path,
            public_key,
        })
    }

    /// [`ensure_key_pair`](Self::ensure_key_pair) on the blocking pool
    ///
    /// Key generation runs `ssh-keygen` and touches the filesystem, which
    /// must not stall a runtime worker.
    pub async fn load(self: &Arc<Self>) -> Result<KeyPair, BrokerError> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.ensure_key_pair())
            .await
            .map_err(|e| BrokerError::KeyGeneration(format!("key generation task failed: {}", e)))?
    }

    /// Trimmed public key, generating the pair if needed
    pub fn public_key_material(&self) -> Result<String, BrokerError> {
        Ok(self.ensure_key_pair()?.public_key)
    }

    fn generate(&self) -> Result<(), BrokerError> {
        if let Some(parent) = self.private_key_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BrokerError::KeyGeneration(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tracing::info!(path = %self.private_key_path.display(), "Generating SSH key pair");

        let status = Command::new(&self.keygen_program)
            .arg("-t")
            .arg("rsa")
            .arg("-C")
            .arg(&self.comment)
            .arg("-f")
            .arg(&self.private_key_path)
            .arg("-N")
            .arg("") // No passphrase
            .arg("-q")
            // Never wait on an interactive prompt
            .stdin(Stdio::null())
            .status()
            .map_err(|e| {
                BrokerError::KeyGeneration(format!("failed to run {}: {}", self.keygen_program, e))
            })?;

        if !status.success() {
            return Err(BrokerError::KeyGeneration(format!(
                "{} failed with status: {}",
                self.keygen_program, status
            )));
        }

        // Set restrictive permissions on private key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.private_key_path, perms).map_err(|e| {
                BrokerError::KeyGeneration(format!("failed to restrict private key: {}", e))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keygen_available() -> bool {
        Command::new("ssh-keygen")
            .arg("-?")
            .output()
            .is_ok()
    }

    #[test]
    fn test_existing_key_is_read_trimmed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k"), "private").unwrap();
        fs::write(dir.path().join("k.pub"), "ssh-rsa AAAA test\n").unwrap();

        // Keygen must not run for an existing pair
        let store = KeyStore::new(dir.path(), "k", "c").with_keygen_program("/nonexistent/keygen");
        let pair = store.ensure_key_pair().unwrap();
        assert_eq!(pair.public_key, "ssh-rsa AAAA test");
        assert_eq!(store.public_key_material().unwrap(), "ssh-rsa AAAA test");
        assert_eq!(pair.private_key_path, dir.path().join("k"));
        assert_eq!(pair.public_key_path, dir.path().join("k.pub"));
    }

    #[test]
    fn test_missing_keygen_is_key_generation_error() {
        let dir = TempDir::new().unwrap();
        let store = KeyStore::new(dir.path(), "k", "c").with_keygen_program("/nonexistent/keygen");
        assert!(matches!(
            store.ensure_key_pair(),
            Err(BrokerError::KeyGeneration(_))
        ));
    }

    #[test]
    fn test_failing_keygen_is_key_generation_error() {
        let dir = TempDir::new().unwrap();
        let store = KeyStore::new(dir.path(), "k", "c").with_keygen_program("false");
        assert!(matches!(
            store.ensure_key_pair(),
            Err(BrokerError::KeyGeneration(_))
        ));
    }

    #[test]
    fn test_empty_public_key_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k"), "private").unwrap();
        fs::write(dir.path().join("k.pub"), "  \n").unwrap();
        let store = KeyStore::new(dir.path(), "k", "c");
        let err = store.ensure_key_pair().unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn test_private_key_without_public_key_is_not_regenerated() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k"), "private").unwrap();

        // Running keygen here would prompt to overwrite `k`
        let store = KeyStore::new(dir.path(), "k", "c").with_keygen_program("/nonexistent/keygen");
        match store.ensure_key_pair() {
            Err(BrokerError::KeyGeneration(msg)) => assert!(msg.contains("has no public key")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(fs::read_to_string(dir.path().join("k")).unwrap(), "private");
        assert!(!dir.path().join("k.pub").exists());
    }

    #[test]
    fn test_public_key_without_private_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k.pub"), "ssh-rsa AAAA test\n").unwrap();

        let store = KeyStore::new(dir.path(), "k", "c").with_keygen_program("/nonexistent/keygen");
        match store.ensure_key_pair() {
            Err(BrokerError::KeyGeneration(msg)) => assert!(msg.contains("has no private key")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_runs_off_the_runtime() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k"), "private").unwrap();
        fs::write(dir.path().join("k.pub"), "ssh-rsa AAAA test\n").unwrap();

        let store = Arc::new(KeyStore::new(dir.path(), "k", "c"));
        let pair = store.load().await.unwrap();
        assert_eq!(pair, store.ensure_key_pair().unwrap());
    }

    #[test]
    fn test_generates_once() {
        if !keygen_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let store = KeyStore::new(dir.path().join("nested"), "aws_ssm_ssh_key", "ec2-ssm");

        let first = store.ensure_key_pair().unwrap();
        assert!(first.public_key.starts_with("ssh-rsa "));
        assert!(first.public_key.ends_with("ec2-ssm"));
        assert!(first.private_key_path.exists());

        let second = store.ensure_key_pair().unwrap();
        assert_eq!(first, second);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&first.private_key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
