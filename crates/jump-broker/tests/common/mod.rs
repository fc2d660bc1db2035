//! Test doubles for broker collaborators

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use jump_broker::context::Collaborators;
use jump_broker::BrokerContext;
use jump_core::config::BrokerConfig;
use jump_core::script::{RemoteScript, ScriptStep};
use jump_core::traits::{
    IdentityProvider, InstanceDiscovery, LaunchOutput, LaunchSpec, ProcessLauncher,
    RemoteExecutor, SessionRelay,
};
use jump_core::{BrokerError, GrantReceipt, Instance, TargetId};

pub const PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2E ec2-ssm";

/// A target whose command channel interprets grant scripts
///
/// Each accepted script runs as a background task against an in-memory
/// `authorized_keys`, so sleeps follow tokio's (pausable) clock.
#[derive(Default)]
pub struct FakeHost {
    pub trust_store: Arc<Mutex<Vec<String>>>,
    pub dispatched: Mutex<Vec<(TargetId, String)>>,
    reject: bool,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A host whose agent is unreachable
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Default::default()
        })
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().unwrap().len()
    }

    pub fn lines(&self) -> Vec<String> {
        self.trust_store.lock().unwrap().clone()
    }

    pub fn lines_with_key(&self, key: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(key)).count()
    }
}

#[async_trait]
impl RemoteExecutor for FakeHost {
    async fn dispatch(
        &self,
        target: &TargetId,
        script: &RemoteScript,
        comment: &str,
    ) -> Result<GrantReceipt, BrokerError> {
        if self.reject {
            return Err(BrokerError::GrantDispatch {
                target: target.clone(),
                reason: "target not connected to the command channel".to_string(),
            });
        }

        let mut dispatched = self.dispatched.lock().unwrap();
        dispatched.push((target.clone(), comment.to_string()));
        let command_id = format!("cmd-{}", dispatched.len());

        let steps = script.steps().to_vec();
        let store = Arc::clone(&self.trust_store);
        tokio::spawn(async move {
            for step in steps {
                match step {
                    ScriptStep::EnsureTrustDir { .. } => {}
                    ScriptStep::InsertIfAbsent { key, line, .. } => {
                        let mut lines = store.lock().unwrap();
                        if !lines.iter().any(|l| l.contains(&key)) {
                            lines.push(line);
                        }
                    }
                    ScriptStep::Sleep(ttl) => tokio::time::sleep(ttl).await,
                    ScriptStep::RemoveMatching { key, .. } => {
                        store.lock().unwrap().retain(|l| !l.contains(&key));
                    }
                }
            }
        });

        Ok(GrantReceipt { command_id })
    }
}

/// Emulates the local ssh client, including control-socket multiplexing
#[derive(Default)]
pub struct FakeSsh {
    pub calls: Mutex<Vec<LaunchSpec>>,
    live: Mutex<HashSet<String>>,
    foreground_code: Mutex<Option<i32>>,
}

impl FakeSsh {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        *fake.foreground_code.lock().unwrap() = Some(0);
        Arc::new(fake)
    }

    /// Exit code for attached sessions
    pub fn set_foreground_code(&self, code: Option<i32>) {
        *self.foreground_code.lock().unwrap() = code;
    }

    pub fn calls(&self) -> Vec<LaunchSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> LaunchSpec {
        self.calls().last().cloned().expect("no launches recorded")
    }
}

#[async_trait]
impl ProcessLauncher for FakeSsh {
    async fn run(&self, spec: &LaunchSpec) -> std::io::Result<LaunchOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let control_path = spec.arg_after("-S").map(str::to_string);
        let mut live = self.live.lock().unwrap();

        if let Some(path) = control_path {
            if spec.has_arg_pair("-O", "exit") || spec.has_arg_pair("-O", "check") {
                let bound = if spec.has_arg_pair("-O", "exit") {
                    live.remove(&path)
                } else {
                    live.contains(&path)
                };
                return Ok(if bound {
                    LaunchOutput::ok()
                } else {
                    LaunchOutput::failed(
                        255,
                        format!("Control socket connect({}): No such file or directory\n", path),
                    )
                });
            }

            if spec.args.iter().any(|a| a == "-M") {
                if !live.insert(path) {
                    return Ok(LaunchOutput::failed(
                        255,
                        "bind [127.0.0.1]:6000: Address already in use",
                    ));
                }
                return Ok(LaunchOutput::ok());
            }
        }

        Ok(LaunchOutput {
            code: *self.foreground_code.lock().unwrap(),
            ..Default::default()
        })
    }
}

/// Relay that launches a recognisable command
pub struct FakeRelay;

impl SessionRelay for FakeRelay {
    fn session(&self, target: &TargetId, port: u16) -> LaunchSpec {
        LaunchSpec::inherit("relay", vec![target.to_string(), port.to_string()])
    }
}

/// Identity service returning a fixed principal
pub struct FakeIdentity(pub Option<&'static str>);

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn caller_principal(&self) -> Result<String, BrokerError> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| BrokerError::IdentityUnavailable("no credentials".to_string()))
    }
}

pub struct FakeDiscovery(pub Vec<Instance>);

#[async_trait]
impl InstanceDiscovery for FakeDiscovery {
    async fn running_instances(&self) -> Result<Vec<Instance>, BrokerError> {
        Ok(self.0.clone())
    }
}

/// A broker wired to fakes, with its key pair in a temp directory
pub struct Harness {
    pub context: BrokerContext,
    pub host: Arc<FakeHost>,
    pub ssh: Arc<FakeSsh>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(FakeHost::new(), Some("arn:aws:sts::1:assumed-role/Ops/alice"), |_| {})
    }

    pub fn with_config(edit: impl FnOnce(&mut BrokerConfig)) -> Self {
        Self::build(FakeHost::new(), Some("arn:aws:sts::1:assumed-role/Ops/alice"), edit)
    }

    pub fn build(
        host: Arc<FakeHost>,
        principal: Option<&'static str>,
        edit: impl FnOnce(&mut BrokerConfig),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("k"), "private").unwrap();
        std::fs::write(dir.path().join("k.pub"), format!("{}\n", PUBLIC_KEY)).unwrap();

        let mut config = BrokerConfig {
            key_dir: dir.path().to_path_buf(),
            key_name: "k".to_string(),
            control_dir: dir.path().to_path_buf(),
            ..BrokerConfig::default()
        };
        edit(&mut config);

        let ssh = FakeSsh::new();
        let collaborators = Collaborators {
            launcher: ssh.clone(),
            executor: host.clone(),
            identity: Arc::new(FakeIdentity(principal)),
            relay: Arc::new(FakeRelay),
            discovery: Arc::new(FakeDiscovery(vec![])),
        };

        Self {
            context: BrokerContext::with_collaborators(config, collaborators),
            host,
            ssh,
            dir,
        }
    }
}

/// Number of processes a harness launched
pub fn launches(harness: &Harness) -> usize {
    harness.ssh.calls().len()
}
