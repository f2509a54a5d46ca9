//! Command runner test utilities

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use nix_bump::command::{CommandError, CommandOutput, CommandRunner, CommandSpec};

/// Scripted stand-in for the nix tool chain.
///
/// * `nix-build` fails with a hash mismatch reporting `got_hash`
/// * `nix build` prints `build_output`
/// * `nix-prefetch-git` answers from `git_hashes` keyed by URL after `prefetch_delay`
/// * `git diff` prints `git_diff`
#[derive(Default)]
pub struct FakeNix {
    pub got_hash: String,
    pub build_output: String,
    pub git_hashes: HashMap<String, String>,
    pub git_diff: String,
    pub prefetch_delay: Duration,
    calls: Mutex<Vec<CommandSpec>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeNix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_got_hash(mut self, hash: &str) -> Self {
        self.got_hash = hash.to_string();
        self
    }

    pub fn with_build_output(mut self, path: &str) -> Self {
        self.build_output = path.to_string();
        self
    }

    pub fn with_git_hash(mut self, url: &str, hash: &str) -> Self {
        self.git_hashes.insert(url.to_string(), hash.to_string());
        self
    }

    pub fn with_git_diff(mut self, diff: &str) -> Self {
        self.git_diff = diff.to_string();
        self
    }

    pub fn with_prefetch_delay(mut self, delay: Duration) -> Self {
        self.prefetch_delay = delay;
        self
    }

    /// Every invocation of `program`, in call order
    pub fn calls_to(&self, program: &str) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|spec| spec.program == program)
            .cloned()
            .collect()
    }

    pub fn max_concurrent_prefetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn prefetch(&self, spec: &CommandSpec) -> CommandOutput {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.prefetch_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let url = &spec.args[1];
        match self.git_hashes.get(url) {
            Some(hash) => ok(format!(r#"{{"url": "{url}", "hash": "{hash}"}}"#)),
            None => CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: format!("fatal: repository '{url}' not found"),
            },
        }
    }
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        status: Some(0),
        stdout,
        stderr: String::new(),
    }
}

#[async_trait]
impl CommandRunner for FakeNix {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());

        let output = match spec.program.as_str() {
            "nix-build" => CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: format!(
                    "error: hash mismatch in fixed-output derivation:\n         specified: sha256-AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=\n            got:    {}\n",
                    self.got_hash
                ),
            },
            "nix" => ok(format!("{}\n", self.build_output)),
            "nix-prefetch-git" => self.prefetch(spec).await,
            "git" => ok(self.git_diff.clone()),
            _ => ok(String::new()),
        };
        Ok(output)
    }
}
