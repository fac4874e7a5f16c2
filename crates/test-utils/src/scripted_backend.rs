use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use anyhow::anyhow;
use devctl::errors::{DevctlError, Result};
use devctl::exec::{CapturedOutput, CommandBackend, NoTargetPatterns};
use devctl::types::Timeout;

type Reply = std::result::Result<CapturedOutput, ScriptedFailure>;

/// Failures a script can inject. `DevctlError` is not `Clone`, so scripts
/// describe the failure and the backend builds a fresh error per call.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    NoTarget(String),
    Timeout,
    Spawn,
}

impl ScriptedFailure {
    fn into_error(self) -> DevctlError {
        match self {
            ScriptedFailure::NoTarget(stderr) => DevctlError::NoTarget {
                output: CapturedOutput::new("", stderr),
            },
            ScriptedFailure::Timeout => DevctlError::Timeout {
                elapsed: std::time::Duration::from_millis(1),
                output: CapturedOutput::default(),
            },
            ScriptedFailure::Spawn => DevctlError::Spawn {
                program: "scripted".to_string(),
                message: "scripted spawn failure".to_string(),
            },
        }
    }
}

#[derive(Default)]
struct Script {
    queued: BTreeMap<String, VecDeque<Reply>>,
    fallback: BTreeMap<String, Reply>,
    calls: Vec<Vec<String>>,
}

/// A fake `CommandBackend` that:
/// - records every argument vector it is asked to run
/// - answers from per-key reply queues, then from a per-key fallback.
///
/// The key of an invocation is its subcommand with any leading `-s <id>`
/// removed; for `shell` the remote command is included, so `shell exit`
/// and `shell id` are scripted separately.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for `key`.
    pub fn reply(&self, key: &str, stdout: &str, stderr: &str) -> &Self {
        self.push(key, Ok(CapturedOutput::new(stdout, stderr)))
    }

    /// Queue one injected failure for `key`.
    pub fn fail(&self, key: &str, failure: ScriptedFailure) -> &Self {
        self.push(key, Err(failure))
    }

    /// Reply used for `key` whenever its queue is empty.
    pub fn always(&self, key: &str, stdout: &str, stderr: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .fallback
            .insert(key.to_string(), Ok(CapturedOutput::new(stdout, stderr)));
        self
    }

    fn push(&self, key: &str, reply: Reply) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(key.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Every argument vector run so far, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Keys of every call so far, in order.
    pub fn keys(&self) -> Vec<String> {
        self.calls().iter().map(|args| key_of(args)).collect()
    }

    /// How many calls had `key`.
    pub fn count(&self, key: &str) -> usize {
        self.keys().iter().filter(|k| k.as_str() == key).count()
    }
}

pub fn key_of(args: &[String]) -> String {
    let rest = match args {
        [flag, _target, rest @ ..] if flag.as_str() == "-s" => rest,
        all => all,
    };
    match rest {
        [sub, cmd @ ..] if sub.as_str() == "shell" && !cmd.is_empty() => {
            format!("shell {}", cmd.join(" "))
        }
        [sub, ..] => sub.clone(),
        [] => String::new(),
    }
}

impl CommandBackend for ScriptedBackend {
    fn run(
        &self,
        args: &[String],
        _timeout: Timeout,
        _no_target: &NoTargetPatterns,
    ) -> Result<CapturedOutput> {
        let key = key_of(args);
        let mut script = self.script.lock().unwrap();
        script.calls.push(args.to_vec());

        let queued = script.queued.get_mut(&key).and_then(VecDeque::pop_front);
        let reply = match queued {
            Some(reply) => Some(reply),
            None => script.fallback.get(&key).cloned(),
        };

        match reply {
            Some(Ok(output)) => Ok(output),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Err(DevctlError::Other(anyhow!("no scripted reply for `{key}`"))),
        }
    }
}
