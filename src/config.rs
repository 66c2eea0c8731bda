//! Runtime settings shared by every run of a compiled plan.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What a download source does when one of its wires fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The statement fails with the first failure in wire order.
    #[default]
    Abort,
    /// The failing wire yields one row carrying its url; every other cell is null.
    NullRow,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" | "fail" => Ok(FailurePolicy::Abort),
            "null" | "null-row" | "skip" => Ok(FailurePolicy::NullRow),
            other => Err(format!("unknown download failure policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Workers per download when the script gives no `thread` hint.
    pub default_threads: usize,
    /// Upper bound applied to every `thread` hint.
    pub max_threads: usize,
    pub download_failure: FailurePolicy,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            default_threads: 1,
            max_threads: 32,
            download_failure: FailurePolicy::Abort,
            user_agent: format!("pickaxe/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `PICKAXE_*` environment variables.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = RuntimeConfig::default();

        if let Some(n) = read_var::<usize>("PICKAXE_THREADS") {
            config.default_threads = n.max(1);
        }
        if let Some(n) = read_var::<usize>("PICKAXE_MAX_THREADS") {
            config.max_threads = n.max(1);
        }
        if let Some(ms) = read_var::<u64>("PICKAXE_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = read_var::<FailurePolicy>("PICKAXE_ON_DOWNLOAD_ERROR") {
            config.download_failure = policy;
        }
        if let Ok(agent) = env::var("PICKAXE_USER_AGENT")
            && !agent.trim().is_empty()
        {
            config.user_agent = agent;
        }

        config
    }

    /// Worker count for a download of `wires` wires.
    pub fn threads_for(&self, hint: Option<usize>, wires: usize) -> usize {
        let requested = hint.unwrap_or(self.default_threads).min(self.max_threads);
        requested.min(wires).max(1)
    }
}

fn read_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
