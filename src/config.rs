use argh::FromArgs;
use nix::sys::signal::Signal;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings of one shell session.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub prompt: String,
    /// Clear the terminal before the first prompt.
    pub clear_screen: bool,
    /// Delivered to a child whose `--tkill` deadline has passed.
    pub timeout_signal: Signal,
    /// How often a child with a deadline is checked for termination.
    pub poll_interval: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            clear_screen: true,
            timeout_signal: Signal::SIGKILL,
            poll_interval: Duration::from_millis(10),
        }
    }
}

#[derive(FromArgs, Debug)]
/// An interactive shell with process-isolated builtins and timed program execution.
pub struct Args {
    #[argh(option, default = "String::from(\"> \")")]
    /// text printed before each input line
    pub prompt: String,

    #[argh(switch)]
    /// do not clear the screen on startup
    pub no_clear: bool,

    #[argh(option, default = "Signal::SIGKILL", from_str_fn(parse_signal))]
    /// signal sent when a --tkill deadline expires (e.g. SIGKILL, SIGALRM)
    pub timeout_signal: Signal,

    #[argh(option, default = "10")]
    /// milliseconds between checks on a child with a deadline
    pub poll_interval_ms: u64,

    #[argh(option, default = "String::from(\"warn\")")]
    /// tracing filter used when RUST_LOG is not set
    pub log_level: String,
}

fn parse_signal(value: &str) -> Result<Signal, String> {
    let upper = value.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&name).map_err(|_| format!("unknown signal: {value}"))
}

impl Args {
    /// Settings for the interpreter, with the poll interval clamped to 1 ms.
    pub fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            prompt: self.prompt.clone(),
            clear_screen: !self.no_clear,
            timeout_signal: self.timeout_signal,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}
