use forksh::Interpreter;
use forksh::config::Args;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    tracing::debug!(?args, "starting shell");
    Interpreter::new(args.shell_config()).repl()
}
