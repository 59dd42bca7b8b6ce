use crate::command::{BuiltinCommand, Context, Execution, Flow};
use crate::error::ShellError;
use crate::lexer;
use crate::removal::{self, DeletionFlags, DeletionRequest, Reporter};
use anyhow::{Context as _, Result};
use argh::FromArgs;
use std::ffi::OsString;
use std::fs;

#[derive(FromArgs)]
/// List the commands built into the shell.
pub struct Help {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Help {
    const NAME: &'static str = "help";
    const EXECUTION: Execution = Execution::Forked;

    fn execute(self, ctx: &mut Context<'_>) -> Result<Flow> {
        writeln!(ctx.out)?;
        writeln!(ctx.out, "Type program names and arguments, and hit enter.")?;
        writeln!(ctx.out, "The following are built in commands:")?;
        for name in ctx.dispatcher.builtin_names() {
            writeln!(ctx.out, "  {name}")?;
        }
        writeln!(ctx.out)?;
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Change the working directory of the shell.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    const NAME: &'static str = "cd";
    const EXECUTION: Execution = Execution::InProcess;

    fn execute(self, ctx: &mut Context<'_>) -> Result<Flow> {
        let target = self
            .target
            .ok_or(ShellError::MissingArgument { command: Self::NAME })?;
        ctx.env.change_dir(target)?;
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Print the commands entered so far, oldest first.
pub struct History {
    #[argh(positional)]
    /// only print the most recent N commands
    pub count: Option<usize>,
}

impl BuiltinCommand for History {
    const NAME: &'static str = "history";
    const EXECUTION: Execution = Execution::Forked;

    fn execute(self, ctx: &mut Context<'_>) -> Result<Flow> {
        let count = self.count.unwrap_or(ctx.history.len());
        for (index, line) in ctx.history.range(count) {
            writeln!(ctx.out, "\t{index}\t{line}")?;
        }
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Run a command from the history again.
pub struct Issue {
    #[argh(positional)]
    /// index of the command (1-based), as printed by `history`
    pub index: Option<String>,
}

impl BuiltinCommand for Issue {
    const NAME: &'static str = "issue";
    const EXECUTION: Execution = Execution::Forked;

    fn execute(self, ctx: &mut Context<'_>) -> Result<Flow> {
        let raw = self
            .index
            .ok_or(ShellError::MissingArgument { command: Self::NAME })?;
        let index: i64 = raw.parse().map_err(|_| ShellError::InvalidArgument {
            command: Self::NAME,
            reason: format!("{raw:?} is not a number"),
        })?;
        let line = ctx.history.get(index).map_err(ShellError::from)?.to_owned();

        write!(ctx.out, "{line}\n\n")?;
        let words = lexer::split_into_words(&line).map_err(ShellError::from)?;
        let dispatcher = ctx.dispatcher;
        Ok(dispatcher.dispatch(&words, ctx))
    }
}

#[derive(FromArgs)]
/// List the entries of the current directory in name order.
pub struct Ls {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Ls {
    const NAME: &'static str = "ls";
    const EXECUTION: Execution = Execution::Forked;

    fn execute(self, ctx: &mut Context<'_>) -> Result<Flow> {
        let dir = ctx.env.current_dir();
        let mut names = fs::read_dir(dir)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|e| e.file_name()))
                    .collect::<std::io::Result<Vec<_>>>()
            })
            .with_context(|| format!("ls: {}", dir.display()))?;
        names.sort();
        for name in names {
            writeln!(ctx.out, "{}", name.to_string_lossy())?;
        }
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Remove files, or whole directory trees with -r.
pub struct Rm {
    #[argh(switch, short = 'r')]
    /// remove directories and their contents, deepest entries first
    pub recursive: bool,

    #[argh(switch, short = 'f')]
    /// do not report removals that fail
    pub force: bool,

    #[argh(switch, short = 'v')]
    /// print each path as it is removed
    pub verbose: bool,

    #[argh(positional)]
    /// paths to remove; relative paths start at the current directory
    pub paths: Vec<String>,
}

impl BuiltinCommand for Rm {
    const NAME: &'static str = "rm";
    const EXECUTION: Execution = Execution::InProcess;

    fn execute(self, ctx: &mut Context<'_>) -> Result<Flow> {
        if self.paths.is_empty() {
            return Err(ShellError::MissingArgument { command: Self::NAME }.into());
        }
        let flags = DeletionFlags {
            recursive: self.recursive,
            force: self.force,
            verbose: self.verbose,
        };
        // Resolve every target before the first removal touches the filesystem.
        let requests: Vec<_> = self
            .paths
            .iter()
            .map(|path| DeletionRequest::new(ctx.env.resolve(path), flags))
            .collect();

        let mut reporter = Reporter::new(&mut *ctx.out, &mut *ctx.err);
        for request in &requests {
            request.execute(&mut reporter)?;
        }
        let report = reporter.finish();
        tracing::debug!(?report, "rm finished");
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Remove everything in the current directory except the named entries.
pub struct RmExcept {
    #[argh(positional, greedy)]
    /// names of entries in the current directory to keep
    pub keep: Vec<String>,
}

impl BuiltinCommand for RmExcept {
    const NAME: &'static str = "rmexcept";
    const EXECUTION: Execution = Execution::InProcess;

    fn execute(self, ctx: &mut Context<'_>) -> Result<Flow> {
        if self.keep.is_empty() {
            return Err(ShellError::MissingArgument { command: Self::NAME }.into());
        }
        let keep: Vec<OsString> = self.keep.into_iter().map(OsString::from).collect();
        let mut reporter = Reporter::new(&mut *ctx.out, &mut *ctx.err);
        let report = removal::remove_except(ctx.env.current_dir(), &keep, &mut reporter)?;
        tracing::debug!(?report, "rmexcept finished");
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    const NAME: &'static str = "exit";
    const EXECUTION: Execution = Execution::Forked;

    fn execute(self, _ctx: &mut Context<'_>) -> Result<Flow> {
        Ok(Flow::Terminate)
    }
}
