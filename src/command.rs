use crate::env::Environment;
use crate::history::HistoryLog;
use crate::interpreter::Dispatcher;
use argh::{EarlyExit, FromArgs};
use std::io::Write;

/// Conventional process exit code type used by this crate.
pub type ExitCode = i32;

/// What the shell loop should do once a command has finished.
///
/// Forked builtins hand this back across the process boundary as their exit
/// code, so the mapping to integers is part of the contract: `0` terminates
/// the loop and anything else continues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

impl Flow {
    /// Exit status a forked child uses to carry this value to the parent.
    pub fn exit_code(self) -> ExitCode {
        match self {
            Flow::Continue => 1,
            Flow::Terminate => 0,
        }
    }

    /// Inverse of [`Flow::exit_code`]; any status other than 0 continues.
    pub fn from_exit_code(code: ExitCode) -> Self {
        if code == 0 {
            Flow::Terminate
        } else {
            Flow::Continue
        }
    }
}

/// How the dispatcher runs a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Runs inside the shell process because it mutates state the shell owns
    /// (the working directory) or must report its results directly.
    InProcess,
    /// Runs in a forked child; the parent waits and adopts the child's exit
    /// code as the dispatch result.
    Forked,
}

/// Everything a command may read or change while it runs.
pub struct Context<'a> {
    pub env: &'a mut Environment,
    pub history: &'a HistoryLog,
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
    /// Used by builtins that run another command line (`issue`).
    pub dispatcher: &'a Dispatcher,
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`). Where they run
/// is decided by [`BuiltinCommand::EXECUTION`], never by the dispatcher.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "rm" or "cd".
    const NAME: &'static str;

    const EXECUTION: Execution;

    /// Executes the command.
    fn execute(self, ctx: &mut Context<'_>) -> anyhow::Result<Flow>;
}

/// Type-erased entry of the builtin table.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub execution: Execution,
    run: fn(&[&str], &mut Context<'_>) -> anyhow::Result<Flow>,
}

impl Builtin {
    pub(crate) fn of<T: BuiltinCommand>() -> Self {
        Self {
            name: T::NAME,
            execution: T::EXECUTION,
            run: parse_and_execute::<T>,
        }
    }

    /// Parse `args` (without the command name) and run the handler.
    pub fn run(&self, args: &[&str], ctx: &mut Context<'_>) -> anyhow::Result<Flow> {
        (self.run)(args, ctx)
    }
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("execution", &self.execution)
            .finish()
    }
}

fn parse_and_execute<T: BuiltinCommand>(
    args: &[&str],
    ctx: &mut Context<'_>,
) -> anyhow::Result<Flow> {
    match T::from_args(&[T::NAME], args) {
        Ok(cmd) => cmd.execute(ctx),
        // Usage errors and --help never stop the shell.
        Err(EarlyExit { output, status }) => {
            match status {
                Ok(()) => ctx.out.write_all(output.as_bytes())?,
                Err(()) => ctx.err.write_all(output.as_bytes())?,
            }
            Ok(Flow::Continue)
        }
    }
}
