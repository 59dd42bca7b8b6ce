use crate::builtin::{Cd, Exit, Help, History, Issue, Ls, Rm, RmExcept};
use crate::command::{Builtin, Context, Execution, Flow};
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::history::HistoryLog;
use crate::launcher::{LaunchRequest, Launcher, Termination};
use crate::lexer;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fmt::Display;
use std::io::{IsTerminal, Write};
use tracing::{debug, trace, warn};

/// Resolves a command name to a builtin or an external program and runs it.
///
/// The builtin table maps each name to its handler and to where that handler
/// must run ([`Execution`]). Names not in the table are executed as programs.
pub struct Dispatcher {
    builtins: Vec<Builtin>,
    launcher: Launcher,
}

impl Dispatcher {
    /// Create a dispatcher with a custom builtin table.
    pub fn new(builtins: Vec<Builtin>, launcher: Launcher) -> Self {
        Self { builtins, launcher }
    }

    /// The standard table: help, cd, history, issue, ls, rm, rmexcept, exit.
    pub fn with_default_builtins(launcher: Launcher) -> Self {
        Self::new(
            vec![
                Builtin::of::<Help>(),
                Builtin::of::<Cd>(),
                Builtin::of::<History>(),
                Builtin::of::<Issue>(),
                Builtin::of::<Ls>(),
                Builtin::of::<Rm>(),
                Builtin::of::<RmExcept>(),
                Builtin::of::<Exit>(),
            ],
            launcher,
        )
    }

    /// Builtin names in table order.
    pub fn builtin_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builtins.iter().map(|b| b.name)
    }

    /// Look up a builtin by its exact name.
    pub fn resolve(&self, name: &str) -> Option<&Builtin> {
        self.builtins.iter().find(|b| b.name == name)
    }

    /// Run one argument vector to completion.
    ///
    /// Never fails: every error is written to `ctx.err` and turned into
    /// [`Flow::Continue`]. Only a handler (in-process or forked) that reports
    /// [`Flow::Terminate`] ends the shell.
    pub fn dispatch(&self, words: &[String], ctx: &mut Context<'_>) -> Flow {
        let Some(name) = words.first() else {
            return Flow::Continue;
        };
        let args: Vec<&str> = words[1..].iter().map(String::as_str).collect();

        match self.resolve(name) {
            Some(builtin) => {
                trace!(name = builtin.name, execution = ?builtin.execution, "builtin");
                match builtin.execution {
                    Execution::InProcess => run_builtin(builtin, &args, ctx),
                    Execution::Forked => self.run_forked(builtin, &args, ctx),
                }
            }
            None => self.run_external(words, ctx),
        }
    }

    fn run_forked(&self, builtin: &Builtin, args: &[&str], ctx: &mut Context<'_>) -> Flow {
        flush(ctx);
        let result = self.launcher.run_forked(|| {
            let flow = run_builtin(builtin, args, ctx);
            flush(ctx);
            flow.exit_code()
        });
        match result {
            Ok(Termination::Exited(code)) => Flow::from_exit_code(code),
            Ok(termination @ Termination::Signaled(_)) => {
                debug!(name = builtin.name, ?termination, "forked builtin killed");
                Flow::Continue
            }
            Err(e) => {
                report(ctx, e);
                Flow::Continue
            }
        }
    }

    fn run_external(&self, words: &[String], ctx: &mut Context<'_>) -> Flow {
        let Some(request) = LaunchRequest::from_words(words) else {
            return Flow::Continue;
        };
        flush(ctx);
        match self.launcher.launch(&request, ctx.env.current_dir()) {
            Ok(termination) => {
                debug!(program = %request.program, ?termination, status = termination.code(), "program finished");
            }
            Err(e) => report(ctx, e),
        }
        // A failing program never ends the shell.
        Flow::Continue
    }
}

fn run_builtin(builtin: &Builtin, args: &[&str], ctx: &mut Context<'_>) -> Flow {
    match builtin.run(args, ctx) {
        Ok(flow) => flow,
        Err(e) => {
            report(ctx, format_args!("{e:#}"));
            Flow::Continue
        }
    }
}

fn report(ctx: &mut Context<'_>, message: impl Display) {
    if let Err(e) = writeln!(ctx.err, "sh: {message}") {
        debug!(error = %e, "could not write diagnostic");
    }
}

fn flush(ctx: &mut Context<'_>) {
    if let Err(e) = ctx.out.flush() {
        warn!(error = %e, "could not flush output");
    }
    if let Err(e) = ctx.err.flush() {
        warn!(error = %e, "could not flush diagnostics");
    }
}

/// An interactive shell: reads a line, runs it, records it, repeats.
///
/// Example
/// ```no_run
/// use forksh::{Interpreter, ShellConfig};
/// let mut sh = Interpreter::new(ShellConfig::default());
/// sh.repl().unwrap();
/// ```
pub struct Interpreter {
    env: Environment,
    history: HistoryLog,
    dispatcher: Dispatcher,
    config: ShellConfig,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl Interpreter {
    /// A shell in the process's working directory writing to stdout/stderr.
    pub fn new(config: ShellConfig) -> Self {
        Self::with_streams(
            config,
            Environment::new(),
            Box::new(std::io::stdout()),
            Box::new(std::io::stderr()),
        )
    }

    /// A shell with an explicit working directory and output sinks.
    pub fn with_streams(
        config: ShellConfig,
        env: Environment,
        out: Box<dyn Write>,
        err: Box<dyn Write>,
    ) -> Self {
        let launcher = Launcher::new(config.timeout_signal, config.poll_interval);
        Self {
            env,
            history: HistoryLog::new(),
            dispatcher: Dispatcher::with_default_builtins(launcher),
            config,
            out,
            err,
        }
    }

    /// Lines run so far in this session.
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// The shell's working directory state.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Tokenize and dispatch one raw line, then record it in the history.
    ///
    /// The line is recorded after it has run, so it is not visible to itself
    /// through `history` or `issue`.
    pub fn execute_line(&mut self, line: &str) -> Flow {
        let mut ctx = Context {
            env: &mut self.env,
            history: &self.history,
            out: &mut *self.out,
            err: &mut *self.err,
            dispatcher: &self.dispatcher,
        };
        let flow = match lexer::split_into_words(line) {
            Ok(words) => self.dispatcher.dispatch(&words, &mut ctx),
            Err(e) => {
                report(&mut ctx, e);
                Flow::Continue
            }
        };
        let index = self.history.record(line);
        trace!(index, ?flow, "line finished");
        flow
    }

    /// Read-eval loop on the terminal until `exit` or end of input.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        if self.config.clear_screen && std::io::stdout().is_terminal() {
            write!(self.out, "\x1b[2J\x1b[H")?;
            self.out.flush()?;
        }

        loop {
            match rl.readline(&self.config.prompt) {
                Ok(line) => {
                    rl.add_history_entry(line.as_str())?;
                    if self.execute_line(&line) == Flow::Terminate {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        self.out.flush()?;
        Ok(())
    }
}
