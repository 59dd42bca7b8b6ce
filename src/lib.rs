//! A small interactive shell built around process isolation.
//!
//! Each input line is tokenized and handed to a [`Dispatcher`], which picks
//! one of three ways to run it:
//!
//! - builtins that change the shell's own state (`cd`, `rm`, `rmexcept`) run
//!   in-process;
//! - every other builtin runs in a forked child whose exit code tells the
//!   shell whether to keep going;
//! - anything else is started as an external program, optionally killed after
//!   a deadline requested with `--tkill <seconds>`.
//!
//! The main entry point is [`Interpreter`], which owns the working directory,
//! the [`HistoryLog`] and the dispatcher for one session.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod history;
pub mod io_adapters;
mod interpreter;
pub mod launcher;
pub mod lexer;
pub mod removal;

pub use command::Flow;
pub use config::ShellConfig;
pub use history::HistoryLog;
pub use interpreter::{Dispatcher, Interpreter};
