//! Command name lookup.

use std::collections::HashMap;
use std::fmt;

use super::arguments::Arguments;
use super::commands;
use super::errors::CommandError;
use crate::context::RequestContext;

/// Signature shared by every command handler.
///
/// Handlers produce output only through the request's response channel and
/// its terminate flag.
pub type Handler = fn(&mut RequestContext<'_>, &Arguments<'_>) -> Result<(), CommandError>;

/// One entry of the command table.
#[derive(Clone, Copy)]
pub struct CommandInfo {
    /// Name used as the head of the request expression.
    pub name: &'static str,
    /// One-line description.
    pub docstring: &'static str,
    /// The implementation.
    pub handler: Handler,
}

impl fmt::Debug for CommandInfo {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandInfo")
            .field("name", &self.name)
            .field("docstring", &self.docstring)
            .finish_non_exhaustive()
    }
}

/// Maps command names to their handlers.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: HashMap<&'static str, CommandInfo>,
}

impl CommandTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The table of built-in commands.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for info in commands::BUILTIN {
            table.register(*info);
        }
        table
    }

    /// Adds or replaces a command.
    pub fn register(&mut self, info: CommandInfo) {
        self.commands.insert(info.name, info);
    }

    /// Looks up a command by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CommandInfo> {
        self.commands.get(name)
    }

    /// Registered command names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
