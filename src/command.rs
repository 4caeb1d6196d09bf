use dict::{CaseStringKeys, Dict};
use log::{debug, trace};

use crate::ServerError;

/// What the connection should do after running a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Send this line back
    Text(String),
    /// Drop the client without replying
    Close,
}

/// Server state a command may look at
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    pub clients: usize,
}

pub type Handler = fn(&CommandContext, &[&str]) -> Reply;

#[derive(Debug, Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    pub handler: Handler,
}

const COMMANDS: [Command; 5] = [
    Command {
        name: "num",
        handler: num,
    },
    Command {
        name: "quit",
        handler: quit,
    },
    Command {
        name: "sa",
        handler: sa,
    },
    Command {
        name: "sb",
        handler: sb,
    },
    Command {
        name: "sc",
        handler: sc,
    },
];

fn num(ctx: &CommandContext, _args: &[&str]) -> Reply {
    Reply::Text(ctx.clients.to_string())
}

fn quit(_ctx: &CommandContext, _args: &[&str]) -> Reply {
    Reply::Close
}

fn sa(_ctx: &CommandContext, _args: &[&str]) -> Reply {
    Reply::Text("SA operate return OK".into())
}

fn sb(_ctx: &CommandContext, _args: &[&str]) -> Reply {
    Reply::Text("SB operate return OK".into())
}

fn sc(_ctx: &CommandContext, _args: &[&str]) -> Reply {
    Reply::Text("SC operate return OK".into())
}

/// Command names to handlers, names are matched ignoring ASCII case
pub struct CommandTable {
    commands: Dict<CaseStringKeys<Command>>,
}

impl CommandTable {
    pub fn new() -> Result<Self, ServerError> {
        let mut commands = Dict::with_capacity(CaseStringKeys::new(), COMMANDS.len());
        for cmd in COMMANDS {
            commands.insert(cmd.name.to_string(), cmd)?;
        }
        debug!(target: "commands", "registered {} commands", commands.len());
        Ok(Self { commands })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn lookup(&mut self, name: &str) -> Option<Command> {
        self.commands
            .get(&name.to_string())
            .ok()
            .and_then(|v| v.val().copied())
    }

    /// Runs the command named by the first word of `line`, the other words
    /// are its arguments. Blank lines get no reply at all.
    pub fn dispatch(&mut self, ctx: &CommandContext, line: &str) -> Option<Reply> {
        let mut words = line.split_whitespace();
        let name = words.next()?;
        let args: Vec<&str> = words.collect();

        let Some(cmd) = self.lookup(name) else {
            trace!(target: "commands", "unknown command {name:?}");
            return Some(Reply::Text(format!("ERR unknown command '{name}'")));
        };
        trace!(target: "commands", "running {} with {} args", cmd.name, args.len());
        Some((cmd.handler)(ctx, &args))
    }
}
