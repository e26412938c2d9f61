//! Command nodes: one instruction of a chain.
//!
//! Nodes live in the chain's arena and are linked by index into a doubly
//! linked list, so chains can be merged and spliced without renumbering
//! the commands that stay put.

use super::param::{ComponentSet, ComponentSource, Lazy};
use crate::{
    error::EngineResult,
    query::Condition,
    scene::Context,
    types::{ComponentId, EntityId, Seconds},
};
use serde::Serialize;
use std::fmt;

pub type NodeId = usize;

pub type Predicate = Box<dyn FnMut() -> bool>;

pub type Action = Box<dyn FnMut(&mut Context<'_>) -> EngineResult<()>>;

/// The closed set of chain instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpCode {
    BeginRepeat,
    EndRepeat,
    Call,
    BeginWhile,
    EndWhile,
    BeginInterval,
    EndInterval,
    BeginIf,
    Else,
    EndIf,
    WaitTime,
    AddComponent,
    WaitForAll,
    WaitForFirst,
    WaitUntil,
    WaitFrames,
    WaitForMessage,
    WaitForMessageWhere,
    RemoveComponent,
    RemoveEntitiesByQuery,
    RemoveEntity,
    SendMessage,
}

impl OpCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeginRepeat           => "BEGIN_REPEAT",
            Self::EndRepeat             => "END_REPEAT",
            Self::Call                  => "CALL",
            Self::BeginWhile            => "BEGIN_WHILE",
            Self::EndWhile              => "END_WHILE",
            Self::BeginInterval         => "BEGIN_INTERVAL",
            Self::EndInterval           => "END_INTERVAL",
            Self::BeginIf               => "BEGIN_IF",
            Self::Else                  => "ELSE",
            Self::EndIf                 => "END_IF",
            Self::WaitTime              => "WAIT_TIME",
            Self::AddComponent          => "ADD_COMPONENT",
            Self::WaitForAll            => "WAIT_FOR_ALL",
            Self::WaitForFirst          => "WAIT_FOR_FIRST",
            Self::WaitUntil             => "WAIT_UNTIL",
            Self::WaitFrames            => "WAIT_FRAMES",
            Self::WaitForMessage        => "WAIT_FOR_MESSAGE",
            Self::WaitForMessageWhere   => "WAIT_FOR_MESSAGE_WHERE",
            Self::RemoveComponent       => "REMOVE_COMPONENT",
            Self::RemoveEntitiesByQuery => "REMOVE_ENTITIES_BY_QUERY",
            Self::RemoveEntity          => "REMOVE_ENTITY",
            Self::SendMessage           => "SEND_MESSAGE",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which component REMOVE_COMPONENT targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentSelector {
    Id(ComponentId),
    /// Looked up on the target entity with `find_component_by_name`.
    Name(String),
}

impl From<ComponentId> for ComponentSelector {
    fn from(id: ComponentId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ComponentSelector {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ComponentSelector {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// An instruction and its parameters. `None` targets mean the chain's
/// own entity.
pub(crate) enum Command {
    BeginRepeat { times: Lazy<u32>, infinite: bool },
    EndRepeat,
    Call(Action),
    BeginWhile(Predicate),
    EndWhile,
    BeginInterval { seconds: Lazy<Seconds> },
    EndInterval,
    BeginIf(Predicate),
    Else,
    EndIf,
    WaitTime { seconds: Lazy<Seconds> },
    AddComponent { component: ComponentSource, target: Option<Lazy<EntityId>> },
    WaitForAll(ComponentSet),
    WaitForFirst(ComponentSet),
    WaitUntil(Predicate),
    WaitFrames { frames: Lazy<u32> },
    WaitForMessage { key: Lazy<String> },
    WaitForMessageWhere { key: Lazy<String>, condition: Lazy<Condition> },
    RemoveComponent { selector: Lazy<ComponentSelector>, target: Option<Lazy<EntityId>> },
    RemoveEntitiesByQuery { condition: Lazy<Condition> },
    RemoveEntity { target: Option<Lazy<EntityId>> },
    SendMessage { key: Lazy<String>, data: Lazy<serde_json::Value> },
}

impl Command {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::BeginRepeat { .. }           => OpCode::BeginRepeat,
            Self::EndRepeat                    => OpCode::EndRepeat,
            Self::Call(_)                      => OpCode::Call,
            Self::BeginWhile(_)                => OpCode::BeginWhile,
            Self::EndWhile                     => OpCode::EndWhile,
            Self::BeginInterval { .. }         => OpCode::BeginInterval,
            Self::EndInterval                  => OpCode::EndInterval,
            Self::BeginIf(_)                   => OpCode::BeginIf,
            Self::Else                         => OpCode::Else,
            Self::EndIf                        => OpCode::EndIf,
            Self::WaitTime { .. }              => OpCode::WaitTime,
            Self::AddComponent { .. }          => OpCode::AddComponent,
            Self::WaitForAll(_)                => OpCode::WaitForAll,
            Self::WaitForFirst(_)              => OpCode::WaitForFirst,
            Self::WaitUntil(_)                 => OpCode::WaitUntil,
            Self::WaitFrames { .. }            => OpCode::WaitFrames,
            Self::WaitForMessage { .. }        => OpCode::WaitForMessage,
            Self::WaitForMessageWhere { .. }   => OpCode::WaitForMessageWhere,
            Self::RemoveComponent { .. }       => OpCode::RemoveComponent,
            Self::RemoveEntitiesByQuery { .. } => OpCode::RemoveEntitiesByQuery,
            Self::RemoveEntity { .. }          => OpCode::RemoveEntity,
            Self::SendMessage { .. }           => OpCode::SendMessage,
        }
    }
}

pub(crate) struct CommandNode {
    pub command:  Command,
    pub next:     Option<NodeId>,
    pub previous: Option<NodeId>,
    /// BEGIN_IF: its matching ELSE or END_IF. ELSE: its matching END_IF.
    pub jump:     Option<NodeId>,
}

impl CommandNode {
    pub fn new(command: Command) -> Self {
        Self { command, next: None, previous: None, jump: None }
    }

    pub fn opcode(&self) -> OpCode {
        self.command.opcode()
    }

    /// Forget every cached parameter so the next visit resolves afresh.
    pub fn reset_cache(&mut self) {
        match &mut self.command {
            Command::BeginRepeat { times, infinite } => {
                times.reset();
                *infinite = false;
            }
            Command::BeginInterval { seconds } | Command::WaitTime { seconds } => seconds.reset(),
            Command::AddComponent { target, .. } | Command::RemoveEntity { target } => {
                if let Some(target) = target {
                    target.reset();
                }
            }
            Command::WaitFrames { frames } => frames.reset(),
            Command::WaitForMessage { key } => key.reset(),
            Command::WaitForMessageWhere { key, condition } => {
                key.reset();
                condition.reset();
            }
            Command::RemoveComponent { selector, target } => {
                selector.reset();
                if let Some(target) = target {
                    target.reset();
                }
            }
            Command::RemoveEntitiesByQuery { condition } => condition.reset(),
            Command::SendMessage { key, data } => {
                key.reset();
                data.reset();
            }
            Command::EndRepeat
            | Command::Call(_)
            | Command::BeginWhile(_)
            | Command::EndWhile
            | Command::EndInterval
            | Command::BeginIf(_)
            | Command::Else
            | Command::EndIf
            | Command::WaitForAll(_)
            | Command::WaitForFirst(_)
            | Command::WaitUntil(_) => {}
        }
    }
}
