use crate::{
    chain::OpCode,
    types::{ComponentId, EntityId},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    #[error("Component {0} not found")]
    ComponentNotFound(ComponentId),

    #[error("No component named '{name}' on entity {entity}")]
    ComponentNameNotFound { entity: EntityId, name: String },

    #[error("Component {0} is already executing a callback")]
    ComponentBusy(ComponentId),

    // ── Structural chain errors ───────────────────────
    #[error("Chain '{chain}': {opcode} has no matching {expected}")]
    UnmatchedCommand {
        chain:    String,
        opcode:   OpCode,
        expected: &'static str,
    },

    #[error("Chain '{chain}': {opcode} found an empty scope stack")]
    EmptyScope { chain: String, opcode: OpCode },

    #[error("Chain '{chain}': {closer} closed a {opener} block")]
    ScopeMismatch {
        chain:  String,
        opener: OpCode,
        closer: OpCode,
    },

    #[error("Chain '{chain}' ran out of commands with {depth} open block(s)")]
    UnterminatedScope { chain: String, depth: usize },

    // ── Misuse ────────────────────────────────────────
    #[error("Chain '{chain}' is already running and cannot be restructured")]
    ChainRunning { chain: String },

    #[error("Chain '{chain}' has already finished")]
    ChainFinished { chain: String },

    #[error("Chain '{chain}': the component given to {opcode} was already attached; use a factory to attach one per pass")]
    ComponentConsumed { chain: String, opcode: OpCode },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
