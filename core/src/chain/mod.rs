//! The command-chain interpreter.
//!
//! A `ChainComponent` is a component holding a linked list of commands
//! and a cursor. Every frame the scene calls `on_update` once, and the
//! chain runs commands until one of them has to wait for a later frame
//! (a suspension point) or the list runs out.
//!
//! RULES:
//!   - The continuation is data: the cursor plus a small scratch record
//!     for whichever waiting command is active. No stack is kept across
//!     frames.
//!   - Commands that resolve instantly are chained within the same call,
//!     so a run of CALL / END_IF / satisfied waits costs no frames.
//!   - Interrupt predicates are checked before every command.
//!   - Leaving a node resets its parameter cache, except BEGIN_REPEAT,
//!     whose counter lives until its END_REPEAT lets the loop exit.

mod builder;
mod node;
mod param;
mod scope;

pub use node::{ComponentSelector, NodeId, OpCode};
pub use param::{ComponentRef, ComponentSet, ComponentSource, Param};
pub use scope::ScopeStack;

use crate::{
    bus::Message,
    component::Component,
    error::{EngineError, EngineResult},
    query::Condition,
    scene::Context,
    types::{ComponentId, Seconds},
};
use node::{Command, CommandNode, Predicate};
use std::any::Any;

/// Where the cursor goes after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Move to the next node and keep going this frame.
    Advance,
    /// Move to the given node and keep going this frame.
    Jump(NodeId),
    /// Move to the node after the given one and keep going this frame.
    JumpPast(NodeId),
    /// Stay on this node until the next frame.
    Suspend,
}

/// Per-command wait state. Only one command waits at a time.
#[derive(Debug, Default)]
struct Scratch {
    wait_start:    Option<Seconds>,
    frames_waited: Option<u32>,
    message_key:   Option<String>,
    arrived:       bool,
    awaited:       Option<Vec<ComponentId>>,
}

pub struct ChainComponent {
    name:        String,
    nodes:       Vec<CommandNode>,
    head:        Option<NodeId>,
    tail:        Option<NodeId>,
    current:     Option<NodeId>,
    started:     bool,
    attached:    bool,
    finished:    bool,
    jumps_dirty: bool,
    scopes:      ScopeStack,
    scratch:     Scratch,
    interrupts:  Vec<Predicate>,
}

impl ChainComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:        name.into(),
            nodes:       Vec::new(),
            head:        None,
            tail:        None,
            current:     None,
            started:     false,
            attached:    false,
            finished:    false,
            jumps_dirty: true,
            scopes:      ScopeStack::new(),
            scratch:     Scratch::default(),
            interrupts:  Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stepped at least once and not finished yet.
    pub fn is_running(&self) -> bool {
        self.started && !self.finished
    }

    /// The command the cursor rests on (the one being waited on between frames).
    pub fn current_opcode(&self) -> Option<OpCode> {
        self.current.map(|id| self.nodes[id].opcode())
    }

    /// Commands in execution order.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.walk().map(|id| self.nodes[id].opcode()).collect()
    }

    pub fn len(&self) -> usize {
        self.walk().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn walk(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.head, move |id| self.nodes[*id].next)
    }

    /// Run commands until one suspends or the chain ends.
    fn step(&mut self, ctx: &mut Context<'_>, absolute: Seconds) -> EngineResult<()> {
        if self.finished {
            return Err(EngineError::ChainFinished { chain: self.name.clone() });
        }
        if self.jumps_dirty {
            self.resolve_jumps()?;
        }
        if !self.started {
            self.started = true;
            self.current = self.head;
            log::debug!("frame={} chain '{}': started with {} command(s)", ctx.frame(), self.name, self.len());
        }

        loop {
            // A CALL (or another component) finished us; the scene retires us.
            if ctx.is_finishing() {
                return Ok(());
            }
            if self.interrupts.iter_mut().any(|interrupt| interrupt()) {
                log::debug!("frame={} chain '{}': interrupted", ctx.frame(), self.name);
                self.complete(ctx);
                return Ok(());
            }

            let Some(id) = self.current else {
                if !self.scopes.is_empty() {
                    return Err(EngineError::UnterminatedScope {
                        chain: self.name.clone(),
                        depth: self.scopes.len(),
                    });
                }
                log::debug!("frame={} chain '{}': completed", ctx.frame(), self.name);
                self.complete(ctx);
                return Ok(());
            };

            match self.dispatch(id, ctx, absolute)? {
                Flow::Advance => {
                    self.leave(id);
                    self.current = self.nodes[id].next;
                }
                Flow::Jump(target) => self.current = Some(target),
                Flow::JumpPast(target) => {
                    self.leave(id);
                    self.current = self.nodes[target].next;
                }
                Flow::Suspend => return Ok(()),
            }
        }
    }

    fn leave(&mut self, id: NodeId) {
        if self.nodes[id].opcode() != OpCode::BeginRepeat {
            self.nodes[id].reset_cache();
        }
    }

    fn dispatch(&mut self, id: NodeId, ctx: &mut Context<'_>, absolute: Seconds) -> EngineResult<Flow> {
        let jump = self.nodes[id].jump;
        let opcode = self.nodes[id].opcode();
        log::trace!("frame={} chain '{}': {opcode} at node {id}", ctx.frame(), self.name);

        let flow = match &mut self.nodes[id].command {
            Command::BeginRepeat { times, infinite } => {
                let fresh = !times.is_cached();
                let n = *times.cache();
                if fresh {
                    *infinite = n == 0;
                }
                self.scopes.push(id);
                Flow::Advance
            }
            Command::EndRepeat => {
                let opener = self.pop_scope(opcode)?;
                match &mut self.nodes[opener].command {
                    Command::BeginRepeat { infinite: true, .. } => Flow::Jump(opener),
                    Command::BeginRepeat { times, infinite } => {
                        let remaining = times.cache();
                        *remaining = remaining.saturating_sub(1);
                        if *remaining > 0 {
                            Flow::Jump(opener)
                        } else {
                            times.reset();
                            *infinite = false;
                            Flow::Advance
                        }
                    }
                    other => return Err(scope_mismatch(&self.name, other.opcode(), opcode)),
                }
            }
            Command::Call(action) => {
                action(ctx)?;
                Flow::Advance
            }
            Command::BeginWhile(_) => {
                self.scopes.push(id);
                Flow::Advance
            }
            Command::EndWhile => {
                let opener = self.pop_scope(opcode)?;
                match &mut self.nodes[opener].command {
                    Command::BeginWhile(predicate) => {
                        if predicate() { Flow::Jump(opener) } else { Flow::Advance }
                    }
                    other => return Err(scope_mismatch(&self.name, other.opcode(), opcode)),
                }
            }
            Command::BeginInterval { seconds } => {
                let seconds = *seconds.cache();
                let start = *self.scratch.wait_start.get_or_insert(absolute);
                if absolute - start >= seconds {
                    self.scratch.wait_start = None;
                    self.scopes.push(id);
                    Flow::Advance
                } else {
                    Flow::Suspend
                }
            }
            Command::EndInterval => {
                let opener = self.pop_scope(opcode)?;
                match &self.nodes[opener].command {
                    Command::BeginInterval { .. } => Flow::Jump(opener),
                    other => return Err(scope_mismatch(&self.name, other.opcode(), opcode)),
                }
            }
            Command::BeginIf(predicate) => {
                if predicate() {
                    Flow::Advance
                } else {
                    Flow::JumpPast(jump.ok_or_else(|| unmatched(&self.name, opcode, "END_IF"))?)
                }
            }
            Command::Else => Flow::JumpPast(jump.ok_or_else(|| unmatched(&self.name, opcode, "END_IF"))?),
            Command::EndIf => Flow::Advance,
            Command::WaitTime { seconds } => {
                let seconds = *seconds.cache();
                let start = *self.scratch.wait_start.get_or_insert(absolute);
                if absolute - start > seconds {
                    self.scratch.wait_start = None;
                    Flow::Advance
                } else {
                    Flow::Suspend
                }
            }
            Command::AddComponent { component, target } => {
                let target = match target {
                    Some(target) => *target.cache(),
                    None => ctx.entity(),
                };
                let component = component.produce().ok_or_else(|| EngineError::ComponentConsumed {
                    chain: self.name.clone(),
                    opcode,
                })?;
                ctx.add_component(target, component)?;
                Flow::Advance
            }
            Command::WaitForAll(set) | Command::WaitForFirst(set) => {
                if self.scratch.awaited.is_none() {
                    let members = set.produce().ok_or_else(|| EngineError::ComponentConsumed {
                        chain: self.name.clone(),
                        opcode,
                    })?;
                    let owner = ctx.entity();
                    let mut ids = Vec::with_capacity(members.len());
                    for member in members {
                        ids.push(match member {
                            ComponentRef::New(component) => ctx.add_component(owner, component)?,
                            ComponentRef::Running(id) => id,
                        });
                    }
                    self.scratch.awaited = Some(ids);
                }

                let ids = self.scratch.awaited.as_deref().unwrap_or_default();
                let done = if opcode == OpCode::WaitForAll {
                    ids.iter().all(|id| ctx.is_component_done(*id))
                } else if ids.is_empty() {
                    true
                } else {
                    match ids.iter().position(|id| ctx.is_component_done(*id)) {
                        Some(winner) => {
                            for (i, loser) in ids.iter().enumerate() {
                                if i != winner && !ctx.is_component_done(*loser) {
                                    ctx.finish_component(*loser)?;
                                }
                            }
                            true
                        }
                        None => false,
                    }
                };

                if done {
                    self.scratch.awaited = None;
                    Flow::Advance
                } else {
                    Flow::Suspend
                }
            }
            Command::WaitUntil(predicate) => {
                if predicate() { Flow::Suspend } else { Flow::Advance }
            }
            Command::WaitFrames { frames } => {
                let frames = *frames.cache();
                match self.scratch.frames_waited {
                    None => {
                        self.scratch.frames_waited = Some(0);
                        Flow::Suspend
                    }
                    Some(waited) if waited + 1 > frames => {
                        self.scratch.frames_waited = None;
                        Flow::Advance
                    }
                    Some(waited) => {
                        self.scratch.frames_waited = Some(waited + 1);
                        Flow::Suspend
                    }
                }
            }
            Command::WaitForMessage { key } => {
                let key = key.cache().clone();
                await_message(&mut self.scratch, ctx, key, None)?
            }
            Command::WaitForMessageWhere { key, condition } => {
                let key = key.cache().clone();
                let condition = condition.cache().clone();
                await_message(&mut self.scratch, ctx, key, Some(condition))?
            }
            Command::RemoveComponent { selector, target } => {
                let target = match target {
                    Some(target) => *target.cache(),
                    None => ctx.entity(),
                };
                let component = match selector.cache() {
                    ComponentSelector::Id(id) => *id,
                    ComponentSelector::Name(name) => ctx
                        .find_component_by_name(target, name)
                        .ok_or_else(|| EngineError::ComponentNameNotFound {
                            entity: target,
                            name:   name.clone(),
                        })?,
                };
                ctx.remove_component(component)?;
                Flow::Advance
            }
            Command::RemoveEntitiesByQuery { condition } => {
                for entity in ctx.find_entities_where(condition.cache()) {
                    ctx.remove_entity(entity)?;
                }
                Flow::Advance
            }
            Command::RemoveEntity { target } => {
                let target = match target {
                    Some(target) => *target.cache(),
                    None => ctx.entity(),
                };
                ctx.remove_entity(target)?;
                Flow::Advance
            }
            Command::SendMessage { key, data } => {
                let key = key.cache().clone();
                let data = data.cache().clone();
                ctx.send_message(key, data);
                Flow::Advance
            }
        };
        Ok(flow)
    }

    fn pop_scope(&mut self, closer: OpCode) -> EngineResult<NodeId> {
        self.scopes.pop().ok_or_else(|| EngineError::EmptyScope {
            chain:  self.name.clone(),
            opcode: closer,
        })
    }

    /// Link every BEGIN_IF to its ELSE or END_IF and every ELSE to its
    /// END_IF in one pass. The targets are the ones a depth-counting
    /// forward scan would find; unmatched commands are reported here,
    /// before anything runs.
    fn resolve_jumps(&mut self) -> EngineResult<()> {
        let mut open: Vec<(NodeId, Option<NodeId>)> = Vec::new();
        let mut cursor = self.head;

        while let Some(id) = cursor {
            self.nodes[id].jump = None;
            match self.nodes[id].opcode() {
                OpCode::BeginIf => open.push((id, None)),
                OpCode::Else => match open.last_mut() {
                    Some((_, branch)) if branch.is_none() => *branch = Some(id),
                    _ => return Err(unmatched(&self.name, OpCode::Else, "BEGIN_IF")),
                },
                OpCode::EndIf => {
                    let (begin, branch) = open
                        .pop()
                        .ok_or_else(|| unmatched(&self.name, OpCode::EndIf, "BEGIN_IF"))?;
                    match branch {
                        Some(branch) => {
                            self.nodes[begin].jump = Some(branch);
                            self.nodes[branch].jump = Some(id);
                        }
                        None => self.nodes[begin].jump = Some(id),
                    }
                }
                _ => {}
            }
            cursor = self.nodes[id].next;
        }

        if !open.is_empty() {
            return Err(unmatched(&self.name, OpCode::BeginIf, "END_IF"));
        }
        self.jumps_dirty = false;
        Ok(())
    }

    /// Drop wait state and any bus subscription it holds.
    fn release(&mut self, ctx: &mut Context<'_>) {
        if let Some(key) = self.scratch.message_key.take() {
            ctx.unsubscribe(&key);
        }
        self.scratch = Scratch::default();
        self.scopes.clear();
        self.current = None;
    }

    fn complete(&mut self, ctx: &mut Context<'_>) {
        self.release(ctx);
        self.finished = true;
        ctx.finish();
    }
}

fn await_message(
    scratch: &mut Scratch,
    ctx: &mut Context<'_>,
    key: String,
    filter: Option<Condition>,
) -> EngineResult<Flow> {
    if scratch.message_key.is_none() {
        ctx.subscribe(&key, filter)?;
        scratch.message_key = Some(key);
        scratch.arrived = false;
        return Ok(Flow::Suspend);
    }
    if scratch.arrived {
        ctx.unsubscribe(&key);
        scratch.message_key = None;
        scratch.arrived = false;
        return Ok(Flow::Advance);
    }
    Ok(Flow::Suspend)
}

fn unmatched(chain: &str, opcode: OpCode, expected: &'static str) -> EngineError {
    EngineError::UnmatchedCommand { chain: chain.to_string(), opcode, expected }
}

fn scope_mismatch(chain: &str, opener: OpCode, closer: OpCode) -> EngineError {
    EngineError::ScopeMismatch { chain: chain.to_string(), opener, closer }
}

impl Component for ChainComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_init(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        self.attached = true;
        Ok(())
    }

    fn on_update(
        &mut self,
        ctx: &mut Context<'_>,
        _delta: Seconds,
        absolute: Seconds,
    ) -> EngineResult<()> {
        self.step(ctx, absolute)
    }

    fn on_message(&mut self, _ctx: &mut Context<'_>, message: &Message) -> EngineResult<()> {
        let waiting = self.current.is_some_and(|id| {
            matches!(self.nodes[id].opcode(), OpCode::WaitForMessage | OpCode::WaitForMessageWhere)
        });
        if waiting && self.scratch.message_key.as_deref() == Some(message.key.as_str()) {
            self.scratch.arrived = true;
        }
        Ok(())
    }

    fn on_finish(&mut self, ctx: &mut Context<'_>) -> EngineResult<()> {
        self.release(ctx);
        self.finished = true;
        Ok(())
    }

    fn on_detach(&mut self, ctx: &mut Context<'_>) -> EngineResult<()> {
        self.release(ctx);
        self.finished = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
