//! Fluent construction of chains, plus merging and splicing.
//!
//! Every builder method appends one command at the tail. Methods taking a
//! literal have a `_with` twin taking a producer, which runs once each
//! time the command is reached.

use super::{
    node::{Command, CommandNode, ComponentSelector, NodeId},
    param::{ComponentRef, ComponentSet, ComponentSource, Lazy, Param},
    ChainComponent,
};
use crate::{
    component::Component,
    error::{EngineError, EngineResult},
    query::Condition,
    scene::Context,
    types::{EntityId, Seconds},
};

impl ChainComponent {
    fn push(mut self, command: Command) -> Self {
        let id = self.nodes.len();
        let mut node = CommandNode::new(command);
        node.previous = self.tail;
        self.nodes.push(node);
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.jumps_dirty = true;
        self
    }

    // ── Loops ──────────────────────────────────────────────────

    /// Repeat the block up to `end_repeat` `times` times; 0 repeats forever.
    pub fn begin_repeat(self, times: u32) -> Self {
        self.begin_repeat_with(Param::Value(times))
    }

    pub fn begin_repeat_with(self, times: impl Into<Param<u32>>) -> Self {
        self.push(Command::BeginRepeat { times: Lazy::new(times.into()), infinite: false })
    }

    pub fn end_repeat(self) -> Self {
        self.push(Command::EndRepeat)
    }

    /// Loop while `predicate` holds. The predicate is checked at
    /// `end_while`, so the body always runs at least once.
    pub fn begin_while(self, predicate: impl FnMut() -> bool + 'static) -> Self {
        self.push(Command::BeginWhile(Box::new(predicate)))
    }

    pub fn end_while(self) -> Self {
        self.push(Command::EndWhile)
    }

    /// Run the block every `seconds`, forever. Leave it with `interrupt_if`
    /// or a `call` that finishes the chain.
    pub fn begin_interval(self, seconds: Seconds) -> Self {
        self.begin_interval_with(Param::Value(seconds))
    }

    pub fn begin_interval_with(self, seconds: impl Into<Param<Seconds>>) -> Self {
        self.push(Command::BeginInterval { seconds: Lazy::new(seconds.into()) })
    }

    pub fn end_interval(self) -> Self {
        self.push(Command::EndInterval)
    }

    // ── Branches ───────────────────────────────────────────────

    pub fn begin_if(self, predicate: impl FnMut() -> bool + 'static) -> Self {
        self.push(Command::BeginIf(Box::new(predicate)))
    }

    pub fn else_(self) -> Self {
        self.push(Command::Else)
    }

    pub fn end_if(self) -> Self {
        self.push(Command::EndIf)
    }

    // ── Actions ────────────────────────────────────────────────

    pub fn call(
        self,
        action: impl FnMut(&mut Context<'_>) -> EngineResult<()> + 'static,
    ) -> Self {
        self.push(Command::Call(Box::new(action)))
    }

    /// Attach a component to the chain's own entity and move on.
    pub fn add_component<C: Component>(self, component: C) -> Self {
        self.add_source(None, ComponentSource::instance(component))
    }

    /// Attach a fresh component from `factory` every time this is reached.
    pub fn add_component_with<C: Component>(self, factory: impl FnMut() -> C + 'static) -> Self {
        self.add_source(None, ComponentSource::factory(factory))
    }

    pub fn add_component_to(self, target: impl Into<Param<EntityId>>, source: ComponentSource) -> Self {
        self.add_source(Some(target.into()), source)
    }

    fn add_source(self, target: Option<Param<EntityId>>, component: ComponentSource) -> Self {
        self.push(Command::AddComponent { component, target: target.map(Lazy::new) })
    }

    /// Remove a component, by id or by name on the chain's own entity.
    pub fn remove_component(self, selector: impl Into<ComponentSelector>) -> Self {
        self.push(Command::RemoveComponent {
            selector: Lazy::new(Param::Value(selector.into())),
            target:   None,
        })
    }

    pub fn remove_component_from(
        self,
        target: impl Into<Param<EntityId>>,
        selector: impl Into<Param<ComponentSelector>>,
    ) -> Self {
        self.push(Command::RemoveComponent {
            selector: Lazy::new(selector.into()),
            target:   Some(Lazy::new(target.into())),
        })
    }

    pub fn remove_entity(self, target: impl Into<Param<EntityId>>) -> Self {
        self.push(Command::RemoveEntity { target: Some(Lazy::new(target.into())) })
    }

    /// Remove the chain's own entity (and so the chain itself, at the end
    /// of the frame).
    pub fn remove_self(self) -> Self {
        self.push(Command::RemoveEntity { target: None })
    }

    pub fn remove_entities_where(self, condition: impl Into<Param<Condition>>) -> Self {
        self.push(Command::RemoveEntitiesByQuery { condition: Lazy::new(condition.into()) })
    }

    /// Send a message with the chain's own entity as origin.
    pub fn send_message(self, key: impl Into<String>, data: serde_json::Value) -> Self {
        self.send_message_with(key, Param::Value(data))
    }

    pub fn send_message_with(
        self,
        key: impl Into<String>,
        data: impl Into<Param<serde_json::Value>>,
    ) -> Self {
        self.push(Command::SendMessage {
            key:  Lazy::new(Param::Value(key.into())),
            data: Lazy::new(data.into()),
        })
    }

    // ── Waits ──────────────────────────────────────────────────

    /// Wait until more than `seconds` have passed since the command was reached.
    pub fn wait_time(self, seconds: Seconds) -> Self {
        self.wait_time_with(Param::Value(seconds))
    }

    pub fn wait_time_with(self, seconds: impl Into<Param<Seconds>>) -> Self {
        self.push(Command::WaitTime { seconds: Lazy::new(seconds.into()) })
    }

    /// Wait `frames` further frames; `wait_frames(0)` yields exactly one frame.
    pub fn wait_frames(self, frames: u32) -> Self {
        self.wait_frames_with(Param::Value(frames))
    }

    pub fn wait_frames_with(self, frames: impl Into<Param<u32>>) -> Self {
        self.push(Command::WaitFrames { frames: Lazy::new(frames.into()) })
    }

    /// Wait for as long as `predicate` holds, and move on once it returns
    /// false.
    ///
    /// Note the polarity: despite the name, this does not wait for the
    /// predicate to become true. Chains written against this engine rely
    /// on it, so it is kept as is.
    pub fn wait_until(self, predicate: impl FnMut() -> bool + 'static) -> Self {
        self.push(Command::WaitUntil(Box::new(predicate)))
    }

    pub fn wait_for_message(self, key: impl Into<String>) -> Self {
        self.push(Command::WaitForMessage { key: Lazy::new(Param::Value(key.into())) })
    }

    /// Wait for a message on `key` whose origin entity satisfies `condition`.
    pub fn wait_for_message_where(
        self,
        key: impl Into<String>,
        condition: impl Into<Param<Condition>>,
    ) -> Self {
        self.push(Command::WaitForMessageWhere {
            key:       Lazy::new(Param::Value(key.into())),
            condition: Lazy::new(condition.into()),
        })
    }

    /// Attach the new members to the chain's entity and wait until every
    /// member has finished.
    pub fn wait_for_all(self, members: Vec<ComponentRef>) -> Self {
        self.push(Command::WaitForAll(ComponentSet::Members(Some(members))))
    }

    pub fn wait_for_all_with(self, factory: impl FnMut() -> Vec<ComponentRef> + 'static) -> Self {
        self.push(Command::WaitForAll(ComponentSet::Factory(Box::new(factory))))
    }

    /// Attach the new members and wait until any one finishes; the others
    /// are finished on the spot.
    pub fn wait_for_first(self, members: Vec<ComponentRef>) -> Self {
        self.push(Command::WaitForFirst(ComponentSet::Members(Some(members))))
    }

    pub fn wait_for_first_with(self, factory: impl FnMut() -> Vec<ComponentRef> + 'static) -> Self {
        self.push(Command::WaitForFirst(ComponentSet::Factory(Box::new(factory))))
    }

    // ── Control ────────────────────────────────────────────────

    /// Finish the chain as soon as `predicate` holds, wherever it is.
    /// Checked before every command.
    pub fn interrupt_if(mut self, predicate: impl FnMut() -> bool + 'static) -> Self {
        self.interrupts.push(Box::new(predicate));
        self
    }

    // ── Restructuring ──────────────────────────────────────────

    fn ensure_idle(&self) -> EngineResult<()> {
        if self.started || self.attached {
            return Err(EngineError::ChainRunning { chain: self.name.clone() });
        }
        Ok(())
    }

    /// Append `donor`'s commands after this chain's. `donor` is left empty.
    /// Fails if either chain is already running.
    pub fn merge_with(&mut self, donor: &mut ChainComponent) -> EngineResult<()> {
        self.ensure_idle()?;
        donor.ensure_idle()?;
        let Some((head, tail)) = self.adopt(donor) else {
            return Ok(());
        };
        match self.tail {
            Some(old_tail) => {
                self.nodes[old_tail].next = Some(head);
                self.nodes[head].previous = Some(old_tail);
            }
            None => self.head = Some(head),
        }
        self.tail = Some(tail);
        Ok(())
    }

    /// Prepend `donor`'s commands before this chain's. `donor` is left empty.
    /// Fails if either chain is already running.
    pub fn merge_at_beginning(&mut self, donor: &mut ChainComponent) -> EngineResult<()> {
        self.ensure_idle()?;
        donor.ensure_idle()?;
        let Some((head, tail)) = self.adopt(donor) else {
            return Ok(());
        };
        match self.head {
            Some(old_head) => {
                self.nodes[tail].next = Some(old_head);
                self.nodes[old_head].previous = Some(tail);
            }
            None => self.tail = Some(tail),
        }
        self.head = Some(head);
        Ok(())
    }

    /// Move `donor`'s reachable nodes into this arena, linked in order.
    /// Returns the moved (head, tail).
    fn adopt(&mut self, donor: &mut ChainComponent) -> Option<(NodeId, NodeId)> {
        let order: Vec<NodeId> = donor.walk().collect();
        let mut pool: Vec<Option<CommandNode>> =
            std::mem::take(&mut donor.nodes).into_iter().map(Some).collect();
        donor.head = None;
        donor.tail = None;
        donor.jumps_dirty = true;

        let first = self.nodes.len();
        for id in order {
            if let Some(node) = pool[id].take() {
                self.nodes.push(node);
            }
        }
        let end = self.nodes.len();
        if first == end {
            return None;
        }
        for i in first..end {
            let node = &mut self.nodes[i];
            node.previous = (i > first).then(|| i - 1);
            node.next = (i + 1 < end).then(|| i + 1);
            node.jump = None;
        }
        self.jumps_dirty = true;
        Some((first, end - 1))
    }

    /// Splice the last command out of a chain that is not running.
    pub fn remove_last(&mut self) -> EngineResult<()> {
        self.ensure_idle()?;
        let Some(tail) = self.tail else {
            return Ok(());
        };
        let previous = self.nodes[tail].previous.take();
        match previous {
            Some(previous) => self.nodes[previous].next = None,
            None => self.head = None,
        }
        self.tail = previous;
        self.jumps_dirty = true;
        Ok(())
    }
}
