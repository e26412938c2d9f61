//! The scene: entities, their component slots, and the per-frame update.
//!
//! UPDATE ORDER (fixed, never reordered):
//!   1. Attach components added since the last update (on_init, on_attach).
//!   2. Deliver messages queued since the last update.
//!   3. on_update every RUNNING component, in id order.
//!   4. Deliver messages sent during step 3.
//!   5. Retire FINISHED / DETACHED components and remove doomed entities.
//!
//! RULES:
//!   - A component is moved out of its slot while one of its callbacks
//!     runs, and gets a `Context` borrowing the whole scene.
//!   - Structural changes (attach, finish, detach, entity removal) are
//!     deferred to the fixed points above, so they are safe from inside
//!     any callback.

use crate::{
    bus::{Message, MessageBus},
    component::{Component, ComponentState},
    error::{EngineError, EngineResult},
    event::SceneEvent,
    query::Condition,
    types::{ComponentId, EntityId, Frame, Seconds},
};
use std::collections::{BTreeMap, VecDeque};

/// A thin container. Behavior lives in its components.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id:     EntityId,
    pub name:   String,
    pub tag:    Option<String>,
    pub state:  u32,
    pub flags:  u32,
    components: Vec<ComponentId>,
    removing:   bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tag: None,
            state: 0,
            flags: 0,
            components: Vec::new(),
            removing: false,
        }
    }

    /// Attached (or about to be attached) components, in attach order.
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// True once `remove_entity` was called; the entity disappears at the
    /// end of the current update.
    pub fn is_removing(&self) -> bool {
        self.removing
    }
}

struct ComponentSlot {
    owner:       EntityId,
    name:        String,
    state:       ComponentState,
    initialized: bool,
    component:   Option<Box<dyn Component>>,
}

/// A message part-way through delivery when a subscriber's callback failed.
struct Delivery {
    message:    Message,
    recipients: VecDeque<(ComponentId, Option<Condition>)>,
}

#[derive(Default)]
pub struct Scene {
    next_entity:     u64,
    next_component:  u64,
    frame:           Frame,
    absolute:        Seconds,
    entities:        BTreeMap<EntityId, Entity>,
    slots:           BTreeMap<ComponentId, ComponentSlot>,
    pending_attach:  Vec<ComponentId>,
    interrupted:     Option<Delivery>,
    pending_removal: Vec<EntityId>,
    bus:             MessageBus,
    events:          Vec<SceneEvent>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn absolute(&self) -> Seconds {
        self.absolute
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    // ── Entities ───────────────────────────────────────────────

    pub fn add_entity(&mut self, name: impl Into<String>) -> EntityId {
        self.next_entity += 1;
        let id = EntityId(self.next_entity);
        let entity = Entity::new(id, name);
        self.events.push(SceneEvent::EntityAdded {
            frame:  self.frame,
            entity: id,
            name:   entity.name.clone(),
        });
        self.entities.insert(id, entity);
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Schedule an entity for removal. All of its components are detached
    /// at the end of the current (or next) update. Idempotent.
    pub fn remove_entity(&mut self, id: EntityId) -> EngineResult<()> {
        let entity = self.entities.get_mut(&id).ok_or(EngineError::EntityNotFound(id))?;
        if !entity.removing {
            entity.removing = true;
            self.pending_removal.push(id);
            log::debug!("frame={} scene: entity {id} scheduled for removal", self.frame);
        }
        Ok(())
    }

    /// Does the entity satisfy `condition`? Unknown entities never match.
    pub fn matches(&self, id: EntityId, condition: &Condition) -> bool {
        let Some(entity) = self.entities.get(&id) else {
            return false;
        };
        if !condition.matches_fields(entity) {
            return false;
        }
        match &condition.has_component {
            Some(name) => self.find_component_by_name(id, name).is_some(),
            None => true,
        }
    }

    /// Entities matching `condition`, in id order. Entities already
    /// scheduled for removal are skipped.
    pub fn find_entities_where(&self, condition: &Condition) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| !e.removing && self.matches(e.id, condition))
            .map(|e| e.id)
            .collect()
    }

    // ── Components ─────────────────────────────────────────────

    /// Add a component to an entity. It stays NEW until the start of the
    /// next update, when it is initialized, attached and starts running.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        component: Box<dyn Component>,
    ) -> EngineResult<ComponentId> {
        let owner = self.entities.get_mut(&entity).ok_or(EngineError::EntityNotFound(entity))?;
        self.next_component += 1;
        let id = ComponentId(self.next_component);
        owner.components.push(id);

        let name = component.name().to_string();
        log::debug!("frame={} scene: {name} ({id}) added to {entity}", self.frame);
        self.slots.insert(id, ComponentSlot {
            owner: entity,
            name,
            state: ComponentState::New,
            initialized: false,
            component: Some(component),
        });
        self.pending_attach.push(id);
        Ok(id)
    }

    pub fn attach<C: Component>(&mut self, entity: EntityId, component: C) -> EngineResult<ComponentId> {
        self.add_component(entity, Box::new(component))
    }

    /// Detach a component from its entity. Idempotent for components that
    /// already stopped.
    pub fn remove_component(&mut self, id: ComponentId) -> EngineResult<()> {
        self.stop(id, ComponentState::Detached)
    }

    /// Finish a component. Idempotent: finishing a component that already
    /// stopped does nothing and does not repeat its callbacks.
    pub fn finish_component(&mut self, id: ComponentId) -> EngineResult<()> {
        self.stop(id, ComponentState::Finished)
    }

    fn stop(&mut self, id: ComponentId, state: ComponentState) -> EngineResult<()> {
        let issued = self.was_issued(id);
        match self.slots.get_mut(&id) {
            Some(slot) => {
                if !slot.state.is_done() {
                    log::debug!("frame={} scene: {} ({id}) -> {state:?}", self.frame, slot.name);
                    slot.state = state;
                }
                Ok(())
            }
            None if issued => Ok(()),
            None => Err(EngineError::ComponentNotFound(id)),
        }
    }

    /// Lifecycle state of a component. `None` for ids this scene never issued.
    pub fn component_state(&self, id: ComponentId) -> Option<ComponentState> {
        match self.slots.get(&id) {
            Some(slot) => Some(slot.state),
            None if self.was_issued(id) => Some(ComponentState::Removed),
            None => None,
        }
    }

    /// Ids are never reused, so an issued id without a slot was retired.
    fn was_issued(&self, id: ComponentId) -> bool {
        id.0 > 0 && id.0 <= self.next_component
    }

    /// True if the component stopped running (or never existed here).
    pub fn is_component_done(&self, id: ComponentId) -> bool {
        self.component_state(id).is_none_or(ComponentState::is_done)
    }

    pub fn component_name(&self, id: ComponentId) -> Option<&str> {
        self.slots.get(&id).map(|s| s.name.as_str())
    }

    /// First component on `entity` with the given name that has not stopped.
    pub fn find_component_by_name(&self, entity: EntityId, name: &str) -> Option<ComponentId> {
        let entity = self.entities.get(&entity)?;
        entity.components.iter().copied().find(|id| {
            self.slots
                .get(id)
                .is_some_and(|s| s.name == name && !s.state.is_done())
        })
    }

    /// Borrow a component as its concrete type. `None` while the component
    /// is executing one of its own callbacks.
    pub fn component<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.slots
            .get(&id)?
            .component
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn component_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.slots
            .get_mut(&id)?
            .component
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// True when no component is running or waiting to be attached.
    pub fn is_idle(&self) -> bool {
        self.slots.values().all(|s| s.state.is_done())
    }

    // ── Bus ────────────────────────────────────────────────────

    pub fn send_message(
        &mut self,
        key: impl Into<String>,
        data: serde_json::Value,
        origin: Option<EntityId>,
    ) {
        let key = key.into();
        self.events.push(SceneEvent::MessageSent {
            frame:  self.frame,
            key:    key.clone(),
            origin,
        });
        self.bus.send(Message { key, data, origin });
    }

    pub fn subscribe(
        &mut self,
        key: &str,
        component: ComponentId,
        filter: Option<Condition>,
    ) -> EngineResult<()> {
        if !self.slots.contains_key(&component) {
            return Err(EngineError::ComponentNotFound(component));
        }
        self.bus.subscribe(key, component, filter);
        Ok(())
    }

    pub fn unsubscribe(&mut self, key: &str, component: ComponentId) {
        self.bus.unsubscribe(key, component);
    }

    // ── Frame ──────────────────────────────────────────────────

    /// Run one frame. The first error raised by a component callback is
    /// returned unchanged; the component is back in its slot by then.
    pub fn update(&mut self, delta: Seconds, absolute: Seconds) -> EngineResult<()> {
        self.frame += 1;
        self.absolute = absolute;

        self.attach_pending()?;
        self.dispatch_messages()?;

        let running: Vec<ComponentId> = self
            .slots
            .iter()
            .filter(|(_, s)| s.state == ComponentState::Running)
            .map(|(id, _)| *id)
            .collect();
        for id in running {
            // An earlier component may have stopped this one during the frame.
            if self.component_state(id) != Some(ComponentState::Running) {
                continue;
            }
            self.with_component(id, |c, ctx| c.on_update(ctx, delta, absolute))?;
        }

        self.dispatch_messages()?;
        self.retire()
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Move the component out of its slot, run `f` with a context, put it back.
    fn with_component<R>(
        &mut self,
        id: ComponentId,
        f: impl FnOnce(&mut dyn Component, &mut Context<'_>) -> EngineResult<R>,
    ) -> EngineResult<Option<R>> {
        let Some(slot) = self.slots.get_mut(&id) else {
            return Ok(None);
        };
        let owner = slot.owner;
        let mut component = slot.component.take().ok_or(EngineError::ComponentBusy(id))?;

        let result = {
            let mut ctx = Context { scene: self, entity: owner, component: id };
            f(&mut *component, &mut ctx)
        };

        if let Some(slot) = self.slots.get_mut(&id) {
            slot.component = Some(component);
        }
        result.map(Some)
    }

    /// Components queued by callbacks during this pass wait for the next
    /// update. If a callback fails, the failing component is detached and
    /// the rest of the batch goes back on the queue before the error is
    /// returned.
    fn attach_pending(&mut self) -> EngineResult<()> {
        let batch = std::mem::take(&mut self.pending_attach);
        for (i, &id) in batch.iter().enumerate() {
            if let Err(err) = self.attach_one(id) {
                log::warn!("frame={} scene: attaching {id} failed: {err}", self.frame);
                self.stop(id, ComponentState::Detached)?;
                self.pending_attach.splice(0..0, batch[i + 1..].iter().copied());
                return Err(err);
            }
        }
        Ok(())
    }

    fn attach_one(&mut self, id: ComponentId) -> EngineResult<()> {
        if self.component_state(id) != Some(ComponentState::New) {
            return Ok(());
        }
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.initialized = true;
        }
        self.with_component(id, |c, ctx| c.on_init(ctx))?;
        if !self.advance_state(id, ComponentState::New, ComponentState::Initialized) {
            return Ok(());
        }

        self.with_component(id, |c, ctx| c.on_attach(ctx))?;
        if !self.advance_state(id, ComponentState::Initialized, ComponentState::Running) {
            return Ok(());
        }

        if let Some(slot) = self.slots.get(&id) {
            self.events.push(SceneEvent::ComponentAttached {
                frame:     self.frame,
                entity:    slot.owner,
                component: id,
                name:      slot.name.clone(),
            });
        }
        Ok(())
    }

    /// Move `id` from `from` to `to`. False if a callback stopped it first.
    fn advance_state(&mut self, id: ComponentId, from: ComponentState, to: ComponentState) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) if slot.state == from => {
                slot.state = to;
                true
            }
            _ => false,
        }
    }

    /// Deliver queued messages. A failed delivery keeps the message and its
    /// remaining recipients, and the next dispatch resumes with them.
    fn dispatch_messages(&mut self) -> EngineResult<()> {
        loop {
            let mut delivery = match self.interrupted.take() {
                Some(delivery) => delivery,
                None => match self.bus.pop() {
                    Some(message) => Delivery {
                        recipients: self.bus.subscribers(&message.key).into(),
                        message,
                    },
                    None => return Ok(()),
                },
            };

            while let Some((component, filter)) = delivery.recipients.pop_front() {
                if self.component_state(component) != Some(ComponentState::Running) {
                    continue;
                }
                // An earlier delivery of this message may have unsubscribed it.
                if !self.bus.is_subscribed(&delivery.message.key, component) {
                    continue;
                }
                if let Some(filter) = &filter {
                    let passes = delivery
                        .message
                        .origin
                        .is_some_and(|origin| self.matches(origin, filter));
                    if !passes {
                        continue;
                    }
                }
                let message = &delivery.message;
                let result = self.with_component(component, |c, ctx| c.on_message(ctx, message));
                if let Err(err) = result {
                    self.interrupted = Some(delivery);
                    return Err(err);
                }
            }
        }
    }

    fn retire(&mut self) -> EngineResult<()> {
        loop {
            let doomed = std::mem::take(&mut self.pending_removal);
            for entity in &doomed {
                let ids = self
                    .entities
                    .get(entity)
                    .map(|e| e.components.clone())
                    .unwrap_or_default();
                for id in ids {
                    if let Some(slot) = self.slots.get_mut(&id) {
                        if !slot.state.is_done() {
                            slot.state = ComponentState::Detached;
                        }
                    }
                }
            }

            let stopping: Vec<ComponentId> = self
                .slots
                .iter()
                .filter(|(_, s)| matches!(s.state, ComponentState::Finished | ComponentState::Detached))
                .map(|(id, _)| *id)
                .collect();

            if doomed.is_empty() && stopping.is_empty() {
                return Ok(());
            }

            for id in stopping {
                self.retire_component(id)?;
            }

            for entity in doomed {
                let empty = self.entities.get(&entity).is_some_and(|e| e.components.is_empty());
                if empty {
                    self.entities.remove(&entity);
                    self.events.push(SceneEvent::EntityRemoved { frame: self.frame, entity });
                    log::debug!("frame={} scene: entity {entity} removed", self.frame);
                } else {
                    // A removal callback attached something new; detach it next pass.
                    self.pending_removal.push(entity);
                }
            }
        }
    }

    fn retire_component(&mut self, id: ComponentId) -> EngineResult<()> {
        let Some(slot) = self.slots.get(&id) else {
            return Ok(());
        };
        let (state, owner, name, initialized) =
            (slot.state, slot.owner, slot.name.clone(), slot.initialized);

        if initialized {
            self.with_component(id, |c, ctx| {
                match state {
                    ComponentState::Finished => c.on_finish(ctx)?,
                    ComponentState::Detached => c.on_detach(ctx)?,
                    _ => {}
                }
                c.on_remove(ctx)
            })?;
        }

        let event = match state {
            ComponentState::Finished => SceneEvent::ComponentFinished {
                frame: self.frame, entity: owner, component: id, name,
            },
            _ => SceneEvent::ComponentDetached {
                frame: self.frame, entity: owner, component: id, name,
            },
        };
        self.events.push(event);
        self.events.push(SceneEvent::ComponentRemoved {
            frame: self.frame, entity: owner, component: id,
        });

        self.bus.unsubscribe_all(id);
        self.slots.remove(&id);
        if let Some(entity) = self.entities.get_mut(&owner) {
            entity.components.retain(|c| *c != id);
        }
        Ok(())
    }
}

#[cfg(test)]
impl Scene {
    /// A context for `component`, outside of any update.
    pub(crate) fn context(&mut self, component: ComponentId) -> Option<Context<'_>> {
        let entity = self.slots.get(&component)?.owner;
        Some(Context { scene: self, entity, component })
    }
}

/// What a component sees of the scene during one of its callbacks.
pub struct Context<'a> {
    scene:     &'a mut Scene,
    entity:    EntityId,
    component: ComponentId,
}

impl<'a> Context<'a> {
    /// The entity owning the component being called.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// The component being called.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn frame(&self) -> Frame {
        self.scene.frame
    }

    pub fn absolute(&self) -> Seconds {
        self.scene.absolute
    }

    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    /// Finish the calling component. Idempotent.
    pub fn finish(&mut self) {
        if let Some(slot) = self.scene.slots.get_mut(&self.component) {
            if !slot.state.is_done() {
                log::debug!("frame={} scene: {} ({}) finished itself", self.scene.frame, slot.name, self.component);
                slot.state = ComponentState::Finished;
            }
        }
    }

    /// True once the calling component was finished or detached.
    pub fn is_finishing(&self) -> bool {
        self.scene.is_component_done(self.component)
    }

    pub fn add_component(
        &mut self,
        entity: EntityId,
        component: Box<dyn Component>,
    ) -> EngineResult<ComponentId> {
        self.scene.add_component(entity, component)
    }

    /// Add a component to the calling component's own entity.
    pub fn attach<C: Component>(&mut self, component: C) -> EngineResult<ComponentId> {
        self.scene.add_component(self.entity, Box::new(component))
    }

    pub fn remove_component(&mut self, id: ComponentId) -> EngineResult<()> {
        self.scene.remove_component(id)
    }

    pub fn finish_component(&mut self, id: ComponentId) -> EngineResult<()> {
        self.scene.finish_component(id)
    }

    pub fn component_state(&self, id: ComponentId) -> Option<ComponentState> {
        self.scene.component_state(id)
    }

    pub fn is_component_done(&self, id: ComponentId) -> bool {
        self.scene.is_component_done(id)
    }

    pub fn find_component_by_name(&self, entity: EntityId, name: &str) -> Option<ComponentId> {
        self.scene.find_component_by_name(entity, name)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.scene.entity_mut(id)
    }

    pub fn remove_entity(&mut self, id: EntityId) -> EngineResult<()> {
        self.scene.remove_entity(id)
    }

    pub fn find_entities_where(&self, condition: &Condition) -> Vec<EntityId> {
        self.scene.find_entities_where(condition)
    }

    /// Send a message with the calling component's entity as origin.
    pub fn send_message(&mut self, key: impl Into<String>, data: serde_json::Value) {
        self.scene.send_message(key, data, Some(self.entity));
    }

    pub fn subscribe(&mut self, key: &str, filter: Option<Condition>) -> EngineResult<()> {
        self.scene.subscribe(key, self.component, filter)
    }

    pub fn unsubscribe(&mut self, key: &str) {
        self.scene.unsubscribe(key, self.component);
    }
}
