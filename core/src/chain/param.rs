//! Command parameters: a literal, or a producer called once per pass.
//!
//! RULE: a producer is invoked the first time its node is visited in a
//! pass and the result is cached until the node's cache is reset. Waiting
//! on a node for many frames never re-invokes its producers.

use crate::{
    component::Component,
    types::ComponentId,
};
use std::fmt;

pub enum Param<T> {
    Value(T),
    Producer(Box<dyn FnMut() -> T>),
}

impl<T> Param<T> {
    pub fn producer(f: impl FnMut() -> T + 'static) -> Self {
        Self::Producer(Box::new(f))
    }
}

impl<T: Clone> Param<T> {
    fn produce(&mut self) -> T {
        match self {
            Self::Value(v) => v.clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl<T> From<T> for Param<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// A parameter together with its per-pass cache.
#[derive(Debug)]
pub(crate) struct Lazy<T> {
    raw:    Param<T>,
    cached: Option<T>,
}

impl<T: Clone> Lazy<T> {
    pub fn new(raw: Param<T>) -> Self {
        Self { raw, cached: None }
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Resolve once per pass; later calls return the cached value.
    pub fn cache(&mut self) -> &mut T {
        let raw = &mut self.raw;
        self.cached.get_or_insert_with(|| raw.produce())
    }

    pub fn reset(&mut self) {
        self.cached = None;
    }
}

/// A component to attach: a one-shot instance or a factory.
pub enum ComponentSource {
    Instance(Option<Box<dyn Component>>),
    Factory(Box<dyn FnMut() -> Box<dyn Component>>),
}

impl ComponentSource {
    pub fn instance<C: Component>(component: C) -> Self {
        Self::Instance(Some(Box::new(component)))
    }

    pub fn factory<C: Component>(mut f: impl FnMut() -> C + 'static) -> Self {
        Self::Factory(Box::new(move || Box::new(f()) as Box<dyn Component>))
    }

    /// `None` once a literal instance has been handed out.
    pub(crate) fn produce(&mut self) -> Option<Box<dyn Component>> {
        match self {
            Self::Instance(slot) => slot.take(),
            Self::Factory(f) => Some(f()),
        }
    }
}

/// One member of a WAIT_FOR_ALL / WAIT_FOR_FIRST set.
pub enum ComponentRef {
    /// Attached to the chain's owner when the set is resolved.
    New(Box<dyn Component>),
    /// Already in the scene; only awaited.
    Running(ComponentId),
}

impl ComponentRef {
    pub fn new<C: Component>(component: C) -> Self {
        Self::New(Box::new(component))
    }
}

impl From<ComponentId> for ComponentRef {
    fn from(id: ComponentId) -> Self {
        Self::Running(id)
    }
}

impl From<Box<dyn Component>> for ComponentRef {
    fn from(component: Box<dyn Component>) -> Self {
        Self::New(component)
    }
}

/// The set awaited by WAIT_FOR_ALL / WAIT_FOR_FIRST.
pub enum ComponentSet {
    Members(Option<Vec<ComponentRef>>),
    Factory(Box<dyn FnMut() -> Vec<ComponentRef>>),
}

impl ComponentSet {
    pub(crate) fn produce(&mut self) -> Option<Vec<ComponentRef>> {
        match self {
            Self::Members(members) => members.take(),
            Self::Factory(f) => Some(f()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    #[test]
    fn producer_runs_once_per_pass() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut lazy = Lazy::new(Param::producer(move || {
            counter.set(counter.get() + 1);
            counter.get() * 10
        }));

        assert!(!lazy.is_cached());
        assert_eq!(*lazy.cache(), 10);
        assert_eq!(*lazy.cache(), 10);
        assert_eq!(calls.get(), 1);

        lazy.reset();
        assert_eq!(*lazy.cache(), 20);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn cached_value_can_be_mutated_in_place() {
        let mut lazy = Lazy::new(Param::from(3u32));
        *lazy.cache() -= 1;
        assert_eq!(*lazy.cache(), 2);
        lazy.reset();
        assert_eq!(*lazy.cache(), 3);
    }
}
