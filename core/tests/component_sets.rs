//! WAIT_FOR_ALL / WAIT_FOR_FIRST and ADD_COMPONENT.

mod common;

use chainwork_core::{
    chain::{ChainComponent, ComponentRef},
    component::ComponentState,
    error::EngineError,
};
use common::{engine, mark_frame, run, Probe};
use std::{cell::Cell, rc::Rc};

#[test]
fn wait_for_all_waits_for_the_slowest_member() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("boss");
    let fast = Probe::countdown("fast", 1);
    let slow = Probe::countdown("slow", 3);
    let (fast_hooks, slow_hooks) = (fast.hooks(), slow.hooks());

    let done_at = Rc::new(Cell::new(0));
    let chain = ChainComponent::new("all")
        .wait_for_all(vec![ComponentRef::new(fast), ComponentRef::new(slow)])
        .call(mark_frame(&done_at));
    engine.scene.attach(owner, chain).unwrap();

    // Members attach at frame 2; "slow" finishes during its third update
    // (frame 4) and the chain, which updates first, sees it at frame 5.
    run(&mut engine, 4);
    assert_eq!(done_at.get(), 0);
    run(&mut engine, 1);
    assert_eq!(done_at.get(), 5);

    assert_eq!(fast_hooks.update.get(), 1);
    assert_eq!(slow_hooks.update.get(), 3);
    assert_eq!(fast_hooks.finish.get(), 1);
    assert_eq!(slow_hooks.finish.get(), 1);
}

#[test]
fn wait_for_first_finishes_the_losers() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("racer");
    let fast = Probe::countdown("fast", 1);
    let slow = Probe::countdown("slow", 10);
    let slower = Probe::countdown("slower", 20);
    let (fast_hooks, slow_hooks, slower_hooks) = (fast.hooks(), slow.hooks(), slower.hooks());

    let done_at = Rc::new(Cell::new(0));
    let chain = ChainComponent::new("first")
        .wait_for_first(vec![
            ComponentRef::new(fast),
            ComponentRef::new(slow),
            ComponentRef::new(slower),
        ])
        .call(mark_frame(&done_at));
    engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 5);
    assert_eq!(done_at.get(), 3);

    // Both losers got one update before the chain finished them.
    for hooks in [&slow_hooks, &slower_hooks] {
        assert_eq!(hooks.update.get(), 1);
        assert_eq!(hooks.finish.get(), 1);
        assert_eq!(hooks.detach.get(), 0);
        assert_eq!(hooks.remove.get(), 1);
    }
    assert_eq!(fast_hooks.finish.get(), 1);
    assert!(engine.scene.find_component_by_name(owner, "slow").is_none());
    assert!(engine.scene.find_component_by_name(owner, "slower").is_none());
    assert!(engine.scene.is_idle());
}

#[test]
fn running_components_can_be_awaited() {
    let mut engine = engine(60.0);
    let worker = engine.scene.add_entity("worker");
    let boss = engine.scene.add_entity("boss");
    let job = engine.scene.attach(worker, Probe::countdown("job", 2)).unwrap();

    let done_at = Rc::new(Cell::new(0));
    let chain = ChainComponent::new("await-job")
        .wait_for_all(vec![ComponentRef::from(job)])
        .call(mark_frame(&done_at));
    engine.scene.attach(boss, chain).unwrap();

    // "job" has the lower id, so it updates before the chain. It finishes
    // during frame 2 and the chain sees that in the same frame.
    run(&mut engine, 5);
    assert_eq!(done_at.get(), 2);
    assert_eq!(engine.scene.component_state(job), Some(ComponentState::Removed));
}

#[test]
fn empty_sets_pass_immediately() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("idle");
    let all_at = Rc::new(Cell::new(0));
    let first_at = Rc::new(Cell::new(0));
    let chain = ChainComponent::new("empty")
        .wait_for_all(Vec::new())
        .call(mark_frame(&all_at))
        .wait_for_first(Vec::new())
        .call(mark_frame(&first_at));
    engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 1);
    assert_eq!(all_at.get(), 1);
    assert_eq!(first_at.get(), 1);
}

#[test]
fn factory_sets_are_rebuilt_every_pass() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("spawner");
    let built = common::counter();
    let count = built.clone();
    let chain = ChainComponent::new("waves")
        .begin_repeat(3)
            .wait_for_all_with(move || {
                count.set(count.get() + 1);
                vec![ComponentRef::new(Probe::countdown("wave", 1))]
            })
        .end_repeat();
    let id = engine.scene.attach(owner, chain).unwrap();

    let frames = engine.run_until_idle(100).unwrap();
    assert_eq!(built.get(), 3);
    assert!(engine.scene.is_component_done(id));
    // Each wave: added, attached next frame, finished, seen a frame later.
    assert_eq!(frames, 7);
}

#[test]
fn add_component_attaches_to_the_owner_next_frame() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("host");
    let probe = Probe::new("probe");
    let hooks = probe.hooks();
    let chain = ChainComponent::new("adder")
        .add_component(probe)
        .wait_frames(5);
    engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 1);
    let added = engine.scene.find_component_by_name(owner, "probe").unwrap();
    assert_eq!(engine.scene.component_state(added), Some(ComponentState::New));
    assert_eq!(hooks.init.get(), 0);

    run(&mut engine, 1);
    assert_eq!(engine.scene.component_state(added), Some(ComponentState::Running));
    assert_eq!((hooks.init.get(), hooks.attach.get(), hooks.update.get()), (1, 1, 1));
}

#[test]
fn add_component_to_another_entity() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("host");
    let other = engine.scene.add_entity("other");
    let chain = ChainComponent::new("gift")
        .add_component_to(other, chainwork_core::chain::ComponentSource::instance(Probe::new("gift")));
    engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 2);
    assert!(engine.scene.find_component_by_name(other, "gift").is_some());
    assert!(engine.scene.find_component_by_name(owner, "gift").is_none());
}

#[test]
fn literal_component_cannot_be_added_twice() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("host");
    let chain = ChainComponent::new("greedy")
        .begin_repeat(2)
            .add_component(Probe::new("once"))
        .end_repeat();
    engine.scene.attach(owner, chain).unwrap();

    let err = engine.tick().unwrap_err();
    assert!(matches!(err, EngineError::ComponentConsumed { .. }), "got {err}");
}

#[test]
fn factory_adds_a_fresh_component_every_pass() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("host");
    let chain = ChainComponent::new("generous")
        .begin_repeat(2)
            .add_component_with(|| Probe::new("copy"))
        .end_repeat();
    engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 2);
    let entity = engine.scene.entity(owner).unwrap();
    // The chain itself has been retired; the two copies remain.
    assert_eq!(entity.components().len(), 2);
}
