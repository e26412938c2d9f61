//! WAIT_FOR_MESSAGE, WAIT_FOR_MESSAGE_WHERE and SEND_MESSAGE against the
//! scene's message bus.

mod common;

use chainwork_core::{
    chain::{ChainComponent, OpCode},
    component::ComponentState,
    event::SceneEvent,
    query::Condition,
};
use common::{engine, mark_frame, record, run, trace};
use serde_json::json;
use std::{cell::Cell, rc::Rc};

#[test]
fn external_message_is_seen_on_the_following_step() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("listener");
    let done_at = Rc::new(Cell::new(0));
    let chain = ChainComponent::new("mojo")
        .wait_for_message("MOJO")
        .call(mark_frame(&done_at));
    let id = engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 2);
    assert_eq!(done_at.get(), 0);
    assert!(engine.scene.bus().is_subscribed("MOJO", id));

    engine.scene.send_message("MOJO", json!(null), None);
    run(&mut engine, 1);
    assert_eq!(done_at.get(), 3);
    assert!(!engine.scene.bus().is_subscribed("MOJO", id));
}

#[test]
fn other_keys_do_not_wake_the_chain() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("listener");
    let done_at = Rc::new(Cell::new(0));
    let chain = ChainComponent::new("picky")
        .wait_for_message("open")
        .call(mark_frame(&done_at));
    engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 1);
    engine.scene.send_message("close", json!(1), None);
    run(&mut engine, 3);
    assert_eq!(done_at.get(), 0);
}

#[test]
fn chains_talk_through_send_message() {
    let mut engine = engine(60.0);
    let sender = engine.scene.add_entity("sender");
    let receiver = engine.scene.add_entity("receiver");
    let log = trace();

    // The sender has the lower component id, so it runs first in frame 1,
    // before the receiver has subscribed. Delivery happens after the
    // component pass, so the message still arrives.
    engine
        .scene
        .attach(sender, ChainComponent::new("ping").send_message("ping", json!({ "n": 1 })))
        .unwrap();
    engine
        .scene
        .attach(
            receiver,
            ChainComponent::new("pong")
                .wait_for_message("ping")
                .call(record(&log, "got ping")),
        )
        .unwrap();

    let events = engine.run_frames(2).unwrap();
    assert_eq!(*log.borrow(), vec!["got ping"]);
    assert!(events.iter().any(|e| matches!(
        e,
        SceneEvent::MessageSent { key, origin: Some(origin), .. } if key == "ping" && *origin == sender
    )));
}

#[test]
fn filtered_wait_ignores_other_origins() {
    let mut engine = engine(60.0);
    let stranger = engine.scene.add_entity("stranger");
    let sentry = engine.scene.add_entity("sentry");
    engine.scene.entity_mut(sentry).unwrap().tag = Some("sentry".into());
    let guard = engine.scene.add_entity("guard");

    let done_at = Rc::new(Cell::new(0));
    let chain = ChainComponent::new("guard")
        .wait_for_message_where("alarm", Condition::any().tag("sentry"))
        .call(mark_frame(&done_at));
    let id = engine.scene.attach(guard, chain).unwrap();
    run(&mut engine, 1);

    engine.scene.send_message("alarm", json!("no origin"), None);
    engine.scene.send_message("alarm", json!("untagged"), Some(stranger));
    run(&mut engine, 2);
    assert_eq!(done_at.get(), 0);
    let chain = engine.scene.component::<ChainComponent>(id).unwrap();
    assert_eq!(chain.current_opcode(), Some(OpCode::WaitForMessageWhere));

    engine.scene.send_message("alarm", json!("real"), Some(sentry));
    run(&mut engine, 1);
    assert_eq!(done_at.get(), 4);
}

#[test]
fn filter_can_come_from_a_producer() {
    let mut engine = engine(60.0);
    let listener = engine.scene.add_entity("listener");
    let loud = engine.scene.add_entity("loud");
    engine.scene.entity_mut(loud).unwrap().state = 3;

    let wanted = Rc::new(Cell::new(3u32));
    let state = wanted.clone();
    let done_at = Rc::new(Cell::new(0));
    let chain = ChainComponent::new("stateful")
        .wait_for_message_where(
            "shout",
            chainwork_core::chain::Param::producer(move || Condition::any().state(state.get())),
        )
        .call(mark_frame(&done_at));
    engine.scene.attach(listener, chain).unwrap();

    run(&mut engine, 1);
    engine.scene.send_message("shout", json!(null), Some(loud));
    run(&mut engine, 1);
    assert_eq!(done_at.get(), 2);
}

#[test]
fn interrupted_wait_drops_its_subscription() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("listener");
    let cancel = Rc::new(Cell::new(false));
    let check = cancel.clone();
    let chain = ChainComponent::new("cancellable")
        .interrupt_if(move || check.get())
        .wait_for_message("never");
    let id = engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 1);
    assert!(engine.scene.bus().is_subscribed("never", id));

    cancel.set(true);
    run(&mut engine, 1);
    assert!(!engine.scene.bus().is_subscribed("never", id));
    assert_eq!(engine.scene.component_state(id), Some(ComponentState::Removed));
}

#[test]
fn repeated_waits_need_one_message_each() {
    let mut engine = engine(60.0);
    let owner = engine.scene.add_entity("listener");
    let count = common::counter();
    let inc = count.clone();
    let chain = ChainComponent::new("three-knocks")
        .begin_repeat(3)
            .wait_for_message("knock")
            .call(move |_| {
                inc.set(inc.get() + 1);
                Ok(())
            })
        .end_repeat();
    let id = engine.scene.attach(owner, chain).unwrap();

    run(&mut engine, 1);
    for expected in 1..=3 {
        engine.scene.send_message("knock", json!(expected), None);
        run(&mut engine, 1);
        assert_eq!(count.get(), expected);
    }
    assert_eq!(engine.scene.component_state(id), Some(ComponentState::Removed));
}
