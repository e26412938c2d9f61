//! chain-runner: headless demo runner for the chain interpreter.
//!
//! Wires a small watch-post scene out of chains, runs it, and prints the
//! scene event log as JSON lines followed by a summary.
//!
//! Usage:
//!   chain-runner --frames 600 --seed 7
//!   chain-runner --config engine.json --inspect
//!   chain-runner --quiet --json-summary
//!   RUST_LOG=debug chain-runner --quiet

use anyhow::{anyhow, Result};
use chainwork_core::{
    chain::{ChainComponent, ComponentRef, Param},
    component::Component,
    config::EngineConfig,
    engine::Engine,
    error::EngineResult,
    event::event_type_name,
    query::Condition,
    scene::Context,
    types::{EntityId, Seconds},
};
use serde_json::json;
use std::any::Any;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::env;
use std::rc::Rc;

/// Finishes itself after a fixed amount of simulated time.
struct Timer {
    name:    String,
    seconds: Seconds,
    started: Option<Seconds>,
}

impl Timer {
    fn new(name: &str, seconds: Seconds) -> Self {
        Self { name: name.to_string(), seconds, started: None }
    }
}

impl Component for Timer {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_update(&mut self, ctx: &mut Context<'_>, _delta: Seconds, absolute: Seconds) -> EngineResult<()> {
        let started = *self.started.get_or_insert(absolute);
        if absolute - started >= self.seconds {
            ctx.finish();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = args
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| w[1].as_str());
    let mut config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.seed = parse_arg(&args, "--seed", config.seed);
    config.frames = parse_arg(&args, "--frames", config.frames);
    let quiet = args.iter().any(|a| a == "--quiet");
    let inspect = args.iter().any(|a| a == "--inspect");
    let json_summary = args.iter().any(|a| a == "--json-summary");

    eprintln!("chain-runner");
    eprintln!("  seed:       {}", config.seed);
    eprintln!("  frames:     {}", config.frames);
    eprintln!("  frame_rate: {}", config.frame_rate);
    eprintln!("  speed:      {:?}", config.speed);
    eprintln!();

    let mut engine = Engine::new(config);
    let sightings = build_scene(&mut engine)?;

    let frames = engine.config().frames;
    let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut ran = 0;
    for _ in 0..frames {
        let events = engine.tick()?;
        ran += 1;
        for event in &events {
            *counts.entry(event_type_name(event)).or_default() += 1;
            if !quiet {
                println!("{}", serde_json::to_string(event)?);
            }
        }
        if engine.scene.is_idle() {
            break;
        }
    }

    if inspect {
        println!("{}", engine.scene.snapshot().to_json()?);
    }
    let summary = RunSummary {
        frames:    ran,
        seconds:   engine.clock.absolute,
        sightings: sightings.get(),
        entities:  engine.scene.entities().count(),
        idle:      engine.scene.is_idle(),
        events:    counts,
    };
    if json_summary {
        println!("{}", serde_json::to_string(&summary)?);
    }
    print_summary(&summary);
    Ok(())
}

/// Three entities:
///   - a sentry that reports a sighting every second, four times,
///   - an intruder that reports sightings at random intervals,
///   - a guard that only trusts sentry reports, and stands down after
///     three of them or a timeout, whichever comes first.
fn build_scene(engine: &mut Engine) -> Result<Rc<Cell<u32>>> {
    let sentry = spawn(engine, "sentry-1", Some("sentry"))?;
    let intruder = spawn(engine, "intruder", None)?;
    let guard = spawn(engine, "guard", Some("guard"))?;

    let reports = Rc::new(Cell::new(0u32));
    let sent = reports.clone();
    let counted = reports.clone();
    let sentry_chain = ChainComponent::new("sentry-watch")
        .interrupt_if(move || sent.get() >= 4)
        .begin_interval(1.0)
            .send_message("sighting", json!({ "by": "sentry-1" }))
            .call(move |_ctx| {
                counted.set(counted.get() + 1);
                Ok(())
            })
        .end_interval();
    engine.scene.attach(sentry, sentry_chain)?;

    let mut rng = engine.rng_for(intruder);
    let intruder_chain = ChainComponent::new("intruder-noise")
        .begin_repeat(5)
            .wait_time_with(Param::producer(move || rng.range(0.2, 1.2)))
            .send_message("sighting", json!({ "by": "intruder" }))
        .end_repeat()
        .remove_self();
    engine.scene.attach(intruder, intruder_chain)?;

    let sightings = Rc::new(Cell::new(0u32));
    let seen = sightings.clone();
    let guard_chain = ChainComponent::new("guard-duty")
        .wait_for_first(vec![
            ComponentRef::new(
                ChainComponent::new("confirmations")
                    .begin_repeat(3)
                        .wait_for_message_where("sighting", Condition::any().tag("sentry"))
                        .call(move |ctx| {
                            seen.set(seen.get() + 1);
                            log::info!("frame={} guard: confirmed sighting #{}", ctx.frame(), seen.get());
                            Ok(())
                        })
                    .end_repeat(),
            ),
            ComponentRef::new(Timer::new("shift-timeout", 10.0)),
        ])
        .send_message("all_clear", json!({}))
        .remove_entities_where(Condition::any().tag("sentry"))
        .call(|ctx| {
            let me = ctx.entity();
            if let Some(entity) = ctx.entity_mut(me) {
                entity.state = 1;
            }
            Ok(())
        });
    engine.scene.attach(guard, guard_chain)?;

    Ok(sightings)
}

fn spawn(engine: &mut Engine, name: &str, tag: Option<&str>) -> Result<EntityId> {
    let id = engine.scene.add_entity(name);
    let entity = engine
        .scene
        .entity_mut(id)
        .ok_or_else(|| anyhow!("entity {id} vanished right after creation"))?;
    entity.tag = tag.map(str::to_string);
    Ok(id)
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

#[derive(serde::Serialize)]
struct RunSummary {
    frames:     u64,
    seconds:    f64,
    sightings:  u32,
    entities:   usize,
    idle:       bool,
    events:     BTreeMap<&'static str, u64>,
}

fn print_summary(summary: &RunSummary) {
    eprintln!();
    eprintln!("═══ RUN SUMMARY ═══════════════════════════");
    eprintln!("  frames run:          {}", summary.frames);
    eprintln!("  simulated seconds:   {:.2}", summary.seconds);
    eprintln!("  confirmed sightings: {}", summary.sightings);
    eprintln!("  entities left:       {}", summary.entities);
    eprintln!("  idle:                {}", summary.idle);
    eprintln!("  events:");
    for (kind, count) in &summary.events {
        eprintln!("    {kind:<20} {count}");
    }
    eprintln!("═══════════════════════════════════════════");
}
