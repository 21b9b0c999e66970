//! Determinism verification tests
//!
//! Tests to ensure a model produces identical results given the same seed.

use rand::seq::SliceRandom;
use rand::Rng;

use abm_core::{
    ActivationPolicy, Agent, AgentError, AgentId, Capabilities, Context, Coord, Grid, Model,
    SpatialIndex,
};

/// Random walker on a torus
struct Wanderer {
    moves: u32,
}

#[derive(Default)]
struct Trace {
    order: Vec<AgentId>,
    rolls: Vec<u32>,
}

impl Agent for Wanderer {
    type Space = Grid;
    type Shared = Trace;

    fn capabilities(&self) -> Capabilities {
        Capabilities::step()
    }

    fn step(&mut self, cx: &mut Context<'_, Self>) -> Result<(), AgentError> {
        cx.shared.order.push(cx.id());
        let roll = cx.rng.0.gen_range(0..1000);
        cx.shared.rolls.push(roll);

        let Some(here) = cx.position() else {
            return Ok(());
        };
        let options = cx.space().neighborhood_cells(here, 1, false);
        if let Some(&target) = options.choose(&mut cx.rng.0) {
            cx.place(target)?;
            self.moves += 1;
        }
        Ok(())
    }
}

fn build(seed: u64) -> Model<Wanderer> {
    let mut model = Model::new(Grid::new(10, 10, true), ActivationPolicy::Random, Some(seed), Trace::default());
    let (agents, rng, _) = model.split_mut();
    for _ in 0..15 {
        let id = agents.add(Wanderer { moves: 0 }).unwrap();
        let cell = agents.space().random_empty_cell(&mut rng.0).unwrap();
        agents.place(id, cell).unwrap();
    }
    model
}

fn positions(model: &Model<Wanderer>) -> Vec<(AgentId, Option<Coord>)> {
    model
        .agents()
        .all_identities()
        .into_iter()
        .map(|id| (id, model.space().position_of(id)))
        .collect()
}

/// Same seed gives the same activation orders and final state
#[test]
fn test_same_seed_same_run() {
    let mut first = build(42);
    let mut second = build(42);

    first.run(25).unwrap();
    second.run(25).unwrap();

    assert_eq!(first.shared().order, second.shared().order, "Activation orders should match");
    assert_eq!(first.shared().rolls, second.shared().rolls);
    assert_eq!(positions(&first), positions(&second), "Final positions should match");
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

/// Different seeds diverge
#[test]
fn test_different_seeds_diverge() {
    let mut first = build(42);
    let mut second = build(43);

    first.run(10).unwrap();
    second.run(10).unwrap();

    assert_ne!(first.shared().order, second.shared().order, "Different seeds should produce different orders");
}

/// Reseeding mid-run makes the rest of the run reproducible
#[test]
fn test_reset_randomizer() {
    let mut first = build(1);
    let mut second = build(1);
    let mut other = build(1);

    for model in [&mut first, &mut second, &mut other] {
        model.run(3).unwrap();
    }
    first.reset_randomizer(Some(99));
    second.reset_randomizer(Some(99));
    other.reset_randomizer(Some(100));
    assert_eq!(first.seed(), 99);

    for model in [&mut first, &mut second, &mut other] {
        model.run(5).unwrap();
    }

    assert_eq!(first.shared().rolls, second.shared().rolls);
    assert_eq!(positions(&first), positions(&second));
    assert_ne!(first.shared().rolls, other.shared().rolls);
}

/// Reseeding without a seed replays the stream from the recorded seed
#[test]
fn test_reset_randomizer_without_seed_replays() {
    let mut model: Model<Wanderer> =
        Model::new(Grid::new(4, 4, true), ActivationPolicy::Random, Some(7), Trace::default());
    let first: Vec<u32> = (0..5).map(|_| model.rng_mut().0.gen()).collect();

    model.reset_randomizer(None);
    assert_eq!(model.seed(), 7);
    let replay: Vec<u32> = (0..5).map(|_| model.rng_mut().0.gen()).collect();
    assert_eq!(first, replay, "Reset should restart the stream from the same seed");

    // A populated model reset mid-run repeats the same step afterwards
    let mut populated = build(3);
    populated.reset_randomizer(None);
    populated.run(1).unwrap();
    let rolls = populated.shared().rolls.clone();
    populated.reset_randomizer(None);
    populated.shared_mut().rolls.clear();
    populated.run(1).unwrap();
    assert_eq!(populated.seed(), 3);
    assert_eq!(populated.shared().rolls, rolls);
}

/// Every walker moves once per step on an unbounded-capacity torus
#[test]
fn test_walkers_move_every_step() {
    let mut model = build(7);
    model.run(4).unwrap();

    for (_, walker) in model.agents().iter() {
        assert_eq!(walker.moves, 4);
    }
    assert_eq!(model.space().len(), 15);
}
