//! End-to-end scenarios for the simulate-then-evolve cycle.

use automaton_pathfinder::compute::{
    Agent, Epoch, EvolutionEngine, FitnessEvaluator, GenomeRng, Grid, MoveOutcome,
    adaptive_mutation_rate, genome_from_str, move_agent, save_checkpoint, simulate_epoch,
};
use automaton_pathfinder::schema::{EvolutionConfig, LearningConfig, PopulationConfig};

#[test]
fn test_straight_genome_reaches_goal_with_bonus() {
    let terrain = Grid::parse(
        "0 0 0 0 0\n\
         0 0 0 0 0\n\
         0 0 0 0 0\n\
         0 0 0 0 0\n\
         0 0 0 0 0",
    )
    .unwrap();
    let mut population = vec![Agent::new(genome_from_str("RRRRDDDD").unwrap(), [0; 3])];
    let mut rng = GenomeRng::new(1);

    let summary = simulate_epoch(
        &terrain,
        &mut population,
        &LearningConfig::default(),
        &mut rng,
    );

    let agent = &population[0];
    assert_eq!(summary.arrivals, 1);
    assert!(agent.reached_goal);
    assert!(!agent.alive);
    assert!(agent.steps <= 8);
    assert_eq!(agent.position, terrain.goal());
    assert_eq!(agent.fitness, 1125.0);
}

#[test]
fn test_out_of_bounds_gets_standard_fitness() {
    // Both in-bounds neighbors of START are occupied, so the UP symbol is forced.
    let terrain = Grid::parse("0 1 0\n1 0 0\n0 0 0").unwrap();
    let mut population = vec![Agent::new(genome_from_str("UUUUUUUUUUUUUUUUUU").unwrap(), [0; 3])];
    let learning = LearningConfig::default();
    let mut rng = GenomeRng::new(2);

    let mut epoch = Epoch::begin(&terrain, &mut population);
    epoch.advance(&mut population, &learning, &mut rng);
    epoch.finish(&mut population);

    let agent = &population[0];
    assert!(!agent.alive);
    assert!(agent.collided);
    assert!(!agent.reached_goal);

    let expected = FitnessEvaluator::new(3, 3).evaluate(agent);
    assert_eq!(agent.fitness, expected);
    assert!(agent.fitness < 1000.0);
}

#[test]
fn test_direct_move_out_of_bounds() {
    let terrain = Grid::parse("0 1 0\n1 0 0\n0 0 0").unwrap();
    let mut agent = Agent::new(genome_from_str("U").unwrap(), [0; 3]);
    agent.reset(terrain.start());
    let mut rng = GenomeRng::new(0);

    let outcome = move_agent(
        &mut agent,
        &terrain,
        terrain.goal(),
        &LearningConfig::default(),
        &mut rng,
    );
    assert_eq!(outcome, MoveOutcome::OutOfBounds);
    assert!(!agent.alive);
    assert!(agent.collided);
}

#[test]
fn test_stagnation_past_threshold_mutation_rate() {
    let threshold = 15;
    let rate = adaptive_mutation_rate(0.01, 0.2, threshold + 1, threshold);
    let expected: f32 = 0.01 * (1.0 + 1.6) * (1.0 + 2.0 * (threshold + 1) as f32 / threshold as f32);
    assert!((rate - expected.min(0.5)).abs() < 1e-6);
    assert!((rate - 0.081_466_67).abs() < 1e-5);
}

#[test]
fn test_small_run_keeps_population_and_checkpoints() {
    let terrain = Grid::parse(
        "0 0 0 1 0 0\n\
         0 0 1 0 0 0\n\
         0 0 0 0 1 0\n\
         1 0 0 0 0 0\n\
         0 0 1 0 0 0\n\
         0 0 0 0 0 0",
    )
    .unwrap();
    let config = EvolutionConfig {
        population: PopulationConfig {
            size: 30,
            max_generations: 5,
        },
        random_seed: Some(99),
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();

    let mut engine = EvolutionEngine::new(config.clone(), terrain.clone()).unwrap();
    let mut sizes = Vec::new();
    let result = engine.run_with_callback(None, |engine, report| {
        sizes.push(engine.population().len());
        assert!(report.generation_best >= 0.1);
        assert!((0.0..=1.0).contains(&report.diversity));
        assert!(report.mutation_rate <= 0.5);
    });

    assert_eq!(result.generations_run, 5);
    assert_eq!(sizes, vec![30; 5]);
    assert_eq!(result.history.len(), 5);
    assert!(result.state.best_fitness_ever >= 0.1);

    let path = save_checkpoint(dir.path(), engine.population(), engine.state()).unwrap();
    let mut resumed = EvolutionEngine::new(config, terrain).unwrap();
    assert!(resumed.restore_or_initialize(&path));
    assert_eq!(resumed.state().generation, 5);
    assert_eq!(resumed.population().len(), 30);

    let report = resumed.run_generation();
    assert_eq!(report.generation, 5);
    assert_eq!(resumed.population().len(), 30);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let terrain = Grid::parse("0 0 1 0\n0 1 0 0\n0 0 0 1\n1 0 0 0").unwrap();
    let config = EvolutionConfig {
        population: PopulationConfig {
            size: 20,
            max_generations: 3,
        },
        random_seed: Some(7),
        ..Default::default()
    };

    let run = || {
        let mut engine = EvolutionEngine::new(config.clone(), terrain.clone()).unwrap();
        engine.run(None);
        engine
            .population()
            .iter()
            .map(|a| a.genome.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
