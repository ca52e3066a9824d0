//! Automaton Pathfinder CLI - Evolve agents across a terrain file.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use automaton_pathfinder::{
    compute::{
        EvolutionEngine, Grid, ReplayOutcome, find_path, latest_checkpoint, list_checkpoints,
        parse_directions, replay_path, save_checkpoint, tick_budget,
    },
    schema::EvolutionConfig,
};

/// Parsed command line.
struct Options {
    terrain: PathBuf,
    generations: Option<usize>,
    config: Option<PathBuf>,
    /// `Some(None)` resumes from the newest checkpoint.
    load: Option<Option<PathBuf>>,
    replay: Option<PathBuf>,
    solve: bool,
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--example" => {
            print_example_config();
            return;
        }
        "--list" => {
            let dir = args.get(2).map(String::as_str).unwrap_or(".");
            print_checkpoints(Path::new(dir));
            return;
        }
        _ => {}
    }

    let options = parse_options(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(&args[0]);
        std::process::exit(1);
    });

    // Load terrain
    let terrain = Grid::load(&options.terrain).unwrap_or_else(|e| {
        eprintln!("Error loading terrain: {}", e);
        std::process::exit(1);
    });

    if let Some(path) = &options.replay {
        replay(&terrain, path);
        return;
    }
    if options.solve {
        solve(&terrain);
        return;
    }

    // Load configuration
    let config = match &options.config {
        Some(path) => {
            let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => EvolutionConfig::default(),
    };

    let checkpoint_dir = PathBuf::from(&config.checkpoint.directory);
    let autosave_interval = config.checkpoint.autosave_interval;

    let mut engine = EvolutionEngine::new(config, terrain).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    match &options.load {
        Some(Some(path)) => {
            engine.restore_or_initialize(path);
        }
        Some(None) => match latest_checkpoint(&checkpoint_dir) {
            Ok(Some(path)) => {
                engine.restore_or_initialize(&path);
            }
            Ok(None) => {
                log::warn!("No checkpoint found in {}", checkpoint_dir.display());
                engine.initialize();
            }
            Err(e) => {
                log::warn!("Could not list checkpoints: {}", e);
                engine.initialize();
            }
        },
        None => engine.initialize(),
    }

    let terrain = engine.terrain();
    println!("Automaton Pathfinder");
    println!("====================");
    println!(
        "Grid: {}x{} ({} occupied)",
        terrain.width(),
        terrain.height(),
        terrain.occupied_count()
    );
    println!("Population: {}", engine.population().len());
    println!(
        "Tick budget: {}",
        tick_budget(terrain.width(), terrain.height())
    );
    println!("Starting generation: {}", engine.state().generation);
    println!();

    let start = Instant::now();
    let result = engine.run_with_callback(options.generations, |engine, report| {
        let generation = engine.state().generation;

        if generation % 10 == 0 {
            println!(
                "  Gen {}: best={:.1} avg={:.1} div={:.2} mut={:.3} arrivals={}",
                generation,
                engine.state().best_fitness_ever,
                report.avg_fitness,
                report.diversity,
                report.mutation_rate,
                report.arrivals
            );
        }

        if autosave_interval > 0
            && generation % autosave_interval == 0
            && let Err(e) = save_checkpoint(&checkpoint_dir, engine.population(), engine.state())
        {
            log::warn!("Autosave failed: {}", e);
        }
    });

    // Save on exit
    if result.state.generation > 0 {
        match save_checkpoint(&checkpoint_dir, engine.population(), engine.state()) {
            Ok(path) => println!("Checkpoint saved to {}", path.display()),
            Err(e) => eprintln!("Error saving checkpoint: {}", e),
        }
    }

    let elapsed = start.elapsed().as_secs_f32();
    println!();
    println!("Finished: {:?}", result.stop_reason);
    println!("  Generations: {}", result.generations_run);
    println!("  Best fitness: {:.1}", result.state.best_fitness_ever);
    println!(
        "  Time: {:.2}s ({:.2} generations/s)",
        elapsed,
        result.generations_run as f32 / elapsed.max(1e-6)
    );
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        terrain: PathBuf::from(&args[1]),
        generations: None,
        config: None,
        load: None,
        replay: None,
        solve: false,
    };

    let mut rest = args[2..].iter().peekable();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" => {
                let path = rest.next().ok_or("--config requires a file")?;
                options.config = Some(PathBuf::from(path));
            }
            "--load" => {
                let path = rest.next_if(|next| !next.starts_with("--"));
                options.load = Some(path.map(PathBuf::from));
            }
            "--replay" => {
                let path = rest.next().ok_or("--replay requires a file")?;
                options.replay = Some(PathBuf::from(path));
            }
            "--solve" => options.solve = true,
            other => {
                let generations = other
                    .parse()
                    .map_err(|_| format!("Unexpected argument '{}'", other))?;
                options.generations = Some(generations);
            }
        }
    }

    Ok(options)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <terrain.txt> [generations] [options]", program);
    eprintln!();
    eprintln!("Evolve agents that cross a grid reshaped by a cellular automaton.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  terrain.txt      Whitespace-separated 0/1 matrix, one row per line");
    eprintln!("  generations      Number of generations (default: config maximum)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>  Evolution configuration (JSON)");
    eprintln!("  --load [file]    Resume from a checkpoint (newest if no file given)");
    eprintln!("  --replay <file>  Replay a direction listing against the terrain");
    eprintln!("  --solve          Search for the shortest path instead of evolving");
    eprintln!();
    eprintln!("Other commands:");
    eprintln!("  {} --example       Print the default configuration", program);
    eprintln!("  {} --list [dir]    List saved checkpoints", program);
}

fn print_example_config() {
    let config = EvolutionConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}

fn print_checkpoints(dir: &Path) {
    match list_checkpoints(dir) {
        Ok(summaries) if summaries.is_empty() => println!("No checkpoints in {}", dir.display()),
        Ok(summaries) => {
            for s in summaries {
                println!(
                    "  {}  generation {}  best {:.1}  saved at {}",
                    s.filename, s.generation, s.best_fitness, s.timestamp
                );
            }
        }
        Err(e) => eprintln!("Error listing checkpoints: {}", e),
    }
}

fn replay(terrain: &Grid, path: &Path) {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading directions: {}", e);
        std::process::exit(1);
    });
    let directions = parse_directions(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing directions: {}", e);
        std::process::exit(1);
    });

    match replay_path(terrain, &directions) {
        ReplayOutcome::ReachedGoal { steps } => println!("Reached goal in {} steps", steps),
        ReplayOutcome::Blocked { step, position } => println!(
            "Blocked at move {} by ({}, {})",
            step + 1,
            position.x,
            position.y
        ),
        ReplayOutcome::OutOfBounds { step } => println!("Left the grid at move {}", step + 1),
        ReplayOutcome::Exhausted { position } => println!(
            "Directions ran out at ({}, {})",
            position.x, position.y
        ),
    }
}

fn solve(terrain: &Grid) {
    let budget = tick_budget(terrain.width(), terrain.height());
    match find_path(terrain, budget) {
        Some(path) => {
            let symbols: String = path.iter().map(|d| d.symbol()).collect();
            println!("Shortest path ({} moves): {}", path.len(), symbols);
        }
        None => println!("No path within {} ticks", budget),
    }
}
