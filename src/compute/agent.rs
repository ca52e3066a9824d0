//! Agent model - genome, per-epoch simulation state and learned preferences.

use std::collections::HashMap;
use std::collections::hash_map;

use rand::Rng;
use rand::distributions::{Distribution, Standard};
use rand::seq::{IteratorRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use super::evolution::{arrival_fitness, random_genome};
use super::grid::{Cell, Fingerprint, Grid, Position};
use crate::schema::LearningConfig;

/// Probability that the greedy fallback takes the closest safe move.
pub const GREEDY_PROBABILITY: f64 = 0.7;

/// Order in which the fallback policy evaluates moves. Ties keep this order.
const FALLBACK_ORDER: [Direction; 4] = [
    Direction::Right,
    Direction::Down,
    Direction::Left,
    Direction::Up,
];

/// One of the four moves an agent can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Displacement `(dx, dy)`; y grows downward.
    #[inline]
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Single-letter symbol used in genome strings.
    pub fn symbol(self) -> char {
        match self {
            Direction::Up => 'U',
            Direction::Down => 'D',
            Direction::Left => 'L',
            Direction::Right => 'R',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'U' => Some(Direction::Up),
            'D' => Some(Direction::Down),
            'L' => Some(Direction::Left),
            'R' => Some(Direction::Right),
            _ => None,
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl Distribution<Direction> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Direction {
        Direction::ALL[rng.gen_range(0..4)]
    }
}

/// Encode a genome as a symbol string.
pub fn genome_to_string(genome: &[Direction]) -> String {
    genome.iter().map(|d| d.symbol()).collect()
}

/// Decode a symbol string, failing on the first unknown symbol.
pub fn genome_from_str(s: &str) -> Result<Vec<Direction>, char> {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| Direction::from_symbol(c).ok_or(c))
        .collect()
}

/// Genome length for a grid: three times its half-perimeter.
#[inline]
pub fn genome_len(width: usize, height: usize) -> usize {
    3 * (width + height)
}

/// Per-direction preference values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectionWeights([f32; 4]);

impl DirectionWeights {
    pub fn new(up: f32, down: f32, left: f32, right: f32) -> Self {
        Self([up, down, left, right])
    }

    #[inline]
    pub fn get(&self, direction: Direction) -> f32 {
        self.0[direction.index()]
    }

    #[inline]
    pub fn add(&mut self, direction: Direction, delta: f32) {
        self.0[direction.index()] += delta;
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self(self.0.map(|w| w * factor))
    }
}

/// Learned preferences keyed by local fingerprint.
///
/// Lookups of unseen fingerprints read as all-zero weights; writes go through
/// [`Preferences::entry`], which inserts the zero entry first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Preferences {
    table: HashMap<Fingerprint, DirectionWeights>,
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weights for a fingerprint, zero if never seen.
    pub fn get(&self, fingerprint: &Fingerprint) -> DirectionWeights {
        self.table.get(fingerprint).copied().unwrap_or_default()
    }

    /// Get-or-insert-default access.
    pub fn entry(&mut self, fingerprint: Fingerprint) -> &mut DirectionWeights {
        self.table.entry(fingerprint).or_default()
    }

    /// Adjust one direction's preference under a fingerprint.
    pub fn reinforce(&mut self, fingerprint: Fingerprint, direction: Direction, delta: f32) {
        self.entry(fingerprint).add(direction, delta);
    }

    /// Independent copy with every weight halved.
    pub fn halved(&self) -> Self {
        Self {
            table: self
                .table
                .iter()
                .map(|(fp, w)| (fp.clone(), w.scaled(0.5)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Fingerprint, DirectionWeights> {
        self.table.iter()
    }
}

impl FromIterator<(Fingerprint, DirectionWeights)> for Preferences {
    fn from_iter<I: IntoIterator<Item = (Fingerprint, DirectionWeights)>>(iter: I) -> Self {
        Self {
            table: iter.into_iter().collect(),
        }
    }
}

/// Result of a single move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Moved onto an empty cell.
    Moved,
    /// Moved onto GOAL and finished.
    ReachedGoal,
    /// Tried to leave the grid and died.
    OutOfBounds,
    /// Tried to enter an occupied cell and died.
    Blocked,
}

impl MoveOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MoveOutcome::Moved)
    }
}

/// A population member.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Preferred move for each step.
    pub genome: Vec<Direction>,
    /// Current cell.
    pub position: Position,
    /// Successful moves this epoch.
    pub steps: usize,
    /// Still moving this epoch.
    pub alive: bool,
    /// Left the grid. Entering an occupied cell does not set this.
    pub collided: bool,
    /// Finished on GOAL.
    pub reached_goal: bool,
    /// High-water mark of Manhattan-distance reduction toward GOAL.
    ///
    /// Measured from the START to GOAL distance, `width + height - 2`, not
    /// from `width + height`. A first move away from GOAL therefore never
    /// counts as progress.
    pub max_progress: usize,
    /// Score for this epoch, 0 until evaluated.
    pub fitness: f32,
    /// Learned per-fingerprint direction preferences.
    pub preferences: Preferences,
    /// Display color.
    pub color: [u8; 3],
}

impl Agent {
    /// Create an agent at START with the given genome and no preferences.
    pub fn new(genome: Vec<Direction>, color: [u8; 3]) -> Self {
        Self {
            genome,
            position: Position::default(),
            steps: 0,
            alive: true,
            collided: false,
            reached_goal: false,
            max_progress: 0,
            fitness: 0.0,
            preferences: Preferences::new(),
            color,
        }
    }

    /// Builder-style preference table.
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Fresh agent with a random genome for a `width` x `height` grid.
    pub fn create<R: Rng + ?Sized>(rng: &mut R, width: usize, height: usize, biased: bool) -> Self {
        let genome = random_genome(rng, genome_len(width, height), biased);
        Self::new(genome, random_color(rng))
    }

    /// Fresh agent sharing this agent's genome and preferences.
    ///
    /// The copy owns its data; later edits never reach the source.
    pub fn elite_copy<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        Self::new(self.genome.clone(), random_color(rng)).with_preferences(self.preferences.clone())
    }

    /// Return to START with per-epoch state cleared.
    pub fn reset(&mut self, start: Position) {
        self.position = start;
        self.steps = 0;
        self.alive = true;
        self.collided = false;
        self.reached_goal = false;
        self.max_progress = 0;
        self.fitness = 0.0;
    }
}

/// Random display color with each channel in `50..=255`.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> [u8; 3] {
    [
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
    ]
}

/// Build `count` fresh agents, a `biased_fraction` share of them goal-biased,
/// in shuffled order.
pub fn create_batch<R: Rng + ?Sized>(
    rng: &mut R,
    width: usize,
    height: usize,
    count: usize,
    biased_fraction: f32,
) -> Vec<Agent> {
    let biased = (count as f32 * biased_fraction) as usize;
    let mut agents: Vec<Agent> = (0..count)
        .map(|i| Agent::create(rng, width, height, i < biased))
        .collect();
    agents.shuffle(rng);
    agents
}

/// Pick the next move for an agent.
///
/// The genome symbol for the current step wins when it leads to a safe cell.
/// Otherwise safe moves are ranked by distance to `goal`: the closest is taken
/// with [`GREEDY_PROBABILITY`], a random safe move otherwise. With no safe move
/// the genome symbol is forced, or a random direction once the genome runs out.
pub fn choose_direction<R: Rng + ?Sized>(
    agent: &Agent,
    grid: &Grid,
    goal: Position,
    rng: &mut R,
) -> Direction {
    let pos = agent.position;
    let gene = agent.genome.get(agent.steps).copied();

    if let Some(direction) = gene
        && grid.is_safe(grid.offset(pos, direction.delta()))
    {
        return direction;
    }

    let mut moves: Vec<(Direction, usize)> = FALLBACK_ORDER
        .iter()
        .filter_map(|&direction| {
            let target = grid.offset(pos, direction.delta())?;
            (grid.get(target) == Cell::Empty).then(|| (direction, target.manhattan(goal)))
        })
        .collect();

    if !moves.is_empty() {
        moves.sort_by_key(|&(_, distance)| distance);
        if rng.gen_bool(GREEDY_PROBABILITY) {
            return moves[0].0;
        }
        if let Some(&(direction, _)) = moves.iter().choose(rng) {
            return direction;
        }
    }

    gene.unwrap_or_else(|| rng.r#gen())
}

/// Move an agent once against the current grid.
///
/// Deaths reinforce the chosen direction negatively under the fingerprint of
/// the cell the agent stood on; a new progress high-water mark reinforces it
/// positively. Reaching `goal` assigns the arrival bonus as final fitness.
pub fn move_agent<R: Rng + ?Sized>(
    agent: &mut Agent,
    grid: &Grid,
    goal: Position,
    learning: &LearningConfig,
    rng: &mut R,
) -> MoveOutcome {
    let fingerprint = grid.fingerprint(agent.position, learning.fingerprint_radius);
    let direction = choose_direction(agent, grid, goal, rng);
    let rate = learning.learning_rate;

    match grid.offset(agent.position, direction.delta()) {
        None => {
            agent.alive = false;
            agent.collided = true;
            agent.preferences.reinforce(fingerprint, direction, -rate);
            MoveOutcome::OutOfBounds
        }
        Some(target) if grid.get(target) == Cell::Occupied => {
            agent.alive = false;
            agent.preferences.reinforce(fingerprint, direction, -rate);
            MoveOutcome::Blocked
        }
        Some(target) => {
            agent.position = target;
            agent.steps += 1;

            let progress = grid
                .start()
                .manhattan(goal)
                .saturating_sub(target.manhattan(goal));
            if progress > agent.max_progress {
                agent.max_progress = progress;
                agent.preferences.reinforce(fingerprint, direction, rate);
            }

            if target == goal {
                agent.alive = false;
                agent.reached_goal = true;
                agent.fitness = arrival_fitness(agent.steps);
                MoveOutcome::ReachedGoal
            } else {
                MoveOutcome::Moved
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn genome(s: &str) -> Vec<Direction> {
        genome_from_str(s).unwrap()
    }

    #[test]
    fn test_symbol_roundtrip() {
        let g = genome("UDLR");
        assert_eq!(g, Direction::ALL.to_vec());
        assert_eq!(genome_to_string(&g), "UDLR");
        assert_eq!(genome_from_str("UXD"), Err('X'));
    }

    #[test]
    fn test_genome_len() {
        assert_eq!(genome_len(5, 5), 30);
        assert_eq!(genome_len(85, 65), 450);
    }

    #[test]
    fn test_preferences_default_entry() {
        let mut prefs = Preferences::new();
        let fp = Fingerprint::from_cells(vec![0, 1, -1]);
        assert_eq!(prefs.get(&fp), DirectionWeights::default());
        assert!(prefs.is_empty());

        prefs.reinforce(fp.clone(), Direction::Down, 0.1);
        prefs.reinforce(fp.clone(), Direction::Down, 0.1);
        assert!((prefs.get(&fp).get(Direction::Down) - 0.2).abs() < 1e-6);
        assert_eq!(prefs.get(&fp).get(Direction::Up), 0.0);
    }

    #[test]
    fn test_preferences_halved_is_independent() {
        let mut prefs = Preferences::new();
        let fp = Fingerprint::from_cells(vec![0; 9]);
        prefs.reinforce(fp.clone(), Direction::Right, 1.0);

        let mut half = prefs.halved();
        assert_eq!(half.get(&fp).get(Direction::Right), 0.5);

        half.reinforce(fp.clone(), Direction::Right, 1.0);
        assert_eq!(prefs.get(&fp).get(Direction::Right), 1.0);
    }

    #[test]
    fn test_gene_used_when_safe() {
        let mut rng = StdRng::seed_from_u64(1);
        let grid = Grid::new(5, 5);
        let agent = Agent::new(genome("DR"), [0; 3]);
        assert_eq!(
            choose_direction(&agent, &grid, grid.goal(), &mut rng),
            Direction::Down
        );
    }

    #[test]
    fn test_fallback_avoids_unsafe_gene() {
        let grid = Grid::new(5, 5);
        let agent = Agent::new(genome("U"), [0; 3]);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let d = choose_direction(&agent, &grid, grid.goal(), &mut rng);
            assert!(matches!(d, Direction::Right | Direction::Down));
        }
    }

    #[test]
    fn test_forced_gene_when_boxed_in() {
        let mut rng = StdRng::seed_from_u64(3);
        let grid = Grid::parse("0 1 0\n1 0 0\n0 0 0").unwrap();
        let agent = Agent::new(genome("L"), [0; 3]);
        assert_eq!(
            choose_direction(&agent, &grid, grid.goal(), &mut rng),
            Direction::Left
        );
    }

    #[test]
    fn test_out_of_bounds_marks_collision() {
        let mut rng = StdRng::seed_from_u64(0);
        let grid = Grid::parse("0 1 0\n1 0 0\n0 0 0").unwrap();
        let mut agent = Agent::new(genome("U"), [0; 3]);

        let outcome = move_agent(
            &mut agent,
            &grid,
            grid.goal(),
            &LearningConfig::default(),
            &mut rng,
        );
        assert_eq!(outcome, MoveOutcome::OutOfBounds);
        assert!(!agent.alive);
        assert!(agent.collided);
        let fp = grid.fingerprint(grid.start(), 2);
        assert!((agent.preferences.get(&fp).get(Direction::Up) + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_blocked_is_not_collision() {
        let mut rng = StdRng::seed_from_u64(0);
        let grid = Grid::parse("0 1 0\n1 0 0\n0 0 0").unwrap();
        let mut agent = Agent::new(genome("R"), [0; 3]);

        let outcome = move_agent(
            &mut agent,
            &grid,
            grid.goal(),
            &LearningConfig::default(),
            &mut rng,
        );
        assert_eq!(outcome, MoveOutcome::Blocked);
        assert!(!agent.alive);
        assert!(!agent.collided);
        assert_eq!(agent.position, grid.start());
    }

    #[test]
    fn test_progress_reinforced() {
        let mut rng = StdRng::seed_from_u64(0);
        let grid = Grid::new(4, 4);
        let mut agent = Agent::new(genome("RRL"), [0; 3]);
        let learning = LearningConfig::default();

        move_agent(&mut agent, &grid, grid.goal(), &learning, &mut rng);
        move_agent(&mut agent, &grid, grid.goal(), &learning, &mut rng);
        assert_eq!(agent.max_progress, 2);
        assert_eq!(agent.steps, 2);

        // Stepping back does not lower the high-water mark.
        move_agent(&mut agent, &grid, grid.goal(), &learning, &mut rng);
        assert_eq!(agent.max_progress, 2);
        assert_eq!(agent.position, Position::new(1, 0));
        assert_eq!(agent.preferences.len(), 2);
    }

    #[test]
    fn test_reaching_goal_assigns_bonus() {
        let mut rng = StdRng::seed_from_u64(0);
        let grid = Grid::new(2, 2);
        let mut agent = Agent::new(genome("RD"), [0; 3]);
        let learning = LearningConfig::default();

        assert_eq!(
            move_agent(&mut agent, &grid, grid.goal(), &learning, &mut rng),
            MoveOutcome::Moved
        );
        assert_eq!(
            move_agent(&mut agent, &grid, grid.goal(), &learning, &mut rng),
            MoveOutcome::ReachedGoal
        );
        assert!(agent.reached_goal);
        assert!(!agent.alive);
        assert_eq!(agent.fitness, 1500.0);
    }

    #[test]
    fn test_create_batch_size_and_length() {
        let mut rng = StdRng::seed_from_u64(9);
        let agents = create_batch(&mut rng, 6, 4, 25, 0.3);
        assert_eq!(agents.len(), 25);
        assert!(agents.iter().all(|a| a.genome.len() == 30));
        assert!(agents.iter().all(|a| a.alive && a.fitness == 0.0));
    }

    #[test]
    fn test_progress_baseline_is_start_distance() {
        let mut rng = StdRng::seed_from_u64(0);
        let grid = Grid::new(3, 3);
        let mut agent = Agent::new(genome("D"), [0; 3]);

        move_agent(&mut agent, &grid, grid.goal(), &LearningConfig::default(), &mut rng);
        // One step closer than START, which sits 4 cells from GOAL.
        assert_eq!(agent.max_progress, 1);
    }

    #[test]
    fn test_create_batch_forward_share() {
        // 30% biased (3/4 DOWN or RIGHT) and 70% uniform (1/2) gives 0.575.
        let mut rng = StdRng::seed_from_u64(17);
        let agents = create_batch(&mut rng, 50, 50, 400, 0.3);

        let total: usize = agents.iter().map(|a| a.genome.len()).sum();
        let forward = agents
            .iter()
            .flat_map(|a| a.genome.iter())
            .filter(|&&d| matches!(d, Direction::Down | Direction::Right))
            .count();
        let share = forward as f32 / total as f32;
        assert!((share - 0.575).abs() < 0.02, "forward share {share}");
    }

    #[test]
    fn test_create_batch_unbiased_is_uniform() {
        let mut rng = StdRng::seed_from_u64(4);
        let agents = create_batch(&mut rng, 50, 50, 200, 0.0);
        let total: usize = agents.iter().map(|a| a.genome.len()).sum();
        let forward = agents
            .iter()
            .flat_map(|a| a.genome.iter())
            .filter(|&&d| matches!(d, Direction::Down | Direction::Right))
            .count();
        assert!((forward as f32 / total as f32 - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_elite_copy_owns_genome() {
        let mut rng = StdRng::seed_from_u64(2);
        let source = Agent::new(genome("UUDD"), [1, 2, 3]);
        let mut copy = source.elite_copy(&mut rng);
        copy.genome[0] = Direction::Left;
        assert_eq!(source.genome[0], Direction::Up);
    }

    #[test]
    fn test_elite_copy_owns_preferences() {
        let mut rng = StdRng::seed_from_u64(2);
        let fp = Fingerprint::from_cells(vec![0; 9]);
        let mut source = Agent::new(genome("UUDD"), [1, 2, 3]);
        source.preferences.reinforce(fp.clone(), Direction::Right, 0.4);

        let mut copy = source.elite_copy(&mut rng);
        assert_eq!(copy.preferences, source.preferences);

        copy.preferences.reinforce(fp.clone(), Direction::Right, 1.0);
        assert!((source.preferences.get(&fp).get(Direction::Right) - 0.4).abs() < 1e-6);
    }
}
