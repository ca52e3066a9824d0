//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random generation, crossover, and mutation operations over
//! direction sequences.

use rand::distributions::{Distribution, Standard};
use rand::prelude::*;

use crate::compute::Direction;

/// Random number generator wrapper for genome operations.
///
/// Implements [`RngCore`], so it can be handed to anything generic over
/// [`Rng`].
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// Independent child generator seeded from this one.
    pub fn child(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.next_seed())
    }
}

impl RngCore for GenomeRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Goal-biased symbol distribution: DOWN and RIGHT 3/8 each, UP and LEFT 1/8 each.
#[derive(Debug, Clone, Copy, Default)]
pub struct TowardGoal;

const TOWARD_GOAL_TABLE: [Direction; 8] = [
    Direction::Down,
    Direction::Down,
    Direction::Down,
    Direction::Right,
    Direction::Right,
    Direction::Right,
    Direction::Up,
    Direction::Left,
];

impl Distribution<Direction> for TowardGoal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Direction {
        TOWARD_GOAL_TABLE[rng.gen_range(0..TOWARD_GOAL_TABLE.len())]
    }
}

/// Generate a random genome of `len` symbols.
pub fn random_genome<R: Rng + ?Sized>(rng: &mut R, len: usize, biased: bool) -> Vec<Direction> {
    if biased {
        (0..len).map(|_| TowardGoal.sample(rng)).collect()
    } else {
        (0..len).map(|_| Standard.sample(rng)).collect()
    }
}

/// Two-point crossover.
///
/// Cut points are drawn with `p1` in `[0, n/3]` and `p2` in `[2n/3, n-1]`
/// where `n` is the shared length. Inside `[p1, p2]` each child takes the
/// other parent's symbols; outside it keeps its own parent's.
pub fn crossover_genomes<R: Rng + ?Sized>(
    rng: &mut R,
    first: &[Direction],
    second: &[Direction],
) -> (Vec<Direction>, Vec<Direction>) {
    let mut child1 = first.to_vec();
    let mut child2 = second.to_vec();

    let size = first.len().min(second.len());
    if size == 0 {
        return (child1, child2);
    }

    let p1 = rng.gen_range(0..=size / 3);
    let p2 = rng.gen_range((2 * size / 3).max(p1)..=size - 1);

    child1[p1..=p2].copy_from_slice(&second[p1..=p2]);
    child2[p1..=p2].copy_from_slice(&first[p1..=p2]);

    (child1, child2)
}

/// Mutation operator applied to a genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Exchange two positions.
    Swap,
    /// Overwrite 1-5 random positions with random symbols.
    Randomize,
    /// Shuffle a contiguous window of 3-10 symbols.
    Scramble,
    /// Remove one symbol and reinsert it elsewhere.
    Reinsert,
}

impl Distribution<Mutation> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Mutation {
        match rng.gen_range(0..4) {
            0 => Mutation::Swap,
            1 => Mutation::Randomize,
            2 => Mutation::Scramble,
            _ => Mutation::Reinsert,
        }
    }
}

/// Apply one uniformly chosen mutation operator. Length is preserved.
pub fn mutate_genome<R: Rng + ?Sized>(rng: &mut R, genome: &mut [Direction]) -> Mutation {
    let op: Mutation = rng.r#gen();
    apply_mutation(rng, genome, op);
    op
}

/// Apply a specific mutation operator in place.
///
/// Genomes too short for an operator are left unchanged (a single symbol
/// cannot be swapped or moved); the scramble window shrinks to fit.
pub fn apply_mutation<R: Rng + ?Sized>(rng: &mut R, genome: &mut [Direction], op: Mutation) {
    let size = genome.len();
    if size == 0 {
        return;
    }

    match op {
        Mutation::Swap => {
            if size < 2 {
                return;
            }
            let picks = rand::seq::index::sample(rng, size, 2);
            genome.swap(picks.index(0), picks.index(1));
        }
        Mutation::Randomize => {
            for _ in 0..rng.gen_range(1..=5) {
                let pos = rng.gen_range(0..size);
                genome[pos] = rng.r#gen();
            }
        }
        Mutation::Scramble => {
            let len = rng.gen_range(3..=10).min(size);
            let start = rng.gen_range(0..=size - len);
            genome[start..start + len].shuffle(rng);
        }
        Mutation::Reinsert => {
            if size < 2 {
                return;
            }
            let from = rng.gen_range(0..size);
            let mut to = rng.gen_range(0..size - 1);
            if to >= from {
                to += 1;
            }
            if from < to {
                genome[from..=to].rotate_left(1);
            } else {
                genome[to..=from].rotate_right(1);
            }
        }
    }
}

/// Fraction of positions, over the shared length, at which two genomes differ.
pub fn genome_distance(g1: &[Direction], g2: &[Direction]) -> f32 {
    let shared = g1.len().min(g2.len());
    if shared == 0 {
        return 0.0;
    }
    let differing = g1.iter().zip(g2).filter(|(a, b)| a != b).count();
    differing as f32 / shared as f32
}
