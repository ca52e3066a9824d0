//! Time-expanded best-first search over an evolving grid.
//!
//! The terrain changes every tick, so a search state is a `(position, tick)`
//! pair: the move taken at tick `t` is checked against the terrain stepped
//! `t` times, matching what an agent sees during an epoch. Agents never
//! wait, so every move costs one tick.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::agent::Direction;
use super::grid::{Cell, Grid, Position};

type State = (Position, usize);

/// Lazily stepped sequence of grids, one per tick.
struct Timeline {
    frames: Vec<Grid>,
}

impl Timeline {
    fn new(terrain: &Grid) -> Self {
        Self {
            frames: vec![terrain.clone()],
        }
    }

    fn at(&mut self, tick: usize) -> &Grid {
        while self.frames.len() <= tick {
            let next = self.frames[self.frames.len() - 1].step();
            self.frames.push(next);
        }
        &self.frames[tick]
    }
}

/// Shortest direction sequence from START to GOAL using at most `max_ticks`
/// moves, or `None` if no such path exists.
///
/// A* with the Manhattan distance to GOAL as heuristic; it is admissible
/// because every move changes the distance by exactly one.
pub fn find_path(terrain: &Grid, max_ticks: usize) -> Option<Vec<Direction>> {
    let start = terrain.start();
    let goal = terrain.goal();
    if start == goal {
        return Some(Vec::new());
    }

    let mut timeline = Timeline::new(terrain);
    let mut open = BinaryHeap::new();
    let mut closed: HashSet<State> = HashSet::new();
    let mut came_from: HashMap<State, (State, Direction)> = HashMap::new();
    // Insertion counter keeps pops deterministic among equal priorities.
    let mut counter = 0usize;

    open.push(Reverse((start.manhattan(goal), 0usize, counter, start.y, start.x)));

    while let Some(Reverse((_, tick, _, y, x))) = open.pop() {
        let position = Position::new(x, y);
        let state = (position, tick);
        if !closed.insert(state) {
            continue;
        }
        if position == goal {
            return Some(reconstruct(&came_from, state));
        }
        if tick >= max_ticks {
            continue;
        }

        let grid = timeline.at(tick);
        for direction in Direction::ALL {
            let Some(target) = grid.offset(position, direction.delta()) else {
                continue;
            };
            if grid.get(target) == Cell::Occupied {
                continue;
            }
            let next = (target, tick + 1);
            if closed.contains(&next) || came_from.contains_key(&next) {
                continue;
            }
            came_from.insert(next, (state, direction));
            counter += 1;
            open.push(Reverse((
                tick + 1 + target.manhattan(goal),
                tick + 1,
                counter,
                target.y,
                target.x,
            )));
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<State, (State, Direction)>, mut state: State) -> Vec<Direction> {
    let mut path = Vec::with_capacity(state.1);
    while let Some(&(previous, direction)) = came_from.get(&state) {
        path.push(direction);
        state = previous;
    }
    path.reverse();
    path
}
