//! This crate recommends moves for minesweeper-style mine-detection
//! puzzles. The revealed numbers on the board are expressed as
//! constraints over the unopened cells; constraint propagation finds
//! the provably safe cells and provable mines, and an exhaustive
//! backtracking search computes mine probabilities for everything the
//! cheap deductions leave open.

mod advisor;
mod board;
mod constraint;
mod engine;
mod error;
mod grid;

pub use advisor::{Advisor, Move, MoveKind};
pub use board::BoardView;
pub use constraint::{Constraint, ConstraintRef, ConstraintStore, Triviality};
pub use engine::{ConstraintEngine, Domain, SearchLimits, SearchStats};
pub use error::Error;
pub use grid::{Cell, CellMap, CellSet};

/// The value of a cell in a solution.
pub type Val = u8;

/// The cell holds no mine.
pub const SAFE: Val = 0;

/// The cell holds a mine.
pub const MINE: Val = 1;

/// A result during solving (Err = the engine and the board disagree).
pub type SolveResult<T> = Result<T, Error>;
