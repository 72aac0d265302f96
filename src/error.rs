use thiserror::Error;

use crate::grid::Cell;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// A domain reduction tried to exclude the value a cell is already
    /// fixed to. The engine and the board have fallen out of sync.
    #[error("cell {0} is already fixed to the value being excluded")]
    Contradiction(Cell),

    /// A constraint's mine count left the range `[0, cells]`.
    #[error("constraint requires {required} mines over {cells} cells")]
    InvalidConstraint { required: usize, cells: usize },

    /// An exhaustive search found no assignment satisfying the current
    /// constraints. Structurally impossible on a valid minefield.
    #[error("no mine arrangement satisfies the current constraints")]
    Unsatisfiable,
}
