//! Script text -> `Program`.
//!
//! - `model`: the parsed program structure (blocks, steps, raw arguments).
//! - `parser`: the total, best-effort line parser.

pub mod model;
pub mod parser;

pub use model::{Arg, Block, CLOSE_BRACKET, OPEN_BRACKET, Program, REPEAT_MARKER, Step};
pub use parser::{ParseAnomaly, parse, parse_with_diagnostics};
