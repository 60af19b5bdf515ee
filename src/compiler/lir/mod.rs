//! Low-Level Intermediate Representation (LIR) and its lowering pass.
//!
//! - `nodes` - LIR data structures (LirModule, LirFunction, Inst, ...)
//! - `build_lir` - lowering entry point, signature pass, per-function state
//! - `statements` - statement lowering (declarations, control flow, redeo)
//! - `expressions` - expression lowering (folding, casts, operator calls)
//! - `ownership` - per-scope drop lists and explicit free insertion
//! - `display` - LIR pretty-printing

pub mod nodes;

mod build_lir;
mod display;
mod expressions;
mod ownership;
mod statements;


pub use build_lir::lower_parse_tree;
pub use display::display_lir;
