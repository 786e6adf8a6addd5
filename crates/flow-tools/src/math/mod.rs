//! Math tools

mod calc;
pub mod expr;

pub use calc::CalcTool;
