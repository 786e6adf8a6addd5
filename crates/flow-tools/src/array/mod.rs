//! Array tools
//!
//! Tools that slice arrays and read numbers out of byte buffers.

mod read_number;
mod slice;

pub use read_number::ReadNumberTool;
pub use slice::SliceTool;
