//! Text tools
//!
//! Tools that encode, decode, split and index strings.

mod codec;
mod index;
mod split;

pub use codec::{DecodeTool, EncodeTool, TextEncoding};
pub use index::IndexTool;
pub use split::SplitTool;
