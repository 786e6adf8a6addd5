//! Test tools
//!
//! Tools for exercising the engine and the editor rather than doing work.

mod form_test;
mod lipsum;

pub use add::AddTool;
pub use form_test::FormTestTool;
pub use lipsum::LipsumTool;
pub use sleep::SleepTool;
