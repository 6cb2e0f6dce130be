pub mod alert;
pub mod call;
pub mod stats;

pub use alert::*;
pub use call::*;
pub use stats::*;
