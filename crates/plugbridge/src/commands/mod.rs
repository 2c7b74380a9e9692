pub mod provision;
pub mod resolve;
pub mod status;

pub use provision::*;
pub use resolve::*;
pub use status::*;
