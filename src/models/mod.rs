pub mod dataset;
pub mod response;
pub mod sentiment;

pub use dataset::*;
pub use response::*;
pub use sentiment::*;
