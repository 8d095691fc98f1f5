pub mod quote;
pub mod status;

pub use quote::{PriceResult, Quote};
pub use status::SourceStatus;
