pub mod backup;
pub mod kind;
pub mod registry;
pub mod symbols;

pub use backup::BackupSource;
pub use kind::SourceKind;
pub use registry::{PriceSource, SourceEntry, SourceRegistry};
