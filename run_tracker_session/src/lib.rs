mod bus;
mod clock;
mod collaborators;
mod config;
mod convert;
mod error;
mod ingestor;
mod machine;
mod notification;
mod tracker;

pub use bus::*;
pub use clock::*;
pub use collaborators::*;
pub use config::*;
pub use convert::*;
pub use error::*;
pub use ingestor::{FixRejection, LocationIngestor, DEFAULT_CONVERSION_TIMEOUT};
pub use machine::*;
pub use notification::*;
pub use tracker::*;
