pub mod error;
pub mod params;
pub mod strategy;
pub mod traits;
pub mod types;

pub use error::*;
pub use params::*;
pub use strategy::*;
pub use traits::*;
pub use types::*;
