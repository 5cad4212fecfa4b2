pub mod error;

pub use error::{CanopyError, CanopyResult};
