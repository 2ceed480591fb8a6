pub mod error;

pub use error::{AppError, ItemError, Result};
