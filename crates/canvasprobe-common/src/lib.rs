pub mod address;
pub mod error;
pub mod types;
pub mod value;

pub use address::*;
pub use error::*;
pub use types::*;
pub use value::*;
