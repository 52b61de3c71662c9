pub mod error;
pub mod selector;
pub mod traits;
pub mod types;

pub use error::*;
pub use selector::*;
pub use traits::*;
pub use types::*;
