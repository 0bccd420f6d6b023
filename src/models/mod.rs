pub mod incident;
pub mod page;

pub use incident::*;
pub use page::*;
