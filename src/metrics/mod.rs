pub mod aggregate;
pub mod model;
pub mod suggest;

pub use aggregate::*;
pub use model::*;
pub use suggest::*;
