pub use counter::*;
pub use gauge::*;
pub use histogram::*;
pub use meter::*;
pub use source::*;

mod counter;
mod gauge;
mod histogram;
mod meter;
mod source;
