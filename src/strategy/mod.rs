// Trade signal module
pub mod signals;

pub use signals::evaluate;
