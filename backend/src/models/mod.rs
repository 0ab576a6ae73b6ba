pub mod coordinates;
pub mod reference;
pub mod sample;
pub mod target;
pub mod time;

pub use coordinates::*;
pub use reference::*;
pub use sample::*;
pub use target::*;
pub use time::*;
