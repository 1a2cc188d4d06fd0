mod annotations;
mod attribute;
mod class;
mod code;
mod constants;
mod field;
mod method;
mod serialize;
mod version;

pub use annotations::*;
pub use attribute::*;
pub use class::*;
pub use code::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use serialize::*;
pub use version::*;
