pub mod enums;
pub mod reading;

pub use enums::*;
pub use reading::*;
