pub mod assignment;
pub mod enums;
pub mod policy;
pub mod profile;

pub use assignment::*;
pub use enums::*;
pub use policy::*;
pub use profile::*;
