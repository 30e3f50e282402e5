pub mod access;
pub mod campaign;
pub mod invitation;
pub mod user;

pub use access::*;
pub use campaign::*;
pub use invitation::*;
pub use user::*;
