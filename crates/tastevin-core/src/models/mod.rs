pub mod duplicate;
pub mod event;
pub mod invitee;
pub mod rating;
pub mod wine;

pub use duplicate::*;
pub use event::*;
pub use invitee::*;
pub use rating::*;
pub use wine::*;
