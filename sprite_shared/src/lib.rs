//! `sprite_shared`
//!
//! Sprite state libraries used by the demo app and the tests.
//!
//! - [`store`]: load/save an [`EntityList`](entity::EntityList) as JSON or XML,
//!   format picked from the file extension.
//! - [`wire`]: fixed-width text codec for position snapshots.
//! - [`net`]: TCP publish/subscribe sockets.
//! - [`sync`]: per-frame publisher/subscriber sync channel.
//!
//! No `unsafe`.

pub mod config;
pub mod entity;
pub mod error;
pub mod math;
pub mod net;
pub mod render;
pub mod store;
pub mod sync;
pub mod wire;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::error::*;
    pub use crate::math::*;
    pub use crate::store::{EntityStore, Format, StoreOutcome};
    pub use crate::sync::*;
    pub use crate::wire::*;
}
