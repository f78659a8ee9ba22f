//! A button that looks like polished metal: live camera frames reflect off
//! its surface, a cursor reflection follows the pointer, and presses leave
//! fingerprints behind.
//!
//! [`ShinyButton`] owns the render tree, the media request and the pointer
//! state. Hosts feed it [`InputEvent`]s, call [`ShinyButton::poll_media`]
//! each frame and paint it with a [`Compositor`].

pub mod builder;
pub mod camera;
pub mod config;
pub mod draw;
pub mod error;
pub mod fallback;
pub mod interaction;
pub mod media;
pub mod render;
pub mod style;
pub mod tree;
pub mod types;
pub mod vision;
pub mod widget;

pub use builder::HostAgent;
pub use config::{ButtonOptions, Config};
pub use error::{Error, Result};
pub use interaction::{InputEvent, PointerRouter, PointerSample};
pub use media::{MediaSource, StreamConstraints};
pub use render::Compositor;
pub use widget::{MediaStatus, ShinyButton};
