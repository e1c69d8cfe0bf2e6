//! Realtime streams
//!
//! Readers for the two ZeroMQ streams a camera can publish:
//! - Image frames over a pull socket (two-part: JSON header, raw pixels)
//! - State updates over a subscribe socket (two-part: topic, JSON object)
//!
//! [`StateMirror`] folds the state stream into a snapshot on a background
//! task for concurrent readers.

pub mod frame;
pub mod image;
pub mod mirror;
pub mod state;

pub use frame::{ByteOrder, DType, Frame, Pixels, ScalarKind};
pub use image::{ImageStreamer, SocketMode};
pub use mirror::{Snapshot, StateMirror, StateReader};
pub use state::{StateSource, StateStreamer, DEFAULT_CHANNEL};
