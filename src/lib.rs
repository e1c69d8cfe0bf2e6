//! Client library for the Motif camera recorder
//!
//! The recorder exposes two surfaces:
//!
//! ```text
//!                    ┌──────────────────────────┐
//!   MotifClient ────►│ HTTPS control API        │  call("camera/X/recording/start")
//!                    │  /api/<version>/...      │
//!                    ├──────────────────────────┤
//!   ImageStreamer ◄──│ ZeroMQ PULL  (frames)    │  [JSON header][pixels]
//!   StateStreamer ◄──│ ZeroMQ SUB   (state, "j")│  [topic][JSON object]
//!                    └──────────────────────────┘
//!                               │
//!                          StateMirror (background snapshot)
//! ```
//!
//! # Example
//! ```no_run
//! use motif_rs::client::{ClientConfig, MotifClient};
//! use motif_rs::stream::{SocketMode, StateMirror};
//!
//! # async fn example() -> motif_rs::error::Result<()> {
//! let client = MotifClient::new(ClientConfig::builder().build()?)?;
//! println!("{}", client.call("version").await?);
//!
//! let mut images = client.image_stream(None, None, SocketMode::Connect).await?;
//! let frame = images.next_image().await?;
//! println!("{:?} {:?}", frame.shape(), frame.frame_number());
//!
//! let mut mirror = StateMirror::new(client.state_stream(None, None).await?);
//! mirror.start();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod metadata;
pub mod stream;

#[cfg(test)]
mod test_util;

pub use client::{ClientConfig, MotifClient};
pub use error::{Error, Result};
pub use metadata::experiment_metadata;
pub use stream::{Frame, ImageStreamer, SocketMode, StateMirror, StateStreamer};
