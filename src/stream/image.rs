//! Image stream reader

use futures_util::FutureExt;
use zeromq::{Endpoint, PullSocket, Socket, SocketRecv};

use crate::client::StreamEndpoint;
use crate::error::Result;

use super::frame::Frame;

/// Which side of the image connection owns the address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketMode {
    /// Listen on the address; the recorder connects to us
    Bind,
    /// Connect to the address the recorder listens on
    #[default]
    Connect,
}

/// Pulls image frames from a camera
pub struct ImageStreamer {
    socket: PullSocket,
    bound: Option<Endpoint>,
}

impl ImageStreamer {
    /// Open a pull socket on `endpoint`
    pub async fn open(endpoint: &StreamEndpoint, mode: SocketMode) -> Result<Self> {
        let address = endpoint.address();
        let mut socket = PullSocket::new();

        let bound = match mode {
            SocketMode::Bind => Some(socket.bind(&address).await?),
            SocketMode::Connect => {
                socket.connect(&address).await?;
                None
            }
        };

        tracing::info!(address = %address, mode = ?mode, "Image stream opened");

        Ok(Self { socket, bound })
    }

    /// Port actually bound, in [`SocketMode::Bind`]
    pub fn bound_port(&self) -> Option<u16> {
        match &self.bound {
            Some(Endpoint::Tcp(_, port)) => Some(*port),
            _ => None,
        }
    }

    /// Wait for the next frame
    pub async fn next_image(&mut self) -> Result<Frame> {
        let message = self.socket.recv().await?;
        Frame::from_parts(message.into_vec())
    }

    /// Take a frame if one is already waiting, without blocking
    pub async fn try_next_image(&mut self) -> Result<Option<Frame>> {
        match self.socket.recv().now_or_never() {
            Some(message) => Frame::from_parts(message?.into_vec()).map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for ImageStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStreamer")
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}
