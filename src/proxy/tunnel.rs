//! Raw transport used for CONNECT probing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Bidirectional byte stream to a proxy
pub trait TunnelStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> TunnelStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Opens raw connections to proxy endpoints.
///
/// The returned stream is owned by the caller and released when dropped.
#[async_trait]
pub trait TunnelConnector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn TunnelStream>>;
}

/// Plain TCP connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl TunnelConnector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn TunnelStream>> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
