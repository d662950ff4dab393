//! Transport primitives for the shipper.
//!
//! [`Dialer`] opens connections and [`Connection`] is the minimal write
//! surface the connection manager needs. Production code uses [`TcpDialer`];
//! tests substitute in-memory doubles to inject failures.

use std::{
    fmt,
    io::{self, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

/// Write half of an established connection.
pub trait Connection: Send {
    /// Update the deadline applied to subsequent writes.
    fn set_write_timeout(&mut self, timeout: Duration) -> io::Result<()>;
    /// Write a full buffer.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    /// Flush any buffered bytes to the peer.
    fn flush(&mut self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn set_write_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        TcpStream::set_write_timeout(self, Some(timeout))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

/// Opens connections to the ingestion endpoint.
pub trait Dialer: Send + Sync {
    /// Establish a new connection, giving up after `timeout`.
    fn dial(&self, timeout: Duration) -> io::Result<Box<dyn Connection>>;

    /// Human-readable target, used in diagnostics and errors.
    fn target(&self) -> &str;
}

/// Dialer for plain TCP endpoints given as `host:port`.
#[derive(Clone)]
pub struct TcpDialer {
    address: String,
}

impl TcpDialer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.address
            .as_str()
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }
}

impl fmt::Debug for TcpDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpDialer")
            .field("address", &self.address)
            .finish()
    }
}

fn connect_tcp(addrs: &[SocketAddr], address: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{address} did not resolve to any socket address"),
        )
    }))
}

impl Dialer for TcpDialer {
    fn dial(&self, timeout: Duration) -> io::Result<Box<dyn Connection>> {
        let addrs = self.socket_addrs()?;
        let stream = connect_tcp(&addrs, &self.address, timeout)?;
        Ok(Box::new(stream))
    }

    fn target(&self) -> &str {
        &self.address
    }
}
