//! Transport abstraction for the two board channels.
//!
//! The data feed needs a reliable byte stream; RBCP needs an unreliable
//! datagram socket with a per-receive timeout. Production uses the std socket
//! adapters below, tests use the simulated board and feed in `sitcp-harness`.
//!
//! Both adapters own their socket. Dropping them closes it, so the handle is
//! released on every exit path, including errors.

use std::{
    io::{self, Read},
    net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    time::Duration,
};

/// Blocking byte stream (the data feed).
pub trait StreamTransport {
    /// Read up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` once the peer has closed the stream.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Blocking datagram socket (RBCP).
pub trait DatagramTransport {
    /// Send one datagram to `target`.
    fn send_to(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<()>;

    /// Wait up to `timeout` for one datagram.
    ///
    /// Returns `Ok(None)` on timeout, so a silent peer is distinguishable from
    /// a socket failure.
    fn receive_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<usize>>;
}

impl<T: StreamTransport + ?Sized> StreamTransport for &mut T {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).receive(buf)
    }
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for &mut T {
    fn send_to(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<()> {
        (**self).send_to(datagram, target)
    }

    fn receive_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<usize>> {
        (**self).receive_with_timeout(buf, timeout)
    }
}

/// TCP connection to the data feed.
#[derive(Debug)]
pub struct TcpFeed {
    stream: TcpStream,
}

impl TcpFeed {
    /// Connect with Nagle disabled.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        tracing::info!(%addr, "connected to data feed");
        Ok(Self { stream })
    }

    /// Bound each read so a cancel flag can be polled between reads.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }
}

impl StreamTransport for TcpFeed {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

/// UDP socket for RBCP.
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    read_timeout: Option<Duration>,
}

impl UdpLink {
    /// Bind to a local address; `0.0.0.0:0` picks any free port.
    pub fn bind(local: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(local)?;
        Ok(Self { socket, read_timeout: None })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramTransport for UdpLink {
    fn send_to(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<()> {
        let sent = self.socket.send_to(datagram, target)?;
        if sent != datagram.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {sent} of {} bytes", datagram.len()),
            ));
        }
        Ok(())
    }

    fn receive_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<usize>> {
        if timeout.is_zero() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "timeout must be non-zero"));
        }
        if self.read_timeout != Some(timeout) {
            self.socket.set_read_timeout(Some(timeout))?;
            self.read_timeout = Some(timeout);
        }

        match self.socket.recv_from(buf) {
            Ok((len, _from)) => Ok(Some(len)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }
}
