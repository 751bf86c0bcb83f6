use alloc::{boxed::Box, rc::Rc};
use core::{
    cell::RefCell,
    future::Future,
    net::Ipv4Addr,
    pin::{pin, Pin},
};

use embassy_futures::{
    block_on, poll_once,
    select::{select, Either},
};
use embassy_net::{
    dns::DnsQueryType,
    tcp::{State, TcpSocket},
    IpAddress, Runner, Stack,
};
use embassy_time::Duration;
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use esp_radio::wifi::WifiDevice;
use log::{debug, warn};

use crate::firmware::{broker::SessionError, types::BrokerEndpoint};

const SOCKET_TIMEOUT_SECS: u64 = 10;

/// Owns the network stack runner and keeps it moving while blocking calls
/// wait on the stack.
pub struct NetDriver {
    runner: RefCell<Pin<Box<dyn Future<Output = ()>>>>,
}

impl NetDriver {
    pub fn new(runner: &'static mut Runner<'static, WifiDevice<'static>>) -> Self {
        let run = async move {
            runner.run().await;
        };
        Self {
            runner: RefCell::new(Box::pin(run)),
        }
    }

    /// Gives the stack one chance to make progress.
    pub fn poll(&self) {
        if let Ok(mut runner) = self.runner.try_borrow_mut() {
            let _ = poll_once(runner.as_mut());
        }
    }

    /// Blocks on `future` while running the stack alongside it.
    pub fn drive<F: Future>(&self, future: F) -> F::Output {
        let Ok(mut runner) = self.runner.try_borrow_mut() else {
            return block_on(future);
        };
        let mut future = pin!(future);
        loop {
            match block_on(select(runner.as_mut(), future.as_mut())) {
                Either::First(()) => continue,
                Either::Second(output) => return output,
            }
        }
    }
}

/// Blocking byte stream over one embassy-net TCP socket.
pub struct TcpStream {
    socket: TcpSocket<'static>,
    net: Rc<NetDriver>,
}

impl ErrorType for TcpStream {
    type Error = ErrorKind;
}

impl Read for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.net
            .drive(self.socket.read(buf))
            .map_err(|_| ErrorKind::ConnectionReset)
    }
}

impl ReadReady for TcpStream {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.net.poll();
        if self.socket.state() != State::Established && !self.socket.can_recv() {
            return Err(ErrorKind::NotConnected);
        }
        Ok(self.socket.can_recv())
    }
}

impl Write for TcpStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.net
            .drive(self.socket.write(buf))
            .map_err(|_| ErrorKind::ConnectionReset)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.net
            .drive(self.socket.flush())
            .map_err(|_| ErrorKind::ConnectionReset)
    }
}

/// Broker transport: one reusable socket, reopened per connect.
pub struct TcpTransport {
    stack: Stack<'static>,
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(
        stack: Stack<'static>,
        net: Rc<NetDriver>,
        rx_buffer: &'static mut [u8],
        tx_buffer: &'static mut [u8],
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));
        Self {
            stack,
            stream: TcpStream { socket, net },
        }
    }

    fn resolve(&self, host: &str) -> Result<Ipv4Addr, SessionError> {
        if let Ok(address) = host.parse::<Ipv4Addr>() {
            return Ok(address);
        }
        let answers = self
            .stream
            .net
            .drive(self.stack.dns_query(host, DnsQueryType::A))
            .map_err(|err| {
                warn!("net: lookup of {} failed: {:?}", host, err);
                SessionError::ConnectFailed
            })?;
        answers
            .iter()
            .find_map(|address| match address {
                IpAddress::Ipv4(address) => Some(*address),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .ok_or(SessionError::ConnectFailed)
    }
}

impl crate::firmware::broker::Transport for TcpTransport {
    type Stream = TcpStream;

    fn open(&mut self, endpoint: &BrokerEndpoint) -> Result<(), SessionError> {
        if self.stack.config_v4().is_none() {
            return Err(SessionError::ConnectFailed);
        }
        let address = self.resolve(&endpoint.host)?;
        debug!("net: connecting to {}:{}", address, endpoint.port);

        let stream = &mut self.stream;
        stream.socket.abort();
        stream
            .net
            .drive(stream.socket.connect((address, endpoint.port)))
            .map_err(|err| {
                warn!("net: connect to {} failed: {:?}", address, err);
                SessionError::ConnectFailed
            })
    }

    fn is_open(&self) -> bool {
        self.stream.socket.state() == State::Established
    }

    fn stream(&mut self) -> Option<&mut TcpStream> {
        if !self.is_open() {
            return None;
        }
        Some(&mut self.stream)
    }

    fn close(&mut self) {
        self.stream.socket.close();
        self.stream.socket.abort();
        self.stream.net.poll();
    }
}
