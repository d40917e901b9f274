use super::std_io::StdIoAdapter;
use crate::error::{Error, Result};
use core::{
    fmt::{self, Display},
    str::FromStr,
};
use std::{
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

pub type TcpAdapter = StdIoAdapter<TcpStream>;

/// Target of a connection, written as `"<host>:<port>"`
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ConnectionId {
    pub host: String,
    pub port: u16,
}

impl FromStr for ConnectionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(s.to_string());
        let (host, port) = s.split_once(':').ok_or_else(invalid)?;
        let (host, port) = (host.trim(), port.trim());
        if host.is_empty() || port.is_empty() {
            return Err(invalid());
        }
        Ok(ConnectionId {
            host: host.to_string(),
            port: port.parse().map_err(|_| invalid())?,
        })
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens a TCP stream to the projector. A read or write that takes longer than `timeout`
/// fails, after which the connection has to be reopened.
pub fn connect_tcp(id: &ConnectionId, timeout: Option<Duration>) -> Result<TcpAdapter> {
    let addr = (id.host.as_str(), id.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::InvalidAddress(id.to_string()))?;
    let stream = match timeout {
        Some(t) => TcpStream::connect_timeout(&addr, t)?,
        None => TcpStream::connect(addr)?,
    };
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    stream.set_nodelay(true)?;
    log::info!("Connected to {}", id);
    Ok(StdIoAdapter::new(stream))
}

impl StdIoAdapter<TcpStream> {
    pub(crate) fn shutdown(&self) {
        // Peer may already be gone, nothing left to do about it
        let _ = self.get_ref().shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_connection_id() {
        assert_ok_eq!(
            "192.168.1.100:21845".parse::<ConnectionId>(),
            ConnectionId {
                host: "192.168.1.100".to_string(),
                port: 0x5555,
            }
        );
        assert_ok_eq!(
            " localhost : 80 ".parse::<ConnectionId>(),
            ConnectionId {
                host: "localhost".to_string(),
                port: 80,
            }
        );
    }

    #[test]
    fn reject_malformed_connection_id() {
        assert_matches!("192.168.1.100".parse::<ConnectionId>(), Err(Error::InvalidAddress(_)));
        assert_err!(":21845".parse::<ConnectionId>());
        assert_err!("192.168.1.100: ".parse::<ConnectionId>());
        assert_err!("192.168.1.100:port".parse::<ConnectionId>());
        assert_err!("192.168.1.100:70000".parse::<ConnectionId>());
    }

    #[test]
    fn display_round_trip() {
        let id: ConnectionId = "10.0.0.2:21845".parse().unwrap();
        assert_eq!(id.to_string(), "10.0.0.2:21845");
    }
}
