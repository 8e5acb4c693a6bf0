//! ICMPv4 echo sessions backed by `surge-ping`.
//!
//! Opening a session needs `CAP_NET_RAW` (or a permissive
//! `net.ipv4.ping_group_range` for unprivileged datagram sockets).

use super::{EchoError, EchoProber, EchoSession, EchoSocket, ProbeConfig, ProbeError};
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};

/// Prober that sends real ICMP echo requests.
pub type IcmpProber = EchoProber<IcmpSocket>;

impl EchoProber<IcmpSocket> {
    pub fn icmp(config: ProbeConfig) -> Self {
        let socket = IcmpSocket::new(config.payload_size);
        EchoProber::new(socket, config)
    }
}

pub struct IcmpSocket {
    payload: Vec<u8>,
}

impl IcmpSocket {
    pub fn new(payload_size: usize) -> Self {
        Self {
            payload: vec![0; payload_size],
        }
    }
}

#[async_trait]
impl EchoSocket for IcmpSocket {
    type Session = IcmpSession;

    async fn open(&self, bind_addr: IpAddr, target: IpAddr) -> Result<IcmpSession, ProbeError> {
        let config = Config::builder()
            .kind(ICMP::V4)
            .bind(SocketAddr::new(bind_addr, 0))
            .build();

        let client = Client::new(&config).map_err(open_error)?;

        Ok(IcmpSession {
            client,
            target,
            identifier: PingIdentifier(rand::random()),
            payload: self.payload.clone(),
        })
    }
}

/// One raw socket towards a single target.
///
/// Replies are matched on (target, identifier, sequence), so each sequence
/// gets its own pinger on the shared socket.
pub struct IcmpSession {
    client: Client,
    target: IpAddr,
    identifier: PingIdentifier,
    payload: Vec<u8>,
}

#[async_trait]
impl EchoSession for IcmpSession {
    async fn echo(&self, sequence: u16, timeout: Duration) -> Result<Duration, EchoError> {
        let mut pinger = self.client.pinger(self.target, self.identifier).await;
        pinger.timeout(timeout);
        match pinger.ping(PingSequence(sequence), &self.payload).await {
            Ok((_packet, rtt)) => Ok(rtt),
            Err(SurgeError::Timeout { .. }) => Err(EchoError::Timeout),
            Err(e) => Err(EchoError::Transport(e.to_string())),
        }
    }
}

fn open_error(err: io::Error) -> ProbeError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => ProbeError::Transport(format!(
            "permission denied opening ICMP socket (needs CAP_NET_RAW): {err}"
        )),
        _ => ProbeError::SessionOpen(err),
    }
}
