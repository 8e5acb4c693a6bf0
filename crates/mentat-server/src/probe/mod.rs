//! Latency Probing
//!
//! One probe measures the RTT to one destination:
//! 1. resolve the destination to an IPv4 address (no retry)
//! 2. open a single echo session bound to the configured source address
//! 3. send up to `attempts` echo requests, spaced `timeout / attempts` apart
//! 4. return the first RTT to arrive, or a timeout once the budget runs out
//!
//! Every outstanding request keeps waiting until the shared deadline, so a
//! late reply to an earlier sequence still counts.
//!
//! The session is an owned value and is dropped on every exit path.
//! Sockets are abstracted behind `EchoSocket` so the attempt/budget logic can
//! be exercised without raw socket privileges.

mod icmp;

pub use icmp::{IcmpProber, IcmpSession, IcmpSocket};

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Either an RTT or the reason no RTT was measured.
pub type ProbeOutcome = Result<Duration, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to resolve '{destination}': {reason}")]
    Resolution { destination: String, reason: String },
    #[error("failed to open echo session: {0}")]
    SessionOpen(#[source] std::io::Error),
    #[error("no echo reply after {attempts} attempt(s) within {budget:?}")]
    Timeout { attempts: u16, budget: Duration },
    #[error("echo transport error: {0}")]
    Transport(String),
}

impl ProbeError {
    /// Stable label for logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Resolution { .. } => "resolution",
            ProbeError::SessionOpen(_) => "session_open",
            ProbeError::Timeout { .. } => "timeout",
            ProbeError::Transport(_) => "transport",
        }
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    /// Measure the RTT to `destination`. Never panics on network errors.
    async fn probe(&self, destination: &str) -> ProbeOutcome;
}

/// Probe tuning
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Echo requests per probe
    pub attempts: u16,
    /// Budget shared by all attempts of one probe
    pub timeout: Duration,
    /// Source address for the echo session
    pub bind_addr: IpAddr,
    /// ICMP payload length in bytes
    pub payload_size: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(30),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            payload_size: 56,
        }
    }
}

impl ProbeConfig {
    /// Spacing between consecutive echo requests.
    pub fn attempt_interval(&self) -> Duration {
        self.timeout / u32::from(self.attempts.max(1))
    }
}

/// Failure of a single echo attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoError {
    /// No reply before the deadline; other attempts may still succeed
    Timeout,
    /// Socket-level failure; further attempts are pointless
    Transport(String),
}

/// Opens echo sessions towards one target.
#[async_trait]
pub trait EchoSocket: Send + Sync {
    type Session: EchoSession;

    async fn open(&self, bind_addr: IpAddr, target: IpAddr) -> Result<Self::Session, ProbeError>;
}

/// An open echo session. Dropping it releases the underlying socket.
///
/// Several sequences may be in flight on one session at the same time.
#[async_trait]
pub trait EchoSession: Send + Sync {
    async fn echo(&self, sequence: u16, timeout: Duration) -> Result<Duration, EchoError>;
}

/// `Prober` built on any `EchoSocket`.
pub struct EchoProber<S> {
    socket: S,
    config: ProbeConfig,
}

impl<S: EchoSocket> EchoProber<S> {
    pub fn new(socket: S, config: ProbeConfig) -> Self {
        Self { socket, config }
    }
}

#[async_trait]
impl<S: EchoSocket> Prober for EchoProber<S> {
    async fn probe(&self, destination: &str) -> ProbeOutcome {
        let target = resolve_ipv4(destination).await?;
        let session = self.socket.open(self.config.bind_addr, target).await?;

        let outcome = run_attempts(&session, &self.config).await;
        drop(session);

        if let Ok(rtt) = &outcome {
            debug!(
                destination = %destination,
                address = %target,
                rtt_ms = rtt.as_secs_f64() * 1000.0,
                "Echo reply received"
            );
        }

        outcome
    }
}

/// Resolve `destination` to its first IPv4 address.
pub async fn resolve_ipv4(destination: &str) -> Result<IpAddr, ProbeError> {
    let resolution_error = |reason: String| ProbeError::Resolution {
        destination: destination.to_string(),
        reason,
    };

    if destination.trim().is_empty() {
        return Err(resolution_error("empty destination".to_string()));
    }

    let addrs = tokio::net::lookup_host((destination, 0))
        .await
        .map_err(|e| resolution_error(e.to_string()))?;

    addrs
        .map(|addr| addr.ip())
        .find(IpAddr::is_ipv4)
        .ok_or_else(|| resolution_error("no IPv4 address".to_string()))
}

async fn run_attempts<E: EchoSession>(session: &E, config: &ProbeConfig) -> ProbeOutcome {
    let deadline = Instant::now() + config.timeout;
    let interval = config.attempt_interval();
    let mut in_flight = FuturesUnordered::new();
    let mut next_send = Instant::now();
    let mut sent = 0u16;

    loop {
        let now = Instant::now();
        let remaining = deadline.saturating_duration_since(now);
        if remaining.is_zero() {
            break;
        }

        // Send on schedule, or right away once every earlier attempt is lost.
        if sent < config.attempts && (now >= next_send || in_flight.is_empty()) {
            let sequence = sent;
            sent += 1;
            next_send = now + interval;

            // The session honours the timeout itself; the outer one is a hard cap.
            in_flight.push(async move {
                let reply = tokio::time::timeout(remaining, session.echo(sequence, remaining))
                    .await
                    .unwrap_or(Err(EchoError::Timeout));
                (sequence, reply)
            });
            continue;
        }

        if in_flight.is_empty() {
            break;
        }

        let wake = if sent < config.attempts {
            next_send.min(deadline)
        } else {
            deadline
        };

        tokio::select! {
            Some((sequence, reply)) = in_flight.next() => match reply {
                Ok(rtt) => return Ok(rtt),
                Err(EchoError::Timeout) => {
                    trace!(sequence = sequence, "Echo attempt got no reply");
                }
                Err(EchoError::Transport(reason)) => return Err(ProbeError::Transport(reason)),
            },
            _ = tokio::time::sleep_until(wake) => {}
        }
    }

    Err(ProbeError::Timeout {
        attempts: sent,
        budget: config.timeout,
    })
}
