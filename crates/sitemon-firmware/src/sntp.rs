//! Network clock set by a single SNTP exchange.

use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, Ipv4Address, Stack};
use embassy_time::{Duration, Instant, with_timeout};
use log::{info, warn};
use sitemon_core::time::{NTP_PACKET_LEN, NTP_PORT, TimeSource, ntp_request, parse_ntp_response};

const NTP_HOST: &str = "pool.ntp.org";

// Used when DNS is unavailable: time.cloudflare.com, time.google.com
const FALLBACK_SERVERS: [Ipv4Address; 2] = [
    Ipv4Address::new(162, 159, 200, 123),
    Ipv4Address::new(216, 239, 35, 0),
];

const REPLY_TIMEOUT_SECS: u64 = 3;

/// [`TimeSource`] anchored to the monotonic timer at the moment of the last
/// successful SNTP reply.
pub struct NetworkClock {
    stack: Stack<'static>,
    base: Option<(i64, Instant)>,
}

impl NetworkClock {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack, base: None }
    }

    async fn query(&self, server: IpAddress) -> Option<i64> {
        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0u8; 128];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_buffer = [0u8; 128];

        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        if socket.bind(0).is_err() {
            warn!("SNTP: failed to bind socket");
            return None;
        }

        if socket.send_to(&ntp_request(), (server, NTP_PORT)).await.is_err() {
            warn!("SNTP: failed to send request to {}", server);
            return None;
        }

        let mut packet = [0u8; NTP_PACKET_LEN];
        match with_timeout(
            Duration::from_secs(REPLY_TIMEOUT_SECS),
            socket.recv_from(&mut packet),
        )
        .await
        {
            Ok(Ok((len, _))) => parse_ntp_response(&packet[..len]),
            Ok(Err(e)) => {
                warn!("SNTP: receive error from {}: {:?}", server, e);
                None
            }
            Err(_) => {
                warn!("SNTP: no reply from {}", server);
                None
            }
        }
    }
}

impl TimeSource for NetworkClock {
    async fn start_sync(&mut self) {
        if !self.stack.is_config_up() {
            warn!("SNTP: network not configured");
            return;
        }

        let resolved = match self.stack.dns_query(NTP_HOST, DnsQueryType::A).await {
            Ok(addrs) => addrs.first().copied(),
            Err(e) => {
                warn!("SNTP: DNS lookup for {} failed: {:?}", NTP_HOST, e);
                None
            }
        };

        let servers = resolved
            .into_iter()
            .chain(FALLBACK_SERVERS.into_iter().map(IpAddress::Ipv4));

        for server in servers {
            if let Some(unix) = self.query(server).await {
                info!("SNTP: {} from {}", unix, server);
                self.base = Some((unix, Instant::now()));
                return;
            }
        }
        warn!("SNTP: all servers failed");
    }

    fn now_unix(&self) -> Option<i64> {
        self.base
            .map(|(unix, at)| unix + at.elapsed().as_secs() as i64)
    }

    fn uptime_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}
