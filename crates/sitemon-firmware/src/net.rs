//! WiFi station link and the HTTP client for the readings API.
//!
//! Requests are plain HTTP/1.0 over a single [`TcpSocket`]; the server closes
//! the connection after the body, so the response is read until EOF.

use alloc::vec::Vec;

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Ipv4Address, Runner, Stack};
use embassy_time::{Duration, Timer, with_timeout};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use log::{debug, info, warn};
use sitemon_core::api::{SitePayload, decode_payload, request_target};
use sitemon_core::config::{ApiConfig, InternetConfig};
use sitemon_core::fetch::{FetchError, SiteFetcher};
use sitemon_core::http::{MAX_RESPONSE_BYTES, build_request, response_body, split_host_port};

const WIFI_MAX_RETRIES: u8 = 3;
const WIFI_RETRY_DELAY_SECS: u64 = 2;
const IP_TIMEOUT_SECS: u64 = 15;

const SOCKET_TIMEOUT_SECS: u64 = 10;
const SOCKET_BUF_LEN: usize = 2048;
const READ_CHUNK_LEN: usize = 1024;

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// [`SiteFetcher`] over the on-board WiFi radio.
pub struct WifiFetcher {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    internet: InternetConfig<'static>,
    api: ApiConfig<'static>,
}

impl WifiFetcher {
    pub fn new(
        controller: WifiController<'static>,
        stack: Stack<'static>,
        internet: InternetConfig<'static>,
        api: ApiConfig<'static>,
    ) -> Self {
        Self {
            controller,
            stack,
            internet,
            api,
        }
    }

    async fn start_radio(&mut self) -> Result<(), FetchError> {
        if matches!(self.controller.is_started(), Ok(true)) {
            return Ok(());
        }

        let client_config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(self.internet.ssid.into())
                .with_password(self.internet.password.into()),
        );
        self.controller.set_config(&client_config).map_err(|e| {
            warn!("WiFi config rejected: {:?}", e);
            FetchError::NotConnected
        })?;

        info!("Starting WiFi...");
        self.controller.start_async().await.map_err(|e| {
            warn!("WiFi start failed: {:?}", e);
            FetchError::NotConnected
        })
    }

    async fn wait_for_ip(&self) -> Result<(), FetchError> {
        let stack = self.stack;
        let ready = async {
            stack.wait_link_up().await;
            stack.wait_config_up().await;
        };

        with_timeout(Duration::from_secs(IP_TIMEOUT_SECS), ready)
            .await
            .map_err(|_| {
                warn!("No IP address after {} s", IP_TIMEOUT_SECS);
                FetchError::NotConnected
            })?;

        if let Some(config) = self.stack.config_v4() {
            info!("Got IP: {}", config.address);
        }
        Ok(())
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, FetchError> {
        if let Ok(addr) = host.parse::<Ipv4Address>() {
            return Ok(IpAddress::Ipv4(addr));
        }

        let addrs = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("DNS lookup for {} failed: {:?}", host, e);
                FetchError::Network {
                    reason: "DNS lookup failed",
                }
            })?;

        addrs.first().copied().ok_or(FetchError::Network {
            reason: "DNS returned no address",
        })
    }
}

impl SiteFetcher for WifiFetcher {
    async fn ensure_connected(&mut self) -> Result<(), FetchError> {
        if matches!(self.controller.is_connected(), Ok(true)) && self.stack.is_config_up() {
            return Ok(());
        }

        self.start_radio().await?;

        info!("Connecting to {}...", self.internet.ssid);
        let mut attempt = 1;
        loop {
            match self.controller.connect_async().await {
                Ok(()) => {
                    info!("WiFi connected");
                    break;
                }
                Err(e) if attempt < WIFI_MAX_RETRIES => {
                    warn!(
                        "WiFi connect attempt {} of {} failed: {:?}, retrying...",
                        attempt, WIFI_MAX_RETRIES, e
                    );
                    Timer::after(Duration::from_secs(WIFI_RETRY_DELAY_SECS)).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("WiFi connect failed: {:?}", e);
                    return Err(FetchError::NotConnected);
                }
            }
        }

        self.wait_for_ip().await
    }

    async fn fetch(&mut self, site: &str, count: u16) -> Result<SitePayload, FetchError> {
        if !self.stack.is_config_up() {
            return Err(FetchError::NotConnected);
        }

        let target = request_target(self.api.path, site, count)?;
        let (host, port) = split_host_port(self.api.host);
        let request = build_request(self.api.host, &target)?;
        let addr = self.resolve(host).await?;

        let mut rx_buffer = [0u8; SOCKET_BUF_LEN];
        let mut tx_buffer = [0u8; SOCKET_BUF_LEN];
        let mut socket = TcpSocket::new(self.stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

        debug!("GET {}{}", self.api.host, target.as_str());
        socket.connect((addr, port)).await.map_err(|e| {
            warn!("Connect to {}:{} failed: {:?}", host, port, e);
            FetchError::Network {
                reason: "connect failed",
            }
        })?;

        write_all(&mut socket, request.as_bytes()).await?;

        let raw = read_to_end(&mut socket).await;
        socket.close();
        let raw = raw?;

        debug!("Received {} bytes", raw.len());
        let body = response_body(&raw)?;
        Ok(decode_payload(body)?)
    }
}

async fn write_all(socket: &mut TcpSocket<'_>, mut bytes: &[u8]) -> Result<(), FetchError> {
    let failed = FetchError::Network {
        reason: "write failed",
    };
    while !bytes.is_empty() {
        match socket.write(bytes).await {
            Ok(0) | Err(_) => return Err(failed),
            Ok(n) => bytes = &bytes[n..],
        }
    }
    socket.flush().await.map_err(|_| failed)
}

async fn read_to_end(socket: &mut TcpSocket<'_>) -> Result<Vec<u8>, FetchError> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_LEN];

    loop {
        let n = socket.read(&mut chunk).await.map_err(|_| FetchError::Network {
            reason: "read failed",
        })?;
        if n == 0 {
            return Ok(raw);
        }
        if raw.len() + n > MAX_RESPONSE_BYTES {
            return Err(FetchError::Network {
                reason: "response too large",
            });
        }
        raw.try_reserve(n).map_err(|_| FetchError::Network {
            reason: "out of memory",
        })?;
        raw.extend_from_slice(&chunk[..n]);
    }
}
