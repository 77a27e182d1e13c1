//! Clock drift detection and the `WallClock` the block validator checks
//! timestamps against (spec §4.1 step 6).

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const NTP_SERVERS: &[&str] = &[
    "time.google.com:123",
    "time.cloudflare.com:123",
    "pool.ntp.org:123",
    "time.nist.gov:123",
];

const CHECK_INTERVAL_SECONDS: u64 = 5 * 60;
const MAX_DEVIATION_WARNING: i64 = 5;
const MAX_DEVIATION_SHUTDOWN: i64 = 10;

/// The clock a validator reads "now" from. A trait so tests can supply a
/// fixed time instead of racing the real clock.
#[async_trait]
pub trait WallClock: Send + Sync {
    fn now_unix(&self) -> u64;
}

pub struct TimeSync {
    calibration_delay_ms: i64,
}

impl TimeSync {
    pub fn new() -> Self {
        Self {
            calibration_delay_ms: 0,
        }
    }

    /// Starts the background NTP sync task. Deviation beyond
    /// `MAX_DEVIATION_SHUTDOWN` exits the process: an un-synced clock makes
    /// this node's own timestamp checks unreliable against the rest of the
    /// network, which spec §7 treats as one of the few fatal conditions.
    pub fn start_sync_task(self) {
        tokio::spawn(async move {
            let mut sync = self;
            info!("starting NTP time synchronization (checks every 5 minutes)");

            loop {
                if let Err(e) = sync.check_time_sync().await {
                    error!("ntp sync error: {}", e);
                }
                sleep(Duration::from_secs(CHECK_INTERVAL_SECONDS)).await;
            }
        });
    }

    pub async fn check_time_sync(&mut self) -> Result<i64, String> {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for server in NTP_SERVERS {
            match self.query_ntp_server(server).await {
                Ok((ntp_time, ping_ms)) => {
                    let local_time = Utc::now().timestamp();
                    let deviation = ntp_time - local_time;
                    results.push((server, ntp_time, deviation, ping_ms));
                }
                Err(e) => {
                    warn!("failed to query {}: {}", server, e);
                    errors.push(format!("{}: {}", server, e));
                }
            }
        }

        if results.is_empty() {
            return Err(format!("all NTP servers failed: {}", errors.join(", ")));
        }

        let mut deviations: Vec<i64> = results.iter().map(|(_, _, dev, _)| *dev).collect();
        deviations.sort_unstable();
        let median_deviation = if deviations.len() % 2 == 0 {
            let mid = deviations.len() / 2;
            (deviations[mid - 1] + deviations[mid]) / 2
        } else {
            deviations[deviations.len() / 2]
        };

        let (best_server, _, _, best_ping) = results
            .iter()
            .min_by_key(|(_, _, dev, _)| (dev - median_deviation).abs())
            .unwrap();

        self.calibration_delay_ms = best_ping / 2;
        let offset_ms = median_deviation * 1000;

        debug!(
            "ntp sync: {} servers, median offset {}s, best {} ({}ms)",
            results.len(),
            median_deviation,
            best_server,
            best_ping
        );

        if median_deviation.abs() > MAX_DEVIATION_SHUTDOWN {
            error!(
                "system clock is {}s off (tolerance ±{}s); shutting down to avoid consensus failures",
                median_deviation, MAX_DEVIATION_SHUTDOWN
            );
            std::process::exit(1);
        } else if median_deviation.abs() >= MAX_DEVIATION_WARNING {
            warn!(
                "system clock deviation is {}s, approaching the ±{}s tolerance",
                median_deviation, MAX_DEVIATION_SHUTDOWN
            );
        }

        Ok(offset_ms)
    }

    async fn query_ntp_server(&self, server: &str) -> Result<(i64, i64), String> {
        use std::time::Instant;
        use tokio::net::UdpSocket;

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| format!("failed to bind socket: {}", e))?;
        socket
            .connect(server)
            .await
            .map_err(|e| format!("failed to connect to {}: {}", server, e))?;

        let mut request = [0u8; 48];
        request[0] = 0x1B;

        let start = Instant::now();
        socket
            .send(&request)
            .await
            .map_err(|e| format!("failed to send NTP request: {}", e))?;

        let mut response = [0u8; 48];
        let receive_result =
            tokio::time::timeout(Duration::from_secs(5), socket.recv(&mut response)).await;
        let ping_ms = start.elapsed().as_millis() as i64;

        receive_result
            .map_err(|_| "NTP request timed out".to_string())?
            .map_err(|e| format!("failed to receive NTP response: {}", e))?;

        let seconds = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
        const NTP_UNIX_OFFSET: i64 = 2_208_988_800;
        let ntp_time = seconds as i64 - NTP_UNIX_OFFSET;

        Ok((ntp_time, ping_ms))
    }

    pub fn get_calibrated_time(&self) -> i64 {
        Utc::now().timestamp() + (self.calibration_delay_ms / 1000)
    }
}

impl Default for TimeSync {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WallClock for TimeSync {
    fn now_unix(&self) -> u64 {
        self.get_calibrated_time().max(0) as u64
    }
}

/// Test double holding a timestamp steady instead of reading the system clock.
pub struct FixedClock(pub u64);

#[async_trait]
impl WallClock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.0
    }
}
