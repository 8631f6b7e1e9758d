use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use fmesh_core::Message;
use log::{debug, info, warn};
use tokio::time::sleep;

/// Maximum heartbeat delay in whole seconds, inclusive
pub const MAX_JITTER_SECS: u64 = 30;

/// Source of the randomized delay between heartbeats.
///
/// Injectable so tests can pin the schedule. The jitter exists to keep many
/// nodes from hitting the server in synchronized bursts.
pub trait Jitter: Send {
    /// Next delay: a whole number of seconds in [0, MAX_JITTER_SECS]
    fn next_delay(&mut self) -> Duration;
}

/// Uniform jitter over [0, 30] seconds
#[derive(Debug, Default)]
pub struct UniformJitter;

impl Jitter for UniformJitter {
    fn next_delay(&mut self) -> Duration {
        Duration::from_secs(fastrand::u64(0..=MAX_JITTER_SECS))
    }
}

/// Outbound half of the transport, injectable for tests
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, data: &[u8]) -> io::Result<usize>;
}

/// Production outbound path: one ephemeral UDP socket per heartbeat
pub struct UdpOutbound {
    server: SocketAddr,
}

impl UdpOutbound {
    pub fn new(server: SocketAddr) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Outbound for UdpOutbound {
    async fn send(&self, data: &[u8]) -> io::Result<usize> {
        fmesh_transport::send_heartbeat(self.server, data).await
    }
}

/// Source of this node's own file listing
pub trait FileListing: Send {
    fn listing(&self) -> String;
}

/// Lists the share directory's file names, comma separated and sorted.
///
/// An unreadable directory yields an empty listing with a warning; the
/// heartbeat still goes out.
pub struct DirListing {
    dir: PathBuf,
}

impl DirListing {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileListing for DirListing {
    fn listing(&self) -> String {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot read share dir {}: {}", self.dir.display(), e);
                return String::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names.join(",")
    }
}

/// Self-rescheduling heartbeat transmitter
///
/// Owns the version counter: it starts at 1, advances after every firing
/// whether the send worked or not, and wraps modulo 256. A failed send is
/// logged and never changes the cadence.
pub struct HeartbeatEngine {
    version: u8,
    node_ip: String,
    listing: Box<dyn FileListing>,
    jitter: Box<dyn Jitter>,
    outbound: Box<dyn Outbound>,
}

impl HeartbeatEngine {
    pub fn new(
        node_ip: impl Into<String>,
        listing: Box<dyn FileListing>,
        jitter: Box<dyn Jitter>,
        outbound: Box<dyn Outbound>,
    ) -> Self {
        Self {
            version: 1,
            node_ip: node_ip.into(),
            listing,
            jitter,
            outbound,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Build the next heartbeat from current local state
    fn next_message(&self) -> Message {
        Message::new(
            self.version,
            self.node_ip.clone(),
            unix_now(),
            self.listing.listing(),
        )
    }

    /// Fire one heartbeat and advance the version counter
    pub async fn fire(&mut self) {
        let message = self.next_message();
        match message.encode() {
            Ok(bytes) => match self.outbound.send(&bytes).await {
                Ok(sent) => info!(
                    "sent heartbeat v{} ({} bytes) at {}",
                    message.version, sent, message.timestamp
                ),
                Err(e) => warn!("heartbeat send failed: {}", e),
            },
            Err(e) => warn!("heartbeat encode failed: {}", e),
        }
        self.version = self.version.wrapping_add(1);
    }

    /// Jittered wait, fire, reschedule, forever.
    ///
    /// The first firing also waits a full jitter draw so that freshly
    /// started nodes do not announce in lockstep.
    pub async fn run(mut self) {
        loop {
            let delay = self.jitter.next_delay();
            debug!("next heartbeat in {}s", delay.as_secs());
            sleep(delay).await;
            self.fire().await;
        }
    }
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;

    use super::*;

    struct FixedJitter(Duration);

    impl Jitter for FixedJitter {
        fn next_delay(&mut self) -> Duration {
            self.0
        }
    }

    struct FixedListing(&'static str);

    impl FileListing for FixedListing {
        fn listing(&self) -> String {
            self.0.to_string()
        }
    }

    /// Records every sent datagram and can be told to fail
    struct RecordingOutbound {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        fail: bool,
        notify: Option<mpsc::UnboundedSender<Vec<u8>>>,
    }

    impl RecordingOutbound {
        fn new(sent: Arc<Mutex<Vec<Vec<u8>>>>, fail: bool) -> Self {
            Self {
                sent,
                fail,
                notify: None,
            }
        }
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send(&self, data: &[u8]) -> io::Result<usize> {
            self.sent.lock().unwrap().push(data.to_vec());
            if let Some(notify) = &self.notify {
                let _ = notify.send(data.to_vec());
            }
            if self.fail {
                Err(io::Error::new(io::ErrorKind::Other, "unreachable"))
            } else {
                Ok(data.len())
            }
        }
    }

    fn engine(outbound: RecordingOutbound) -> HeartbeatEngine {
        HeartbeatEngine::new(
            "10.0.0.5",
            Box::new(FixedListing("a.txt,b.txt")),
            Box::new(FixedJitter(Duration::from_secs(5))),
            Box::new(outbound),
        )
    }

    #[tokio::test]
    async fn test_version_advances_per_firing() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut engine = engine(RecordingOutbound::new(sent.clone(), false));

        assert_eq!(engine.version(), 1);
        for n in 1..=300u32 {
            engine.fire().await;
            assert_eq!(engine.version() as u32, (1 + n) % 256);
        }
        assert_eq!(sent.lock().unwrap().len(), 300);
    }

    #[tokio::test]
    async fn test_send_failure_still_advances_version() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut engine = engine(RecordingOutbound::new(sent.clone(), true));

        for _ in 0..3 {
            engine.fire().await;
        }
        assert_eq!(engine.version(), 4);
        // The attempts were still made.
        assert_eq!(sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_heartbeat_bytes_carry_local_state() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut engine = engine(RecordingOutbound::new(sent.clone(), false));
        engine.fire().await;

        let sent = sent.lock().unwrap();
        let bytes = &sent[0];
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x08);
        assert_eq!(&bytes[2..10], b"10.0.0.5");
        // 4 timestamp bytes, then the listing.
        assert_eq!(&bytes[14..], b"a.txt,b.txt");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_send_waits_one_jitter_draw() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut outbound = RecordingOutbound::new(sent.clone(), false);
        outbound.notify = Some(tx);

        let start = tokio::time::Instant::now();
        tokio::spawn(engine(outbound).run());

        let first = rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(first[0], 0x01);
        assert_eq!(first[1], 0x08);
        assert_eq!(&first[2..10], b"10.0.0.5");

        let second = rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(second[0], 0x02);
    }

    #[test]
    fn test_uniform_jitter_range_and_spread() {
        let mut jitter = UniformJitter;
        let mut counts = [0u32; MAX_JITTER_SECS as usize + 1];
        let draws = 31_000;

        for _ in 0..draws {
            let delay = jitter.next_delay();
            assert_eq!(delay.subsec_nanos(), 0, "delay must be whole seconds");
            let secs = delay.as_secs();
            assert!(secs <= MAX_JITTER_SECS);
            counts[secs as usize] += 1;
        }

        // Roughly uniform: every value drawn, none wildly over-represented.
        let expected = draws / counts.len() as u32;
        for (secs, count) in counts.iter().enumerate() {
            assert!(
                *count > expected / 2 && *count < expected * 2,
                "value {}s drawn {} times, expected about {}",
                secs,
                count,
                expected
            );
        }
    }

    #[test]
    fn test_dir_listing_sorted_and_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let listing = DirListing::new(dir.path());
        assert_eq!(listing.listing(), "a.txt,b.txt");
    }

    #[test]
    fn test_dir_listing_missing_dir_is_empty_not_fatal() {
        let listing = DirListing::new("/definitely/not/here");
        assert_eq!(listing.listing(), "");
    }
}
