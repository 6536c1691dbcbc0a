//! LAN discovery: the host announces its lobby over UDP broadcast and
//! joining processes scan for announcements.
//!
//! Announcements repeat every 500 ms with no ack or retry; a lost
//! datagram is covered by the next one. Datagrams are ASCII,
//! colon-delimited: `BRAWL_HOST:<ip>:<seat count>:<join code>`.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::protocol::{DISCOVERY_MAGIC, DISCOVERY_PORT, SESSION_PORT};
use crate::session::{Phase, Session};

pub const ANNOUNCE_INTERVAL: Duration = Duration::from_millis(500);
const SCAN_READ_TIMEOUT: Duration = Duration::from_millis(500);
const STALE_AFTER: Duration = Duration::from_secs(2);
const MAX_KNOWN_SERVERS: usize = 20;
const LOOPBACK_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub host_ip: Ipv4Addr,
    pub seat_count: u8,
    pub join_code: String,
}

impl Announcement {
    pub fn to_wire(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            DISCOVERY_MAGIC, self.host_ip, self.seat_count, self.join_code
        )
    }

    /// Parse a datagram; anything without our magic prefix or with a
    /// malformed field is silently not ours.
    pub fn parse(message: &str) -> Option<Self> {
        let mut parts = message.split(':');
        if parts.next()? != DISCOVERY_MAGIC {
            return None;
        }
        let host_ip = parts.next()?.parse().ok()?;
        let seat_count = parts.next()?.parse().ok()?;
        let join_code = parts.next()?.to_string();
        if join_code.is_empty() {
            return None;
        }
        Some(Self {
            host_ip,
            seat_count,
            join_code,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveredServer {
    pub ip: Ipv4Addr,
    pub seat_count: u8,
    pub join_code: String,
    pub last_seen: Instant,
}

/// Known servers, deduplicated by address or join code: a later
/// announcement for either key replaces the earlier entry.
#[derive(Debug, Default)]
pub struct ServerList {
    inner: Mutex<Vec<DiscoveredServer>>,
}

impl ServerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, ann: &Announcement) {
        let entry = DiscoveredServer {
            ip: ann.host_ip,
            seat_count: ann.seat_count,
            join_code: ann.join_code.clone(),
            last_seen: Instant::now(),
        };

        let mut servers = self.lock();
        if let Some(existing) = servers
            .iter_mut()
            .find(|s| s.ip == ann.host_ip || s.join_code == ann.join_code)
        {
            *existing = entry;
        } else if servers.len() < MAX_KNOWN_SERVERS {
            servers.push(entry);
        }
    }

    pub fn snapshot(&self) -> Vec<DiscoveredServer> {
        self.lock().clone()
    }

    pub fn find_by_code(&self, code: &str) -> Option<Ipv4Addr> {
        self.lock()
            .iter()
            .find(|s| s.join_code == code)
            .map(|s| s.ip)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// True while announcements keep arriving; drives the UI's
    /// "receiving broadcasts" vs. "scanning" indicator.
    pub fn receiving(&self) -> bool {
        self.lock()
            .iter()
            .any(|s| s.last_seen.elapsed() < STALE_AFTER)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DiscoveredServer>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Best-guess LAN address of this machine: a UDP connect carries no
/// traffic but makes the OS pick the outbound interface.
pub fn local_ipv4() -> Ipv4Addr {
    let guess = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|s| {
            s.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            s.local_addr()
        })
        .ok();

    match guess {
        Some(SocketAddr::V4(addr)) => *addr.ip(),
        _ => Ipv4Addr::LOCALHOST,
    }
}

/// Broadcast, loopback, and the /24 subnet broadcast derived from the
/// host's own address; some networks filter one form but not another.
fn announce_targets(host_ip: Ipv4Addr) -> Vec<SocketAddrV4> {
    let mut targets = vec![
        SocketAddrV4::new(Ipv4Addr::BROADCAST, DISCOVERY_PORT),
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, DISCOVERY_PORT),
    ];
    if !host_ip.is_loopback() {
        let [a, b, c, _] = host_ip.octets();
        targets.push(SocketAddrV4::new(
            Ipv4Addr::new(a, b, c, 255),
            DISCOVERY_PORT,
        ));
    }
    targets
}

/// Host-side announcement loop; runs while the lobby stays open.
pub struct Broadcaster {
    handle: Option<JoinHandle<()>>,
}

impl Broadcaster {
    pub fn start(session: Arc<Session>) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;

        let host_ip = local_ipv4();
        log::info!("broadcasting lobby {} from {}", session.join_code(), host_ip);

        let handle = thread::spawn(move || broadcast_loop(socket, session, host_ip));
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Blocks for at most one announce interval.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn broadcast_loop(socket: UdpSocket, session: Arc<Session>, host_ip: Ipv4Addr) {
    let targets = announce_targets(host_ip);

    while session.is_running() && session.phase() == Phase::LobbyOpen {
        let message = Announcement {
            host_ip,
            seat_count: session.seat_count() as u8,
            join_code: session.join_code().to_string(),
        }
        .to_wire();

        for target in &targets {
            if let Err(e) = socket.send_to(message.as_bytes(), target) {
                log::debug!("announcement to {} failed: {}", target, e);
            }
        }

        thread::sleep(ANNOUNCE_INTERVAL);
    }

    log::info!("stopped broadcasting");
}

/// Client-side scanner; upserts parsed announcements into a shared list.
pub struct ServerBrowser {
    list: Arc<ServerList>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ServerBrowser {
    pub fn start() -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, DISCOVERY_PORT))?;
        socket.set_read_timeout(Some(SCAN_READ_TIMEOUT))?;

        let list = Arc::new(ServerList::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let list = Arc::clone(&list);
            let running = Arc::clone(&running);
            thread::spawn(move || scan_loop(socket, list, running))
        };

        Ok(Self {
            list,
            running,
            handle: Some(handle),
        })
    }

    pub fn servers(&self) -> Arc<ServerList> {
        Arc::clone(&self.list)
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ServerBrowser {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn scan_loop(socket: UdpSocket, list: Arc<ServerList>, running: Arc<AtomicBool>) {
    log::info!("scanning for lobbies on port {}", DISCOVERY_PORT);
    let mut buf = [0u8; 1024];

    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                let message = String::from_utf8_lossy(&buf[..len]);
                match Announcement::parse(&message) {
                    Some(ann) => {
                        log::debug!("lobby {} at {} ({} seats)", ann.join_code, ann.host_ip, ann.seat_count);
                        list.upsert(&ann);
                    }
                    None => log::debug!("ignoring datagram from {}", from),
                }
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::warn!("scan receive error: {}", e);
                thread::sleep(SCAN_READ_TIMEOUT);
            }
        }
    }

    log::info!("stopped scanning, {} lobbies known", list.len());
}

/// Resolve a join code to an address: discovered servers first, then a
/// probe of loopback's session port for the same-machine case.
pub fn resolve_code(list: &ServerList, code: &str) -> Option<Ipv4Addr> {
    if let Some(ip) = list.find_by_code(code) {
        return Some(ip);
    }

    let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, SESSION_PORT));
    if TcpStream::connect_timeout(&loopback, LOOPBACK_PROBE_TIMEOUT).is_ok() {
        log::info!("code {} not seen in broadcasts, but a local host is listening", code);
        return Some(Ipv4Addr::LOCALHOST);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(ip: [u8; 4], count: u8, code: &str) -> Announcement {
        Announcement {
            host_ip: Ipv4Addr::from(ip),
            seat_count: count,
            join_code: code.to_string(),
        }
    }

    #[test]
    fn test_announcement_roundtrip() {
        let original = ann([192, 168, 1, 23], 3, "AB12CD");
        let wire = original.to_wire();
        assert_eq!(wire, "BRAWL_HOST:192.168.1.23:3:AB12CD");
        assert_eq!(Announcement::parse(&wire).unwrap(), original);
    }

    #[test]
    fn test_malformed_announcements_rejected() {
        assert!(Announcement::parse("OTHER_GAME:10.0.0.1:2:ABCDEF").is_none());
        assert!(Announcement::parse("BRAWL_HOST:10.0.0.1:2").is_none());
        assert!(Announcement::parse("BRAWL_HOST:not-an-ip:2:ABCDEF").is_none());
        assert!(Announcement::parse("BRAWL_HOST:10.0.0.1:lots:ABCDEF").is_none());
        assert!(Announcement::parse("").is_none());
    }

    #[test]
    fn test_upsert_is_idempotent_per_code() {
        let list = ServerList::new();
        for n in 1..=5 {
            list.upsert(&ann([192, 168, 1, 23], n, "AB12CD"));
        }
        assert_eq!(list.len(), 1);
        assert_eq!(list.snapshot()[0].seat_count, 5);
    }

    #[test]
    fn test_upsert_replaces_by_ip_or_code() {
        let list = ServerList::new();
        list.upsert(&ann([192, 168, 1, 23], 1, "AB12CD"));
        // Same host re-announces with a new code (fresh lobby).
        list.upsert(&ann([192, 168, 1, 23], 1, "ZZ99ZZ"));
        assert_eq!(list.len(), 1);
        assert_eq!(list.find_by_code("ZZ99ZZ"), Some(Ipv4Addr::new(192, 168, 1, 23)));

        // A different host with the same code replaces too.
        list.upsert(&ann([192, 168, 1, 50], 2, "ZZ99ZZ"));
        assert_eq!(list.len(), 1);
        assert_eq!(list.find_by_code("ZZ99ZZ"), Some(Ipv4Addr::new(192, 168, 1, 50)));
    }

    #[test]
    fn test_list_capped() {
        let list = ServerList::new();
        for i in 0..40u8 {
            list.upsert(&ann([10, 0, 0, i], 1, &format!("CODE{:02}", i)));
        }
        assert_eq!(list.len(), MAX_KNOWN_SERVERS);
    }

    #[test]
    fn test_receiving_freshness() {
        let list = ServerList::new();
        assert!(!list.receiving());
        list.upsert(&ann([10, 0, 0, 1], 1, "ABCDEF"));
        assert!(list.receiving());
    }

    #[test]
    fn test_announce_targets_include_subnet() {
        let targets = announce_targets(Ipv4Addr::new(192, 168, 7, 42));
        assert!(targets.iter().any(|t| *t.ip() == Ipv4Addr::BROADCAST));
        assert!(targets.iter().any(|t| *t.ip() == Ipv4Addr::LOCALHOST));
        assert!(targets.iter().any(|t| *t.ip() == Ipv4Addr::new(192, 168, 7, 255)));

        let loopback_only = announce_targets(Ipv4Addr::LOCALHOST);
        assert_eq!(loopback_only.len(), 2);
    }
}
