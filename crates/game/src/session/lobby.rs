//! Host side of the lobby: TCP acceptor, join handshake, battle start.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{Phase, Session, SessionError};
use crate::net::discovery::Broadcaster;
use crate::net::protocol::{MAX_SEATS, SESSION_PORT, START_TOKEN};
use crate::net::replication::PeerLink;

const ACCEPT_POLL: Duration = Duration::from_millis(100);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_NAME_LEN: usize = 64;

/// An open lobby. Accepts joiners in the background and announces
/// itself over UDP until the battle starts or the lobby closes.
pub struct HostLobby {
    session: Arc<Session>,
    links: Arc<Mutex<Vec<PeerLink>>>,
    open: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
    broadcaster: Option<Broadcaster>,
}

impl HostLobby {
    /// Bind the session port, start announcing, and begin accepting
    /// joiners. Fails if the port is already taken.
    pub fn open(session: Arc<Session>) -> Result<Self, SessionError> {
        Self::open_on(session, SESSION_PORT)
    }

    pub fn open_on(session: Arc<Session>, port: u16) -> Result<Self, SessionError> {
        let listener =
            TcpListener::bind(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))?;
        listener.set_nonblocking(true)?;

        session.set_phase(Phase::LobbyOpen);
        session.set_status(format!("Lobby open, code {}", session.join_code()));
        log::info!("lobby open on port {} with code {}", port, session.join_code());

        let links = Arc::new(Mutex::new(Vec::new()));
        let open = Arc::new(AtomicBool::new(true));

        let acceptor = {
            let session = Arc::clone(&session);
            let links = Arc::clone(&links);
            let open = Arc::clone(&open);
            thread::spawn(move || accept_loop(listener, session, links, open))
        };

        // A host without UDP announcements is still joinable by IP.
        let broadcaster = match Broadcaster::start(Arc::clone(&session)) {
            Ok(b) => Some(b),
            Err(e) => {
                log::warn!("discovery announcements unavailable: {}", e);
                None
            }
        };

        Ok(Self {
            session,
            links: Arc::clone(&links),
            open,
            acceptor: Some(acceptor),
            broadcaster,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Send the start token to every connected client and hand the
    /// links over to replication. Needs at least 2 seats. A client
    /// that cannot be reached is dropped; everyone else still starts.
    pub fn start_battle(mut self) -> Result<Vec<PeerLink>, SessionError> {
        if !self.session.can_start() {
            return Err(SessionError::NotStartable);
        }

        self.session.set_phase(Phase::Starting);
        self.stop_background();

        let mut links = std::mem::take(&mut *lock(&self.links));
        for link in &mut links {
            if let Err(e) = link.stream_mut().write_all(START_TOKEN) {
                log::warn!("start signal to seat {} failed: {}", link.seat, e);
                link.retire();
                continue;
            }
            if let Err(e) = link.prepare_for_battle() {
                log::warn!("seat {} could not enter battle mode: {}", link.seat, e);
                link.retire();
            }
        }
        links.retain(PeerLink::is_alive);

        self.session.set_phase(Phase::InBattle);
        self.session.set_status("Battle started");
        log::info!("battle started with {} seats", self.session.seat_count());
        Ok(links)
    }

    /// Close the lobby without starting. Connected clients see the
    /// stream close while waiting for the start token.
    pub fn close(self) {
        if self.session.phase() == Phase::LobbyOpen {
            self.session.set_status("Lobby closed");
        }
        log::info!("lobby closed");
        // Drop joins the acceptor and broadcaster.
    }

    fn stop_background(&mut self) {
        // A lobby torn down without starting is terminal for the host.
        // The broadcaster keys on the phase, so flip it before joining.
        if self.session.phase() == Phase::LobbyOpen {
            self.session.set_phase(Phase::Closed);
        }
        self.open.store(false, Ordering::SeqCst);
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
        if let Some(broadcaster) = self.broadcaster.take() {
            broadcaster.join();
        }
    }
}

impl Drop for HostLobby {
    fn drop(&mut self) {
        self.stop_background();
    }
}

fn accept_loop(
    listener: TcpListener,
    session: Arc<Session>,
    links: Arc<Mutex<Vec<PeerLink>>>,
    open: Arc<AtomicBool>,
) {
    while open.load(Ordering::SeqCst)
        && session.is_running()
        && session.phase() == Phase::LobbyOpen
    {
        if session.seat_count() >= MAX_SEATS {
            thread::sleep(ACCEPT_POLL);
            continue;
        }

        match listener.accept() {
            Ok((stream, addr)) => match admit(stream, &session) {
                Ok(link) => {
                    log::info!("seat {} joined from {}", link.seat, addr);
                    lock(&links).push(link);
                }
                Err(e) => {
                    // Only this joiner's socket is dropped; the lobby
                    // keeps accepting.
                    log::warn!("join from {} rejected: {}", addr, e);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                log::error!("accept failed: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

/// Handshake: read the joiner's name, assign the next free seat index,
/// reply with the index as decimal ASCII.
fn admit(stream: TcpStream, session: &Session) -> Result<PeerLink, SessionError> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let mut stream = stream;

    let mut buf = [0u8; MAX_NAME_LEN];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Err(SessionError::Handshake("joiner sent no name".into()));
    }
    let name = String::from_utf8_lossy(&buf[..n]).trim().to_string();
    if name.is_empty() {
        return Err(SessionError::Handshake("empty player name".into()));
    }

    // Only this thread adds seats, so the index stays stable between
    // the read and the insert below.
    let seat = session.world().seat_count();
    stream.write_all(seat.to_string().as_bytes())?;
    session.world().add_seat(name.clone());

    session.set_status(format!("{} joined ({} players)", name, seat + 1));
    Ok(PeerLink::new(seat, stream))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
