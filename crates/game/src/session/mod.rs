//! Session lifecycle: one hosting or joining game process.
//!
//! The `Session` object is the single shared handle every background
//! loop (discovery broadcast, acceptor, replication) holds an `Arc` to;
//! each loop re-checks the phase and running flag every iteration and
//! exits within one timeout interval of a change.

mod client;
mod lobby;

pub use client::{join, join_at, join_by_code, wait_for_start};
pub use lobby::HostLobby;

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::net::protocol::JOIN_CODE_LEN;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    LobbyOpen = 1,
    Connecting = 2,
    WaitingForStart = 3,
    Starting = 4,
    InBattle = 5,
    Closed = 6,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::LobbyOpen,
            2 => Phase::Connecting,
            3 => Phase::WaitingForStart,
            4 => Phase::Starting,
            5 => Phase::InBattle,
            6 => Phase::Closed,
            _ => Phase::Idle,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("lobby needs at least 2 players to start")]
    NotStartable,
    #[error("lobby is not open")]
    NotOpen,
    #[error("lobby code '{0}' not found")]
    UnknownCode(String),
    #[error("host closed the connection")]
    HostClosed,
    #[error("unexpected message while waiting for start")]
    UnexpectedMessage,
}

pub struct Session {
    role: Role,
    join_code: String,
    phase: AtomicU8,
    local_seat: AtomicUsize,
    running: AtomicBool,
    status: Mutex<String>,
    world: Mutex<World>,
}

impl Session {
    pub fn host(name: &str) -> Self {
        let mut world = World::new();
        world.add_seat(format!("{} (Host)", name));
        Self {
            role: Role::Host,
            join_code: generate_join_code(),
            phase: AtomicU8::new(Phase::Idle as u8),
            local_seat: AtomicUsize::new(0),
            running: AtomicBool::new(true),
            status: Mutex::new(String::new()),
            world: Mutex::new(world),
        }
    }

    /// A joining process; the seat index arrives with the handshake.
    pub fn client() -> Self {
        Self {
            role: Role::Client,
            join_code: String::new(),
            phase: AtomicU8::new(Phase::Idle as u8),
            local_seat: AtomicUsize::new(0),
            running: AtomicBool::new(true),
            status: Mutex::new(String::new()),
            world: Mutex::new(World::new()),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn join_code(&self) -> &str {
        &self.join_code
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    pub fn local_seat(&self) -> usize {
        self.local_seat.load(Ordering::SeqCst)
    }

    pub fn set_local_seat(&self, seat: usize) {
        self.local_seat.store(seat, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops every background loop within one timeout interval.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.set_phase(Phase::Closed);
    }

    /// Human-readable state line consumed by the UI layer.
    pub fn status(&self) -> String {
        lock(&self.status).clone()
    }

    pub fn set_status(&self, status: impl Into<String>) {
        *lock(&self.status) = status.into();
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        lock(&self.world)
    }

    pub fn seat_count(&self) -> usize {
        self.world().seat_count()
    }

    pub fn can_start(&self) -> bool {
        self.role == Role::Host && self.phase() == Phase::LobbyOpen && self.seat_count() >= 2
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_join_code() -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| CODE_CHARS[(rand_u64() % CODE_CHARS.len() as u64) as usize] as char)
        .collect()
}

pub(crate) fn rand_u64() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0),
    );
    hasher.finish()
}
