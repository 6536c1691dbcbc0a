//! Best-effort state replication during battle.
//!
//! Every tick each side sends a complete snapshot of what it owns and
//! drains whatever has arrived; no acks, no retransmission. A missing
//! message on a tick is the steady state, and within one TCP stream a
//! later snapshot always supersedes an earlier one. Trust is one-way:
//! the host merges only the seat a client owns, and a client never lets
//! the host's broadcast clobber its own seat.

use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::framing::{FrameReader, FrameWriter};
use super::protocol::{SyncMessage, wall_clock_ms};
use crate::session::{Phase, Session};

/// Target replication interval; effectively "as fast as the channel
/// allows" with a yield between ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// One framed TCP link to a peer. The host holds one per client seat;
/// a client holds a single link to the host (`seat` 0).
#[derive(Debug)]
pub struct PeerLink {
    pub seat: usize,
    stream: TcpStream,
    reader: FrameReader,
    writer: FrameWriter,
    alive: bool,
}

impl PeerLink {
    pub fn new(seat: usize, stream: TcpStream) -> Self {
        Self {
            seat,
            stream,
            reader: FrameReader::new(),
            writer: FrameWriter::new(),
            alive: true,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Switch the socket into the non-blocking regime replication needs.
    pub fn prepare_for_battle(&mut self) -> io::Result<()> {
        self.stream.set_read_timeout(None)?;
        self.stream.set_nonblocking(true)
    }

    /// Queue one frame and push the backlog as far as the socket
    /// allows. A frame the socket only partially accepts is resumed on
    /// the next call, so the stream never carries a torn frame.
    pub fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        self.writer.push(payload)?;
        self.writer.flush(&mut self.stream)
    }

    /// Drain the socket and return every complete frame that arrived.
    /// Peer closure and stream errors retire the link; the caller just
    /// sees no more frames from it.
    pub fn poll(&mut self) -> Vec<Vec<u8>> {
        if !self.alive {
            return Vec::new();
        }

        match self.reader.fill(&mut self.stream) {
            Ok(true) => {}
            Ok(false) => {
                log::info!("peer on seat {} closed its connection", self.seat);
                self.alive = false;
            }
            Err(e) => {
                log::warn!("receive from seat {} failed: {}", self.seat, e);
                self.alive = false;
            }
        }

        let mut frames = Vec::new();
        loop {
            match self.reader.next_frame() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(e) => {
                    log::warn!("corrupt frame from seat {}: {}", self.seat, e);
                    self.alive = false;
                    break;
                }
            }
        }
        frames
    }

    pub fn retire(&mut self) {
        self.alive = false;
    }

    pub(crate) fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

/// Background replication loop for one battle. Exits within one tick of
/// the session leaving `InBattle`; sockets are left for session
/// teardown to close.
pub struct ReplicationEngine {
    handle: JoinHandle<()>,
}

impl ReplicationEngine {
    pub fn spawn_host(session: Arc<Session>, links: Vec<PeerLink>) -> Self {
        Self {
            handle: thread::spawn(move || host_loop(session, links)),
        }
    }

    pub fn spawn_client(session: Arc<Session>, link: PeerLink) -> Self {
        Self {
            handle: thread::spawn(move || client_loop(session, link)),
        }
    }

    pub fn join(self) {
        let _ = self.handle.join();
    }
}

fn host_loop(session: Arc<Session>, mut links: Vec<PeerLink>) {
    log::info!("replication started for {} client links", links.len());

    while session.is_running() && session.phase() == Phase::InBattle {
        // Broadcast the full world; one unreachable client must not
        // stall the others.
        let message = SyncMessage::HostState {
            timestamp_ms: wall_clock_ms(),
            seats: session.world().snapshot_all(),
        };
        match message.encode() {
            Ok(bytes) => {
                for link in links.iter_mut().filter(|l| l.is_alive()) {
                    if let Err(e) = link.send(&bytes) {
                        log::warn!("send to seat {} failed: {}", link.seat, e);
                        link.retire();
                    }
                }
            }
            Err(e) => log::error!("snapshot encode failed: {}", e),
        }

        for link in &mut links {
            for frame in link.poll() {
                merge_client_frame(&session, link.seat, &frame);
            }
        }

        thread::sleep(TICK_INTERVAL);
    }

    log::info!("replication ended");
}

/// A client is only ever trusted about its own seat.
fn merge_client_frame(session: &Session, link_seat: usize, frame: &[u8]) {
    match SyncMessage::decode(frame) {
        Ok(SyncMessage::SeatReport {
            sender, snapshot, ..
        }) => {
            if sender as usize != link_seat || snapshot.seat != sender {
                log::debug!(
                    "seat {} reported about seat {}, ignoring",
                    link_seat,
                    snapshot.seat
                );
                return;
            }
            session.world().apply_snapshot(&snapshot);
        }
        Ok(SyncMessage::HostState { .. }) => {
            log::debug!("seat {} sent a host envelope, ignoring", link_seat);
        }
        Err(e) => {
            // Bad data from one peer never aborts the battle.
            log::debug!("undecodable frame from seat {}: {}", link_seat, e);
        }
    }
}

fn client_loop(session: Arc<Session>, mut link: PeerLink) {
    log::info!("replication started (seat {})", session.local_seat());

    while session.is_running() && session.phase() == Phase::InBattle && link.is_alive() {
        let local_seat = session.local_seat();

        let report = session
            .world()
            .snapshot_seat(local_seat)
            .map(|snapshot| SyncMessage::SeatReport {
                sender: local_seat as u8,
                timestamp_ms: wall_clock_ms(),
                snapshot,
            });
        if let Some(message) = report {
            match message.encode() {
                Ok(bytes) => {
                    if let Err(e) = link.send(&bytes) {
                        log::warn!("send to host failed: {}", e);
                        link.retire();
                    }
                }
                Err(e) => log::error!("snapshot encode failed: {}", e),
            }
        }

        for frame in link.poll() {
            apply_host_frame(&session, local_seat, &frame);
        }

        thread::sleep(TICK_INTERVAL);
    }

    if !link.is_alive() && session.phase() == Phase::InBattle {
        session.set_status("Connection to host lost");
        session.set_phase(Phase::Idle);
    }

    log::info!("replication ended");
}

/// The host's broadcast overwrites every seat except the one this
/// process simulates locally.
fn apply_host_frame(session: &Session, local_seat: usize, frame: &[u8]) {
    match SyncMessage::decode(frame) {
        Ok(SyncMessage::HostState { seats, .. }) => {
            let mut world = session.world();
            for snapshot in &seats {
                if snapshot.seat as usize != local_seat {
                    world.apply_snapshot(snapshot);
                }
            }
        }
        Ok(SyncMessage::SeatReport { .. }) => {
            log::debug!("host sent a client envelope, ignoring");
        }
        Err(e) => {
            log::debug!("undecodable frame from host: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::SeatSnapshot;

    fn battle_session_with_seats(n: usize) -> Arc<Session> {
        let session = Arc::new(Session::host("Host"));
        for i in 1..n {
            session.world().add_seat(format!("Player {}", i + 1));
        }
        session.set_phase(Phase::InBattle);
        session
    }

    fn report(sender: u8, seat: u8, x: f32) -> Vec<u8> {
        let mut snapshot = SeatSnapshot::new(seat);
        snapshot.position = [x, 0.0];
        SyncMessage::SeatReport {
            sender,
            timestamp_ms: 0,
            snapshot,
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn test_host_merges_only_the_senders_seat() {
        let session = battle_session_with_seats(3);

        merge_client_frame(&session, 1, &report(1, 1, 25.0));
        assert_eq!(session.world().seat(1).unwrap().state.position.x, 25.0);

        // Seat 1 claiming to speak for seat 2 is dropped.
        merge_client_frame(&session, 1, &report(1, 2, 99.0));
        assert_eq!(session.world().seat(2).unwrap().state.position.x, 0.0);

        // A forged sender index not matching the link is dropped too.
        merge_client_frame(&session, 1, &report(2, 2, 99.0));
        assert_eq!(session.world().seat(2).unwrap().state.position.x, 0.0);
    }

    #[test]
    fn test_malformed_frame_is_ignored() {
        let session = battle_session_with_seats(2);
        merge_client_frame(&session, 1, &[0xFF, 0x00, 0x12]);
        assert_eq!(session.world().seat(1).unwrap().state.position.x, 0.0);
    }

    #[test]
    fn test_client_keeps_its_own_seat() {
        let session = battle_session_with_seats(3);
        session.set_local_seat(1);
        session.world().seat_mut(1).unwrap().state.position.x = 77.0;

        let broadcast = SyncMessage::HostState {
            timestamp_ms: 0,
            seats: vec![
                SeatSnapshot::new(0),
                SeatSnapshot::new(1),
                {
                    let mut s = SeatSnapshot::new(2);
                    s.position = [13.0, 0.0];
                    s
                },
            ],
        }
        .encode()
        .unwrap();

        apply_host_frame(&session, 1, &broadcast);

        let world = session.world();
        assert_eq!(world.seat(1).unwrap().state.position.x, 77.0);
        assert_eq!(world.seat(2).unwrap().state.position.x, 13.0);
    }
}
