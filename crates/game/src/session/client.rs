//! Client side of the session: connect, handshake, wait for the host
//! to start the battle.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use super::{Phase, Session, SessionError};
use crate::net::discovery::{self, ServerList};
use crate::net::protocol::{SESSION_PORT, START_TOKEN};
use crate::net::replication::PeerLink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to a host by address and perform the join handshake. On
/// success the session knows its seat and is waiting for the start
/// token on the returned link.
pub fn join(session: &Session, host: Ipv4Addr, name: &str) -> Result<PeerLink, SessionError> {
    join_at(session, SocketAddr::from((host, SESSION_PORT)), name)
}

pub fn join_at(session: &Session, addr: SocketAddr, name: &str) -> Result<PeerLink, SessionError> {
    session.set_phase(Phase::Connecting);
    session.set_status(format!("Connecting to {}...", addr));

    match handshake(addr, name) {
        Ok((seat, stream)) => {
            session.set_local_seat(seat);
            {
                let mut world = session.world();
                world.ensure_seats(seat + 1);
                if let Some(entry) = world.seat_mut(seat) {
                    entry.name = name.to_string();
                }
            }
            session.set_phase(Phase::WaitingForStart);
            session.set_status(format!("Joined as player {}", seat + 1));
            log::info!("joined {} as seat {}", addr, seat);
            Ok(PeerLink::new(0, stream))
        }
        Err(e) => {
            session.set_phase(Phase::Idle);
            session.set_status(format!("Join failed: {}", e));
            Err(e)
        }
    }
}

/// Resolve a join code against browsed servers and connect.
pub fn join_by_code(
    session: &Session,
    servers: &ServerList,
    code: &str,
    name: &str,
) -> Result<PeerLink, SessionError> {
    let code = code.trim().to_ascii_uppercase();
    match discovery::resolve_code(servers, &code) {
        Some(host) => join(session, host, name),
        None => {
            session.set_status(format!("No lobby with code {}", code));
            Err(SessionError::UnknownCode(code))
        }
    }
}

fn handshake(addr: SocketAddr, name: &str) -> Result<(usize, TcpStream), SessionError> {
    let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

    stream.write_all(name.trim().as_bytes())?;

    let mut buf = [0u8; 8];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Err(SessionError::Handshake("host closed during handshake".into()));
    }
    let reply = String::from_utf8_lossy(&buf[..n]);
    let seat: usize = reply
        .trim()
        .parse()
        .map_err(|_| SessionError::Handshake(format!("bad seat reply '{}'", reply)))?;
    Ok((seat, stream))
}

/// Block until the host sends the start token, then switch the link
/// into battle mode. A closed stream or any other payload aborts the
/// join.
pub fn wait_for_start(session: &Session, link: &mut PeerLink) -> Result<(), SessionError> {
    let stream = link.stream_mut();
    stream.set_read_timeout(None)?;

    let mut buf = [0u8; START_TOKEN.len()];
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..])?;
        if n == 0 {
            session.set_phase(Phase::Idle);
            session.set_status("Host closed the lobby");
            return Err(SessionError::HostClosed);
        }
        filled += n;
    }

    if buf != START_TOKEN {
        session.set_phase(Phase::Idle);
        session.set_status("Protocol error while waiting for start");
        return Err(SessionError::UnexpectedMessage);
    }

    link.prepare_for_battle()?;
    session.set_phase(Phase::InBattle);
    session.set_status("Battle started");
    log::info!("start signal received, entering battle");
    Ok(())
}
