pub mod net;
pub mod session;
pub mod weapons;
pub mod world;

pub use net::{
    Announcement, Broadcaster, DISCOVERY_PORT, DiscoveredServer, MAX_SEATS, PeerLink,
    ReplicationEngine, SESSION_PORT, SeatSnapshot, ServerBrowser, ServerList, SyncMessage,
};
pub use session::{HostLobby, Phase, Role, Session, SessionError, join, join_by_code, wait_for_start};
pub use weapons::{WeaponId, WeaponSpec};
pub use world::{PlayerState, Projectile, Seat, World};
