pub mod discovery;
pub mod framing;
pub mod protocol;
pub mod replication;

pub use discovery::{
    ANNOUNCE_INTERVAL, Announcement, Broadcaster, DiscoveredServer, ServerBrowser, ServerList,
    local_ipv4, resolve_code,
};
pub use framing::{FrameReader, FrameWriter, write_frame};
pub use protocol::{
    DISCOVERY_MAGIC, DISCOVERY_PORT, JOIN_CODE_LEN, MAX_FRAME_SIZE, MAX_SEATS, ProjectileState,
    SESSION_PORT, START_TOKEN, SeatSnapshot, SyncMessage, WireError, wall_clock_ms,
};
pub use replication::{PeerLink, ReplicationEngine, TICK_INTERVAL};
