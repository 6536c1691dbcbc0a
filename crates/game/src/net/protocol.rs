use rkyv::{Archive, Deserialize, Serialize, rancor};

/// TCP port all session traffic (handshake, start signal, snapshots) uses.
pub const SESSION_PORT: u16 = 55664;
/// UDP port lobby announcements are broadcast on.
pub const DISCOVERY_PORT: u16 = 55665;

/// Prefix that marks a discovery datagram as one of ours.
pub const DISCOVERY_MAGIC: &str = "BRAWL_HOST";
/// Literal the host writes to each client socket when the battle begins.
/// Never mistakable for a frame: read as a length prefix, its first four
/// bytes demand far more than MAX_FRAME_SIZE.
pub const START_TOKEN: &[u8] = b"START_BATTLE";

pub const MAX_SEATS: usize = 10;
pub const JOIN_CODE_LEN: usize = 6;
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

/// Wall-clock milliseconds since the Unix epoch, used to stamp snapshots.
pub fn wall_clock_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ProjectileState {
    pub position: [f32; 2],
    pub direction: [f32; 2],
    pub damage: f32,
    pub color: [u8; 3],
    pub has_area_effect: bool,
}

/// Complete replicated state for one seat. Messages carry whole
/// snapshots; a newer one fully supersedes anything before it.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SeatSnapshot {
    pub seat: u8,
    pub position: [f32; 2],
    pub velocity_y: f32,
    pub on_ground: bool,
    pub health: f32,
    pub max_health: f32,
    pub facing_right: bool,
    pub weapon: u8,
    pub color: [u8; 3],
    pub projectiles: Vec<ProjectileState>,
}

impl SeatSnapshot {
    pub fn new(seat: u8) -> Self {
        Self {
            seat,
            position: [0.0; 2],
            velocity_y: 0.0,
            on_ground: false,
            health: 100.0,
            max_health: 100.0,
            facing_right: true,
            weapon: 0,
            color: [255, 255, 255],
            projectiles: Vec::new(),
        }
    }
}

/// Battle-phase messages. The two directions carry different envelopes:
/// the host reports every seat, a client reports only the seat it owns.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum SyncMessage {
    HostState {
        timestamp_ms: u64,
        seats: Vec<SeatSnapshot>,
    },
    SeatReport {
        sender: u8,
        timestamp_ms: u64,
        snapshot: SeatSnapshot,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("serialization failed: {0}")]
    Encode(rancor::Error),
    #[error("deserialization failed: {0}")]
    Decode(rancor::Error),
}

impl SyncMessage {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(WireError::Encode)
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(WireError::Decode)
    }
}
