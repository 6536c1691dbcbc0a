//! Shared world model: the seat list and each seat's combat state.
//!
//! Exactly one process is authoritative for a given seat (the one whose
//! local player it represents); everyone else holds a replicated copy
//! that is overwritten wholesale on merge, with one exception: health
//! only ever moves down from remote data, so a stale or replayed
//! snapshot can never revive a defeated player.

use glam::Vec2;

use crate::net::protocol::{MAX_SEATS, ProjectileState, SeatSnapshot};
use crate::weapons::WeaponId;

pub const DEFAULT_MAX_HEALTH: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub position: Vec2,
    pub direction: Vec2,
    pub damage: f32,
    pub color: [u8; 3],
    pub has_area_effect: bool,
}

impl Projectile {
    pub fn to_wire(&self) -> ProjectileState {
        ProjectileState {
            position: self.position.into(),
            direction: self.direction.into(),
            damage: self.damage,
            color: self.color,
            has_area_effect: self.has_area_effect,
        }
    }

    pub fn from_wire(state: &ProjectileState) -> Self {
        Self {
            position: Vec2::from(state.position),
            direction: Vec2::from(state.direction),
            damage: state.damage,
            color: state.color,
            has_area_effect: state.has_area_effect,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub position: Vec2,
    pub velocity_y: f32,
    pub on_ground: bool,
    pub health: f32,
    pub max_health: f32,
    pub facing_right: bool,
    pub weapon: WeaponId,
    pub color: [u8; 3],
    pub projectiles: Vec<Projectile>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity_y: 0.0,
            on_ground: false,
            health: DEFAULT_MAX_HEALTH,
            max_health: DEFAULT_MAX_HEALTH,
            facing_right: true,
            weapon: WeaponId::Fist,
            color: [255, 255, 255],
            projectiles: Vec::new(),
        }
    }
}

impl PlayerState {
    pub fn to_wire(&self, seat: u8) -> SeatSnapshot {
        SeatSnapshot {
            seat,
            position: self.position.into(),
            velocity_y: self.velocity_y,
            on_ground: self.on_ground,
            health: self.health,
            max_health: self.max_health,
            facing_right: self.facing_right,
            weapon: self.weapon as u8,
            color: self.color,
            projectiles: self.projectiles.iter().map(Projectile::to_wire).collect(),
        }
    }

    /// Overwrite this state from a remote snapshot. Every field is
    /// replaced wholesale except health, which merges as
    /// `min(current, incoming)`. Applying the same snapshot twice
    /// leaves the state unchanged.
    pub fn apply(&mut self, snap: &SeatSnapshot) {
        self.position = Vec2::from(snap.position);
        self.velocity_y = snap.velocity_y;
        self.on_ground = snap.on_ground;
        self.max_health = snap.max_health;
        if snap.health < self.health {
            self.health = snap.health;
        }
        self.facing_right = snap.facing_right;
        self.weapon = WeaponId::from_id(snap.weapon);
        self.color = snap.color;
        self.projectiles = snap.projectiles.iter().map(Projectile::from_wire).collect();
    }
}

#[derive(Debug)]
pub struct Seat {
    pub index: usize,
    pub name: String,
    pub state: PlayerState,
}

/// All seats for one battle. Indices are dense `[0, n)`, assigned in
/// connection order with the host at 0, and never reassigned.
#[derive(Debug, Default)]
pub struct World {
    seats: Vec<Seat>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_seat(&mut self, name: String) -> usize {
        let index = self.seats.len();
        self.seats.push(Seat {
            index,
            name,
            state: PlayerState::default(),
        });
        index
    }

    /// Grow the seat list with placeholders up to `count` seats.
    /// Clients learn about other seats only from host snapshots.
    pub fn ensure_seats(&mut self, count: usize) {
        while self.seats.len() < count.min(MAX_SEATS) {
            let name = format!("Player {}", self.seats.len() + 1);
            self.add_seat(name);
        }
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    pub fn seat(&self, index: usize) -> Option<&Seat> {
        self.seats.get(index)
    }

    pub fn seat_mut(&mut self, index: usize) -> Option<&mut Seat> {
        self.seats.get_mut(index)
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn snapshot_seat(&self, index: usize) -> Option<SeatSnapshot> {
        self.seats.get(index).map(|s| s.state.to_wire(index as u8))
    }

    pub fn snapshot_all(&self) -> Vec<SeatSnapshot> {
        self.seats
            .iter()
            .map(|s| s.state.to_wire(s.index as u8))
            .collect()
    }

    /// Merge one remote snapshot. Out-of-range seat indices are dropped
    /// rather than grown past the seat cap.
    pub fn apply_snapshot(&mut self, snap: &SeatSnapshot) {
        let index = snap.seat as usize;
        if index >= MAX_SEATS {
            return;
        }
        self.ensure_seats(index + 1);
        if let Some(seat) = self.seats.get_mut(index) {
            seat.state.apply(snap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_at(seat: u8, x: f32, health: f32) -> SeatSnapshot {
        let mut snap = SeatSnapshot::new(seat);
        snap.position = [x, 50.0];
        snap.health = health;
        snap
    }

    #[test]
    fn test_seat_indices_dense() {
        let mut world = World::new();
        assert_eq!(world.add_seat("Host".into()), 0);
        assert_eq!(world.add_seat("Ana".into()), 1);
        assert_eq!(world.add_seat("Ben".into()), 2);
        assert_eq!(world.seat_count(), 3);
        for (i, seat) in world.seats().iter().enumerate() {
            assert_eq!(seat.index, i);
        }
    }

    #[test]
    fn test_health_never_raised_by_merge() {
        let mut world = World::new();
        world.add_seat("Host".into());
        world.add_seat("Ana".into());

        world.apply_snapshot(&snapshot_at(1, 10.0, 60.0));
        assert_eq!(world.seat(1).unwrap().state.health, 60.0);

        // A lower report sticks.
        world.apply_snapshot(&snapshot_at(1, 12.0, 40.0));
        assert_eq!(world.seat(1).unwrap().state.health, 40.0);

        // A stale duplicate claiming higher health is ignored.
        world.apply_snapshot(&snapshot_at(1, 12.0, 70.0));
        assert_eq!(world.seat(1).unwrap().state.health, 40.0);
        assert_eq!(world.seat(1).unwrap().state.position.x, 12.0);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut world = World::new();
        world.add_seat("Host".into());
        world.add_seat("Ana".into());

        let mut snap = snapshot_at(1, 33.0, 80.0);
        snap.projectiles.push(ProjectileState {
            position: [34.0, 50.0],
            direction: [1.0, 0.0],
            damage: 10.0,
            color: [100, 150, 255],
            has_area_effect: false,
        });

        world.apply_snapshot(&snap);
        let once = world.seat(1).unwrap().state.clone();

        world.apply_snapshot(&snap);
        let twice = world.seat(1).unwrap().state.clone();

        assert_eq!(once, twice);
        assert_eq!(twice.projectiles.len(), 1);
    }

    #[test]
    fn test_projectiles_replaced_wholesale() {
        let mut world = World::new();
        world.add_seat("Host".into());
        world.add_seat("Ana".into());

        let mut with_two = snapshot_at(1, 0.0, 100.0);
        for _ in 0..2 {
            with_two.projectiles.push(ProjectileState {
                position: [0.0, 0.0],
                direction: [1.0, 0.0],
                damage: 10.0,
                color: [0, 0, 0],
                has_area_effect: false,
            });
        }
        world.apply_snapshot(&with_two);
        assert_eq!(world.seat(1).unwrap().state.projectiles.len(), 2);

        world.apply_snapshot(&snapshot_at(1, 0.0, 100.0));
        assert!(world.seat(1).unwrap().state.projectiles.is_empty());
    }

    #[test]
    fn test_out_of_range_seat_ignored() {
        let mut world = World::new();
        world.add_seat("Host".into());
        world.apply_snapshot(&snapshot_at((MAX_SEATS + 5) as u8, 0.0, 100.0));
        assert_eq!(world.seat_count(), 1);
    }

    #[test]
    fn test_wire_roundtrip() {
        let mut state = PlayerState::default();
        state.position = Vec2::new(200.0, -15.5);
        state.weapon = WeaponId::RayGun;
        state.facing_right = false;
        state.projectiles.push(Projectile {
            position: Vec2::new(210.0, -15.0),
            direction: Vec2::new(1.0, 0.0),
            damage: 27.0,
            color: [0, 255, 100],
            has_area_effect: false,
        });

        let mut replica = PlayerState::default();
        replica.apply(&state.to_wire(2));
        assert_eq!(replica, state);
    }
}
