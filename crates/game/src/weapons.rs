use serde::{Deserialize, Serialize};

/// Stable identifier for a weapon; the wire format carries the raw `u8`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WeaponId {
    #[default]
    Fist = 0,
    WaterGun = 1,
    SplatBomb = 2,
    CorkGun = 3,
    ConfettiBomb = 4,
    SquirtGun = 5,
    PieBomb = 6,
    NerfBlaster = 7,
    WhoopeeCushion = 8,
    BubbleGun = 9,
    CartoonGrenade = 10,
    BananaGun = 11,
    GlitterGrenade = 12,
    PaintGun = 13,
    SmokeBomb = 14,
    PotatoGun = 15,
    BubbleMine = 16,
    RayGun = 17,
    RubberRocket = 18,
    LaserPistol = 19,
    TntStick = 20,
    ZapGun = 21,
    FoamMissile = 22,
    PlasmaRifle = 23,
    StickyBomb = 24,
    BlasterCannon = 25,
    SuperGrenade = 26,
    IonBlaster = 27,
    MegaRocket = 28,
    PhotonCannon = 29,
    NukeLauncher = 30,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    pub name: &'static str,
    pub damage: f32,
    pub cost: u32,
    pub projectile_speed: f32,
    pub color: [u8; 3],
    pub has_area_effect: bool,
    pub melee: bool,
}

const WEAPON_TABLE: [WeaponSpec; 31] = [
    WeaponSpec { name: "Fist", damage: 8.0, cost: 0, projectile_speed: 12.0, color: [255, 220, 180], has_area_effect: false, melee: true },
    WeaponSpec { name: "Water Gun", damage: 10.0, cost: 30, projectile_speed: 15.0, color: [100, 150, 255], has_area_effect: false, melee: false },
    WeaponSpec { name: "Splat Bomb", damage: 12.0, cost: 40, projectile_speed: 7.0, color: [255, 100, 0], has_area_effect: true, melee: false },
    WeaponSpec { name: "Cork Gun", damage: 13.0, cost: 50, projectile_speed: 16.0, color: [200, 150, 100], has_area_effect: false, melee: false },
    WeaponSpec { name: "Confetti Bomb", damage: 14.0, cost: 60, projectile_speed: 7.0, color: [255, 200, 255], has_area_effect: true, melee: false },
    WeaponSpec { name: "Squirt Gun", damage: 15.0, cost: 70, projectile_speed: 17.0, color: [0, 200, 255], has_area_effect: false, melee: false },
    WeaponSpec { name: "Pie Bomb", damage: 16.0, cost: 80, projectile_speed: 8.0, color: [255, 230, 180], has_area_effect: true, melee: false },
    WeaponSpec { name: "Nerf Blaster", damage: 17.0, cost: 90, projectile_speed: 18.0, color: [255, 140, 0], has_area_effect: false, melee: false },
    WeaponSpec { name: "Whoopee Cushion", damage: 18.0, cost: 100, projectile_speed: 9.0, color: [200, 100, 200], has_area_effect: true, melee: false },
    WeaponSpec { name: "Bubble Gun", damage: 19.0, cost: 110, projectile_speed: 14.0, color: [200, 255, 255], has_area_effect: false, melee: false },
    WeaponSpec { name: "Cartoon Grenade", damage: 20.0, cost: 120, projectile_speed: 8.0, color: [50, 255, 50], has_area_effect: true, melee: false },
    WeaponSpec { name: "Banana Gun", damage: 21.0, cost: 130, projectile_speed: 15.0, color: [255, 255, 100], has_area_effect: false, melee: false },
    WeaponSpec { name: "Glitter Grenade", damage: 22.0, cost: 140, projectile_speed: 8.0, color: [255, 180, 255], has_area_effect: true, melee: false },
    WeaponSpec { name: "Paint Gun", damage: 23.0, cost: 150, projectile_speed: 16.0, color: [255, 100, 200], has_area_effect: false, melee: false },
    WeaponSpec { name: "Smoke Bomb", damage: 24.0, cost: 160, projectile_speed: 7.0, color: [150, 150, 150], has_area_effect: true, melee: false },
    WeaponSpec { name: "Potato Gun", damage: 25.0, cost: 170, projectile_speed: 13.0, color: [180, 140, 100], has_area_effect: false, melee: false },
    WeaponSpec { name: "Bubble Mine", damage: 26.0, cost: 180, projectile_speed: 6.0, color: [100, 255, 255], has_area_effect: true, melee: false },
    WeaponSpec { name: "Ray Gun", damage: 27.0, cost: 190, projectile_speed: 20.0, color: [0, 255, 100], has_area_effect: false, melee: false },
    WeaponSpec { name: "Rubber Rocket", damage: 28.0, cost: 200, projectile_speed: 10.0, color: [255, 100, 150], has_area_effect: true, melee: false },
    WeaponSpec { name: "Laser Pistol", damage: 29.0, cost: 210, projectile_speed: 22.0, color: [255, 0, 0], has_area_effect: false, melee: false },
    WeaponSpec { name: "TNT Stick", damage: 30.0, cost: 220, projectile_speed: 8.0, color: [255, 0, 0], has_area_effect: true, melee: false },
    WeaponSpec { name: "Zap Gun", damage: 31.0, cost: 230, projectile_speed: 21.0, color: [255, 255, 0], has_area_effect: false, melee: false },
    WeaponSpec { name: "Foam Missile", damage: 32.0, cost: 240, projectile_speed: 11.0, color: [255, 128, 0], has_area_effect: true, melee: false },
    WeaponSpec { name: "Plasma Rifle", damage: 33.0, cost: 250, projectile_speed: 19.0, color: [100, 100, 255], has_area_effect: false, melee: false },
    WeaponSpec { name: "Sticky Bomb", damage: 34.0, cost: 260, projectile_speed: 7.0, color: [100, 255, 100], has_area_effect: true, melee: false },
    WeaponSpec { name: "Blaster Cannon", damage: 35.0, cost: 270, projectile_speed: 17.0, color: [255, 50, 150], has_area_effect: false, melee: false },
    WeaponSpec { name: "Super Grenade", damage: 36.0, cost: 280, projectile_speed: 9.0, color: [255, 50, 255], has_area_effect: true, melee: false },
    WeaponSpec { name: "Ion Blaster", damage: 38.0, cost: 300, projectile_speed: 23.0, color: [150, 200, 255], has_area_effect: false, melee: false },
    WeaponSpec { name: "Mega Rocket", damage: 40.0, cost: 320, projectile_speed: 12.0, color: [255, 50, 50], has_area_effect: true, melee: false },
    WeaponSpec { name: "Photon Cannon", damage: 42.0, cost: 350, projectile_speed: 24.0, color: [255, 255, 255], has_area_effect: false, melee: false },
    WeaponSpec { name: "Nuke Launcher", damage: 45.0, cost: 400, projectile_speed: 10.0, color: [255, 255, 0], has_area_effect: true, melee: false },
];

const ALL: [WeaponId; WeaponId::COUNT] = [
    WeaponId::Fist,
    WeaponId::WaterGun,
    WeaponId::SplatBomb,
    WeaponId::CorkGun,
    WeaponId::ConfettiBomb,
    WeaponId::SquirtGun,
    WeaponId::PieBomb,
    WeaponId::NerfBlaster,
    WeaponId::WhoopeeCushion,
    WeaponId::BubbleGun,
    WeaponId::CartoonGrenade,
    WeaponId::BananaGun,
    WeaponId::GlitterGrenade,
    WeaponId::PaintGun,
    WeaponId::SmokeBomb,
    WeaponId::PotatoGun,
    WeaponId::BubbleMine,
    WeaponId::RayGun,
    WeaponId::RubberRocket,
    WeaponId::LaserPistol,
    WeaponId::TntStick,
    WeaponId::ZapGun,
    WeaponId::FoamMissile,
    WeaponId::PlasmaRifle,
    WeaponId::StickyBomb,
    WeaponId::BlasterCannon,
    WeaponId::SuperGrenade,
    WeaponId::IonBlaster,
    WeaponId::MegaRocket,
    WeaponId::PhotonCannon,
    WeaponId::NukeLauncher,
];

impl WeaponId {
    pub const COUNT: usize = WEAPON_TABLE.len();

    /// Unknown ids fall back to `Fist` rather than failing the merge.
    pub fn from_id(id: u8) -> Self {
        if (id as usize) < Self::COUNT {
            ALL[id as usize]
        } else {
            WeaponId::Fist
        }
    }

    pub fn spec(self) -> &'static WeaponSpec {
        &WEAPON_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }
}
