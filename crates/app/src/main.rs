use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use glam::Vec2;

use brawl::net::discovery;
use brawl::session::{self, HostLobby, Phase, Session};
use brawl::{MAX_SEATS, Projectile, ReplicationEngine, ServerBrowser};

#[derive(Parser)]
#[command(name = "brawl")]
#[command(about = "LAN battle session host and client")]
struct Args {
    #[arg(long, help = "Host a lobby and wait for players")]
    host: bool,

    #[arg(long, help = "Join a host at this IPv4 address")]
    join: Option<Ipv4Addr>,

    #[arg(long, help = "Join by lobby code discovered on the LAN")]
    code: Option<String>,

    #[arg(short, long, default_value = "Player")]
    name: String,

    #[arg(long, default_value_t = 2, help = "Players to wait for before starting")]
    seats: usize,

    #[arg(long, default_value_t = 3000, help = "Battle ticks to simulate before exiting")]
    ticks: u64,

    #[arg(long, help = "List lobbies seen on the LAN and exit")]
    browse: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.browse {
        return browse();
    }
    if args.host {
        return host(&args);
    }
    if args.join.is_some() || args.code.is_some() {
        return join(&args);
    }
    bail!("pass --host, --join <IP>, --code <CODE>, or --browse");
}

fn browse() -> Result<()> {
    let browser = ServerBrowser::start().context("could not listen for announcements")?;
    println!("Scanning for lobbies (3s)...");
    thread::sleep(Duration::from_secs(3));

    let servers = browser.servers().snapshot();
    if servers.is_empty() {
        println!("No lobbies found.");
    }
    for server in servers {
        println!(
            "{}  code {}  {} player(s)",
            server.ip, server.join_code, server.seat_count
        );
    }
    browser.stop();
    Ok(())
}

fn host(args: &Args) -> Result<()> {
    let wanted = args.seats.clamp(2, MAX_SEATS);
    let session = Arc::new(Session::host(&args.name));
    let lobby = HostLobby::open(Arc::clone(&session)).context("could not open the lobby")?;

    println!("Lobby open. Join code: {}", session.join_code());
    println!("Waiting for {} player(s)...", wanted);
    while session.seat_count() < wanted {
        if !session.is_running() {
            bail!("session shut down while waiting for players");
        }
        thread::sleep(Duration::from_millis(200));
    }

    let links = lobby.start_battle().context("could not start the battle")?;
    run_battle(args, session, |s| ReplicationEngine::spawn_host(s, links))
}

fn join(args: &Args) -> Result<()> {
    let session = Arc::new(Session::client());

    let mut link = if let Some(ip) = args.join {
        session::join(&session, ip, &args.name)?
    } else if let Some(code) = &args.code {
        let browser = ServerBrowser::start().context("could not listen for announcements")?;
        // Give announcements a moment to arrive before resolving.
        thread::sleep(Duration::from_secs(2));
        let link = session::join_by_code(&session, &browser.servers(), code, &args.name)?;
        browser.stop();
        link
    } else {
        unreachable!("checked by main");
    };

    println!("{}", session.status());
    println!("Waiting for the host to start...");
    session::wait_for_start(&session, &mut link)?;

    run_battle(args, session, |s| ReplicationEngine::spawn_client(s, link))
}

/// Headless battle loop: nudge the local seat around so replication has
/// something to carry, print the world occasionally, then shut down.
fn run_battle<F>(args: &Args, session: Arc<Session>, spawn: F) -> Result<()>
where
    F: FnOnce(Arc<Session>) -> ReplicationEngine,
{
    let engine = spawn(Arc::clone(&session));
    let local = session.local_seat();
    let started = Instant::now();
    let mut last_print = Instant::now();

    for tick in 0..args.ticks {
        if session.phase() != Phase::InBattle {
            println!("Battle ended: {}", session.status());
            break;
        }

        {
            let mut world = session.world();
            if let Some(seat) = world.seat_mut(local) {
                seat.state.position =
                    Vec2::new(100.0 + 50.0 * (tick as f32 * 0.01).sin(), 300.0);
                seat.state.on_ground = true;

                // Lob something every half second so projectile
                // replication has traffic too.
                if tick % 500 == 0 {
                    let spec = seat.state.weapon.spec();
                    seat.state.projectiles.push(Projectile {
                        position: seat.state.position + Vec2::new(20.0, -10.0),
                        direction: Vec2::X,
                        damage: spec.damage,
                        color: spec.color,
                        has_area_effect: spec.has_area_effect,
                    });
                } else if tick % 500 == 250 {
                    seat.state.projectiles.clear();
                }
            }
        }

        if last_print.elapsed() >= Duration::from_secs(1) {
            last_print = Instant::now();
            let world = session.world();
            for seat in world.seats() {
                println!(
                    "  seat {} {:>12}  pos ({:6.1}, {:6.1})  hp {:5.1}",
                    seat.index,
                    seat.name,
                    seat.state.position.x,
                    seat.state.position.y,
                    seat.state.health
                );
            }
        }

        thread::sleep(Duration::from_millis(1));
    }

    session.shutdown();
    engine.join();
    log::info!(
        "battle finished after {:.1}s on {}",
        started.elapsed().as_secs_f32(),
        discovery::local_ipv4()
    );
    Ok(())
}
