//! Soak test for the pitchside server.
//!
//! Spawns multiple client sessions that:
//! - Connect and join the room
//! - Periodically place bets
//! - Count match updates, currency updates and bet errors
//!
//! Usage: cargo run --bin soak -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of sessions to spawn (default: 50)
//!   --duration S     Test duration in seconds (default: 30)
//!   --bet-rate R     Bets per second per session (default: 0.2)
//!   --url URL        Server WebSocket URL (default: ws://127.0.0.1:9100/ws)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pitchside_client::{ClientSession, EventKind, SessionConfig, SessionEvent};
use pitchside_shared::protocol::ServerMsg;

struct Metrics {
    connected: AtomicU64,
    match_updates: AtomicU64,
    currency_updates: AtomicU64,
    bet_errors: AtomicU64,
    bets_sent: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            match_updates: AtomicU64::new(0),
            currency_updates: AtomicU64::new(0),
            bet_errors: AtomicU64::new(0),
            bets_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }
}

fn health_url_from(ws_url: &str) -> String {
    ws_url
        .replacen("ws://", "http://", 1)
        .replacen("wss://", "https://", 1)
        .replace("/ws", "/health")
}

async fn run_client(client_id: u32, url: String, bet_rate: f64, duration: Duration, metrics: Arc<Metrics>) {
    let mut config = SessionConfig::new(url.clone(), health_url_from(&url));
    config.heartbeat_interval = Duration::from_secs(2);
    let session = ClientSession::new(config);

    {
        let metrics = metrics.clone();
        session.on(EventKind::Message, move |event| {
            if let SessionEvent::Message(msg) = event {
                match msg {
                    ServerMsg::MatchUpdate(_) => {
                        metrics.match_updates.fetch_add(1, Ordering::Relaxed);
                    }
                    ServerMsg::CurrencyUpdate(_) => {
                        metrics.currency_updates.fetch_add(1, Ordering::Relaxed);
                    }
                    ServerMsg::BetError(_) => {
                        metrics.bet_errors.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
        });
    }
    {
        let metrics = metrics.clone();
        session.on(EventKind::Latency, move |event| {
            if let SessionEvent::Latency { rtt_ms } = event {
                metrics.latency_sum_ms.fetch_add(*rtt_ms, Ordering::Relaxed);
                metrics.latency_count.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    if let Err(err) = session.connect().await {
        if client_id < 5 {
            eprintln!("Client {} failed to connect: {}", client_id, err);
        }
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        return;
    }
    metrics.connected.fetch_add(1, Ordering::Relaxed);
    session.join("main");

    let bet_interval = if bet_rate > 0.0 {
        Duration::from_secs_f64(1.0 / bet_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut bet_timer = tokio::time::interval(bet_interval);
    bet_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    let mut rng_state: u64 = client_id as u64 * 12345 + 67890;

    while Instant::now() < test_end {
        bet_timer.tick().await;
        // xorshift is plenty for spreading stakes around
        rng_state ^= rng_state << 13;
        rng_state ^= rng_state >> 7;
        rng_state ^= rng_state << 17;
        let team = (rng_state % 2) as u8 + 1;
        let amount = 10 + rng_state % 90;
        session.place_bet(team, amount);
        metrics.bets_sent.fetch_add(1, Ordering::Relaxed);
    }
}

fn parse_args() -> (u32, u64, f64, String) {
    let mut clients: u32 = 50;
    let mut duration: u64 = 30;
    let mut bet_rate: f64 = 0.2;
    let mut url = "ws://127.0.0.1:9100/ws".to_string();

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i + 1 < args.len() {
        match args[i].as_str() {
            "--clients" => clients = args[i + 1].parse().expect("bad --clients"),
            "--duration" => duration = args[i + 1].parse().expect("bad --duration"),
            "--bet-rate" => bet_rate = args[i + 1].parse().expect("bad --bet-rate"),
            "--url" => url = args[i + 1].clone(),
            other => panic!("unknown option {}", other),
        }
        i += 2;
    }
    (clients, duration, bet_rate, url)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let (clients, duration_secs, bet_rate, url) = parse_args();
    let duration = Duration::from_secs(duration_secs);
    let metrics = Arc::new(Metrics::new());

    println!(
        "Soaking {} with {} sessions for {}s at {} bets/s each",
        url, clients, duration_secs, bet_rate
    );

    let mut handles = Vec::new();
    for client_id in 0..clients {
        let url = url.clone();
        let metrics = metrics.clone();
        handles.push(tokio::spawn(async move {
            run_client(client_id, url, bet_rate, duration, metrics).await;
        }));
        // Stagger connections slightly
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    for handle in handles {
        let _ = handle.await;
    }

    let latency_count = metrics.latency_count.load(Ordering::Relaxed).max(1);
    println!("--- soak results ---");
    println!("connected:        {}", metrics.connected.load(Ordering::Relaxed));
    println!("bets sent:        {}", metrics.bets_sent.load(Ordering::Relaxed));
    println!("match updates:    {}", metrics.match_updates.load(Ordering::Relaxed));
    println!("currency updates: {}", metrics.currency_updates.load(Ordering::Relaxed));
    println!("bet errors:       {}", metrics.bet_errors.load(Ordering::Relaxed));
    println!("errors:           {}", metrics.errors.load(Ordering::Relaxed));
    println!(
        "mean heartbeat rtt: {} ms",
        metrics.latency_sum_ms.load(Ordering::Relaxed) / latency_count
    );
}
