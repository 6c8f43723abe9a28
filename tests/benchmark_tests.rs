//! Performance benchmarks for the hot paths of the position server

use server::character::Character;
use server::dispatcher::broadcast;
use server::network::advance_characters;
use server::registry::{ConnectionId, Registry, Session, OUTBOUND_QUEUE_CAPACITY};
use shared::{decode_frame, encode_frame, Message, UserInfo, Vec2};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

fn roster(len: u16) -> Vec<UserInfo> {
    (0..len)
        .map(|i| UserInfo {
            user_id: 1000 + i,
            character_id: ConnectionId::new().to_string(),
            current: Vec2::new(i as f32, i as f32),
            target: Vec2::new(700.0, 400.0),
            speed: 100.0,
            is_moving: i % 2 == 0,
        })
        .collect()
}

/// Benchmarks Move frame encoding and decoding
#[test]
fn benchmark_move_codec() {
    let mut message = Message::move_command(Vec2::new(12.5, 40.0), Vec2::new(650.0, 300.0));
    message.character_id = ConnectionId::new().to_string();
    message.user_id = 1234;

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode_frame(&message).unwrap();
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.user_id, 1234);
    }

    let duration = start.elapsed();
    println!(
        "Move codec: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks encoding and decoding a large AllUsersInfo roster
#[test]
fn benchmark_roster_codec() {
    let message = Message::all_users_info(roster(500));

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode_frame(&message).unwrap();
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.all_users.len(), 500);
    }

    let duration = start.elapsed();
    println!(
        "Roster codec (500 users): {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks the movement model over many simulated ticks
#[test]
fn benchmark_character_updates() {
    let origin = Instant::now();
    let mut characters: Vec<Character> = (0..100u16)
        .map(|i| {
            let mut character = Character::new(ConnectionId::new(), 1000 + i, 100.0);
            character.start_movement(
                Vec2::new(i as f32, 0.0),
                Vec2::new(700.0, 400.0),
                50.0 + i as f32,
                origin,
            );
            character
        })
        .collect();

    let frames = 1_500u32;
    let tick = Duration::from_millis(16);
    let start = Instant::now();

    for frame in 1..=frames {
        let now = origin + tick * frame;
        for character in &mut characters {
            character.update(now);
        }
    }

    let duration = start.elapsed();
    println!(
        "Movement: {} characters × {} ticks in {:?} ({:.2} μs/tick)",
        characters.len(),
        frames,
        duration,
        duration.as_micros() as f64 / frames as f64
    );

    // 24 simulated seconds is enough for every character to arrive.
    for character in &characters {
        assert!(!character.is_moving);
        assert_eq!(character.position, Vec2::new(700.0, 400.0));
    }
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a simulation tick and a broadcast over a crowded registry
#[tokio::test]
async fn benchmark_tick_and_broadcast() {
    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
    let registry = RwLock::new(Registry::new());
    let mut queues = Vec::new();

    {
        let mut guard = registry.write().await;
        for i in 0..200u16 {
            let id = ConnectionId::new();
            let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
            let mut character = Character::new(id, 1000 + i, 100.0);
            character.start_movement(Vec2::ZERO, Vec2::new(700.0, 400.0), 100.0, Instant::now());
            guard.add(Session::new(id, 1000 + i, addr, character, tx));
            queues.push(rx);
        }
    }

    let iterations = 200;
    let start = Instant::now();

    for _ in 0..iterations {
        assert_eq!(advance_characters(&registry).await, 200);
    }
    let tick_duration = start.elapsed();

    let relay = Message::move_command(Vec2::ZERO, Vec2::new(1.0, 1.0));
    let start = Instant::now();
    for _ in 0..iterations {
        let guard = registry.read().await;
        assert_eq!(broadcast(&guard, &relay, None), 200);
    }
    let broadcast_duration = start.elapsed();

    println!(
        "Tick (200 characters): {:?} per tick, broadcast: {:?} per relay",
        tick_duration / iterations,
        broadcast_duration / iterations
    );

    for rx in &mut queues {
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, iterations);
    }

    // Should complete in under 5 seconds
    assert!((tick_duration + broadcast_duration).as_millis() < 5000);
}
