use std::time::{Duration, Instant};

use tessera_chunks::{ChunkCoord, TileType};
use tessera_config::Config;
use tessera_streaming::*;
use tessera_terrain::ChunkGenerator;

fn config() -> Config {
    let mut config = Config::default();
    config.world.seed = 12345;
    config.world.lands_and_seas.algorithm = "random_chunks".to_string();
    config.world.lands_and_seas.land_ratio = 4;
    config.world.zoom.iterations = 2;
    config.streaming.render_chunk_size = 32;
    config.streaming.render_distance = 1;
    config.streaming.unload_distance = 2;
    config.streaming.preload_margin = 0;
    config.streaming.unload_safety_margin = 1;
    config.streaming.max_messages_per_tick = 64;
    config.streaming.status_interval_ms = 20;
    config
}

fn pump_until(manager: &mut WorldManager, mut done: impl FnMut(&WorldManager) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline {
        manager.process_worker_messages();
        if done(manager) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_streamed_tiles_match_direct_generation() {
    let config = config();
    let mut manager = WorldManager::new(&config).unwrap();
    manager.update_chunks((0, 0), 32, 32);
    assert!(pump_until(&mut manager, |m| m.is_chunk_loaded(0, 0)
        && m.is_chunk_loaded(-1, -1)));

    let generator = ChunkGenerator::from_config(&config.world, 32, 256).unwrap();
    for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-1, -1)] {
        let expected = generator.generate_render_chunk(coord).unwrap();
        for (&(x, y), &tile_type) in &expected.aggregated_tiles {
            let tile = manager.get_tile(x, y);
            assert_eq!(tile.tile_type, tile_type, "tile ({x}, {y}) in {coord}");
        }
    }
    manager.shutdown();
}

#[test]
fn test_two_worlds_with_same_seed_agree() {
    let mut a = WorldManager::new(&config()).unwrap();
    let mut b = WorldManager::new(&config()).unwrap();
    let coord = ChunkCoord::new(3, -2);
    a.request_chunks(&[coord], Priority::Urgent);
    b.request_chunks(&[coord], Priority::Urgent);
    assert!(pump_until(&mut a, |m| m.is_chunk_loaded(3, -2)));
    assert!(pump_until(&mut b, |m| m.is_chunk_loaded(3, -2)));

    let chunk_a = a.ready_chunk(coord).unwrap();
    let chunk_b = b.ready_chunk(coord).unwrap();
    assert!(chunk_a.is_complete());
    let mut tiles_a: Vec<_> = chunk_a.aggregated_tiles.iter().collect();
    let mut tiles_b: Vec<_> = chunk_b.aggregated_tiles.iter().collect();
    tiles_a.sort();
    tiles_b.sort();
    assert_eq!(tiles_a, tiles_b);
}

#[test]
fn test_get_tile_never_blocks_under_load() {
    let mut manager = WorldManager::new(&config()).unwrap();
    let far: Vec<ChunkCoord> = (0..40).map(|i| ChunkCoord::new(i, 50)).collect();
    manager.request_chunks(&far, Priority::Low);

    let start = Instant::now();
    for x in 0..2_000 {
        let tile = manager.get_tile(x * 7, -500);
        assert!(matches!(
            tile.tile_type,
            TileType::Loading | TileType::Land | TileType::Water
        ));
    }
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "get_tile took {:?} for 2000 lookups",
        start.elapsed()
    );
}

#[test]
fn test_worker_serves_urgent_before_queued_low() {
    let config = config();
    let bus = MessageBus::new(64);
    for x in 0..5 {
        assert!(bus.send_to_worker(WorkerMessage::Request(ChunkRequest::new(
            ChunkCoord::new(x, 10),
            Priority::Low,
            x as u64,
        ))));
    }
    assert!(bus.send_to_worker(WorkerMessage::Request(ChunkRequest::new(
        ChunkCoord::new(0, 0),
        Priority::Urgent,
        99,
    ))));

    let generator = ChunkGenerator::from_config(&config.world, 32, 256).unwrap();
    let worker = GenerationWorker::new(generator, bus.clone(), WorkerSettings::default());
    let mut handle = WorkerHandle::spawn(worker).unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    let mut tickets = Vec::new();
    while tickets.len() < 6 && Instant::now() < deadline {
        for event in bus.drain_for_main(16) {
            if let WorkerEvent::Chunk(response) = event {
                assert!(response.success);
                tickets.push(response.ticket);
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(tickets, vec![99, 0, 1, 2, 3, 4]);

    let stats = handle.shutdown("test", Duration::from_secs(5)).unwrap();
    assert_eq!(stats.requests_processed, 6);
    assert_eq!(stats.chunks_generated, 6);
}

#[test]
fn test_worker_status_reaches_statistics() {
    let mut manager = WorldManager::new(&config()).unwrap();
    assert!(pump_until(&mut manager, |m| m.get_statistics().worker_status.is_some()));
    let status = manager.get_statistics().worker_status.unwrap();
    assert_eq!(status.worker_id, "worker_1");
}

#[test]
fn test_walk_keeps_ready_set_near_camera() {
    let mut manager = WorldManager::new(&config()).unwrap();
    for step in 0..10_i64 {
        manager.update_chunks((step * 32, 0), 32, 32);
        manager.process_worker_messages();
    }
    // camera ends in render chunk (9, 0); unload radius is 3
    assert!(pump_until(&mut manager, |m| m.get_statistics().loading_chunks == 0));
    let stats = manager.get_statistics();
    assert_eq!(stats.unload_radius, 3);
    assert!(stats.available_chunks > 0);
    for x in -5..=5 {
        assert!(!manager.is_chunk_loaded(x, 0), "chunk ({x}, 0) should be unloaded");
    }
    assert!(manager.is_chunk_loaded(9, 0));

    let worker_stats = manager.shutdown().unwrap();
    assert!(worker_stats.requests_processed >= stats.chunks_received);
}
