//! Integration tests for the file manager façade against the synthetic
//! decoder backend.

use std::sync::Arc;

use mefserve_core::ChannelInfo;
use mefserve_decoder::{DecoderError, SyntheticDecoder, SyntheticRecording};
use mefserve_engine::{EngineConfig, EngineError, FileManager};

const FILE: &str = "/data/session01.mefd";

fn no_prefetch() -> EngineConfig {
    EngineConfig {
        n_prefetch: 0,
        cache_capacity_multiplier: 1,
        max_workers: 1,
    }
}

fn manager_with(
    recording: SyntheticRecording,
    config: EngineConfig,
) -> (Arc<SyntheticDecoder>, FileManager) {
    let decoder = Arc::new(SyntheticDecoder::new());
    decoder.register(FILE, recording);
    let manager = FileManager::new(decoder.clone(), config);
    (decoder, manager)
}

#[tokio::test]
async fn open_enumerate_read_sequential() {
    // 10s of one channel at 1 kHz, 2s segments -> 5 segments of (1, 2000).
    let (decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 1000.0, 10.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    let count = manager.set_segment_seconds(FILE, 2.0).await.unwrap();
    assert_eq!(count, 5);

    for i in 0..5 {
        let chunk = manager.get_signal_segment(FILE, i).await.unwrap();
        assert_eq!(chunk.shape(), (1, 2000));
        assert_eq!(chunk.t_start_us, i as i64 * 2_000_000);
        assert_eq!(chunk.t_end_us, (i as i64 + 1) * 2_000_000);
    }

    // With prefetch disabled, exactly one decode per segment.
    assert_eq!(decoder.read_count(), 5);
}

#[tokio::test]
async fn invalidation_on_resize() {
    let (decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 1000.0, 10.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    manager.set_segment_seconds(FILE, 2.0).await.unwrap();
    for i in 0..5 {
        manager.get_signal_segment(FILE, i).await.unwrap();
    }
    let reads_before = decoder.read_count();

    let count = manager.set_segment_seconds(FILE, 1.0).await.unwrap();
    assert_eq!(count, 10);
    assert!(manager.cache().is_empty().await);

    // Old entries are gone: index 0 decodes fresh over [0, 1s).
    let chunk = manager.get_signal_segment(FILE, 0).await.unwrap();
    assert_eq!(decoder.read_count(), reads_before + 1);
    assert_eq!((chunk.t_start_us, chunk.t_end_us), (0, 1_000_000));
    assert_eq!(chunk.shape(), (1, 1000));
}

#[tokio::test]
async fn channel_filter_orders_rows_as_requested() {
    let recording = SyntheticRecording {
        channels: vec![
            ChannelInfo {
                name: "Ch1".into(),
                sample_rate_hz: 100.0,
            },
            ChannelInfo {
                name: "Ch2".into(),
                sample_rate_hz: 100.0,
            },
            ChannelInfo {
                name: "Ch3".into(),
                sample_rate_hz: 100.0,
            },
        ],
        start_us: 0,
        end_us: 1_000_000,
    };
    let (_decoder, manager) = manager_with(recording, no_prefetch());

    manager.open_file(FILE).await.unwrap();
    manager
        .set_active_channels(FILE, vec!["Ch3".into(), "Ch1".into()])
        .await
        .unwrap();

    let chunk = manager.get_signal_segment(FILE, 0).await.unwrap();
    assert_eq!(chunk.shape(), (2, 100));
    assert_eq!(chunk.channel_names, vec!["Ch3", "Ch1"]);
    // The synthetic ramp bases each channel at index * 1e6, so row
    // contents identify the source channel.
    assert_eq!(chunk.data.row(0)[0], 2_000_000.0);
    assert_eq!(chunk.data.row(1)[0], 0.0);
}

#[tokio::test]
async fn empty_active_channels_means_all() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(3, 100.0, 1.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    manager
        .set_active_channels(FILE, vec!["chan_002".into()])
        .await
        .unwrap();
    assert_eq!(
        manager.get_signal_segment(FILE, 0).await.unwrap().shape().0,
        1
    );

    manager.set_active_channels(FILE, vec![]).await.unwrap();
    let chunk = manager.get_signal_segment(FILE, 0).await.unwrap();
    assert_eq!(chunk.shape().0, 3);
    assert_eq!(chunk.channel_names, vec!["chan_001", "chan_002", "chan_003"]);
}

#[tokio::test]
async fn default_view_is_the_whole_recording() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 100.0, 4.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    assert_eq!(manager.get_segment_count(FILE).await.unwrap(), 1);

    let chunk = manager.get_signal_segment(FILE, 0).await.unwrap();
    assert_eq!((chunk.t_start_us, chunk.t_end_us), (0, 4_000_000));
    assert_eq!(chunk.shape(), (1, 400));
}

#[tokio::test]
async fn short_final_segment() {
    // 9s at 2s segments: the last segment covers [8s, 9s).
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 1000.0, 9.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    let count = manager.set_segment_seconds(FILE, 2.0).await.unwrap();
    assert_eq!(count, 5);

    let last = manager.get_signal_segment(FILE, 4).await.unwrap();
    assert_eq!((last.t_start_us, last.t_end_us), (8_000_000, 9_000_000));
    assert!(last.t_end_us - last.t_start_us <= 2_000_000);
    assert_eq!(last.shape(), (1, 1000));

    // One past the end fails.
    let err = manager.get_signal_segment(FILE, 5).await.unwrap_err();
    assert_eq!(err, EngineError::OutOfRange { index: 5, count: 5 });
}

#[tokio::test]
async fn open_is_idempotent() {
    let (decoder, manager) = manager_with(
        SyntheticRecording::uniform(2, 100.0, 1.0),
        no_prefetch(),
    );

    let first = manager.open_file(FILE).await.unwrap();
    let second = manager.open_file(FILE).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(decoder.open_count(), 1);
}

#[tokio::test]
async fn close_is_idempotent_and_unknown_close_is_a_noop() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 100.0, 1.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    manager.close_file(FILE).await.unwrap();
    manager.close_file(FILE).await.unwrap();
    manager.close_file("/never/opened.mefd").await.unwrap();
    assert!(manager.list_open_files().await.is_empty());
}

#[tokio::test]
async fn operations_on_unopened_files_fail_not_open() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 100.0, 1.0),
        no_prefetch(),
    );

    assert!(matches!(
        manager.get_segment_count(FILE).await.unwrap_err(),
        EngineError::NotOpen(_)
    ));
    assert!(matches!(
        manager.set_segment_seconds(FILE, 1.0).await.unwrap_err(),
        EngineError::NotOpen(_)
    ));
    assert!(matches!(
        manager
            .set_active_channels(FILE, vec!["chan_001".into()])
            .await
            .unwrap_err(),
        EngineError::NotOpen(_)
    ));
    assert!(matches!(
        manager.get_signal_segment(FILE, 0).await.unwrap_err(),
        EngineError::NotOpen(_)
    ));
    assert!(matches!(
        manager.get_file_info(FILE).await.unwrap_err(),
        EngineError::NotOpen(_)
    ));
}

#[tokio::test]
async fn open_failures_do_not_register_the_file() {
    let decoder = Arc::new(SyntheticDecoder::new());
    decoder.register_corrupt("/bad/file.mefd");
    let manager = FileManager::new(decoder.clone(), no_prefetch());

    let missing = manager.open_file("/missing.mefd").await.unwrap_err();
    assert!(matches!(
        missing,
        EngineError::Decoder(DecoderError::NotFound(_))
    ));

    let corrupt = manager.open_file("/bad/file.mefd").await.unwrap_err();
    assert!(matches!(
        corrupt,
        EngineError::Decoder(DecoderError::Corrupt(_))
    ));

    assert!(manager.list_open_files().await.is_empty());
}

#[tokio::test]
async fn relative_paths_are_rejected() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 100.0, 1.0),
        no_prefetch(),
    );
    let err = manager.open_file("relative/path.mefd").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}

#[tokio::test]
async fn equivalent_path_spellings_share_one_open_file() {
    let (decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 100.0, 1.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    manager.open_file("/data/./session01.mefd").await.unwrap();
    manager
        .open_file("/data/ignored/../session01.mefd")
        .await
        .unwrap();

    assert_eq!(decoder.open_count(), 1);
    assert_eq!(manager.list_open_files().await.len(), 1);
}

#[tokio::test]
async fn view_mutations_are_visible_to_subsequent_reads() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 1000.0, 10.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    for (seconds, expected) in [(5.0, 2u64), (2.0, 5), (3.0, 4), (2.0, 5)] {
        let count = manager.set_segment_seconds(FILE, seconds).await.unwrap();
        assert_eq!(count, expected);
        assert_eq!(manager.get_segment_count(FILE).await.unwrap(), expected);

        let chunk = manager.get_signal_segment(FILE, 0).await.unwrap();
        let expected_us = (seconds * 1_000_000.0) as i64;
        assert_eq!(chunk.t_end_us - chunk.t_start_us, expected_us);
    }
}

#[tokio::test]
async fn invalid_view_mutations_leave_the_view_unchanged() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(2, 100.0, 10.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    manager.set_segment_seconds(FILE, 2.0).await.unwrap();

    assert!(matches!(
        manager.set_segment_seconds(FILE, -1.0).await.unwrap_err(),
        EngineError::InvalidArgument(_)
    ));
    assert_eq!(
        manager
            .set_active_channels(FILE, vec!["nope".into()])
            .await
            .unwrap_err(),
        EngineError::InvalidChannel("nope".into())
    );
    assert!(matches!(
        manager
            .set_active_channels(FILE, vec!["chan_001".into(), "chan_001".into()])
            .await
            .unwrap_err(),
        EngineError::InvalidArgument(_)
    ));

    // Still 5 segments under the last valid view, and reads still work.
    assert_eq!(manager.get_segment_count(FILE).await.unwrap(), 5);
    let chunk = manager.get_signal_segment(FILE, 0).await.unwrap();
    assert_eq!(chunk.shape().0, 2);
}

#[tokio::test]
async fn get_file_info_returns_the_open_snapshot() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(4, 250.0, 2.0),
        no_prefetch(),
    );

    let opened = manager.open_file(FILE).await.unwrap();
    let info = manager.get_file_info(FILE).await.unwrap();
    assert_eq!(opened, info);
    assert_eq!(info.channels.len(), 4);
    assert_eq!(info.duration_us(), 2_000_000);
}

#[tokio::test]
async fn close_purges_cache_entries() {
    let (_decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 1000.0, 10.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    manager.set_segment_seconds(FILE, 2.0).await.unwrap();
    manager.get_signal_segment(FILE, 0).await.unwrap();
    assert_eq!(manager.cache().len().await, 1);

    manager.close_file(FILE).await.unwrap();
    assert!(manager.cache().is_empty().await);
}

#[tokio::test]
async fn pure_lru_behavior_with_prefetch_disabled() {
    // capacity = max(0 * 1, 1) = 1: every new segment evicts the previous.
    let (decoder, manager) = manager_with(
        SyntheticRecording::uniform(1, 1000.0, 10.0),
        no_prefetch(),
    );

    manager.open_file(FILE).await.unwrap();
    manager.set_segment_seconds(FILE, 2.0).await.unwrap();

    manager.get_signal_segment(FILE, 0).await.unwrap();
    manager.get_signal_segment(FILE, 1).await.unwrap();
    assert_eq!(manager.cache().len().await, 1);
    assert_eq!(manager.cache().stats().await.evictions, 1);

    // Index 0 was evicted, so reading it again decodes again.
    manager.get_signal_segment(FILE, 0).await.unwrap();
    assert_eq!(decoder.read_count(), 3);
    assert_eq!(manager.prefetch().stats().scheduled, 0);
}

#[tokio::test]
async fn shutdown_closes_everything() {
    let decoder = Arc::new(SyntheticDecoder::new());
    decoder.register(FILE, SyntheticRecording::uniform(1, 100.0, 1.0));
    decoder.register("/data/other.mefd", SyntheticRecording::uniform(1, 100.0, 1.0));
    let manager = FileManager::new(decoder.clone(), no_prefetch());

    manager.open_file(FILE).await.unwrap();
    manager.open_file("/data/other.mefd").await.unwrap();

    manager.shutdown().await;
    assert!(manager.list_open_files().await.is_empty());
    assert_eq!(decoder.close_count(), 2);

    // Idempotent.
    manager.shutdown().await;
    assert_eq!(decoder.close_count(), 2);
}
