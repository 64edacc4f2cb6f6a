use super::*;

// --- add_to_queue() tests ---

#[test]
fn test_add_to_queue_returns_new_length_in_call_order() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_manager(
        test_config(&temp_dir),
        Arc::new(FakeSource::new()),
        Arc::new(CopyTranscoder::new()),
    );
    assert_eq!(manager.state(), ManagerState::Empty);

    for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
        let len = manager
            .add_to_queue(queue_item(&temp_dir, &watch_url(id), id, None))
            .unwrap();
        assert_eq!(len, i + 1, "add_to_queue should return the new length");
    }

    assert_eq!(manager.state(), ManagerState::Accepting);
    assert_eq!(manager.queue_len(), 4);

    let urls: Vec<_> = manager
        .view_queue()
        .into_iter()
        .map(|entry| entry.source_url)
        .collect();
    assert_eq!(
        urls,
        vec![watch_url("a"), watch_url("b"), watch_url("c"), watch_url("d")]
    );
}

#[test]
fn test_view_queue_reports_indices_and_tag_presence() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_manager(
        test_config(&temp_dir),
        Arc::new(FakeSource::new()),
        Arc::new(CopyTranscoder::new()),
    );

    manager
        .add_to_queue(queue_item(&temp_dir, &watch_url("a"), "a", None))
        .unwrap();
    manager
        .add_to_queue(queue_item(
            &temp_dir,
            &watch_url("b"),
            "b",
            Some(song_tags("B", "Artist")),
        ))
        .unwrap();

    let entries = manager.view_queue();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].index, 1);
    assert!(!entries[0].has_tags);
    assert_eq!(entries[1].index, 2);
    assert!(entries[1].has_tags);
    assert_eq!(
        entries[1].destination_path,
        temp_dir.path().join("out").join("b.mp3")
    );
}

#[test]
fn test_add_to_queue_rejects_duplicate_destination() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_manager(
        test_config(&temp_dir),
        Arc::new(FakeSource::new()),
        Arc::new(CopyTranscoder::new()),
    );

    manager
        .add_to_queue(queue_item(&temp_dir, &watch_url("a"), "same", None))
        .unwrap();
    let result = manager.add_to_queue(queue_item(&temp_dir, &watch_url("b"), "same", None));

    match result {
        Err(Error::DuplicateDestination(path)) => {
            assert_eq!(path, temp_dir.path().join("out").join("same.mp3"));
        }
        other => panic!("expected DuplicateDestination, got: {:?}", other),
    }
    assert_eq!(manager.queue_len(), 1, "rejected item must not be queued");
}

#[test]
fn test_add_to_queue_emits_queued_event() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_manager(
        test_config(&temp_dir),
        Arc::new(FakeSource::new()),
        Arc::new(CopyTranscoder::new()),
    );
    let mut events = manager.subscribe();

    manager
        .add_to_queue(queue_item(&temp_dir, &watch_url("a"), "a", None))
        .unwrap();

    match drain_events(&mut events).as_slice() {
        [Event::Queued { index, url, .. }] => {
            assert_eq!(*index, 1);
            assert_eq!(url, &watch_url("a"));
        }
        other => panic!("expected one Queued event, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_add_to_queue_after_download_is_invalid_state() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_manager(
        test_config(&temp_dir),
        Arc::new(FakeSource::new()),
        Arc::new(CopyTranscoder::new()),
    );
    manager
        .add_to_queue(queue_item(&temp_dir, &watch_url("a"), "a", None))
        .unwrap();

    manager.download().await.unwrap();
    assert_eq!(manager.state(), ManagerState::Drained);
    assert!(manager.view_queue().is_empty(), "queue is drained");

    let result = manager.add_to_queue(queue_item(&temp_dir, &watch_url("b"), "b", None));
    match result {
        Err(Error::InvalidState { state, .. }) => assert_eq!(state, "drained"),
        other => panic!("expected InvalidState, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_download_twice_is_invalid_state() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_manager(
        test_config(&temp_dir),
        Arc::new(FakeSource::new()),
        Arc::new(CopyTranscoder::new()),
    );

    manager.download().await.unwrap();
    let second = manager.download().await;

    assert!(matches!(second, Err(Error::InvalidState { .. })));
}

#[tokio::test]
async fn test_download_on_empty_queue_reports_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_manager(
        test_config(&temp_dir),
        Arc::new(FakeSource::new()),
        Arc::new(CopyTranscoder::new()),
    );
    let mut events = manager.subscribe();

    let report = manager.download().await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(report.all_succeeded());
    assert!(matches!(
        drain_events(&mut events).as_slice(),
        [Event::BatchComplete {
            succeeded: 0,
            failed: 0
        }]
    ));
}
