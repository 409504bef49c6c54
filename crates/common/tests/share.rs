//! Building, exporting and downloading shares
mod common;

use std::collections::BTreeMap;

use futures::{pin_mut, StreamExt};

use ::common::graph::DownloadDriver;
use ::common::object::{ObjectKind, ObjectNode};
use ::common::share::{
    fetch_share_description, BuildEvent, Contact, ExportError, ExportEvent, ProgressEvent, Share,
    ShareRequest,
};
use ::common::state::StateContainer;
use ::common::store::ContentStore;

fn request(paths: Vec<std::path::PathBuf>) -> ShareRequest {
    ShareRequest {
        title: "holiday".into(),
        description: "summer pictures".into(),
        author: Some("alice".into()),
        recipients: vec![Contact::new("bob"), Contact::new("carol")],
        paths,
    }
}

// Split a finished build into its progress events and the share
fn split(events: Vec<BuildEvent>) -> (Vec<ProgressEvent>, Share) {
    let mut progress = Vec::new();
    let mut share = None;
    for event in events {
        match event {
            BuildEvent::Progress(event) => progress.push(event),
            BuildEvent::Complete(complete) => share = Some(complete),
        }
    }
    (progress, share.expect("build did not complete"))
}

#[tokio::test]
async fn test_two_items_give_two_progress_events() {
    let (store, state) = common::setup();
    let temp = tempfile::TempDir::new().unwrap();
    common::write_tree(
        temp.path(),
        &[("a.txt", vec![0u8; 10]), ("sub/x.bin", vec![1u8; 20])],
    );

    let builder = common::builder(&store, &state);
    let events: Vec<BuildEvent> = builder
        .build(request(vec![temp.path().join("a.txt"), temp.path().join("sub")]))
        .map(|event| event.unwrap())
        .collect()
        .await;
    let (progress, share) = split(events);

    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0].progress, 0.0);
    assert_eq!(progress[0].next_progress, 10.0 / 30.0);
    assert_eq!(progress[1].progress, 10.0 / 30.0);

    let kinds: BTreeMap<String, ObjectKind> = share
        .content()
        .and_then(ObjectNode::children)
        .unwrap()
        .iter()
        .map(|(name, node)| (name.clone(), node.kind()))
        .collect();
    assert_eq!(
        kinds,
        BTreeMap::from([
            ("a.txt".to_string(), ObjectKind::File),
            ("sub".to_string(), ObjectKind::Directory),
        ])
    );
}

#[tokio::test]
async fn test_progress_is_monotonic_and_complete() {
    let (store, state) = common::setup();
    let temp = common::album();
    let paths = vec![temp.path().join("readme.md"), temp.path().join("album")];
    let total: u64 = 9 + 10 + 25 + 25 + 6;

    let builder = common::builder(&store, &state);
    let events: Vec<BuildEvent> = builder
        .build(request(paths))
        .map(|event| event.unwrap())
        .collect()
        .await;
    let (progress, share) = split(events);

    let mut last = 0.0;
    for event in &progress {
        assert!(event.progress >= last);
        assert!(event.next_progress >= event.progress);
        last = event.next_progress;
    }
    assert_eq!(last, 1.0);
    assert_eq!(share.content().and_then(ObjectNode::size), Some(total));

    // the stored share matches what the stream ended with
    let stored = state.share(share.id()).await.unwrap();
    assert_eq!(stored, share);
}

#[tokio::test]
async fn test_each_patch_builds_on_the_previous_one() {
    let (store, state) = common::setup();
    let temp = tempfile::TempDir::new().unwrap();
    common::write_tree(
        temp.path(),
        &[
            ("one", b"1".to_vec()),
            ("two", b"22".to_vec()),
            ("three", b"333".to_vec()),
        ],
    );
    let paths = ["one", "two", "three"]
        .iter()
        .map(|name| temp.path().join(name))
        .collect();

    let builder = common::builder(&store, &state);
    let events: Vec<_> = builder.build(request(paths)).collect().await;
    assert!(events.iter().all(|event| event.is_ok()));

    let patches = store.patches();
    assert_eq!(patches.len(), 3);
    let names: Vec<&str> = patches.iter().map(|patch| patch.name.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "three"]);
    for pair in patches.windows(2) {
        assert_eq!(pair[1].dir, pair[0].result);
    }
    let share = state.shares().pop().unwrap();
    assert_eq!(share.content().unwrap().hash(), &patches[2].result);
}

#[tokio::test]
async fn test_published_description_can_be_fetched() {
    let (store, state) = common::setup();
    let temp = common::album();

    let builder = common::builder(&store, &state);
    let stream = builder.build(request(vec![temp.path().join("readme.md")]));
    pin_mut!(stream);
    let mut share = None;
    while let Some(event) = stream.next().await {
        if let BuildEvent::Complete(complete) = event.unwrap() {
            share = Some(complete);
        }
    }
    let share = share.unwrap();

    let hash = share.hash().unwrap();
    let received = fetch_share_description(&store, hash).await.unwrap();
    assert_eq!(received.title(), "holiday");
    assert_eq!(received.author(), Some("alice"));
    assert_eq!(
        received.content().map(|content| content.hash()),
        share.content().map(|content| content.hash())
    );
    assert!(share.recipients().values().all(|r| r.notified()));
}

#[tokio::test]
async fn test_build_then_export_round_trip() {
    let (store, state) = common::setup();
    let source = common::album();
    let builder = common::builder(&store, &state);
    let events: Vec<BuildEvent> = builder
        .build(request(vec![
            source.path().join("album"),
            source.path().join("readme.md"),
        ]))
        .map(|event| event.unwrap())
        .collect()
        .await;
    let (_, share) = split(events);

    // a peer only knows the published description
    let received = fetch_share_description(&store, share.hash().unwrap())
        .await
        .unwrap();
    let destination = tempfile::TempDir::new().unwrap();
    let exporter = common::exporter(&store, &state);
    let events: Vec<ExportEvent> = exporter
        .export(received, destination.path())
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            ExportEvent::Exporting { name: "album".into() },
            ExportEvent::Exporting { name: "readme.md".into() },
            ExportEvent::Finished { files: 5, bytes: 75 },
        ]
    );
    let mut expected = common::read_tree(source.path());
    expected.remove(std::path::Path::new("album/.DS_Store"));
    assert_eq!(common::read_tree(destination.path()), expected);
}

#[tokio::test]
async fn test_export_never_overwrites() {
    let (store, state) = common::setup();
    let notes = store.insert_file(b"fresh notes".to_vec());
    let other = store.insert_file(b"other".to_vec());
    let wrapper = common::dir(&store, &[("notes.txt", &notes), ("other.txt", &other)]);
    let mut share = Share::create("notes", "");
    share.set_content(ObjectNode::directory(wrapper));

    let destination = tempfile::TempDir::new().unwrap();
    std::fs::write(destination.path().join("notes.txt"), b"my own notes").unwrap();

    let exporter = common::exporter(&store, &state);
    let events: Vec<_> = exporter.export(share, destination.path()).collect().await;

    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        Ok(ExportEvent::Exporting { name }) if name == "notes.txt"
    ));
    assert!(matches!(events[1], Err(ExportError::Conflict(_))));
    assert_eq!(
        std::fs::read(destination.path().join("notes.txt")).unwrap(),
        b"my own notes"
    );
    assert!(!destination.path().join("other.txt").exists());
}

#[tokio::test]
async fn test_download_received_share() {
    let (store, state) = common::setup();
    let source = common::album();
    let builder = common::builder(&store, &state);
    let events: Vec<BuildEvent> = builder
        .build(request(vec![
            source.path().join("album"),
            source.path().join("readme.md"),
        ]))
        .map(|event| event.unwrap())
        .collect()
        .await;
    let (_, share) = split(events);

    let count = DownloadDriver::new(store.clone())
        .download_share(&share)
        .await
        .unwrap();
    assert_eq!(count, 2);
    let pins = store.pins().await.unwrap();
    for child in share.content().and_then(ObjectNode::children).unwrap().values() {
        assert!(pins.contains(child.hash()));
    }
}
