//! End-to-end scan tests: crawl, build, and persist against a real tree

mod helpers;

use helpers::{sample_tree::file_name, write_raw_wav, SampleTree};
use sap_index::{Error, ScanError, ScanOptions};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn options() -> ScanOptions {
    ScanOptions {
        crawl_workers: 4,
        batch_size: 3,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_indexes_qualifying_files_once() {
    let tree = SampleTree::new();
    tree.wav("drums/kick_drum.wav");
    tree.wav("drums/snare.wav");
    tree.wav("drums/hats/closed_hat.WAV");
    tree.file("loops/bass_loop.mp3", b"ID3 not really an mp3");
    tree.file("loops/pad.flac", b"fLaC");
    tree.file("readme.txt", b"hello");
    tree.file("loops/cover.jpg", b"\xFF\xD8");

    let library = tree.open_library(options()).await;

    let first = library.scan(&tree.root()).await.unwrap();
    assert_eq!(first.records_inserted, 4);
    assert_eq!(first.records_built, 4);
    assert_eq!(first.crawl.files_seen, 7);
    assert!(!first.cancelled);
    assert_eq!(library.store().count().await.unwrap(), 4);

    let second = library.scan(&tree.root()).await.unwrap();
    assert_eq!(second.records_inserted, 0);
    assert_eq!(second.crawl.already_indexed, 4);
    assert_eq!(second.batches_committed, 0);
    assert_eq!(library.store().count().await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_picks_up_new_files_only() {
    let tree = SampleTree::new();
    tree.wav("a.wav");

    let library = tree.open_library(options()).await;
    library.scan(&tree.root()).await.unwrap();

    tree.wav("b.wav");
    let summary = library.scan(&tree.root()).await.unwrap();

    assert_eq!(summary.records_inserted, 1);
    assert_eq!(summary.crawl.already_indexed, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_broken_wav_is_still_indexed() {
    let tree = SampleTree::new();
    tree.file("broken_kick.wav", b"RIFF\x04\x00\x00\x00JUNK");
    // 12-bit audio: valid container, unsupported depth
    let odd = tree.root().join("odd_depth.wav");
    write_raw_wav(&odd, 1, 8000, 12, &[0, 0, 0, 0]).unwrap();
    tree.wav("good_kick.wav");

    let library = tree.open_library(options()).await;
    let summary = library.scan(&tree.root()).await.unwrap();

    assert_eq!(summary.records_inserted, 3);
    assert_eq!(summary.parse_failures, 2);

    let broken = library.search("broken").await.unwrap();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].duration, 0.0);
    assert_eq!(broken[0].size, 12);

    let good = library.search("good").await.unwrap();
    assert!((good[0].duration - 0.25).abs() < 1e-6);

    // Not rescanned
    let again = library.scan(&tree.root()).await.unwrap();
    assert_eq!(again.records_built, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_nested_tree_wider_than_worker_pool() {
    let tree = SampleTree::new();
    let mut expected = 0;
    for top in 0..16 {
        let mut dir = format!("pack{}", top);
        for depth in 0..6 {
            dir = format!("{}/level{}", dir, depth);
            tree.file(&format!("{}/hit_{}_{}.wav", dir, top, depth), b"x");
            expected += 1;
        }
    }

    let library = tree.open_library(ScanOptions::default()).await;
    let summary = library.scan(&tree.root()).await.unwrap();

    assert_eq!(summary.records_inserted, expected);
    assert_eq!(summary.crawl.directories, 1 + 16 + 16 * 6);
    assert_eq!(library.store().count().await.unwrap(), expected as i64);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_batches_commit_in_groups() {
    let tree = SampleTree::new();
    for i in 0..7 {
        tree.file(&format!("s{}.mp3", i), b"x");
    }

    let library = tree.open_library(options()).await;
    let summary = library.scan(&tree.root()).await.unwrap();

    assert_eq!(summary.records_inserted, 7);
    // 3 + 3 + 1 tail flush
    assert_eq!(summary.batches_committed, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancelled_scan_writes_nothing() {
    let tree = SampleTree::new();
    tree.wav("kick.wav");
    tree.wav("sub/snare.wav");

    let cancel = CancellationToken::new();
    cancel.cancel();

    let library = tree.open_library(options()).await;
    let summary = library
        .scan_with_cancel(&tree.root(), cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.records_inserted, 0);
    assert_eq!(library.store().count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_mid_scan_keeps_committed_records() {
    let tree = SampleTree::new();
    for i in 0..3000 {
        tree.file(&format!("pack{}/hit_{}.wav", i % 50, i), b"x");
    }

    let library = tree
        .open_library(ScanOptions {
            crawl_workers: 4,
            batch_size: 16,
        })
        .await;

    let cancel = CancellationToken::new();
    let scan = {
        let library = library.clone();
        let root = tree.root();
        let cancel = cancel.clone();
        tokio::spawn(async move { library.scan_with_cancel(&root, cancel).await })
    };

    // Cancel once the first batch has landed
    while library.store().count().await.unwrap() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    cancel.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(30), scan)
        .await
        .expect("cancelled scan did not return")
        .unwrap()
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.records_inserted > 0);
    assert_eq!(
        library.store().count().await.unwrap(),
        summary.records_inserted as i64
    );

    // A fresh scan picks up exactly what was left
    let rest = library.scan(&tree.root()).await.unwrap();
    assert!(!rest.cancelled);
    assert_eq!(summary.records_inserted + rest.records_inserted, 3000);
    assert_eq!(library.store().count().await.unwrap(), 3000);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_by_name() {
    let tree = SampleTree::new();
    tree.wav("kick_drum.wav");
    tree.wav("snare.wav");

    let library = tree.open_library(options()).await;
    library.scan(&tree.root()).await.unwrap();

    let found = library.search("drum").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "kick_drum.wav");
    assert_eq!(found[0].auto_tags, "kick drum wav");
    assert_eq!(found[0].num_auto_tags, 3);
    assert_eq!(
        file_name(std::path::Path::new(&found[0].path)),
        "kick_drum.wav"
    );

    assert_eq!(library.search("").await.unwrap().len(), 2);
    assert!(library.search("hat").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_rejects_bad_root() {
    let tree = SampleTree::new();
    let library = tree.open_library(options()).await;

    let missing = library.scan(&tree.root().join("nope")).await;
    assert!(matches!(missing, Err(Error::Scan(ScanError::PathNotFound(_)))));

    let file = tree.file("kick.wav", b"x");
    let not_dir = library.scan(&file).await;
    assert!(matches!(not_dir, Err(Error::Scan(ScanError::NotADirectory(_)))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_survives_reopen() {
    let tree = SampleTree::new();
    tree.wav("kick.wav");

    {
        let library = tree.open_library(options()).await;
        library.scan(&tree.root()).await.unwrap();
        library.store().close().await;
    }

    let store = tree.open_store().await;
    assert_eq!(store.count().await.unwrap(), 1);
    let first = store.first_n(10).await.unwrap();
    assert_eq!(first[0].name, "kick.wav");
}
