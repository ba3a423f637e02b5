use crate::downloader::test_helpers::{
    JPEG_BYTES, create_test_downloader, drain_events, test_chapter, test_series, wait_until_idle,
};
use crate::types::{DownloadStatus, Event};

/// Names of the finished (non-temp) files in a directory, sorted
async fn finished_files(dir: &std::path::Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}

// --- the full success scenario ---

#[tokio::test]
async fn two_chapters_download_completely_and_commit() {
    let ctx = create_test_downloader(3).await;
    let series = test_series(1);
    let c1 = test_chapter(10, "Chapter 1", 1);
    let c2 = test_chapter(20, "Chapter 2", 2);

    let mut events = ctx.downloader.subscribe();

    ctx.downloader
        .queue_chapters(&series, &[c1.clone(), c2.clone()])
        .await
        .unwrap();
    ctx.downloader.start().await;
    wait_until_idle(&ctx.downloader).await;

    // Queue drained
    assert!(ctx.downloader.queue_snapshot().await.is_empty());

    // Both chapter directories committed with three finished images each
    for chapter in [&c1, &c2] {
        let dir = ctx.chapter_dir(&series, chapter);
        assert!(
            tokio::fs::try_exists(&dir).await.unwrap(),
            "chapter directory must exist: {}",
            dir.display()
        );
        assert_eq!(
            finished_files(&dir).await,
            vec!["001.jpg", "002.jpg", "003.jpg"],
            "pages must be stored as NNN.<ext> with no .tmp remnants"
        );
        assert!(
            !tokio::fs::try_exists(&ctx.staging_dir(&series, chapter))
                .await
                .unwrap(),
            "the staging directory must be gone after the commit"
        );
    }

    // Two completions, zero error notifications
    let events = drain_events(&mut events);
    let completed = events
        .iter()
        .filter(|e| matches!(e, Event::Completed { .. }))
        .count();
    let errors = events
        .iter()
        .filter(|e| matches!(e, Event::Error { .. }))
        .count();
    assert_eq!(completed, 2);
    assert_eq!(errors, 0);
}

#[tokio::test]
async fn committed_pages_carry_the_detected_extension() {
    let ctx = create_test_downloader(1).await;
    let series = test_series(1);
    let chapter = test_chapter(10, "Chapter 1", 1);

    ctx.downloader
        .queue_chapters(&series, std::slice::from_ref(&chapter))
        .await
        .unwrap();
    ctx.downloader.start().await;
    wait_until_idle(&ctx.downloader).await;

    let dir = ctx.chapter_dir(&series, &chapter);
    let contents = tokio::fs::read(dir.join("001.jpg")).await.unwrap();
    assert_eq!(contents, JPEG_BYTES, "stored bytes must match the source bytes");
}

// --- per-item ordering of notifications ---

#[tokio::test]
async fn item_events_are_queued_then_progress_then_one_terminal() {
    let ctx = create_test_downloader(3).await;
    let series = test_series(1);
    let chapter = test_chapter(10, "Chapter 1", 1);

    let mut events = ctx.downloader.subscribe();

    ctx.downloader
        .queue_chapters(&series, std::slice::from_ref(&chapter))
        .await
        .unwrap();
    ctx.downloader.start().await;
    wait_until_idle(&ctx.downloader).await;

    let mut saw_queued = false;
    let mut progress_after_queued = 0usize;
    let mut terminal = 0usize;
    for event in drain_events(&mut events) {
        match event {
            Event::Queued { .. } => saw_queued = true,
            Event::Progress { .. } => {
                assert!(saw_queued, "progress must not precede the queued event");
                assert_eq!(terminal, 0, "no progress after the terminal event");
                progress_after_queued += 1;
            }
            Event::Completed { .. } => terminal += 1,
            _ => {}
        }
    }
    assert!(saw_queued);
    assert!(progress_after_queued >= 3, "one progress event per page");
    assert_eq!(terminal, 1, "exactly one terminal notification");
}

// --- partial-page isolation ---

#[tokio::test]
async fn one_bad_page_fails_the_chapter_but_not_its_siblings() {
    let ctx = create_test_downloader(3).await;
    let series = test_series(1);
    let chapter = test_chapter(10, "Chapter 1", 1);

    ctx.source.fail_page(1);

    let mut events = ctx.downloader.subscribe();
    ctx.downloader
        .queue_chapters(&series, std::slice::from_ref(&chapter))
        .await
        .unwrap();
    ctx.downloader.start().await;
    wait_until_idle(&ctx.downloader).await;

    // The chapter ends in Error and stays queued for manual retry
    let snapshot = ctx.downloader.queue_snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].status, DownloadStatus::Error);
    assert_eq!(
        snapshot[0].downloaded_pages, 2,
        "the sibling pages must still be fetched"
    );

    // Bounded retries on the bad page only
    assert_eq!(ctx.source.attempts(10, 1), 3, "no more than 3 fetch attempts");
    assert_eq!(ctx.source.attempts(10, 0), 1);
    assert_eq!(ctx.source.attempts(10, 2), 1);

    // No commit: the final directory must not exist, the staging directory
    // holds the two good pages
    assert!(
        !tokio::fs::try_exists(ctx.chapter_dir(&series, &chapter))
            .await
            .unwrap()
    );
    assert_eq!(
        finished_files(&ctx.staging_dir(&series, &chapter)).await,
        vec!["001.jpg", "003.jpg"]
    );

    // The failure surfaces as an error notification with the chapter name
    let errored = drain_events(&mut events).into_iter().any(|e| {
        matches!(&e, Event::Error { context: Some(c), .. } if c == "Chapter 1")
    });
    assert!(errored);
}

// --- resume and atomic commit ---

#[tokio::test]
async fn rerun_after_partial_failure_resumes_and_commits() {
    let ctx = create_test_downloader(3).await;
    let series = test_series(1);
    let chapter = test_chapter(10, "Chapter 1", 1);

    ctx.source.fail_page(1);
    ctx.downloader
        .queue_chapters(&series, std::slice::from_ref(&chapter))
        .await
        .unwrap();
    ctx.downloader.start().await;
    wait_until_idle(&ctx.downloader).await;

    assert!(
        !tokio::fs::try_exists(ctx.chapter_dir(&series, &chapter))
            .await
            .unwrap(),
        "an interrupted chapter must never appear under its final name"
    );

    // The page heals; the retry run must reuse the staged pages
    ctx.source.heal_pages();
    ctx.downloader.start().await;
    wait_until_idle(&ctx.downloader).await;

    assert!(ctx.downloader.queue_snapshot().await.is_empty());
    let dir = ctx.chapter_dir(&series, &chapter);
    assert_eq!(
        finished_files(&dir).await,
        vec!["001.jpg", "002.jpg", "003.jpg"]
    );

    // Pages 0 and 2 were staged in the first run: one fetch each. Page 1
    // took 3 failed attempts plus the successful retry.
    assert_eq!(ctx.source.attempts(10, 0), 1, "staged pages skip the network");
    assert_eq!(ctx.source.attempts(10, 2), 1, "staged pages skip the network");
    assert_eq!(ctx.source.attempts(10, 1), 4);
    assert_eq!(
        ctx.source.page_list_calls(),
        1,
        "the page list fetched in the first run must be reused"
    );
}

#[tokio::test]
async fn staged_files_from_a_previous_process_are_reused() {
    let ctx = create_test_downloader(3).await;
    let series = test_series(1);
    let chapter = test_chapter(10, "Chapter 1", 1);

    // Simulate a crashed previous process: staging holds one finished page
    // and one torn temp file
    let staging = ctx.staging_dir(&series, &chapter);
    tokio::fs::create_dir_all(&staging).await.unwrap();
    tokio::fs::write(staging.join("001.jpg"), JPEG_BYTES).await.unwrap();
    tokio::fs::write(staging.join("002.tmp"), b"torn write").await.unwrap();

    ctx.downloader
        .queue_chapters(&series, std::slice::from_ref(&chapter))
        .await
        .unwrap();
    ctx.downloader.start().await;
    wait_until_idle(&ctx.downloader).await;

    let dir = ctx.chapter_dir(&series, &chapter);
    assert_eq!(
        finished_files(&dir).await,
        vec!["001.jpg", "002.jpg", "003.jpg"],
        "the torn temp file must be discarded, the finished page kept"
    );
    assert_eq!(
        ctx.source.attempts(10, 0),
        0,
        "the staged page must not be fetched again"
    );
    assert_eq!(ctx.source.attempts(10, 1), 1);
    assert_eq!(ctx.source.attempts(10, 2), 1);
}

// --- page-list failure ---

#[tokio::test]
async fn page_list_failure_marks_the_item_and_surfaces_the_chapter_name() {
    let ctx = create_test_downloader(3).await;
    let series = test_series(1);
    let chapter = test_chapter(10, "Chapter 1", 1);

    ctx.source.fail_page_list(10);

    let mut events = ctx.downloader.subscribe();
    ctx.downloader
        .queue_chapters(&series, std::slice::from_ref(&chapter))
        .await
        .unwrap();
    ctx.downloader.start().await;
    wait_until_idle(&ctx.downloader).await;

    let snapshot = ctx.downloader.queue_snapshot().await;
    assert_eq!(snapshot[0].status, DownloadStatus::Error);
    assert!(
        snapshot[0].total_pages.is_none(),
        "no page list means no page count"
    );

    // The staging directory is only created after the page list resolves
    assert!(
        !tokio::fs::try_exists(ctx.staging_dir(&series, &chapter))
            .await
            .unwrap()
    );

    let errored = drain_events(&mut events).into_iter().any(|e| {
        matches!(&e, Event::Error { context: Some(c), .. } if c == "Chapter 1")
    });
    assert!(errored, "the failure must carry the chapter name as context");
}
