use std::sync::Arc;

use plotline_client::{HttpBackend, NovelBackend};
use plotline_core::*;
use plotline_schema::{ForeshadowStatus, ReviewDecision, ReviewStatus, ReviewSummary};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn foreshadow(id: &str, status: &str, resolved_at: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "project_id": "p-1",
        "title": "线索A",
        "description": "...",
        "foreshadow_type": "plot",
        "status": status,
        "importance": 7,
        "planted_chapter_number": 2,
        "resolved_chapter_number": 12,
        "resolved_at": resolved_at,
        "tags": [],
        "related_characters": [],
        "related_foreshadows": [],
        "remind_before_chapters": 5,
        "auto_remind": true
    })
}

fn list_body(items: Vec<serde_json::Value>, planted: usize, resolved: usize) -> serde_json::Value {
    serde_json::json!({
        "items": items,
        "total": planted + resolved,
        "planted_count": planted,
        "resolved_count": resolved,
        "pending_count": planted
    })
}

fn backend(server: &MockServer) -> Arc<dyn NovelBackend> {
    Arc::new(HttpBackend::new(server.uri()))
}

fn chapters_body() -> serde_json::Value {
    let mut chapters: Vec<serde_json::Value> = (1..=10)
        .map(|n| {
            let status = match n {
                8 | 9 => "approved",
                10 => "rejected",
                _ => "pending",
            };
            serde_json::json!({
                "id": format!("c-{n}"),
                "chapter_number": n,
                "title": format!("第{n}章"),
                "word_count": 3000,
                "is_refined": true,
                "refined_at": "2026-02-01T09:30:00",
                "model": "sonnet",
                "review_status": status
            })
        })
        .collect();
    chapters.push(serde_json::json!({
        "id": "c-11",
        "chapter_number": 11,
        "title": "第11章",
        "word_count": 2500,
        "is_refined": false,
        "refined_at": null,
        "model": null
    }));
    serde_json::json!({ "chapters": chapters })
}

async fn mount_review_listing(server: &MockServer, chapter_loads: u64) {
    Mock::given(method("GET"))
        .and(path("/api/refinement/project/p-1/chapters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chapters_body()))
        .expect(chapter_loads)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/refinement/project/p-1/review-summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 10, "approved": 2, "rejected": 1, "pending": 7
        })))
        .expect(chapter_loads)
        .mount(server)
        .await;
}

#[tokio::test]
async fn resolving_moves_foreshadow_into_resolved_count() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/foreshadows"))
        .and(query_param("project_id", "p-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(list_body(vec![foreshadow("f-1", "planted", None)], 1, 0)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/foreshadows/f-1/resolve"))
        .and(body_json(serde_json::json!({"resolved_chapter_number": 12})))
        .respond_with(ResponseTemplate::new(200).set_body_json(foreshadow(
            "f-1",
            "resolved",
            Some("2026-02-03T20:00:00"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/foreshadows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            vec![foreshadow("f-1", "resolved", Some("2026-02-03T20:00:00"))],
            0,
            1,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/foreshadows/reminders"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"reminders": [], "total": 0})),
        )
        .mount(&server)
        .await;

    let mut tracker = ForeshadowTracker::new(backend(&server), "p-1");
    tracker.refresh().await.unwrap();
    assert_eq!(tracker.stats().planted, 1);
    assert_eq!(tracker.stats().pending, 1);

    let resolved = tracker.resolve("f-1", Some(12), None, None).await.unwrap();

    assert_eq!(resolved.status, ForeshadowStatus::Resolved);
    assert_eq!(tracker.stats().resolved, 1);
    assert_eq!(tracker.stats().pending, 0);
    assert_eq!(tracker.stats().planted, 0);
    assert!(tracker.items().iter().all(|f| f.check_resolution_fields().is_ok()));
}

#[tokio::test]
async fn second_delete_of_same_id_counts_as_done() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/foreshadows/f-1"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/foreshadows/f-1"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "伏笔不存在"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/foreshadows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(vec![], 0, 0)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/foreshadows/reminders"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"reminders": [], "total": 0})),
        )
        .mount(&server)
        .await;

    let mut tracker = ForeshadowTracker::new(backend(&server), "p-1");
    assert_eq!(tracker.delete("f-1").await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(
        tracker.delete("f-1").await.unwrap(),
        DeleteOutcome::AlreadyGone
    );
    let levels: Vec<NoticeLevel> = tracker.drain_notices().iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![NoticeLevel::Success, NoticeLevel::Info]);
}

#[tokio::test]
async fn approving_updates_summary_without_refetching_it() {
    let server = MockServer::start().await;
    mount_review_listing(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/refinement/chapter/c-1/review"))
        .and(body_json(serde_json::json!({"status": "approved"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "chapter_id": "c-1",
            "review_status": "approved",
            "message": "审核完成"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut flow = ReviewFlow::new(backend(&server), "p-1");
    flow.load_chapters().await.unwrap();
    assert_eq!(flow.len(), 10);

    let outcome = flow.review(ReviewDecision::Approved, None).await.unwrap();

    assert_eq!(outcome, ReviewOutcome::Confirmed { advanced: true });
    assert_eq!(
        flow.summary(),
        ReviewSummary {
            total: 10,
            approved: 3,
            rejected: 1,
            pending: 6
        }
    );
    assert_eq!(flow.current().map(|c| c.id.as_str()), Some("c-2"));
}

#[tokio::test]
async fn rejected_write_reverts_and_reloads() {
    let server = MockServer::start().await;
    mount_review_listing(&server, 2).await;

    Mock::given(method("POST"))
        .and(path("/api/refinement/chapter/c-1/review"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database is locked"))
        .expect(1)
        .mount(&server)
        .await;

    let mut flow = ReviewFlow::new(backend(&server), "p-1");
    flow.load_chapters().await.unwrap();

    let outcome = flow.review(ReviewDecision::Rejected, None).await.unwrap();

    match outcome {
        ReviewOutcome::Reverted { error } => assert!(error.contains("500")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(flow.chapters()[0].review_status, ReviewStatus::Pending);
    assert_eq!(flow.summary().pending, 7);
    assert!(!flow.needs_reload());
}

#[tokio::test]
async fn diff_for_abandoned_chapter_is_ignored() {
    let server = MockServer::start().await;
    mount_review_listing(&server, 1).await;

    for n in [1, 2] {
        Mock::given(method("GET"))
            .and(path(format!("/api/refinement/chapter/c-{n}/diff")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chapter_id": format!("c-{n}"),
                "chapter_number": n,
                "version": 1,
                "model_used": "sonnet",
                "original_word_count": 3000,
                "refined_word_count": 2900,
                "segments": [{
                    "segment": 1,
                    "original": format!("原文{n}"),
                    "refined": format!("润色{n}"),
                    "original_words": 3000,
                    "refined_words": 2900
                }],
                "status": "completed",
                "created_at": "2026-02-01T09:30:00"
            })))
            .mount(&server)
            .await;
    }

    let backend = backend(&server);
    let mut flow = ReviewFlow::new(backend.clone(), "p-1");
    flow.load_chapters().await.unwrap();

    let first = flow.begin_diff_load().unwrap();
    flow.next();
    let second = flow.begin_diff_load().unwrap();

    let late = backend.chapter_diff(first.chapter_id()).await;
    let fresh = backend.chapter_diff(second.chapter_id()).await;
    assert!(flow.apply_diff(second, fresh));
    assert!(!flow.apply_diff(first, late));

    match flow.view() {
        ChapterView::Compare {
            refined,
            delta,
            favorable,
            ..
        } => {
            assert_eq!(refined, "润色2");
            assert_eq!(delta, -100);
            assert!(!favorable);
        }
        other => panic!("unexpected view: {other:?}"),
    }
}
