use serde_json::json;
use uuid::Uuid;

use crate::common::{TestApp, routes};

mod decisions {
    use super::*;

    #[tokio::test]
    async fn approve_locks_and_records_reviewer() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());
        let reviewer_id = Uuid::new_v4();
        let reviewer = app.reviewer_token(reviewer_id);
        let id = app.create_submitted_entry(&owner, "lpg", 2024).await;

        let res = app
            .post_with_token(
                &routes::review(id),
                &json!({"action": "approve", "notes": "matches invoices"}),
                &reviewer,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "approved");
        assert_eq!(res.body["is_locked"], true);
        assert_eq!(res.body["reviewer_id"].as_str().unwrap(), reviewer_id.to_string());
        assert_eq!(res.body["review_notes"], "matches invoices");
        assert!(res.body["reviewed_at"].is_string());
    }

    #[tokio::test]
    async fn owners_cannot_review() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&owner, "lpg", 2024).await;

        let res = app
            .post_with_token(&routes::review(id), &json!({"action": "approve"}), &owner)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn drafts_cannot_be_approved() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());
        let reviewer = app.reviewer_token(Uuid::new_v4());
        let id = app.create_draft(&owner, "lpg", 2024).await;

        let res = app
            .post_with_token(&routes::review(id), &json!({"action": "approve"}), &reviewer)
            .await;

        assert_eq!(res.status, 404);
        let entry = app.get_with_token(&routes::entry(id), &owner).await;
        assert_eq!(entry.body["status"], "draft");
    }

    #[tokio::test]
    async fn reject_then_resubmit_returns_to_queue() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());
        let reviewer = app.reviewer_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&owner, "lpg", 2024).await;

        let res = app
            .post_with_token(
                &routes::review(id),
                &json!({"action": "reject", "notes": "missing March invoice"}),
                &reviewer,
            )
            .await;
        assert_eq!(res.body["status"], "rejected");
        assert_eq!(res.body["is_locked"], false);

        let res = app
            .post_with_token(&routes::entry_resubmit(id), &json!({}), &owner)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "submitted");
        assert!(res.body["review_notes"].is_null());

        let again = app
            .post_with_token(&routes::entry_resubmit(id), &json!({}), &owner)
            .await;
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn reset_unlocks_approved_entry() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());
        let reviewer = app.reviewer_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&owner, "lpg", 2024).await;
        app.post_with_token(&routes::review(id), &json!({"action": "approve"}), &reviewer)
            .await;

        let res = app
            .post_with_token(&routes::review(id), &json!({"action": "reset"}), &reviewer)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "submitted");
        assert_eq!(res.body["is_locked"], false);

        let edit = app
            .put_with_token(
                routes::ENTRIES,
                &json!({"page_key": "lpg", "period_year": 2024, "monthly": {"1": 9}}),
                &owner,
            )
            .await;
        assert_eq!(edit.status, 200, "{}", edit.text);
    }

    #[tokio::test]
    async fn unknown_action_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let reviewer = app.reviewer_token(Uuid::new_v4());

        let res = app
            .post_with_token(
                &routes::review(Uuid::new_v4()),
                &json!({"action": "escalate"}),
                &reviewer,
            )
            .await;

        assert_eq!(res.status, 400);
    }
}

mod bulk {
    use super::*;

    #[tokio::test]
    async fn bulk_approve_skips_entries_not_submitted() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());
        let reviewer = app.reviewer_token(Uuid::new_v4());
        let a = app.create_submitted_entry(&owner, "lpg", 2024).await;
        let b = app.create_submitted_entry(&owner, "urea", 2024).await;
        let draft = app.create_draft(&owner, "wd40", 2024).await;

        let res = app
            .post_with_token(
                routes::REVIEW_BULK,
                &json!({"entry_ids": [a, b, draft], "action": "approve"}),
                &reviewer,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["requested"], 3);
        assert_eq!(res.body["affected"], 2);

        let entry = app.get_with_token(&routes::entry(b), &owner).await;
        assert_eq!(entry.body["status"], "approved");
        assert_eq!(entry.body["is_locked"], true);
        let entry = app.get_with_token(&routes::entry(draft), &owner).await;
        assert_eq!(entry.body["status"], "draft");
    }

    #[tokio::test]
    async fn empty_bulk_request_is_rejected() {
        let app = TestApp::spawn().await;
        let reviewer = app.reviewer_token(Uuid::new_v4());

        let res = app
            .post_with_token(
                routes::REVIEW_BULK,
                &json!({"entry_ids": [], "action": "reject"}),
                &reviewer,
            )
            .await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn bulk_reset_is_not_accepted() {
        let app = TestApp::spawn().await;
        let reviewer = app.reviewer_token(Uuid::new_v4());

        let res = app
            .post_with_token(
                routes::REVIEW_BULK,
                &json!({"entry_ids": [Uuid::new_v4()], "action": "reset"}),
                &reviewer,
            )
            .await;

        assert_eq!(res.status, 400);
    }
}

mod queues {
    use super::*;

    #[tokio::test]
    async fn pending_lists_only_submitted_entries() {
        let app = TestApp::spawn().await;
        let alice_id = Uuid::new_v4();
        let alice = app.owner_token(alice_id);
        let bob = app.owner_token(Uuid::new_v4());
        let reviewer = app.reviewer_token(Uuid::new_v4());
        app.create_submitted_entry(&alice, "lpg", 2024).await;
        app.create_submitted_entry(&alice, "urea", 2024).await;
        app.create_submitted_entry(&bob, "lpg", 2024).await;
        app.create_draft(&bob, "wd40", 2024).await;

        let res = app.get_with_token(routes::REVIEW_PENDING, &reviewer).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["total"], 3);

        let res = app
            .get_with_token(
                &format!("{}?owner_id={alice_id}", routes::REVIEW_PENDING),
                &reviewer,
            )
            .await;
        assert_eq!(res.body["total"], 2);

        let owners = app.get_with_token(routes::REVIEW_OWNERS, &reviewer).await;
        let owners = owners.body.as_array().unwrap();
        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0]["owner_id"].as_str().unwrap(), alice_id.to_string());
        assert_eq!(owners[0]["pending_count"], 2);
    }

    #[tokio::test]
    async fn reviewed_filters_by_status() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());
        let reviewer = app.reviewer_token(Uuid::new_v4());
        let a = app.create_submitted_entry(&owner, "lpg", 2024).await;
        let b = app.create_submitted_entry(&owner, "urea", 2024).await;
        app.post_with_token(&routes::review(a), &json!({"action": "approve"}), &reviewer)
            .await;
        app.post_with_token(&routes::review(b), &json!({"action": "reject"}), &reviewer)
            .await;

        let all = app.get_with_token(routes::REVIEW_REVIEWED, &reviewer).await;
        assert_eq!(all.status, 200, "{}", all.text);
        assert_eq!(all.body["total"], 2);

        let rejected = app
            .get_with_token(
                &format!("{}?status=rejected", routes::REVIEW_REVIEWED),
                &reviewer,
            )
            .await;
        assert_eq!(rejected.body["total"], 1);
        assert_eq!(rejected.body["entries"][0]["id"].as_str().unwrap(), b.to_string());

        let invalid = app
            .get_with_token(
                &format!("{}?status=draft", routes::REVIEW_REVIEWED),
                &reviewer,
            )
            .await;
        assert_eq!(invalid.status, 400);
    }

    #[tokio::test]
    async fn queues_require_reviewer_role() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());

        let res = app.get_with_token(routes::REVIEW_PENDING, &owner).await;

        assert_eq!(res.status, 403);
    }
}
