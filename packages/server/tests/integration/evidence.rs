use serde_json::json;
use uuid::Uuid;

use crate::common::{FilePart, MAX_OBJECT_SIZE, TestApp, routes};

mod upload {
    use super::*;

    #[tokio::test]
    async fn upload_stores_file_metadata() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "diesel", 2024).await;

        let res = app
            .upload_evidence(
                id,
                FilePart {
                    name: "receipt.png".into(),
                    bytes: b"PNG".to_vec(),
                    mime: "image/png".into(),
                },
                &[],
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["file_name"], "receipt.png");
        assert_eq!(res.body["mime_type"], "image/png");
        assert_eq!(res.body["file_size"], 3);
        assert_eq!(res.body["kind"], "usage_evidence");
        assert!(res.body.get("file_path").is_none());
    }

    #[tokio::test]
    async fn single_slot_pages_replace_the_previous_file() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "natural_gas", 2024).await;

        let first = app
            .upload_evidence(
                id,
                FilePart::pdf("jan-v1.pdf", b"one"),
                &[("month", "1".to_string())],
                &token,
            )
            .await;
        assert_eq!(first.status, 201, "{}", first.text);
        let second = app
            .upload_evidence(
                id,
                FilePart::pdf("jan-v2.pdf", b"two"),
                &[("month", "1".to_string())],
                &token,
            )
            .await;
        assert_eq!(second.status, 201, "{}", second.text);
        let other_month = app
            .upload_evidence(
                id,
                FilePart::pdf("feb.pdf", b"three"),
                &[("month", "2".to_string())],
                &token,
            )
            .await;
        assert_eq!(other_month.status, 201);

        let files = app.get_with_token(&routes::entry_evidence(id), &token).await;
        let names: Vec<_> = files.body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["file_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["jan-v2.pdf", "feb.pdf"]);
    }

    #[tokio::test]
    async fn multiple_pages_keep_every_file() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "gasoline", 2024).await;

        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            let res = app
                .upload_evidence(id, FilePart::pdf(name, b"x"), &[], &token)
                .await;
            assert_eq!(res.status, 201);
        }

        let files = app.get_with_token(&routes::entry_evidence(id), &token).await;
        assert_eq!(files.body["total"], 3);
    }

    #[tokio::test]
    async fn invalid_month_and_empty_file_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "lpg", 2024).await;

        let res = app
            .upload_evidence(
                id,
                FilePart::pdf("a.pdf", b"x"),
                &[("month", "13".to_string())],
                &token,
            )
            .await;
        assert_eq!(res.status, 400);

        let res = app
            .upload_evidence(id, FilePart::pdf("empty.pdf", b""), &[], &token)
            .await;
        assert_eq!(res.status, 400);

        let res = app
            .upload_evidence(
                id,
                FilePart::pdf("a.pdf", b"x"),
                &[("kind", "photo".to_string())],
                &token,
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn only_images_and_pdfs_are_accepted() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "lpg", 2024).await;

        let res = app
            .upload_evidence(
                id,
                FilePart {
                    name: "readings.txt".into(),
                    bytes: b"jan 100".to_vec(),
                    mime: "text/plain".into(),
                },
                &[],
                &token,
            )
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        let files = app.get_with_token(&routes::entry_evidence(id), &token).await;
        assert_eq!(files.body["total"], 0);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "lpg", 2024).await;

        let big = vec![0u8; MAX_OBJECT_SIZE as usize + 1];
        let res = app
            .upload_evidence(id, FilePart::pdf("big.pdf", &big), &[], &token)
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        let files = app.get_with_token(&routes::entry_evidence(id), &token).await;
        assert_eq!(files.body["total"], 0);
    }

    #[tokio::test]
    async fn locked_entries_refuse_owner_uploads() {
        let app = TestApp::spawn().await;
        let owner = app.owner_token(Uuid::new_v4());
        let reviewer = app.reviewer_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&owner, "lpg", 2024).await;
        app.post_with_token(&routes::review(id), &json!({"action": "approve"}), &reviewer)
            .await;

        let res = app
            .upload_evidence(id, FilePart::pdf("late.pdf", b"x"), &[], &owner)
            .await;

        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn other_owners_cannot_upload() {
        let app = TestApp::spawn().await;
        let alice = app.owner_token(Uuid::new_v4());
        let bob = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&alice, "lpg", 2024).await;

        let res = app
            .upload_evidence(id, FilePart::pdf("x.pdf", b"x"), &[], &bob)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod download {
    use super::*;

    #[tokio::test]
    async fn signed_url_serves_the_bytes() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "lpg", 2024).await;
        let file_id = app
            .upload_evidence(id, FilePart::pdf("bill.pdf", b"%PDF-bill"), &[], &token)
            .await
            .id();

        let res = app.get_with_token(&routes::evidence_url(file_id), &token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["expires_in"], 300);
        let url = res.body["url"].as_str().unwrap();

        let (status, bytes) = app.get_absolute(url).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, b"%PDF-bill");
    }

    #[tokio::test]
    async fn tampered_signature_is_refused() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "lpg", 2024).await;
        let file_id = app
            .upload_evidence(id, FilePart::pdf("bill.pdf", b"data"), &[], &token)
            .await
            .id();
        let res = app.get_with_token(&routes::evidence_url(file_id), &token).await;
        let url = res.body["url"].as_str().unwrap();

        let (base, _) = url.split_once("&sig=").unwrap();
        let forged = format!("{base}&sig={}", "0".repeat(64));
        let (status, _) = app.get_absolute(&forged).await;

        assert_eq!(status, 403);
    }

    #[tokio::test]
    async fn other_owners_cannot_request_links() {
        let app = TestApp::spawn().await;
        let alice = app.owner_token(Uuid::new_v4());
        let bob = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&alice, "lpg", 2024).await;
        let file_id = app
            .upload_evidence(id, FilePart::pdf("bill.pdf", b"data"), &[], &alice)
            .await
            .id();

        let res = app.get_with_token(&routes::evidence_url(file_id), &bob).await;

        assert_eq!(res.status, 404);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn delete_removes_row_and_object() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = app.create_submitted_entry(&token, "lpg", 2024).await;
        let file_id = app
            .upload_evidence(id, FilePart::pdf("bill.pdf", b"data"), &[], &token)
            .await
            .id();

        let res = app.delete_with_token(&routes::evidence(file_id), &token).await;
        assert_eq!(res.status, 204);

        let files = app.get_with_token(&routes::entry_evidence(id), &token).await;
        assert_eq!(files.body["total"], 0);
        assert!(app.state.objects.list("").await.unwrap().is_empty());

        let again = app.delete_with_token(&routes::evidence(file_id), &token).await;
        assert_eq!(again.status, 404);
    }
}

mod groups {
    use super::*;

    async fn itemised_entry(app: &TestApp, token: &str, group_id: Uuid) -> Uuid {
        let res = app
            .put_with_token(
                routes::ENTRIES,
                &json!({
                    "page_key": "refrigerant",
                    "period_year": 2024,
                    "payload": {
                        "line_records": [
                            {"id": "r1", "group_id": group_id, "date": "2024-03-02", "quantity": 1.5},
                            {"id": "r2", "group_id": group_id, "date": "2024-04-10", "quantity": 2.0},
                            {"id": "r3", "date": "2024-05-01", "quantity": 4.0},
                        ]
                    },
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["amount"].as_f64().unwrap(), 7.5);
        res.uuid("entry_id")
    }

    #[tokio::test]
    async fn line_records_drive_monthly_totals() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = itemised_entry(&app, &token, Uuid::new_v4()).await;

        let entry = app.get_with_token(&routes::entry(id), &token).await;

        assert_eq!(entry.body["monthly"]["3"].as_f64().unwrap(), 1.5);
        assert_eq!(entry.body["monthly"]["5"].as_f64().unwrap(), 4.0);
    }

    #[tokio::test]
    async fn group_lists_records_and_files() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let group_id = Uuid::new_v4();
        let id = itemised_entry(&app, &token, group_id).await;

        let upload = app
            .upload_evidence(
                id,
                FilePart::pdf("refill.pdf", b"x"),
                &[("group_id", group_id.to_string())],
                &token,
            )
            .await;
        assert_eq!(upload.status, 201, "{}", upload.text);

        let records = app
            .get_with_token(&routes::entry_group(id, group_id), &token)
            .await;
        assert_eq!(records.status, 200);
        assert_eq!(records.body.as_array().unwrap().len(), 2);

        let groups = app.get_with_token(&routes::entry_groups(id), &token).await;
        let groups = groups.body.as_array().unwrap();
        let group = groups
            .iter()
            .find(|g| g["group_id"] == group_id.to_string())
            .unwrap();
        assert_eq!(group["files"].as_array().unwrap().len(), 1);
        assert_eq!(group["records"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn files_can_move_between_groups() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let id = itemised_entry(&app, &token, Uuid::new_v4()).await;
        let file_id = app
            .upload_evidence(id, FilePart::pdf("a.pdf", b"x"), &[], &token)
            .await
            .id();

        let target = Uuid::new_v4();
        let res = app
            .put_with_token(
                &routes::evidence_group(file_id),
                &json!({"group_id": target}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["group_id"].as_str().unwrap(), target.to_string());
    }

    #[tokio::test]
    async fn ungroup_detaches_files_and_reconcile_collects_them() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());
        let group_id = Uuid::new_v4();
        let id = itemised_entry(&app, &token, group_id).await;
        app.upload_evidence(
            id,
            FilePart::pdf("refill.pdf", b"x"),
            &[("group_id", group_id.to_string())],
            &token,
        )
        .await;

        let res = app.delete_with_token(&routes::group(group_id), &token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["detached"], 1);

        let files = app.get_with_token(&routes::entry_evidence(id), &token).await;
        assert_eq!(files.body["total"], 0);
        let records = app
            .get_with_token(&routes::entry_group(id, group_id), &token)
            .await;
        assert_eq!(records.body.as_array().unwrap().len(), 2);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let report = app
            .state
            .engines
            .reconciler
            .run_once(chrono::Utc::now())
            .await
            .unwrap();
        assert_eq!(report.detached_rows.len(), 1);
        assert!(app.state.objects.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_group_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.owner_token(Uuid::new_v4());

        let res = app
            .delete_with_token(&routes::group(Uuid::new_v4()), &token)
            .await;

        assert_eq!(res.status, 404);
    }
}
