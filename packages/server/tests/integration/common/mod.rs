use std::net::SocketAddr;

use reqwest::Client;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

use server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, ReconcileConfig, ServerConfig,
    StorageBackend, StorageConfig,
};
use server::state::AppState;
use server::utils::jwt;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";
pub const MAX_OBJECT_SIZE: u64 = 64 * 1024;

pub mod routes {
    use uuid::Uuid;

    pub const ENTRIES: &str = "/api/v1/entries";
    pub const ENTRIES_DRAFT: &str = "/api/v1/entries/draft";
    pub const ENTRIES_SUBMIT: &str = "/api/v1/entries/submit";
    pub const REVIEW_PENDING: &str = "/api/v1/review/pending";
    pub const REVIEW_REVIEWED: &str = "/api/v1/review/reviewed";
    pub const REVIEW_OWNERS: &str = "/api/v1/review/owners";
    pub const REVIEW_BULK: &str = "/api/v1/review/bulk";

    pub fn entry(id: Uuid) -> String {
        format!("/api/v1/entries/{id}")
    }

    pub fn entry_lookup(page_key: &str, year: i32) -> String {
        format!("/api/v1/entries/lookup?page_key={page_key}&period_year={year}")
    }

    pub fn entry_resubmit(id: Uuid) -> String {
        format!("/api/v1/entries/{id}/resubmit")
    }

    pub fn entry_evidence(id: Uuid) -> String {
        format!("/api/v1/entries/{id}/evidence")
    }

    pub fn entry_groups(id: Uuid) -> String {
        format!("/api/v1/entries/{id}/groups")
    }

    pub fn entry_group(id: Uuid, group_id: Uuid) -> String {
        format!("/api/v1/entries/{id}/groups/{group_id}")
    }

    pub fn evidence(id: Uuid) -> String {
        format!("/api/v1/evidence/{id}")
    }

    pub fn evidence_url(id: Uuid) -> String {
        format!("/api/v1/evidence/{id}/url")
    }

    pub fn evidence_group(id: Uuid) -> String {
        format!("/api/v1/evidence/{id}/group")
    }

    pub fn group(group_id: Uuid) -> String {
        format!("/api/v1/groups/{group_id}")
    }

    pub fn review(id: Uuid) -> String {
        format!("/api/v1/review/{id}")
    }
}

/// A running test server backed by a throwaway SQLite file and evidence
/// directory.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub state: AppState,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

/// One file part of a multipart request.
pub struct FilePart {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl FilePart {
    pub fn pdf(name: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            bytes: bytes.to_vec(),
            mime: "application/pdf".to_string(),
        }
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("carbonbook.db").display()
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig {
                url: db_url,
                max_connections: 1,
            },
            auth: AuthConfig {
                jwt_secret: JWT_SECRET.to_string(),
                reviewer_role: "admin".to_string(),
                token_ttl_secs: 3600,
            },
            storage: StorageConfig {
                backend: StorageBackend::Filesystem,
                root: dir.path().join("evidence"),
                max_object_size: MAX_OBJECT_SIZE,
                public_base_url: format!("http://{addr}"),
                url_secret: None,
                signed_url_ttl_secs: 300,
                allowed_types: vec!["image/*".to_string(), "application/pdf".to_string()],
                s3: None,
            },
            reconcile: ReconcileConfig {
                enabled: false,
                interval_secs: 3600,
                grace_secs: 0,
                dry_run: false,
            },
        };

        let db = server::database::init_db(&app_config.database)
            .await
            .expect("Failed to initialize test database");
        let state = AppState::build(app_config, db.clone())
            .await
            .expect("Failed to build app state");

        let app = server::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            state,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Token for a plain owner account.
    pub fn owner_token(&self, user_id: Uuid) -> String {
        jwt::sign(JWT_SECRET, user_id, "user", 3600).expect("Failed to sign token")
    }

    /// Token carrying the reviewer role.
    pub fn reviewer_token(&self, user_id: Uuid) -> String {
        jwt::sign(JWT_SECRET, user_id, "admin", 3600).expect("Failed to sign token")
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// GET an absolute URL, such as a signed download link.
    pub async fn get_absolute(&self, url: &str) -> (u16, Vec<u8>) {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .expect("Failed to send GET request");
        let status = res.status().as_u16();
        let bytes = res.bytes().await.unwrap_or_default().to_vec();
        (status, bytes)
    }

    pub async fn put_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// Upload one evidence file with optional text fields.
    pub async fn upload_evidence(
        &self,
        entry_id: Uuid,
        file: FilePart,
        fields: &[(&str, String)],
        token: &str,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(&file.mime)
            .expect("Failed to set MIME type");
        let mut form = reqwest::multipart::Form::new().part("file", part);
        for (name, value) in fields {
            form = form.text(name.to_string(), value.clone());
        }

        let res = self
            .client
            .post(self.url(&routes::entry_evidence(entry_id)))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Multipart submission: entry JSON, files, optional per-file metadata.
    pub async fn submit(
        &self,
        entry: &Value,
        files: Vec<FilePart>,
        file_meta: Option<&Value>,
        token: &str,
    ) -> TestResponse {
        let mut form = reqwest::multipart::Form::new().text("entry", entry.to_string());
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str(&file.mime)
                .expect("Failed to set MIME type");
            form = form.part("file", part);
        }
        if let Some(meta) = file_meta {
            form = form.text("file_meta", meta.to_string());
        }

        let res = self
            .client
            .post(self.url(routes::ENTRIES_SUBMIT))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart submit request");

        TestResponse::from_response(res).await
    }

    /// Submit a monthly entry through `PUT /entries` and return its id.
    pub async fn create_submitted_entry(&self, token: &str, page_key: &str, year: i32) -> Uuid {
        let res = self
            .put_with_token(
                routes::ENTRIES,
                &serde_json::json!({
                    "page_key": page_key,
                    "period_year": year,
                    "monthly": {"1": 100.0, "2": 50.0},
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 200, "create_submitted_entry failed: {}", res.text);
        res.uuid("entry_id")
    }

    /// Save a draft and return its id.
    pub async fn create_draft(&self, token: &str, page_key: &str, year: i32) -> Uuid {
        let res = self
            .post_with_token(
                routes::ENTRIES_DRAFT,
                &serde_json::json!({
                    "page_key": page_key,
                    "period_year": year,
                    "monthly": {"3": 12.5},
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 200, "create_draft failed: {}", res.text);
        res.uuid("entry_id")
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn id(&self) -> Uuid {
        self.uuid("id")
    }

    pub fn uuid(&self, field: &str) -> Uuid {
        self.body[field]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("response body should contain uuid '{field}': {}", self.text))
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}
