use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::Client;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tempfile::TempDir;

use ::common::storage::FilesystemBlobStore;
use photovault_server::config::{
    AdminConfig, AppConfig, AuthConfig, CorsConfig, DatabaseConfig, ServerConfig, StorageConfig,
};
use photovault_server::state::AppState;

/// Upload limit used by every test server.
pub const MAX_UPLOAD_SIZE: u64 = 1024 * 1024;

pub mod routes {
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const ME: &str = "/api/v1/auth/me";
    pub const HEALTH: &str = "/api/v1/health";

    pub const IMAGES: &str = "/api/v1/images";
    pub const UPLOAD: &str = "/api/v1/images/upload";
    pub const UPLOAD_MULTIPLE: &str = "/api/v1/images/upload/multiple";
    pub const FAVORITES: &str = "/api/v1/images/favorites";
    pub const ARCHIVED: &str = "/api/v1/images/archived";
    pub const TRASH: &str = "/api/v1/images/trash";
    pub const SEARCH: &str = "/api/v1/images/search";
    pub const STATS: &str = "/api/v1/images/stats";

    pub fn image(id: &str) -> String {
        format!("/api/v1/images/{id}")
    }

    pub fn download(id: &str) -> String {
        format!("/api/v1/images/{id}/download")
    }

    pub fn thumbnail(id: &str) -> String {
        format!("/api/v1/images/{id}/thumbnail")
    }

    pub fn favorite(id: &str) -> String {
        format!("/api/v1/images/{id}/favorite")
    }

    pub fn archive(id: &str) -> String {
        format!("/api/v1/images/{id}/archive")
    }

    pub fn restore(id: &str) -> String {
        format!("/api/v1/images/{id}/restore")
    }

    pub fn permanent(id: &str) -> String {
        format!("/api/v1/images/{id}/permanent")
    }
}

/// A running test server backed by a throwaway SQLite file and storage root.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub blob_store: Arc<FilesystemBlobStore>,
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

/// A file part for multipart uploads.
pub struct UploadFile<'a> {
    pub name: &'a str,
    pub content_type: &'a str,
    pub bytes: Vec<u8>,
}

impl<'a> UploadFile<'a> {
    pub fn new(name: &'a str, content_type: &'a str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            content_type,
            bytes: bytes.into(),
        }
    }

    fn into_part(self) -> reqwest::multipart::Part {
        reqwest::multipart::Part::bytes(self.bytes)
            .file_name(self.name.to_string())
            .mime_str(self.content_type)
            .expect("Failed to set MIME type")
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with a chance to adjust the configuration first.
    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());

        let mut app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig {
                url: db_url.clone(),
            },
            auth: AuthConfig {
                jwt_secret: "test-secret-for-integration-tests".to_string(),
                token_ttl_hours: 1,
            },
            storage: StorageConfig {
                root: dir.path().join("uploads"),
                max_upload_size: MAX_UPLOAD_SIZE,
                max_request_size: 8 * 1024 * 1024,
            },
            admin: AdminConfig::default(),
        };
        configure(&mut app_config);

        let db = photovault_server::database::init_db(&db_url)
            .await
            .expect("Failed to initialize test database");
        photovault_server::seed::ensure_indexes(&db)
            .await
            .expect("Failed to create indexes");
        photovault_server::seed::ensure_admin_user(&db, &app_config.admin)
            .await
            .expect("Failed to bootstrap admin");

        let blob_store = Arc::new(
            FilesystemBlobStore::new(
                app_config.storage.root.clone(),
                app_config.storage.max_upload_size,
            )
            .await
            .expect("Failed to create blob store"),
        );

        let state = AppState {
            db: db.clone(),
            config: app_config,
            blob_store: blob_store.clone(),
        };

        let app = photovault_server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            blob_store,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
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

    pub async fn put_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
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

    /// Upload one file in the `file` field.
    pub async fn upload(&self, file: UploadFile<'_>, token: &str) -> TestResponse {
        let form = reqwest::multipart::Form::new().part("file", file.into_part());
        self.send_multipart(routes::UPLOAD, form, token).await
    }

    /// Upload several files in repeated `files` fields.
    pub async fn upload_many(&self, files: Vec<UploadFile<'_>>, token: &str) -> TestResponse {
        let form = files
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |form, file| {
                form.part("files", file.into_part())
            });
        self.send_multipart(routes::UPLOAD_MULTIPLE, form, token).await
    }

    async fn send_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
        token: &str,
    ) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Upload a PNG and return the new image's id.
    pub async fn upload_png(&self, name: &str, bytes: &[u8], token: &str) -> String {
        let res = self
            .upload(UploadFile::new(name, "image/png", bytes.to_vec()), token)
            .await;
        assert_eq!(res.status, 200, "upload failed: {}", res.text);
        res.body["image"]["id"]
            .as_str()
            .expect("upload response should contain image.id")
            .to_string()
    }

    /// Register a user and log in, returning the auth token.
    pub async fn create_authenticated_user(&self, username: &str, password: &str) -> String {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });

        let reg = self.post_without_token(routes::REGISTER, &body).await;
        assert_eq!(reg.status, 201, "Registration failed: {}", reg.text);

        self.login(username, password).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });
        let res = self.post_without_token(routes::LOGIN, &body).await;
        assert_eq!(res.status, 200, "Login failed: {}", res.text);

        res.body["token"]
            .as_str()
            .expect("Login response should contain a token")
            .to_string()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }
}
