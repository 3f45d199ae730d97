#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use file_share_access::config::AccessConfig;
use file_share_access::entities::{files, secure_links, users};
use file_share_access::infrastructure::{database, seed};
use file_share_access::models::{Actor, Role};
use file_share_access::services::access_gateway::AccessGateway;
use file_share_access::services::storage::{BlobReader, StorageService};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tempfile::TempDir;
use uuid::Uuid;

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

/// File-backed sqlite with a real connection pool, so concurrent callers
/// contend on separate connections. The database lives as long as the
/// returned directory.
pub async fn setup_pooled_test_db(max_connections: u32) -> (DatabaseConnection, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("access.db").display());
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(max_connections)
        .min_connections(max_connections)
        .sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    database::run_migrations(&db).await.unwrap();
    (db, dir)
}

/// In-memory blob store. `fail_reads` makes every open fail, `read_delay_ms`
/// makes every open slow.
#[derive(Default)]
pub struct MockStorageService {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_reads: AtomicBool,
    pub read_delay_ms: AtomicU64,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: std::time::Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        self.files.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object_stream(&self, key: &str) -> anyhow::Result<BlobReader> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        let data = self
            .files
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Key not found"))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn delete_file(&self, key: &str) -> anyhow::Result<()> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }
}

pub struct TestEnv {
    pub db: DatabaseConnection,
    pub storage: Arc<MockStorageService>,
    pub config: AccessConfig,
    pub gateway: AccessGateway,
    _db_dir: Option<TempDir>,
}

pub async fn setup_env() -> TestEnv {
    setup_env_with(AccessConfig::default()).await
}

pub async fn setup_env_with(config: AccessConfig) -> TestEnv {
    let db = setup_test_db().await;
    build_env(db, config, None)
}

/// Like `setup_env`, but over a multi-connection pool.
pub async fn setup_pooled_env() -> TestEnv {
    let (db, dir) = setup_pooled_test_db(8).await;
    build_env(db, AccessConfig::default(), Some(dir))
}

fn build_env(db: DatabaseConnection, config: AccessConfig, db_dir: Option<TempDir>) -> TestEnv {
    let storage = Arc::new(MockStorageService::new());
    let gateway = AccessGateway::new(db.clone(), storage.clone(), config.clone());
    TestEnv {
        db,
        storage,
        config,
        gateway,
        _db_dir: db_dir,
    }
}

pub async fn create_user(db: &DatabaseConnection, email: &str, role: Role) -> Actor {
    let user: users::Model = seed::ensure_user(db, email, role).await.unwrap();
    Actor::try_from(user).unwrap()
}

/// Inserts a file row owned by `owner` and stores `content` under its key.
pub async fn create_file(env: &TestEnv, owner: &Actor, name: &str, content: &[u8]) -> files::Model {
    create_file_at(env, owner, name, content, Utc::now()).await
}

pub async fn create_file_at(
    env: &TestEnv,
    owner: &Actor,
    name: &str,
    content: &[u8],
    created_at: DateTime<Utc>,
) -> files::Model {
    let id = Uuid::new_v4().to_string();
    let storage_key = format!("uploads/{}/{}", owner.id, id);
    env.storage
        .upload_file(&storage_key, content.to_vec())
        .await
        .unwrap();

    files::ActiveModel {
        id: Set(id),
        owner_id: Set(owner.id.clone()),
        original_name: Set(name.to_string()),
        content_type: Set("text/plain".to_string()),
        size: Set(content.len() as i64),
        storage_key: Set(storage_key),
        created_at: Set(created_at),
    }
    .insert(&env.db)
    .await
    .unwrap()
}

/// Inserts a secure link directly, bypassing the ttl checks of `issue`.
pub async fn insert_link(
    db: &DatabaseConnection,
    file: &files::Model,
    expires_in: Duration,
    is_used: bool,
) -> secure_links::Model {
    let now = Utc::now();
    secure_links::ActiveModel {
        id: Set(Uuid::new_v4().simple().to_string()),
        file_id: Set(file.id.clone()),
        created_by: Set(file.owner_id.clone()),
        created_at: Set(now),
        expires_at: Set(now + expires_in),
        is_used: Set(is_used),
        used_at: Set(if is_used { Some(now) } else { None }),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn read_all(mut reader: BlobReader) -> Vec<u8> {
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    buf
}
