//! In-memory notes API.
//!
//! ```text
//! cargo run --example notes [config.toml] [environment]
//!
//! curl -X POST localhost:8080/api/notes -d '{"title":"milk"}'
//! curl localhost:8080/api/notes/1.yml
//! curl -X PATCH localhost:8080/api/notes/1 -d '{"done":true}'
//! curl localhost:8080/docs.xml
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use restkit::middleware::{LoggerMiddleware, from_middleware};
use restkit::security::KeysMiddleware;
use restkit::{Config, Context, Error, Model, Mux, Resource, Router, Sentinel, Server};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

type Store = Arc<RwLock<BTreeMap<u64, Note>>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Note {
    id: u64,
    title: String,
    done: bool,
    #[serde(skip)]
    store: Store,
}

impl Model for Note {
    fn new_instance(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ..Self::default()
        }
    }

    fn path_id(&self) -> &str {
        "note_id"
    }

    fn set_id(&mut self, id: &str) -> Result<(), Error> {
        self.id = id.parse().map_err(|_| Sentinel::INVALID_ID)?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Self>, Error> {
        Ok(self.store.read().await.values().cloned().collect())
    }

    async fn find_by_id(&mut self, id: &str) -> Result<(), Error> {
        self.set_id(id)?;
        let found = self.store.read().await.get(&self.id).cloned();
        self.assign(found.ok_or(Sentinel::INVALID_ID)?);
        Ok(())
    }

    async fn find_all_by_owner<O: Model>(&self, _owner: &O) -> Result<Vec<Self>, Error> {
        self.find_all().await
    }

    fn belongs_to<O: Model>(&mut self, _owner: &O) -> Result<(), Error> {
        Ok(())
    }

    async fn save(&mut self) -> Result<(), Error> {
        let mut notes = self.store.write().await;
        if self.id == 0 {
            self.id = notes.keys().next_back().map_or(1, |last| last + 1);
        }
        notes.insert(self.id, self.clone());
        Ok(())
    }

    async fn delete(&mut self) -> Result<(), Error> {
        self.store
            .write()
            .await
            .remove(&self.id)
            .map(|_| ())
            .ok_or_else(|| Sentinel::INVALID_ID.into())
    }

    fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Sentinel::INVALID_INPUT.into());
        }
        Ok(())
    }

    fn assign(&mut self, decoded: Self) {
        let store = Arc::clone(&self.store);
        *self = Self { store, ..decoded };
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::load(path, args.next().as_deref())?,
        None => Config::default(),
    };

    let mut router = Router::new();
    router.set_pretty(config.pretty);
    router.middleware(from_middleware(Arc::new(LoggerMiddleware)));

    {
        let mut api = router.subrouter("/api");
        if !config.keys.is_empty() {
            KeysMiddleware::new(config.keys.clone()).install(&mut api);
        }
        api.resource("/notes", "note_id", Resource::new(Note::default()), &[]);
    }

    if let Err(err) = router.static_files("/public", &config.static_dir) {
        tracing::warn!(error = %err, "static files disabled");
    }

    let endpoints = Arc::new(router.endpoints().to_vec());
    router.get(
        "/docs",
        move |ctx: Context| {
            let endpoints = Arc::clone(&endpoints);
            async move { ctx.ok(&*endpoints) }
        },
        &[],
    );

    let server = Server::bind(config.addr()).await?;
    server.serve(router).await?;
    Ok(())
}
