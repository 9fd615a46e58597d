//! Resource controllers: generic CRUD over a [`Model`].
//!
//! [`Resource`] implements the six [`Resourcer`] actions for any model type;
//! [`Mux::resource`](crate::router::Mux::resource) wires them to routes:
//!
//! | Action    | Steps                                                     | Success |
//! |-----------|-----------------------------------------------------------|---------|
//! | `index`   | find_all                                                  | 200     |
//! | `show`    | id, new, find_by_id                                       | 200     |
//! | `store`   | new, decode body, validate, save                          | 201     |
//! | `update`  | id, new, decode body, set_id, validate, save              | 200     |
//! | `apply`   | id, new, find_by_id, decode body, validate, save          | 200     |
//! | `destroy` | id, new, set_id, delete                                   | 204     |
//!
//! The first failing step ends the action; its error is rendered through the
//! router's error map in the request's format.

mod decode;

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use crate::context::Context;
use crate::error::{Error, Sentinel};
use crate::http::{Response, StatusCode};
use crate::model::Model;

pub use decode::decode_into;

/// A resource controller and its action methods.
///
/// Implemented by [`Resource`] for every [`Model`]; implement it directly for
/// controllers that do not fit the generic flow.
pub trait Resourcer: Send + Sync + 'static {
    fn index(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn show(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn store(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn update(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn apply(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn destroy(&self, ctx: Context) -> impl Future<Output = Response> + Send;
}

/// Strategy for reading the target id off a request.
pub type IdExtractor = Arc<dyn Fn(&Context) -> Result<String, Error> + Send + Sync + 'static>;

/// Reads the path parameter `name`, failing with [`Sentinel::INVALID_ID`]
/// when it is missing or empty.
pub fn path_id(ctx: &Context, name: &str) -> Result<String, Error> {
    match ctx.param(name) {
        Some(id) if !id.is_empty() => Ok(id.to_owned()),
        _ => Err(Sentinel::INVALID_ID.into()),
    }
}

/// The generic CRUD controller.
///
/// ```rust,ignore
/// let notes = Resource::new(Note::with_store(store));
/// router.resource("/notes", "note_id", notes, &[]);
///
/// // `/me` routes take the id from the session instead of the path.
/// let me = Resource::new(User::with_store(users))
///     .with_id(|ctx: &Context| session_user_id(ctx));
/// ```
pub struct Resource<M: Model> {
    prototype: M,
    id: IdExtractor,
}

impl<M: Model> Resource<M> {
    /// A controller using `prototype` as the instance factory and reading ids
    /// from the path parameter named by [`Model::path_id`].
    pub fn new(prototype: M) -> Self {
        let name = prototype.path_id().to_owned();
        Self {
            prototype,
            id: Arc::new(move |ctx: &Context| path_id(ctx, &name)),
        }
    }

    /// Replaces the id extraction strategy.
    #[must_use]
    pub fn with_id<F>(mut self, id: F) -> Self
    where
        F: Fn(&Context) -> Result<String, Error> + Send + Sync + 'static,
    {
        self.id = Arc::new(id);
        self
    }

    async fn load(&self, ctx: &Context) -> Result<M, Error> {
        let id = (self.id)(ctx)?;
        let mut item = self.prototype.new_instance();
        item.find_by_id(&id).await?;
        Ok(item)
    }

    async fn create(&self, ctx: &Context) -> Result<M, Error> {
        let mut item = self.prototype.new_instance();
        decode_into(&mut item, ctx.request())?;
        item.validate()?;
        item.save().await?;
        Ok(item)
    }

    async fn replace(&self, ctx: &Context) -> Result<M, Error> {
        let id = (self.id)(ctx)?;
        let mut item = self.prototype.new_instance();
        decode_into(&mut item, ctx.request())?;
        item.set_id(&id)?;
        item.validate()?;
        item.save().await?;
        Ok(item)
    }

    async fn merge(&self, ctx: &Context) -> Result<M, Error> {
        let mut item = self.load(ctx).await?;
        decode_into(&mut item, ctx.request())?;
        item.validate()?;
        item.save().await?;
        Ok(item)
    }

    async fn remove(&self, ctx: &Context) -> Result<(), Error> {
        let id = (self.id)(ctx)?;
        let mut item = self.prototype.new_instance();
        item.set_id(&id)?;
        item.delete().await
    }
}

fn respond<T: Serialize>(ctx: &Context, status: StatusCode, result: Result<T, Error>) -> Response {
    match result {
        Ok(value) => ctx.write_format(status, &value),
        Err(err) => ctx.write_error(&err),
    }
}

impl<M: Model> Resourcer for Resource<M> {
    async fn index(&self, ctx: Context) -> Response {
        let items = self.prototype.find_all().await;
        respond(&ctx, StatusCode::Ok, items)
    }

    async fn show(&self, ctx: Context) -> Response {
        let item = self.load(&ctx).await;
        respond(&ctx, StatusCode::Ok, item)
    }

    async fn store(&self, ctx: Context) -> Response {
        let item = self.create(&ctx).await;
        respond(&ctx, StatusCode::Created, item)
    }

    async fn update(&self, ctx: Context) -> Response {
        let item = self.replace(&ctx).await;
        respond(&ctx, StatusCode::Ok, item)
    }

    async fn apply(&self, ctx: Context) -> Response {
        let item = self.merge(&ctx).await;
        respond(&ctx, StatusCode::Ok, item)
    }

    async fn destroy(&self, ctx: Context) -> Response {
        match self.remove(&ctx).await {
            Ok(()) => Response::new(StatusCode::NoContent),
            Err(err) => ctx.write_error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use crate::router::{Mux, Router};
    use serde::Deserialize;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    type Store = Arc<Mutex<BTreeMap<u64, Note>>>;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Note {
        #[serde(default)]
        id: u64,
        #[serde(default)]
        title: String,
        #[serde(default)]
        body: String,
        #[serde(skip)]
        store: Store,
    }

    impl Note {
        fn with_store(store: &Store) -> Self {
            Self {
                store: Arc::clone(store),
                ..Self::default()
            }
        }
    }

    impl Model for Note {
        fn new_instance(&self) -> Self {
            Self::with_store(&self.store)
        }

        fn path_id(&self) -> &str {
            "note_id"
        }

        fn set_id(&mut self, id: &str) -> Result<(), Error> {
            self.id = id.parse().map_err(|_| Sentinel::INVALID_ID)?;
            Ok(())
        }

        async fn find_all(&self) -> Result<Vec<Self>, Error> {
            Ok(self.store.lock().unwrap().values().cloned().collect())
        }

        async fn find_by_id(&mut self, id: &str) -> Result<(), Error> {
            self.set_id(id)?;
            let found = self.store.lock().unwrap().get(&self.id).cloned();
            let found = found.ok_or(Sentinel::INVALID_ID)?;
            self.assign(found);
            Ok(())
        }

        async fn find_all_by_owner<O: Model>(&self, owner: &O) -> Result<Vec<Self>, Error> {
            let mut notes = self.find_all().await?;
            for note in &mut notes {
                note.belongs_to(owner)?;
            }
            Ok(notes)
        }

        fn belongs_to<O: Model>(&mut self, _owner: &O) -> Result<(), Error> {
            Ok(())
        }

        async fn save(&mut self) -> Result<(), Error> {
            let mut notes = self.store.lock().unwrap();
            if self.id == 0 {
                self.id = notes.keys().next_back().map_or(1, |last| last + 1);
            }
            notes.insert(self.id, self.clone());
            Ok(())
        }

        async fn delete(&mut self) -> Result<(), Error> {
            match self.store.lock().unwrap().remove(&self.id) {
                Some(_) => Ok(()),
                None => Err(Sentinel::INVALID_ID.into()),
            }
        }

        fn validate(&self) -> Result<(), Error> {
            if self.title.is_empty() {
                return Err(Sentinel::INVALID_INPUT.into());
            }
            Ok(())
        }

        fn assign(&mut self, decoded: Self) {
            let store = Arc::clone(&self.store);
            *self = Self { store, ..decoded };
        }
    }

    fn router(store: &Store) -> Router {
        let mut router = Router::new();
        router.resource("/notes", "note_id", Resource::new(Note::with_store(store)), &[]);
        router
    }

    fn request(method: &str, path: &str, content_type: &str, body: &str) -> Request {
        let raw = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    fn get(path: &str) -> Request {
        request("GET", path, "application/json", "")
    }

    fn json_body(res: &Response) -> Value {
        serde_json::from_slice(res.content()).unwrap()
    }

    async fn seed(router: &Router, body: Value) {
        let res = router
            .route(request("POST", "/notes", "application/json", &body.to_string()))
            .await;
        assert_eq!(res.status(), StatusCode::Created);
    }

    #[test]
    fn resource_registers_six_endpoints() {
        let store = Store::default();
        let router = router(&store);
        let routes: Vec<String> = router
            .endpoints()
            .iter()
            .map(|e| format!("{} {}", e.method, e.path))
            .collect();
        assert_eq!(
            routes,
            vec![
                "GET /notes",
                "POST /notes",
                "GET /notes/:note_id",
                "PUT /notes/:note_id",
                "PATCH /notes/:note_id",
                "DELETE /notes/:note_id",
            ]
        );
    }

    #[tokio::test]
    async fn store_then_show_round_trip() {
        let store = Store::default();
        let router = router(&store);

        let res = router
            .route(request("POST", "/notes", "application/json", r#"{"title":"groceries","body":"milk"}"#))
            .await;
        assert_eq!(res.status(), StatusCode::Created);
        assert_eq!(json_body(&res), json!({"id": 1, "title": "groceries", "body": "milk"}));

        let res = router.route(get("/notes/1")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(json_body(&res)["title"], "groceries");

        let res = router.route(get("/notes/1.yml")).await;
        assert_eq!(res.headers().get("content-type"), Some("text/x-yaml"));
        let text = std::str::from_utf8(res.content()).unwrap();
        assert!(text.contains("title: groceries"), "{text}");
    }

    #[tokio::test]
    async fn index_lists_every_item() {
        let store = Store::default();
        let router = router(&store);
        seed(&router, json!({"title": "a"})).await;
        seed(&router, json!({"title": "b"})).await;

        let res = router.route(get("/notes.json")).await;
        let titles: Vec<Value> = json_body(&res)
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn apply_keeps_fields_update_resets_them() {
        let store = Store::default();
        let router = router(&store);
        seed(&router, json!({"title": "draft", "body": "keep me"})).await;

        let res = router
            .route(request("PATCH", "/notes/1", "application/json", r#"{"title":"final"}"#))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(json_body(&res), json!({"id": 1, "title": "final", "body": "keep me"}));

        let res = router
            .route(request("PUT", "/notes/1", "application/json", r#"{"title":"replaced"}"#))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(json_body(&res), json!({"id": 1, "title": "replaced", "body": ""}));
        assert_eq!(store.lock().unwrap()[&1].body, "");

        let shown = router.route(get("/notes/1")).await;
        assert_eq!(shown.status(), StatusCode::Ok);
        assert_eq!(json_body(&shown), json_body(&res));
    }

    #[tokio::test]
    async fn destroy_then_show_is_invalid_id() {
        let store = Store::default();
        let router = router(&store);
        seed(&router, json!({"title": "temp"})).await;

        let res = router.route(request("DELETE", "/notes/1", "application/json", "")).await;
        assert_eq!(res.status(), StatusCode::NoContent);
        assert!(res.content().is_empty());

        let res = router.route(get("/notes/1")).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert_eq!(json_body(&res), json!({"errors": ["invalid id"]}));
    }

    #[tokio::test]
    async fn store_rejects_invalid_items() {
        let store = Store::default();
        let router = router(&store);

        let res = router
            .route(request("POST", "/notes", "application/json", r#"{"body":"no title"}"#))
            .await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert_eq!(json_body(&res), json!({"errors": ["invalid input"]}));

        let res = router
            .route(request("POST", "/notes", "application/json", "{not json"))
            .await;
        assert_eq!(json_body(&res), json!({"errors": ["invalid json"]}));

        let res = router
            .route(request("POST", "/notes", "text/xml", "<note/>"))
            .await;
        assert_eq!(json_body(&res), json!({"errors": ["invalid xml"]}));

        assert!(store.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn yaml_request_bodies_are_decoded() {
        let store = Store::default();
        let router = router(&store);

        let res = router
            .route(request("POST", "/notes.yml", "application/x-yaml", "title: from yaml\nbody: hi\n"))
            .await;
        assert_eq!(res.status(), StatusCode::Created);
        assert_eq!(store.lock().unwrap()[&1].title, "from yaml");
    }

    #[tokio::test]
    async fn empty_body_is_invalid_in_its_own_format() {
        let store = Store::default();
        let router = router(&store);

        let res = router.route(request("POST", "/notes", "application/x-yaml", "")).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert_eq!(json_body(&res), json!({"errors": ["invalid yaml"]}));

        let res = router.route(request("POST", "/notes", "application/json", "")).await;
        assert_eq!(json_body(&res), json!({"errors": ["invalid json"]}));
        assert!(store.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn custom_id_extractor() {
        let store = Store::default();
        let mut router = Router::new();
        let me = Resource::new(Note::with_store(&store)).with_id(|_ctx: &Context| Ok("1".to_string()));
        router.resource("/me", "ignored", me, &[]);
        seed_direct(&store, "mine");

        let res = router.route(get("/me/anything")).await;
        assert_eq!(json_body(&res)["title"], "mine");
    }

    fn seed_direct(store: &Store, title: &str) {
        let note = Note {
            id: 1,
            title: title.to_string(),
            ..Note::default()
        };
        store.lock().unwrap().insert(1, note);
    }

    #[test]
    fn path_id_requires_non_empty_param() {
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        let ctx = Context::new(req);
        let err = path_id(&ctx, "note_id").unwrap_err();
        assert!(err.is(Sentinel::INVALID_ID));
    }
}
