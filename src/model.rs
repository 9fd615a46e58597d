//! The data model contract resource controllers are built on.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::Error;

/// A persisted type a [`Resource`](crate::resource::Resource) can drive
/// through the full CRUD cycle.
///
/// The value handed to `Resource::new` acts as a prototype: every request
/// asks it for a fresh instance with [`new_instance`](Model::new_instance)
/// and works on that. Request bodies are decoded over an instance through
/// serde, so the serialized shape of a model is also its wire shape.
///
/// Storage failures are reported as [`Error`]. Return a [`Sentinel`] for
/// conditions clients should see with a 4xx status (a missing record is
/// usually `Sentinel::INVALID_ID`), and [`Error::other`] for the rest.
///
/// [`Sentinel`]: crate::error::Sentinel
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    /// A fresh, empty instance sharing this one's storage handles.
    fn new_instance(&self) -> Self;

    /// Name of the path parameter carrying this model's id.
    fn path_id(&self) -> &str;

    fn set_id(&mut self, id: &str) -> Result<(), Error>;

    fn find_all(&self) -> impl Future<Output = Result<Vec<Self>, Error>> + Send;

    /// Loads the record `id` into `self`.
    fn find_by_id(&mut self, id: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn find_all_by_owner<O: Model>(&self, owner: &O) -> impl Future<Output = Result<Vec<Self>, Error>> + Send;

    /// Associates `self` with `owner`.
    fn belongs_to<O: Model>(&mut self, owner: &O) -> Result<(), Error>;

    fn save(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    fn delete(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    fn validate(&self) -> Result<(), Error>;

    /// Takes over the fields of a value decoded from a request body.
    ///
    /// The default replaces `self` wholesale. Override it when the model holds
    /// state serde never sees (a connection pool, a cache handle) that must
    /// survive decoding.
    fn assign(&mut self, decoded: Self) {
        *self = decoded;
    }
}
