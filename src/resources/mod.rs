//! CRUD passthrough stores. Each store keeps a local copy of the collection in
//! step with what the server acknowledged.

mod locations;

pub use locations::{Location, LocationStore};

use crate::{
    api::{ApiClient, RequestOptions},
    error::{Error, Result},
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Display};
use tracing::debug;

/// An entity served under `<COLLECTION>` and `<COLLECTION>/<id>`.
pub trait Resource: Serialize + DeserializeOwned + Clone + Debug + Send + Sync {
    type Id: Display + PartialEq + Clone + Send + Sync;

    const COLLECTION: &'static str;

    /// `None` until the server has assigned one.
    fn id(&self) -> Option<Self::Id>;
}

#[derive(Clone, Debug)]
pub struct ResourceStore<T: Resource> {
    api: ApiClient,
    items: Vec<T>,
}

impl<T: Resource> ResourceStore<T> {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self {
            api,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    fn item_path(id: &T::Id) -> String {
        format!("{}/{}", T::COLLECTION, id)
    }

    /// Replaces the local list with the server's.
    ///
    /// # Errors
    /// Returns the request error; the local list is left as it was.
    pub async fn fetch_all(&mut self) -> Result<&[T]> {
        let items: Vec<T> = self
            .api
            .get(T::COLLECTION, &RequestOptions::default())
            .await?;
        debug!("fetched {} {} items", items.len(), T::COLLECTION);
        self.items = items;
        Ok(&self.items)
    }

    /// Loads a single item without touching the local list.
    ///
    /// # Errors
    /// Returns the request error.
    pub async fn get(&self, id: &T::Id) -> Result<T> {
        self.api
            .get(&Self::item_path(id), &RequestOptions::default())
            .await
    }

    /// # Errors
    /// Returns the request error.
    pub async fn create(&mut self, item: &T) -> Result<T> {
        let created: T = self
            .api
            .post(T::COLLECTION, item, &RequestOptions::default())
            .await?;
        self.items.push(created.clone());
        Ok(created)
    }

    /// Sends the full item. The local copy becomes the server's answer when it
    /// returns the item, otherwise what was sent.
    ///
    /// # Errors
    /// `Validation` for an item without an id, otherwise the request error.
    pub async fn update(&mut self, item: &T) -> Result<T> {
        let id = item
            .id()
            .ok_or_else(|| Error::Validation(format!("{} item has no id", T::COLLECTION)))?;

        let response: Value = self
            .api
            .put(&Self::item_path(&id), item, &RequestOptions::default())
            .await?;
        let updated = serde_json::from_value::<T>(response).unwrap_or_else(|_| item.clone());

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|existing| existing.id().as_ref() == Some(&id))
        {
            *existing = updated.clone();
        }
        Ok(updated)
    }

    /// # Errors
    /// Returns the request error; the item stays in the local list.
    pub async fn delete(&mut self, id: &T::Id) -> Result<()> {
        let _: Value = self
            .api
            .delete(&Self::item_path(id), &RequestOptions::default())
            .await?;
        self.items.retain(|item| item.id().as_ref() != Some(id));
        Ok(())
    }
}
