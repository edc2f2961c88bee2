//! Generic CRUD service over one REST resource.
//!
//! Every method returns an [`ApiResult`]; failures are also recorded on the
//! store's error channel so observers that only watch the store still see
//! them. Local state changes only after the server confirms a mutation.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

use daybook_shared::mapper::{from_api_event, ApiEvent};
use daybook_shared::{ApiResponse, CalendarEvent, Category, Entity, EntityId, PageQuery, Task};

use crate::error::{ApiError, ApiResult};
use crate::http::{ApiClient, RequestOptions};
use crate::store::{EntityStore, UpdateOutcome};

/// An entity the backend serves, and how to decode it from the wire.
pub trait Resource: Entity + Clone + Send + Sync + 'static {
    /// Shape the server sends
    type Wire: DeserializeOwned + Send;

    /// Human readable name used in errors and logs
    const NAME: &'static str;

    fn from_wire(wire: Self::Wire) -> Self;
}

impl Resource for Task {
    type Wire = Task;
    const NAME: &'static str = "Task";

    fn from_wire(wire: Task) -> Self {
        wire
    }
}

impl Resource for Category {
    type Wire = Category;
    const NAME: &'static str = "Category";

    fn from_wire(wire: Category) -> Self {
        wire
    }
}

impl Resource for CalendarEvent {
    type Wire = ApiEvent;
    const NAME: &'static str = "Event";

    fn from_wire(wire: ApiEvent) -> Self {
        from_api_event(wire)
    }
}

pub struct EntityService<T> {
    api: Arc<ApiClient>,
    path: String,
    store: Arc<EntityStore<T>>,
}

impl<T: Resource> EntityService<T> {
    pub fn new(api: Arc<ApiClient>, path: impl Into<String>) -> Self {
        Self::with_store(api, path, Arc::new(EntityStore::new()))
    }

    /// Use an existing store, e.g. one already handed to a view.
    pub fn with_store(api: Arc<ApiClient>, path: impl Into<String>, store: Arc<EntityStore<T>>) -> Self {
        Self {
            api,
            path: path.into(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<EntityStore<T>> {
        &self.store
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetch one page and replace the mirror with it.
    pub async fn get_all(&self, page: u32, limit: u32) -> ApiResult<Vec<T>> {
        let options = RequestOptions {
            query: PageQuery { page, limit }.to_pairs(),
            ..RequestOptions::default()
        };
        self.list(options).await
    }

    /// Fetch with arbitrary query options and replace the mirror.
    pub async fn list(&self, options: RequestOptions) -> ApiResult<Vec<T>> {
        self.list_filtered(options, |items| items).await
    }

    /// Fetch, keep what `filter` returns, and replace the mirror with exactly that.
    pub async fn list_filtered<F>(&self, options: RequestOptions, filter: F) -> ApiResult<Vec<T>>
    where
        F: FnOnce(Vec<T>) -> Vec<T>,
    {
        self.tracked(async {
            let response: ApiResponse<Vec<T::Wire>> = self.api.get(&self.path, options).await?;
            let meta = response.meta;
            let items: Vec<T> = response
                .into_data()
                .map_err(ApiError::Rejected)?
                .into_iter()
                .map(T::from_wire)
                .collect();
            let items = filter(items);

            tracing::debug!("Loaded {} {} records", items.len(), T::NAME);
            self.store.replace_all(items.clone());
            self.store.set_meta(meta);
            Ok(items)
        })
        .await
    }

    /// Fetch one record, optionally making it the selected one.
    pub async fn get_by_id(&self, id: &EntityId, select: bool) -> ApiResult<T> {
        self.tracked(async {
            let response: ApiResponse<T::Wire> = self
                .api
                .get(&self.item_path(id), RequestOptions::default())
                .await
                .map_err(|e| self.name_not_found(e, id))?;
            let item = T::from_wire(response.into_data().map_err(ApiError::Rejected)?);

            if select {
                self.store.select(Some(item.clone()));
            }
            Ok(item)
        })
        .await
    }

    /// Validate and post a new record, appending the server's copy.
    pub async fn create<P>(&self, payload: &P) -> ApiResult<T>
    where
        P: Serialize + Validate + Sync,
    {
        self.tracked(async {
            payload.validate()?;
            let response: ApiResponse<T::Wire> = self
                .api
                .post(&self.path, payload, RequestOptions::default())
                .await?;
            let item = T::from_wire(response.into_data().map_err(ApiError::Rejected)?);

            tracing::info!("Created {} {}", T::NAME, item.id());
            self.store.push(item.clone());
            Ok(item)
        })
        .await
    }

    /// Validate and put a patch, replacing the mirrored record.
    ///
    /// Fails with [`ApiError::Conflict`] when the server's answer is older
    /// than what the mirror already holds.
    pub async fn update<P>(&self, id: &EntityId, patch: &P) -> ApiResult<T>
    where
        P: Serialize + Validate + Sync,
    {
        self.tracked(async {
            patch.validate()?;
            let response: ApiResponse<T::Wire> = self
                .api
                .put(&self.item_path(id), patch, RequestOptions::default())
                .await
                .map_err(|e| self.name_not_found(e, id))?;
            let item = T::from_wire(response.into_data().map_err(ApiError::Rejected)?);

            match self.store.apply_update(item.clone()) {
                UpdateOutcome::Stale => Err(ApiError::Conflict(format!(
                    "{} {} was modified by a newer request",
                    T::NAME,
                    id
                ))),
                _ => {
                    tracing::info!("Updated {} {}", T::NAME, id);
                    Ok(item)
                }
            }
        })
        .await
    }

    /// Delete a record and drop it from the mirror.
    pub async fn delete(&self, id: &EntityId) -> ApiResult<()> {
        self.tracked(async {
            let response: ApiResponse<serde_json::Value> = self
                .api
                .delete(&self.item_path(id), RequestOptions::default())
                .await
                .map_err(|e| self.name_not_found(e, id))?;
            response.ensure_success().map_err(ApiError::Rejected)?;

            self.store.remove(id);
            tracing::info!("Deleted {} {}", T::NAME, id);
            Ok(())
        })
        .await
    }

    fn item_path(&self, id: &EntityId) -> String {
        format!("{}/{}", self.path, urlencoding::encode(&id.to_string()))
    }

    fn name_not_found(&self, error: ApiError, id: &EntityId) -> ApiError {
        match error {
            ApiError::NotFound(_) => ApiError::NotFound(format!("{} {}", T::NAME, id)),
            other => other,
        }
    }

    /// Run `operation` counted as in flight on the store, recording the outcome.
    async fn tracked<R, F>(&self, operation: F) -> ApiResult<R>
    where
        F: Future<Output = ApiResult<R>>,
    {
        let ticket = self.store.begin_request();
        let result = operation.await;

        let error = match &result {
            Ok(_) => None,
            Err(e) => {
                tracing::error!("{} request on {} failed: {}", T::NAME, self.path, e);
                Some(e.to_string())
            }
        };
        self.store.finish_request(ticket, error);
        result
    }
}
