use std::ops::Deref;
use std::sync::Arc;

use daybook_shared::api::CategoryPatch;
use daybook_shared::{Category, EntityId};

use crate::entity::EntityService;
use crate::error::ApiResult;
use crate::http::ApiClient;

pub const CATEGORIES_PATH: &str = "/api/categories";

/// Colour for anything without a category
pub const DEFAULT_COLOR: &str = "#6b7280";

pub struct CategoryService {
    entities: EntityService<Category>,
}

impl CategoryService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            entities: EntityService::new(api, CATEGORIES_PATH),
        }
    }

    pub async fn recolor(&self, id: &EntityId, color: &str) -> ApiResult<Category> {
        let patch = CategoryPatch {
            color: Some(color.to_string()),
            ..Default::default()
        };
        self.update(id, &patch).await
    }

    /// Case-insensitive lookup in the mirror
    pub fn by_name(&self, name: &str) -> Option<Category> {
        self.store()
            .items()
            .into_iter()
            .find(|category| category.name.eq_ignore_ascii_case(name))
    }

    pub fn color_for(&self, id: Option<&EntityId>) -> String {
        id.and_then(|id| self.store().find(id))
            .map(|category| category.color)
            .unwrap_or_else(|| DEFAULT_COLOR.to_string())
    }
}

impl Deref for CategoryService {
    type Target = EntityService<Category>;

    fn deref(&self) -> &Self::Target {
        &self.entities
    }
}
