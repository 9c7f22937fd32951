//! The Remote Resource Gateway seam.
//!
//! Controllers only ever talk to the backend through [`UserGateway`], so tests
//! can substitute an in-memory implementation for [`super::ApiClient`].

use async_trait::async_trait;

use super::ApiError;
use crate::models::{LoginData, RegisterRequest, User, UserDraft, UserPage};
use crate::query::PageRequest;

#[async_trait]
pub trait UserGateway: Send + Sync {
    /// `POST /user/login` - exchange credentials for a token.
    async fn login(&self, username: &str, password: &str) -> Result<LoginData, ApiError>;

    /// `POST /user/create` - self-registration.
    async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError>;

    /// `POST /user/page` - one page of users matching the filters.
    async fn page(&self, request: &PageRequest) -> Result<UserPage, ApiError>;

    /// `GET /user/{id}` - a single user record.
    async fn fetch_user(&self, id: i64) -> Result<User, ApiError>;

    /// `POST /user/create` - administrative create.
    async fn create_user(&self, draft: &UserDraft) -> Result<(), ApiError>;

    /// `POST /user/update` - full record including `id`.
    async fn update_user(&self, draft: &UserDraft) -> Result<(), ApiError>;

    /// `POST /user/logicDelete/{id}` - soft delete.
    async fn logic_delete(&self, id: i64) -> Result<(), ApiError>;
}
