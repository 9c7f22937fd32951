//! Data models for the user administration console.
//!
//! This module contains:
//!
//! - `User`, `UserDraft`, `Role`: account records as read and as written
//! - `Profile`: the signed-in operator's cached identity
//! - `ApiEnvelope`, `PageData`, `LoginData`: backend wire wrappers
//! - Form types with client-side validation (`LoginForm`, `RegisterForm`, `UserForm`)

pub mod envelope;
pub mod form;
pub mod user;

pub use envelope::{ApiEnvelope, LoginData, PageData, UserPage};
pub use form::{
    is_valid_email, FieldError, LoginForm, RegisterForm, RegisterRequest, UserForm,
    ValidationErrors,
};
pub use user::{Profile, Role, User, UserDraft};
