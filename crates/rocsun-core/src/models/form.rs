//! Client-side form constraints.
//!
//! A form that fails validation never reaches the gateway; the caller gets a
//! [`ValidationErrors`] with one message per offending field.

use serde::Serialize;

use super::{Role, UserDraft};

/// Minimum username length accepted by registration.
const MIN_USERNAME_LENGTH: usize = 3;

/// Minimum password length accepted by registration.
const MIN_PASSWORD_LENGTH: usize = 6;

/// A single field-level problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field errors found in one form submission, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. Only the first error per field is kept.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        if self.for_field(field).is_none() {
            self.errors.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Check that a string has the shape of an email address.
pub fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Trimmed value, or `None` for blank input.
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn check_required(errors: &mut ValidationErrors, field: &'static str, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.add(field, format!("Please enter {}", label));
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    check_required(errors, "email", email, "an email address");
    if !email.trim().is_empty() && !is_valid_email(email.trim()) {
        errors.add("email", "Please enter a valid email address");
    }
}

fn check_confirmation(errors: &mut ValidationErrors, password: &str, confirm: &str) {
    if confirm.is_empty() {
        errors.add("confirm_password", "Please confirm the password");
    } else if password != confirm {
        errors.add("confirm_password", "The two passwords do not match");
    }
}

// ============================================================================
// Login
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "username", &self.username, "a username");
        if self.password.is_empty() {
            errors.add("password", "Please enter a password");
        }
        errors.into_result()
    }
}

// ============================================================================
// Registration
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub email: String,
    pub phone: Option<String>,
    pub nickname: Option<String>,
}

/// Body sent to `/user/create` for self-registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_required(&mut errors, "username", &self.username, "a username");
        if self.username.trim().chars().count() < MIN_USERNAME_LENGTH {
            errors.add(
                "username",
                format!("Username must be at least {} characters", MIN_USERNAME_LENGTH),
            );
        }

        check_email(&mut errors, &self.email);

        if self.password.is_empty() {
            errors.add("password", "Please enter a password");
        } else if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
            );
        }

        check_confirmation(&mut errors, &self.password, &self.confirm_password);
        errors.into_result()
    }

    /// Validate and build the outgoing request. The confirmation is dropped.
    pub fn into_request(self) -> Result<RegisterRequest, ValidationErrors> {
        self.validate()?;
        Ok(RegisterRequest {
            username: self.username.trim().to_string(),
            password: self.password,
            email: self.email.trim().to_string(),
            phone: non_blank(&self.phone),
            nickname: non_blank(&self.nickname),
        })
    }
}

// ============================================================================
// User edit / create
// ============================================================================

/// Edit dialog contents. `id == None` means a new user.
#[derive(Debug, Clone)]
pub struct UserForm {
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub status: bool,
    pub role: Role,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

impl Default for UserForm {
    fn default() -> Self {
        Self {
            id: None,
            username: String::new(),
            email: String::new(),
            phone: None,
            nickname: None,
            avatar: None,
            status: true,
            role: Role::User,
            password: None,
            confirm_password: None,
        }
    }
}

impl From<&UserDraft> for UserForm {
    fn from(draft: &UserDraft) -> Self {
        Self {
            id: draft.id,
            username: draft.username.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
            nickname: draft.nickname.clone(),
            avatar: draft.avatar.clone(),
            status: draft.status,
            role: draft.role,
            password: None,
            confirm_password: None,
        }
    }
}

impl UserForm {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_new() {
            let password = self.password.as_deref().unwrap_or_default();
            let confirm = self.confirm_password.as_deref().unwrap_or_default();
            if password.is_empty() {
                errors.add("password", "Please enter a password");
            }
            check_confirmation(&mut errors, password, confirm);
        }

        check_required(&mut errors, "username", &self.username, "a username");
        check_email(&mut errors, &self.email);

        if self.is_new() && non_blank(&self.phone).is_none() {
            errors.add("phone", "Please enter a phone number");
        }

        errors.into_result()
    }

    /// Validate and build the record `save` sends. Existing users never carry
    /// a password.
    pub fn into_draft(self) -> Result<UserDraft, ValidationErrors> {
        self.validate()?;
        let password = if self.is_new() { self.password } else { None };
        Ok(UserDraft {
            id: self.id,
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: non_blank(&self.phone),
            nickname: non_blank(&self.nickname),
            avatar: non_blank(&self.avatar),
            status: self.status,
            role: self.role,
            password,
        })
    }
}
