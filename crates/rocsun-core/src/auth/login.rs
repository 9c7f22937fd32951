//! Credential exchange and self-registration.
//!
//! These run the gateway call on behalf of the presentation layer and hand a
//! validated credential to [`SessionController::login`]; the session
//! controller itself never touches the network.

use tracing::{error, info};

use super::SessionController;
use crate::api::{ApiError, UserGateway};
use crate::error::ConsoleError;
use crate::models::{LoginForm, Profile, RegisterForm};
use crate::notify::Notifier;

/// Map a login failure to the message shown to the operator.
pub fn login_failure_message(error: &ApiError) -> String {
    match error {
        ApiError::Unauthorized => "Invalid username or password".to_string(),
        ApiError::Rejected(message) => message.clone(),
        other => format!("Login failed: {}", other.user_message()),
    }
}

/// Validate the login form, exchange the credentials and start a session.
pub async fn sign_in(
    gateway: &dyn UserGateway,
    session: &mut SessionController,
    form: &LoginForm,
) -> Result<(), ConsoleError> {
    form.validate()?;

    match gateway.login(form.username.trim(), &form.password).await {
        Ok(data) => {
            let profile = Profile::new(data.username, data.nickname);
            session.login(data.token, profile);
            session.notifier().success("Login successful");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Login failed");
            session.notifier().error(login_failure_message(&e));
            Err(e.into())
        }
    }
}

/// Validate the registration form and create the account.
pub async fn register(
    gateway: &dyn UserGateway,
    notifier: &Notifier,
    form: RegisterForm,
) -> Result<(), ConsoleError> {
    let request = form.into_request()?;

    match gateway.register(&request).await {
        Ok(()) => {
            info!(username = %request.username, "Account registered");
            notifier.success("Registration successful, please log in");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Registration failed");
            notifier.error(e.user_message());
            Err(e.into())
        }
    }
}
