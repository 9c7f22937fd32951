//! Navigation gate in front of protected views.
//!
//! The guard holds no state; callers pass in the reconciled authentication
//! flag from the session controller.

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show the requested content unchanged.
    Render(String),
    /// Send the user to `to`, remembering `from` so login can resume there.
    Redirect { to: String, from: String },
}

/// Paths reachable without a session.
pub fn is_public(path: &str) -> bool {
    matches!(path, LOGIN_PATH | REGISTER_PATH)
}

pub fn guard(is_authenticated: bool, requested_path: &str) -> GuardDecision {
    if is_authenticated || is_public(requested_path) {
        GuardDecision::Render(requested_path.to_string())
    } else {
        GuardDecision::Redirect {
            to: LOGIN_PATH.to_string(),
            from: requested_path.to_string(),
        }
    }
}

/// Where to go after a successful login.
pub fn resume_target(from: Option<&str>) -> String {
    match from {
        Some(path) if !path.is_empty() && !is_public(path) => path.to_string(),
        _ => HOME_PATH.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_redirects_with_origin() {
        assert_eq!(
            guard(false, "/users"),
            GuardDecision::Redirect {
                to: "/login".to_string(),
                from: "/users".to_string()
            }
        );
    }

    #[test]
    fn test_authenticated_renders_unchanged() {
        assert_eq!(guard(true, "/users"), GuardDecision::Render("/users".to_string()));
        assert_eq!(guard(true, "/"), GuardDecision::Render("/".to_string()));
    }

    #[test]
    fn test_public_paths_always_render() {
        assert_eq!(guard(false, "/login"), GuardDecision::Render("/login".to_string()));
        assert_eq!(guard(false, "/register"), GuardDecision::Render("/register".to_string()));
    }

    #[test]
    fn test_resume_target() {
        assert_eq!(resume_target(Some("/users")), "/users");
        assert_eq!(resume_target(Some("/login")), "/");
        assert_eq!(resume_target(Some("")), "/");
        assert_eq!(resume_target(None), "/");
    }
}
