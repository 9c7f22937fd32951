use serde::{Deserialize, Serialize};

use super::User;

/// Standard `{success, data, message}` wrapper every backend reply uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One page of a remote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData<T> {
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
    pub current: u32,
    pub size: u32,
    pub total: u64,
}

pub type UserPage = PageData<User>;

/// Payload of a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginData {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_envelope() {
        let json =
            r#"{"success":true,"data":{"token":"T1","username":"alice","nickname":"Alice"}}"#;
        let env: ApiEnvelope<LoginData> =
            serde_json::from_str(json).expect("Failed to parse login envelope");
        assert!(env.success);
        let data = env.data.expect("login data missing");
        assert_eq!(data.token, "T1");
        assert_eq!(data.nickname.as_deref(), Some("Alice"));
        assert_eq!(env.message, None);
    }

    #[test]
    fn test_parse_failure_envelope_without_data() {
        let json = r#"{"success":false,"message":"bad credentials"}"#;
        let env: ApiEnvelope<LoginData> =
            serde_json::from_str(json).expect("Failed to parse failure envelope");
        assert!(!env.success);
        assert!(env.data.is_none());
        assert_eq!(env.message.as_deref(), Some("bad credentials"));
    }

    #[test]
    fn test_parse_user_page() {
        let json = r#"{
            "success": true,
            "data": {
                "records": [{"id": 1, "username": "a"}, {"id": 2, "username": "b"}],
                "current": 2,
                "size": 10,
                "total": 12
            }
        }"#;
        let env: ApiEnvelope<UserPage> =
            serde_json::from_str(json).expect("Failed to parse page envelope");
        let page = env.data.expect("page data missing");
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.current, 2);
        assert_eq!(page.size, 10);
        assert_eq!(page.total, 12);
    }

    #[test]
    fn test_missing_payload_fields_use_defaults() {
        // Neither User nor UserPage implements Default.
        let env: ApiEnvelope<User> =
            serde_json::from_str(r#"{"success":true}"#).expect("Failed to parse user envelope");
        assert!(env.data.is_none());

        let page: UserPage = serde_json::from_str(r#"{"current":1,"size":10,"total":0}"#)
            .expect("Failed to parse page without records");
        assert!(page.records.is_empty());
    }
}
