//! 数据模型线格式测试
//!
//! 验证HTTP边界上的JSON形态: 请求反序列化、响应序列化、
//! 错误分类的标签格式与稳定消息。

use insta_connect::models::{
    AccountData, AccountStatus, ConnectError, ConnectionRequest, ConnectionResult,
};
use uuid::Uuid;

#[test]
fn test_request_deserializes_camel_case() {
    let json = r#"{
        "username": "creator_account",
        "password": "validpass123",
        "email": "a@b.com",
        "twoFactorSecret": "JBSWY3DPEHPK3PXP"
    }"#;

    let request: ConnectionRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.username, "creator_account");
    assert_eq!(request.two_factor_secret.as_deref(), Some("JBSWY3DPEHPK3PXP"));
    assert!(request.validate().is_ok());
}

#[test]
fn test_request_two_factor_secret_is_optional() {
    let json = r#"{
        "username": "creator_account",
        "password": "validpass123",
        "email": "a@b.com"
    }"#;

    let request: ConnectionRequest = serde_json::from_str(json).unwrap();
    assert!(request.two_factor_secret.is_none());
    assert!(!request.has_two_factor_secret());
}

#[test]
fn test_validation_matrix() {
    let base = ConnectionRequest {
        username: "creator_account".to_string(),
        password: "validpass123".to_string(),
        email: "a@b.com".to_string(),
        two_factor_secret: None,
    };

    let cases: Vec<(ConnectionRequest, Option<&str>)> = vec![
        (base.clone(), None),
        (
            ConnectionRequest {
                username: "ab".to_string(),
                ..base.clone()
            },
            Some("username"),
        ),
        (
            ConnectionRequest {
                password: "12345".to_string(),
                ..base.clone()
            },
            Some("password"),
        ),
        (
            ConnectionRequest {
                email: "no-at".to_string(),
                ..base.clone()
            },
            Some("email"),
        ),
    ];

    for (request, expected_field) in cases {
        match (request.validate(), expected_field) {
            (Ok(()), None) => {}
            (Err(ConnectError::InvalidInput { field, .. }), Some(expected)) => {
                assert_eq!(field, expected);
            }
            (outcome, expected) => {
                panic!("校验结果 {:?} 与期望字段 {:?} 不符", outcome, expected)
            }
        }
    }
}

#[test]
fn test_success_response_shape() {
    let result = ConnectionResult::connected(AccountData {
        id: Uuid::nil(),
        username: "creator_account".to_string(),
        status: AccountStatus::Active,
        followers: 1234,
        following: 321,
        posts: 88,
        profile_picture: "https://cdn.example.com/avatar.jpg".to_string(),
        bio: "photographer".to_string(),
        is_verified: true,
    });

    let json: serde_json::Value = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(
        json["message"],
        "Instagram account connected successfully"
    );
    let account = &json["accountData"];
    assert_eq!(account["username"], "creator_account");
    assert_eq!(account["status"], "active");
    assert_eq!(account["followers"], 1234);
    assert_eq!(account["profilePicture"], "https://cdn.example.com/avatar.jpg");
    assert_eq!(account["isVerified"], true);
}

#[test]
fn test_failure_response_omits_account_data() {
    let result = ConnectionResult::failure("Invalid username or password");
    let json: serde_json::Value = serde_json::to_value(&result).unwrap();

    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Invalid username or password");
    assert!(json.get("accountData").is_none());
}

#[test]
fn test_error_messages_are_stable() {
    // 这些消息是对外契约,客户端按文本匹配提示用户
    let cases: Vec<(ConnectError, &str)> = vec![
        (ConnectError::LoginRejected, "Invalid username or password"),
        (
            ConnectError::TwoFactorMissing,
            "Two-factor authentication is required but no two-factor secret was provided",
        ),
        (
            ConnectError::HomeVerificationFailed,
            "Unable to verify successful authentication with Instagram",
        ),
        (
            ConnectError::NetworkTimeout,
            "Network timeout while communicating with Instagram",
        ),
        (
            ConnectError::NetworkChanged,
            "Network connection changed during the connection attempt",
        ),
        (
            ConnectError::DuplicateAccount,
            "This Instagram account is already connected",
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn test_error_serializes_tagged() {
    let json = serde_json::to_value(ConnectError::invalid_input(
        "username",
        "Username must be at least 3 characters long",
    ))
    .unwrap();

    assert_eq!(json["error"], "InvalidInput");
    assert_eq!(json["details"]["field"], "username");
}
