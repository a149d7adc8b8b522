use serde::Deserialize;

use crate::models::errors::ConnectError;

/// 账号连接请求
///
/// 每次连接尝试由用户提交的表单数据构造,不可变,
/// 尝试结束后即丢弃。密码与两步验证密钥绝不以明文持久化,
/// 也绝不写入日志 (Debug输出已脱敏)。
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    /// Instagram用户名
    pub username: String,

    /// 账号密码
    pub password: String,

    /// 联系邮箱
    pub email: String,

    /// 两步验证共享密钥 (可选, base32编码)
    #[serde(default)]
    pub two_factor_secret: Option<String>,
}

impl ConnectionRequest {
    /// 校验输入字段
    ///
    /// 规则 (在任何浏览器活动之前执行):
    /// 1. 用户名长度 ≥ 3
    /// 2. 密码长度 ≥ 6
    /// 3. 邮箱必须包含 "@"
    ///
    /// 任一违规立即短路返回字段级错误,不启动浏览器。
    pub fn validate(&self) -> Result<(), ConnectError> {
        if self.username.trim().len() < 3 {
            return Err(ConnectError::invalid_input(
                "username",
                "Username must be at least 3 characters long",
            ));
        }

        if self.password.len() < 6 {
            return Err(ConnectError::invalid_input(
                "password",
                "Password must be at least 6 characters long",
            ));
        }

        if !self.email.contains('@') {
            return Err(ConnectError::invalid_input(
                "email",
                "Email address must contain '@'",
            ));
        }

        Ok(())
    }

    /// 是否提供了两步验证密钥
    ///
    /// 空字符串视同未提供
    pub fn has_two_factor_secret(&self) -> bool {
        self.two_factor_secret
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}

/// 脱敏的Debug输出
///
/// 密码与两步验证密钥不出现在任何日志中
impl std::fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field(
                "two_factor_secret",
                &self.two_factor_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> ConnectionRequest {
        ConnectionRequest {
            username: "creator_account".to_string(),
            password: "validpass123".to_string(),
            email: "a@b.com".to_string(),
            two_factor_secret: None,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_short_username_rejected() {
        let mut req = valid_request();
        req.username = "ab".to_string();
        let err = req.validate().unwrap_err();
        match err {
            ConnectError::InvalidInput { field, .. } => assert_eq!(field, "username"),
            other => panic!("期望 InvalidInput, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_short_password_rejected() {
        let mut req = valid_request();
        req.password = "12345".to_string();
        let err = req.validate().unwrap_err();
        match err {
            ConnectError::InvalidInput { field, .. } => assert_eq!(field, "password"),
            other => panic!("期望 InvalidInput, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_email_without_at_rejected() {
        let mut req = valid_request();
        req.email = "not-an-email".to_string();
        let err = req.validate().unwrap_err();
        match err {
            ConnectError::InvalidInput { field, .. } => assert_eq!(field, "email"),
            other => panic!("期望 InvalidInput, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_empty_two_factor_secret_counts_as_missing() {
        let mut req = valid_request();
        req.two_factor_secret = Some("   ".to_string());
        assert!(!req.has_two_factor_secret());

        req.two_factor_secret = Some("JBSWY3DPEHPK3PXP".to_string());
        assert!(req.has_two_factor_secret());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut req = valid_request();
        req.two_factor_secret = Some("JBSWY3DPEHPK3PXP".to_string());
        let output = format!("{:?}", req);
        assert!(!output.contains("validpass123"));
        assert!(!output.contains("JBSWY3DPEHPK3PXP"));
        assert!(output.contains("creator_account"));
    }
}
