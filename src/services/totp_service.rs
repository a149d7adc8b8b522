//! TOTP两步验证服务
//!
//! 职责: 由共享密钥与当前时间派生6位验证码。
//!
//! 标准 RFC 6238 实现: HMAC-SHA1作用于8字节大端时间计数器
//! (30秒步长),动态截断,模10^6,零填充到6位。
//! 与真实验证器密钥 (Google Authenticator等) 互操作。

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::models::errors::TotpError;

type HmacSha1 = Hmac<Sha1>;

/// 时间步长 (秒)
const TIME_STEP_SECONDS: u64 = 30;

/// 验证码位数
const DIGITS: u32 = 6;

/// TOTP生成器
pub struct TotpService;

impl TotpService {
    /// 基于当前时间生成验证码
    pub fn generate(secret: &str) -> Result<String, TotpError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Self::generate_at(secret, now)
    }

    /// 基于指定时间戳生成验证码
    ///
    /// 单独暴露以便确定性测试 (RFC 6238 附录B参考向量)
    pub fn generate_at(secret: &str, epoch_seconds: u64) -> Result<String, TotpError> {
        let key = Self::decode_secret(secret)?;
        let counter = epoch_seconds / TIME_STEP_SECONDS;

        let mut mac = HmacSha1::new_from_slice(&key)
            .map_err(|e| TotpError::InvalidSecret(e.to_string()))?;
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // 动态截断 (RFC 4226 §5.3)
        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = ((digest[offset] & 0x7f) as u32) << 24
            | (digest[offset + 1] as u32) << 16
            | (digest[offset + 2] as u32) << 8
            | (digest[offset + 3] as u32);

        let code = binary % 10u32.pow(DIGITS);
        Ok(format!("{:0width$}", code, width = DIGITS as usize))
    }

    /// 解码base32共享密钥
    ///
    /// 容忍验证器应用常见的展示格式:
    /// 空格/连字符分组、小写字母、尾部填充符
    fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
        let normalized: String = secret
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();
        let trimmed = normalized.trim_end_matches('=');

        if trimmed.is_empty() {
            return Err(TotpError::InvalidSecret("密钥为空".to_string()));
        }

        BASE32_NOPAD
            .decode(trimmed.as_bytes())
            .map_err(|e| TotpError::InvalidSecret(e.to_string()))
    }
}
