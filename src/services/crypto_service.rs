//! 凭证加密服务
//!
//! 职责:
//! - 以认证加密 (XChaCha20-Poly1305) 保护存储的密码与两步验证密钥
//! - 解密历史版本以XOR方案写入的遗留密文 (仅迁移用)
//!
//! 新写入一律走AEAD路径。加密/解密失败时响亮报错,
//! 绝不静默降级为弱保护存储。

use base64::{engine::general_purpose, Engine as _};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::models::errors::CryptoError;

/// XChaCha20-Poly1305 nonce长度 (字节)
const NONCE_LEN: usize = 24;

/// 凭证加密器
///
/// 密钥由配置的密钥字符串经SHA-256派生为256位。
/// 密文格式: base64(nonce ‖ ciphertext+tag),nonce每次随机生成。
pub struct CredentialCipher {
    cipher: XChaCha20Poly1305,
}

impl CredentialCipher {
    /// 从配置的密钥字符串构造
    pub fn new(key_material: &str) -> Self {
        let digest = Sha256::digest(key_material.as_bytes());
        let key = Key::from_slice(digest.as_slice());
        Self {
            cipher: XChaCha20Poly1305::new(key),
        }
    }

    /// 加密明文
    ///
    /// 每次调用生成新的随机nonce,同一明文两次加密产生不同密文
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// 解密密文
    ///
    /// 认证标签校验失败 (密文被篡改或密钥不匹配) 返回 DecryptFailed
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let raw = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))?;

        if raw.len() <= NONCE_LEN {
            return Err(CryptoError::InvalidCiphertext(
                "密文长度不足".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::DecryptFailed)?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))
    }
}

/// 遗留XOR方案 (仅迁移兼容)
///
/// 历史版本以"明文逐字节异或循环密钥再base64"的方式存储凭证。
/// 此模块仅用于读取这些遗留密文;新写入一律走 `CredentialCipher`。
/// 与历史实现不同,格式错误在此是显式错误,不存在静默回退。
pub mod legacy {
    use base64::{engine::general_purpose, Engine as _};

    use crate::models::errors::CryptoError;

    /// 遗留方案加密 (对称,主要用于测试与密文迁移核对)
    pub fn xor_encrypt(plaintext: &str, key: &str) -> Result<String, CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::EncryptFailed);
        }

        let key_bytes = key.as_bytes();
        let mixed: Vec<u8> = plaintext
            .bytes()
            .enumerate()
            .map(|(i, b)| b ^ key_bytes[i % key_bytes.len()])
            .collect();

        Ok(general_purpose::STANDARD.encode(mixed))
    }

    /// 遗留方案解密
    pub fn xor_decrypt(ciphertext: &str, key: &str) -> Result<String, CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::DecryptFailed);
        }

        let raw = general_purpose::STANDARD
            .decode(ciphertext)
            .map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))?;

        let key_bytes = key.as_bytes();
        let plain: Vec<u8> = raw
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key_bytes[i % key_bytes.len()])
            .collect();

        String::from_utf8(plain).map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))
    }
}
