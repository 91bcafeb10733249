//! 任务Token校验

use sha2::{Digest, Sha256};

/// Worker配置的校验方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCheck {
    /// 明文比较
    Plain(String),

    /// 比较SHA-256摘要（小写十六进制）
    Sha256(String),
}

impl TokenCheck {
    /// 以十六进制摘要构造，统一转成小写
    pub fn sha256(digest_hex: &str) -> Self {
        Self::Sha256(digest_hex.trim().to_ascii_lowercase())
    }

    /// 任务里带的token是否有效
    pub fn validate(&self, presented: &str) -> bool {
        match self {
            Self::Plain(secret) => !secret.is_empty() && presented == secret,
            Self::Sha256(digest) => hash_token(presented) == *digest,
        }
    }
}

/// 计算token的SHA-256摘要
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
