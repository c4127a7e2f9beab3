use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Binance请求签名辅助工具
pub struct SignatureHelper;

impl SignatureHelper {
    /// Binance 签名: HMAC-SHA256(query_string)，十六进制输出
    pub fn binance_signature(secret: &str, query_string: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC 支持任意长度密钥");
        mac.update(query_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// URL 编码并保持键排序（签名依赖参数顺序稳定）
    pub fn build_query_string(params: &HashMap<String, String>) -> String {
        let mut pairs: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        pairs.sort();
        pairs.join("&")
    }
}
