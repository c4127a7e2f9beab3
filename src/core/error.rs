use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("参数验证失败: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("交易所拒绝请求: {code} - {message}")]
    ExchangeRejected { code: i64, message: String },

    #[error("网络请求错误: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("YAML配置错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("其他错误: {0}")]
    Other(String),
}

/// 错误类别，调用方据此分支处理而不是解析错误文本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 参数在发出网络请求前被拒绝
    Validation,
    /// 交易所主动拒绝了请求（携带机器可读的错误码）
    ExchangeRejected,
    /// 网络、序列化、配置等其他故障
    Transport,
}

impl ExecError {
    /// 构造验证错误
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ExecError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 获取错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Validation { .. } => ErrorKind::Validation,
            ExecError::ExchangeRejected { .. } => ErrorKind::ExchangeRejected,
            _ => ErrorKind::Transport,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// 交易所错误码（仅ExchangeRejected有）
    pub fn exchange_code(&self) -> Option<i64> {
        match self {
            ExecError::ExchangeRejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let e = ExecError::validation("symbol", "交易对为空");
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert!(e.is_validation());

        let e = ExecError::ExchangeRejected {
            code: -1013,
            message: "Filter failure: MIN_NOTIONAL".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::ExchangeRejected);
        assert_eq!(e.exchange_code(), Some(-1013));

        let e = ExecError::Config("缺少API密钥".to_string());
        assert_eq!(e.kind(), ErrorKind::Transport);
        assert_eq!(e.exchange_code(), None);
    }

    #[test]
    fn test_validation_message_contains_field_and_reason() {
        let e = ExecError::validation("quantity", "数量必须大于0");
        let text = e.to_string();
        assert!(text.contains("quantity"));
        assert!(text.contains("数量必须大于0"));
    }
}
