use crate::core::error::ExecError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 交易默认参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "TradingConfig::default_symbol")]
    pub default_symbol: String,
    #[serde(default = "TradingConfig::default_leverage")]
    pub default_leverage: u32,
    #[serde(default = "TradingConfig::default_max_leverage")]
    pub max_leverage: u32,
}

impl TradingConfig {
    fn default_symbol() -> String {
        "BTCUSDT".to_string()
    }
    fn default_leverage() -> u32 {
        10
    }
    fn default_max_leverage() -> u32 {
        20
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            default_symbol: Self::default_symbol(),
            default_leverage: Self::default_leverage(),
            max_leverage: Self::default_max_leverage(),
        }
    }
}

/// 账户级风险限制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "RiskConfig::default_max_position_size")]
    pub max_position_size_usdt: f64,
    #[serde(default = "RiskConfig::default_max_open_orders")]
    pub max_open_orders: usize,
}

impl RiskConfig {
    fn default_max_position_size() -> f64 {
        1000.0
    }
    fn default_max_open_orders() -> usize {
        10
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size_usdt: Self::default_max_position_size(),
            max_open_orders: Self::default_max_open_orders(),
        }
    }
}

/// TWAP执行默认参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwapConfig {
    #[serde(default = "TwapConfig::default_chunks_value")]
    pub default_chunks: u32,
    #[serde(default = "TwapConfig::default_interval_value")]
    pub default_interval_seconds: u64,
}

impl TwapConfig {
    fn default_chunks_value() -> u32 {
        5
    }
    fn default_interval_value() -> u64 {
        60
    }
}

impl Default for TwapConfig {
    fn default() -> Self {
        Self {
            default_chunks: Self::default_chunks_value(),
            default_interval_seconds: Self::default_interval_value(),
        }
    }
}

/// 网格执行默认参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "GridConfig::default_levels_value")]
    pub default_levels: u32,
    #[serde(default = "GridConfig::default_min_spacing")]
    pub min_spacing_percent: f64,
    #[serde(default = "GridConfig::default_max_spacing")]
    pub max_spacing_percent: f64,
}

impl GridConfig {
    fn default_levels_value() -> u32 {
        10
    }
    fn default_min_spacing() -> f64 {
        0.5
    }
    fn default_max_spacing() -> f64 {
        5.0
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_levels: Self::default_levels_value(),
            min_spacing_percent: Self::default_min_spacing(),
            max_spacing_percent: Self::default_max_spacing(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub twap: TwapConfig,
    #[serde(default)]
    pub grid: GridConfig,
}

/// 订单参数校验边界
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "ValidationConfig::default_min_order_size")]
    pub min_order_size_usdt: f64,
    #[serde(default = "ValidationConfig::default_max_order_size")]
    pub max_order_size_usdt: f64,
    #[serde(default = "ValidationConfig::default_min_price")]
    pub min_price: f64,
    #[serde(default = "ValidationConfig::default_max_price")]
    pub max_price: f64,
    #[serde(default = "ValidationConfig::default_price_precision")]
    pub price_precision: u32,
    #[serde(default = "ValidationConfig::default_quantity_precision")]
    pub quantity_precision: u32,
    #[serde(default = "ValidationConfig::default_quote_asset")]
    pub quote_asset: String,
}

impl ValidationConfig {
    fn default_min_order_size() -> f64 {
        5.0
    }
    fn default_max_order_size() -> f64 {
        100_000.0
    }
    fn default_min_price() -> f64 {
        0.01
    }
    fn default_max_price() -> f64 {
        1_000_000.0
    }
    fn default_price_precision() -> u32 {
        2
    }
    fn default_quantity_precision() -> u32 {
        3
    }
    fn default_quote_asset() -> String {
        "USDT".to_string()
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_order_size_usdt: Self::default_min_order_size(),
            max_order_size_usdt: Self::default_max_order_size(),
            min_price: Self::default_min_price(),
            max_price: Self::default_max_price(),
            price_precision: Self::default_price_precision(),
            quantity_precision: Self::default_quantity_precision(),
            quote_asset: Self::default_quote_asset(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_level")]
    pub level: String,
    #[serde(default = "LogConfig::default_dir")]
    pub dir: String,
    #[serde(default = "LogConfig::default_max_file_size")]
    pub max_file_size_mb: u64,
    #[serde(default = "LogConfig::default_console")]
    pub console_output: bool,
}

impl LogConfig {
    fn default_level() -> String {
        "INFO".to_string()
    }
    fn default_dir() -> String {
        "logs".to_string()
    }
    fn default_max_file_size() -> u64 {
        10
    }
    fn default_console() -> bool {
        true
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            dir: Self::default_dir(),
            max_file_size_mb: Self::default_max_file_size(),
            console_output: Self::default_console(),
        }
    }
}

/// 应用配置，YAML各节均可省略并回退到默认值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default, rename = "risk_management")]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    /// 从YAML文件加载配置
    pub fn from_file(path: &str) -> Result<Self, ExecError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ExecError::Config(format!("读取配置文件{}失败: {}", path, e)))?;

        let config: AppConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// 加载配置文件，不存在时回退到内置默认值
    pub fn load_or_default(path: &str) -> Result<Self, ExecError> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            log::debug!("配置文件{}不存在，使用默认配置", path);
            Ok(Self::default())
        }
    }
}

/// 交易所连接配置
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub testnet: bool,
    pub base_url: String,
    pub recv_window_ms: u64,
}

impl ExchangeConfig {
    pub fn new(testnet: bool) -> Self {
        let base_url = if testnet {
            "https://testnet.binancefuture.com".to_string()
        } else {
            "https://fapi.binance.com".to_string()
        };

        Self {
            testnet,
            base_url,
            recv_window_ms: 5000,
        }
    }

    /// 按USE_TESTNET环境变量选择正式网或测试网，变量缺省时使用测试网
    pub fn from_env() -> Self {
        let testnet = std::env::var("USE_TESTNET")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);
        Self::new(testnet)
    }
}

/// API密钥配置
#[derive(Debug, Clone)]
pub struct ApiKeys {
    pub api_key: String,
    pub api_secret: String,
}

impl ApiKeys {
    /// 从环境变量加载API密钥
    pub fn from_env() -> Result<Self, ExecError> {
        dotenv::dotenv().ok(); // 加载.env文件，忽略错误

        let api_key = std::env::var("BINANCE_API_KEY")
            .map_err(|_| ExecError::Config("未找到BINANCE_API_KEY环境变量".to_string()))?;

        // 兼容两种密钥变量名
        let api_secret = std::env::var("BINANCE_API_SECRET")
            .or_else(|_| std::env::var("BINANCE_SECRET_KEY"))
            .map_err(|_| {
                ExecError::Config("未找到BINANCE_API_SECRET或BINANCE_SECRET_KEY环境变量".to_string())
            })?;

        Ok(ApiKeys {
            api_key,
            api_secret,
        })
    }
}
