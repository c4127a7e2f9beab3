use chrono::Local;
use log::Level;
/// 执行日志模块
/// 日志上下文在引擎构造时创建并显式传入各组件，不使用全局状态
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::core::config::LogConfig;
use crate::core::error::ExecError;

/// 订单生命周期记录统一格式
/// [ACTION] TYPE | SYMBOL | Qty: q [@ price] [| key=value ...]
pub fn format_order_record(
    action: &str,
    order_type: &str,
    symbol: &str,
    quantity: f64,
    price: Option<f64>,
    details: &[(&str, String)],
) -> String {
    let mut record = format!("[{}] {} | {} | Qty: {}", action, order_type, symbol, quantity);
    if let Some(price) = price {
        record.push_str(&format!(" @ {}", price));
    }
    for (key, value) in details {
        record.push_str(&format!(" | {}={}", key, value));
    }
    record
}

/// 执行日志上下文
/// 克隆共享同一文件目标；同时转发到log门面供控制台输出
#[derive(Clone)]
pub struct ExecLogger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    name: String,
    dir: String,
    file: Mutex<Option<fs::File>>,
    max_size: u64,
    current_size: Mutex<u64>,
}

impl ExecLogger {
    /// 创建日志上下文，日志文件为 {dir}/{name}_{YYYYMMDD}.log
    pub fn new(name: &str, config: &LogConfig) -> Result<Self, ExecError> {
        if !Path::new(&config.dir).exists() {
            fs::create_dir_all(&config.dir)?;
        }

        let date = Local::now().format("%Y%m%d");
        let log_file = format!("{}/{}_{}.log", config.dir, name, date);

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            inner: Arc::new(LoggerInner {
                name: name.to_string(),
                dir: config.dir.clone(),
                file: Mutex::new(Some(file)),
                max_size: config.max_file_size_mb * 1024 * 1024,
                current_size: Mutex::new(current_size),
            }),
        })
    }

    /// 写入日志，超出大小上限时轮转到新文件
    pub fn log(&self, level: Level, message: &str) {
        log::log!(target: "rustexec", level, "{}", message);

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let formatted = format!(
            "[{}] [{}] [{}] {}\n",
            timestamp, self.inner.name, level, message
        );

        let mut file_guard = self.inner.file.lock().expect("Lock poisoned");
        let mut size_guard = self.inner.current_size.lock().expect("Lock poisoned");

        if *size_guard + formatted.len() as u64 > self.inner.max_size {
            *file_guard = None;

            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            let rotated = format!(
                "{}/{}_{}_rotated.log",
                self.inner.dir, self.inner.name, timestamp
            );

            if let Ok(new_file) = fs::OpenOptions::new().create(true).append(true).open(&rotated)
            {
                *file_guard = Some(new_file);
                *size_guard = 0;
            }
        }

        if let Some(ref mut file) = *file_guard {
            if file.write_all(formatted.as_bytes()).is_ok() {
                *size_guard += formatted.len() as u64;
                let _ = file.flush();
            }
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    /// 记录订单生命周期事件
    pub fn log_order(
        &self,
        action: &str,
        order_type: &str,
        symbol: &str,
        quantity: f64,
        price: Option<f64>,
        details: &[(&str, String)],
    ) {
        let record = format_order_record(action, order_type, symbol, quantity, price, details);
        self.log(Level::Info, &record);
    }

    /// 记录带上下文标签的错误及其因果链
    pub fn log_error_trace(&self, context: &str, error: &ExecError) {
        self.log(Level::Error, &format!("{} 失败: {}", context, error));

        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            self.log(Level::Error, &format!("  原因: {}", cause));
            source = cause.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_record_format() {
        let record = format_order_record("PLACING", "MARKET", "BTCUSDT", 0.001, None, &[]);
        assert_eq!(record, "[PLACING] MARKET | BTCUSDT | Qty: 0.001");

        let record = format_order_record(
            "PLACED",
            "LIMIT",
            "BTCUSDT",
            0.001,
            Some(50000.0),
            &[("order_id", "12345".to_string()), ("status", "NEW".to_string())],
        );
        assert_eq!(
            record,
            "[PLACED] LIMIT | BTCUSDT | Qty: 0.001 @ 50000 | order_id=12345 | status=NEW"
        );
    }

    #[test]
    fn test_logger_writes_to_file() {
        let dir = std::env::temp_dir().join("rustexec_logger_test");
        let config = LogConfig {
            level: "INFO".to_string(),
            dir: dir.to_string_lossy().to_string(),
            max_file_size_mb: 1,
            console_output: false,
        };

        let logger = ExecLogger::new("test_ctx", &config).unwrap();
        logger.info("第一条消息");
        logger.log_order("PLACING", "MARKET", "BTCUSDT", 0.5, None, &[]);

        let date = Local::now().format("%Y%m%d");
        let path = dir.join(format!("test_ctx_{}.log", date));
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("第一条消息"));
        assert!(contents.contains("[PLACING] MARKET | BTCUSDT | Qty: 0.5"));

        let _ = fs::remove_dir_all(&dir);
    }
}
