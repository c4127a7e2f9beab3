use crate::core::config::ValidationConfig;
use crate::core::error::ExecError;
use crate::core::types::{OrderSide, Result};

/// 订单参数校验器
/// 所有检查都是无副作用的纯函数，失败时返回Validation类错误
#[derive(Debug, Clone)]
pub struct OrderValidator {
    config: ValidationConfig,
}

impl OrderValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// 校验交易对格式: 大写字母数字、以计价资产结尾、长度不小于6
    pub fn validate_symbol(&self, symbol: &str) -> Result<()> {
        if symbol.is_empty() {
            return Err(ExecError::validation("symbol", "交易对不能为空"));
        }

        if !symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(ExecError::validation(
                "symbol",
                "交易对只能包含大写字母和数字",
            ));
        }

        if !symbol.ends_with(&self.config.quote_asset) {
            return Err(ExecError::validation(
                "symbol",
                format!("USDT本位合约交易对必须以{}结尾", self.config.quote_asset),
            ));
        }

        if symbol.len() < 6 {
            return Err(ExecError::validation("symbol", "交易对长度不足"));
        }

        Ok(())
    }

    /// 校验数量；给定价格时同时校验名义价值上下限
    pub fn validate_quantity(&self, quantity: f64, price: Option<f64>) -> Result<()> {
        if quantity <= 0.0 {
            return Err(ExecError::validation("quantity", "数量必须大于0"));
        }

        if let Some(price) = price {
            let notional = quantity * price;

            if notional < self.config.min_order_size_usdt {
                return Err(ExecError::validation(
                    "quantity",
                    format!(
                        "订单价值({:.2} USDT)低于最小值({} USDT)",
                        notional, self.config.min_order_size_usdt
                    ),
                ));
            }

            if notional > self.config.max_order_size_usdt {
                return Err(ExecError::validation(
                    "quantity",
                    format!(
                        "订单价值({:.2} USDT)超过最大值({} USDT)",
                        notional, self.config.max_order_size_usdt
                    ),
                ));
            }
        }

        Ok(())
    }

    /// 校验价格为正且处于配置的价格区间内
    pub fn validate_price(&self, price: f64) -> Result<()> {
        if price <= 0.0 {
            return Err(ExecError::validation("price", "价格必须大于0"));
        }

        if price < self.config.min_price {
            return Err(ExecError::validation(
                "price",
                format!("价格({})低于最小值({})", price, self.config.min_price),
            ));
        }

        if price > self.config.max_price {
            return Err(ExecError::validation(
                "price",
                format!("价格({})超过最大值({})", price, self.config.max_price),
            ));
        }

        Ok(())
    }

    pub fn validate_leverage(&self, leverage: u32, max_leverage: u32) -> Result<()> {
        if leverage < 1 {
            return Err(ExecError::validation("leverage", "杠杆倍数不能低于1"));
        }

        if leverage > max_leverage {
            return Err(ExecError::validation(
                "leverage",
                format!("杠杆倍数({})超过最大值({})", leverage, max_leverage),
            ));
        }

        Ok(())
    }

    /// 校验止损触发价与现价的方向关系
    /// BUY止损触发价须高于现价，SELL止损触发价须低于现价
    pub fn validate_stop_price(
        &self,
        stop_price: f64,
        current_price: f64,
        side: OrderSide,
    ) -> Result<()> {
        self.validate_price(stop_price)?;

        match side {
            OrderSide::Buy if stop_price <= current_price => Err(ExecError::validation(
                "stop_price",
                format!(
                    "BUY订单的触发价({})必须高于现价({})",
                    stop_price, current_price
                ),
            )),
            OrderSide::Sell if stop_price >= current_price => Err(ExecError::validation(
                "stop_price",
                format!(
                    "SELL订单的触发价({})必须低于现价({})",
                    stop_price, current_price
                ),
            )),
            _ => Ok(()),
        }
    }

    /// 校验百分比取值（平仓比例等）
    pub fn validate_percentage(&self, percentage: f64) -> Result<()> {
        const MIN_PCT: f64 = 0.1;
        const MAX_PCT: f64 = 100.0;

        if percentage < MIN_PCT {
            return Err(ExecError::validation(
                "percentage",
                format!("百分比({}%)低于最小值({}%)", percentage, MIN_PCT),
            ));
        }

        if percentage > MAX_PCT {
            return Err(ExecError::validation(
                "percentage",
                format!("百分比({}%)超过最大值({}%)", percentage, MAX_PCT),
            ));
        }

        Ok(())
    }

    /// 校验网格参数: 价格区间有效且层数在[2,100]内
    pub fn validate_grid_parameters(
        &self,
        lower_price: f64,
        upper_price: f64,
        grid_levels: u32,
    ) -> Result<()> {
        self.validate_price(lower_price).map_err(|e| match e {
            ExecError::Validation { reason, .. } => {
                ExecError::validation("lower_price", format!("下边界无效: {}", reason))
            }
            other => other,
        })?;

        self.validate_price(upper_price).map_err(|e| match e {
            ExecError::Validation { reason, .. } => {
                ExecError::validation("upper_price", format!("上边界无效: {}", reason))
            }
            other => other,
        })?;

        if upper_price <= lower_price {
            return Err(ExecError::validation(
                "upper_price",
                "上边界必须高于下边界",
            ));
        }

        if grid_levels < 2 {
            return Err(ExecError::validation("grid_levels", "网格层数不能低于2"));
        }

        if grid_levels > 100 {
            return Err(ExecError::validation("grid_levels", "网格层数不能超过100"));
        }

        Ok(())
    }

    /// 校验TWAP参数: 分片数[2,100]、间隔[1,3600]秒、分片数量大于0
    pub fn validate_twap_parameters(
        &self,
        total_quantity: f64,
        chunks: u32,
        interval_seconds: u64,
    ) -> Result<()> {
        self.validate_quantity(total_quantity, None)?;

        if chunks < 2 {
            return Err(ExecError::validation("chunks", "TWAP至少需要2个分片"));
        }

        if chunks > 100 {
            return Err(ExecError::validation("chunks", "TWAP分片数不能超过100"));
        }

        if interval_seconds < 1 {
            return Err(ExecError::validation("interval", "间隔不能低于1秒"));
        }

        if interval_seconds > 3600 {
            return Err(ExecError::validation(
                "interval",
                "间隔不能超过1小时(3600秒)",
            ));
        }

        let chunk_size = total_quantity / chunks as f64;
        if chunk_size <= 0.0 {
            return Err(ExecError::validation("chunks", "分片数量过小"));
        }

        Ok(())
    }

    /// 价格按配置精度做银行家舍入
    /// 必须在校验之后调用，校验始终作用于调用方给出的原始精度
    pub fn format_price(&self, price: f64) -> f64 {
        round_to_precision(price, self.config.price_precision)
    }

    /// 数量按配置精度做银行家舍入
    pub fn format_quantity(&self, quantity: f64) -> f64 {
        round_to_precision(quantity, self.config.quantity_precision)
    }
}

/// 四舍六入五成双，保留指定小数位
pub fn round_to_precision(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> OrderValidator {
        OrderValidator::new(ValidationConfig::default())
    }

    #[test]
    fn test_symbol_accepts_usdt_pairs() {
        let v = validator();
        assert!(v.validate_symbol("BTCUSDT").is_ok());
        assert!(v.validate_symbol("ETHUSDT").is_ok());
        assert!(v.validate_symbol("1000PEPEUSDT").is_ok());
    }

    #[test]
    fn test_symbol_rejects_bad_formats() {
        let v = validator();
        // 小写
        assert!(v.validate_symbol("btcusdt").is_err());
        // 长度与后缀
        assert!(v.validate_symbol("BTC").is_err());
        // 非法字符
        assert!(v.validate_symbol("BTC-USDT").is_err());
        assert!(v.validate_symbol("").is_err());
        // 计价资产不符
        assert!(v.validate_symbol("BTCBUSD").is_err());
    }

    #[test]
    fn test_quantity_notional_bounds() {
        let v = validator();
        // 0.001 * 50000 = 50 USDT，在默认区间[5, 100000]内
        assert!(v.validate_quantity(0.001, Some(50000.0)).is_ok());
        // 0.00001 * 50000 = 0.5 USDT < 5
        assert!(v.validate_quantity(0.00001, Some(50000.0)).is_err());
        // 10 * 50000 = 500000 > 100000
        assert!(v.validate_quantity(10.0, Some(50000.0)).is_err());
        // 无价格时只检查数量为正
        assert!(v.validate_quantity(0.00001, None).is_ok());
        assert!(v.validate_quantity(0.0, None).is_err());
        assert!(v.validate_quantity(-1.0, None).is_err());
    }

    #[test]
    fn test_price_bounds() {
        let v = validator();
        assert!(v.validate_price(50000.0).is_ok());
        assert!(v.validate_price(0.01).is_ok());
        assert!(v.validate_price(0.0).is_err());
        assert!(v.validate_price(0.005).is_err());
        assert!(v.validate_price(2_000_000.0).is_err());
    }

    #[test]
    fn test_leverage_bounds() {
        let v = validator();
        assert!(v.validate_leverage(1, 125).is_ok());
        assert!(v.validate_leverage(125, 125).is_ok());
        assert!(v.validate_leverage(126, 125).is_err());
        assert!(v.validate_leverage(21, 20).is_err());
        assert!(v.validate_leverage(0, 125).is_err());
    }

    #[test]
    fn test_stop_price_side_rules() {
        let v = validator();
        let current = 50000.0;
        // BUY止损须在现价上方
        assert!(v
            .validate_stop_price(51000.0, current, OrderSide::Buy)
            .is_ok());
        assert!(v
            .validate_stop_price(49000.0, current, OrderSide::Buy)
            .is_err());
        assert!(v
            .validate_stop_price(50000.0, current, OrderSide::Buy)
            .is_err());
        // SELL止损须在现价下方
        assert!(v
            .validate_stop_price(49000.0, current, OrderSide::Sell)
            .is_ok());
        assert!(v
            .validate_stop_price(51000.0, current, OrderSide::Sell)
            .is_err());
        assert!(v
            .validate_stop_price(50000.0, current, OrderSide::Sell)
            .is_err());
    }

    #[test]
    fn test_percentage_bounds() {
        let v = validator();
        assert!(v.validate_percentage(50.0).is_ok());
        assert!(v.validate_percentage(100.0).is_ok());
        assert!(v.validate_percentage(0.1).is_ok());
        assert!(v.validate_percentage(0.05).is_err());
        assert!(v.validate_percentage(101.0).is_err());
    }

    #[test]
    fn test_grid_parameters() {
        let v = validator();
        assert!(v.validate_grid_parameters(45000.0, 55000.0, 10).is_ok());
        assert!(v.validate_grid_parameters(55000.0, 45000.0, 10).is_err());
        assert!(v.validate_grid_parameters(45000.0, 45000.0, 10).is_err());
        assert!(v.validate_grid_parameters(45000.0, 55000.0, 1).is_err());
        assert!(v.validate_grid_parameters(45000.0, 55000.0, 101).is_err());
        assert!(v.validate_grid_parameters(0.005, 55000.0, 10).is_err());
    }

    #[test]
    fn test_twap_parameters() {
        let v = validator();
        assert!(v.validate_twap_parameters(0.003, 3, 60).is_ok());
        assert!(v.validate_twap_parameters(0.003, 1, 60).is_err());
        assert!(v.validate_twap_parameters(0.003, 101, 60).is_err());
        assert!(v.validate_twap_parameters(0.003, 3, 0).is_err());
        assert!(v.validate_twap_parameters(0.003, 3, 3601).is_err());
        assert!(v.validate_twap_parameters(0.0, 3, 60).is_err());
    }

    #[test]
    fn test_format_rounds_half_to_even() {
        let v = validator();
        // 0.125和0.375的二进制表示精确，缩放后恰为.5结尾
        assert_eq!(v.format_price(0.125), 0.12);
        assert_eq!(v.format_price(0.375), 0.38);
        assert_eq!(v.format_price(1111.111111), 1111.11);
        assert_eq!(v.format_quantity(0.0033333), 0.003);
        assert_eq!(v.format_quantity(0.0625), 0.062);
        assert_eq!(round_to_precision(2.5, 0), 2.0);
        assert_eq!(round_to_precision(3.5, 0), 4.0);
    }
}
