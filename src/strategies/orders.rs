use std::sync::Arc;

use crate::core::error::{ErrorKind, ExecError};
use crate::core::exchange::Exchange;
use crate::core::types::{OrderResult, OrderSide, OrderSpec, Result, TimeInForce};
use crate::core::validator::OrderValidator;
use crate::utils::ExecLogger;

/// 单笔订单执行器
///
/// 每个下单入口先按固定顺序跑校验（交易对 → 价格 → 数量），任一失败即
/// 短路返回且不触网；通过后格式化精度、构造订单描述、恰好发起一次
/// 交易所调用，原样返回交易所响应。
///
/// 组合策略（OCO、TWAP、网格）通过持有本执行器复用下单能力。
pub struct OrderExecutor {
    exchange: Arc<dyn Exchange>,
    validator: Arc<OrderValidator>,
    logger: ExecLogger,
}

impl OrderExecutor {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        validator: Arc<OrderValidator>,
        logger: ExecLogger,
    ) -> Self {
        Self {
            exchange,
            validator,
            logger,
        }
    }

    pub fn validator(&self) -> &OrderValidator {
        &self.validator
    }

    /// 市价单
    pub async fn place_market(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        reduce_only: bool,
    ) -> Result<OrderResult> {
        self.validator.validate_symbol(symbol)?;
        self.validator.validate_quantity(quantity, None)?;

        let spec = OrderSpec::Market {
            symbol: symbol.to_string(),
            side,
            quantity: self.validator.format_quantity(quantity),
            reduce_only,
        };
        self.submit("place_market", spec).await
    }

    /// 限价单
    pub async fn place_limit(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        price: f64,
        time_in_force: TimeInForce,
        reduce_only: bool,
        post_only: bool,
    ) -> Result<OrderResult> {
        self.validator.validate_symbol(symbol)?;
        self.validator.validate_price(price)?;
        self.validator.validate_quantity(quantity, Some(price))?;

        let spec = OrderSpec::Limit {
            symbol: symbol.to_string(),
            side,
            quantity: self.validator.format_quantity(quantity),
            price: self.validator.format_price(price),
            time_in_force,
            reduce_only,
            post_only,
        };
        self.submit("place_limit", spec).await
    }

    /// 限价止损单
    ///
    /// 触发价方向按当前行情校验：买入止损须高于现价，卖出止损须低于现价。
    pub async fn place_stop_limit(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        price: f64,
        stop_price: f64,
        time_in_force: TimeInForce,
        reduce_only: bool,
    ) -> Result<OrderResult> {
        self.validator.validate_symbol(symbol)?;
        self.validator.validate_price(price)?;
        let current_price = self.exchange.get_ticker_price(symbol).await?;
        self.validator
            .validate_stop_price(stop_price, current_price, side)?;
        self.validator.validate_quantity(quantity, Some(price))?;

        let spec = OrderSpec::StopLimit {
            symbol: symbol.to_string(),
            side,
            quantity: self.validator.format_quantity(quantity),
            price: self.validator.format_price(price),
            stop_price: self.validator.format_price(stop_price),
            time_in_force,
            reduce_only,
        };
        self.submit("place_stop_limit", spec).await
    }

    /// 市价止损单
    pub async fn place_stop_market(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        stop_price: f64,
        reduce_only: bool,
    ) -> Result<OrderResult> {
        self.validator.validate_symbol(symbol)?;
        let current_price = self.exchange.get_ticker_price(symbol).await?;
        self.validator
            .validate_stop_price(stop_price, current_price, side)?;
        self.validator.validate_quantity(quantity, None)?;

        let spec = OrderSpec::StopMarket {
            symbol: symbol.to_string(),
            side,
            quantity: self.validator.format_quantity(quantity),
            stop_price: self.validator.format_price(stop_price),
            reduce_only,
        };
        self.submit("place_stop_market", spec).await
    }

    /// 止盈单，不传price时为触发后市价成交
    ///
    /// 止盈触发价落在盈利一侧，不适用止损的方向规则，只做常规价格校验。
    pub async fn place_take_profit(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        stop_price: f64,
        price: Option<f64>,
        reduce_only: bool,
    ) -> Result<OrderResult> {
        self.validator.validate_symbol(symbol)?;
        self.validator.validate_price(stop_price)?;
        if let Some(price) = price {
            self.validator.validate_price(price)?;
        }
        self.validator.validate_quantity(quantity, price)?;

        let spec = OrderSpec::TakeProfit {
            symbol: symbol.to_string(),
            side,
            quantity: self.validator.format_quantity(quantity),
            stop_price: self.validator.format_price(stop_price),
            price: price.map(|p| self.validator.format_price(p)),
            reduce_only,
        };
        self.submit("place_take_profit", spec).await
    }

    /// 撤销单个订单
    pub async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()> {
        self.validator.validate_symbol(symbol)?;

        match self.exchange.cancel_order(symbol, order_id).await {
            Ok(()) => {
                self.logger
                    .info(&format!("[CANCELED] {} 订单 #{}", symbol, order_id));
                Ok(())
            }
            Err(e) => {
                self.log_failure(&format!("cancel_order {} #{}", symbol, order_id), &e);
                Err(e)
            }
        }
    }

    /// 撤销某交易对的全部挂单
    pub async fn cancel_all_orders(&self, symbol: &str) -> Result<()> {
        self.validator.validate_symbol(symbol)?;

        match self.exchange.cancel_all_orders(symbol).await {
            Ok(()) => {
                self.logger
                    .info(&format!("[CANCELED] {} 全部挂单", symbol));
                Ok(())
            }
            Err(e) => {
                self.log_failure(&format!("cancel_all_orders {}", symbol), &e);
                Err(e)
            }
        }
    }

    /// 查询订单状态
    pub async fn get_order_status(&self, symbol: &str, order_id: i64) -> Result<OrderResult> {
        self.validator.validate_symbol(symbol)?;
        self.exchange.get_order(symbol, order_id).await
    }

    /// 查询挂单列表
    pub async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OrderResult>> {
        if let Some(symbol) = symbol {
            self.validator.validate_symbol(symbol)?;
        }
        self.exchange.get_open_orders(symbol).await
    }

    /// 提交订单并记录生命周期
    async fn submit(&self, context: &str, spec: OrderSpec) -> Result<OrderResult> {
        let details = Self::spec_details(&spec);
        self.logger.log_order(
            "PLACING",
            spec.type_name(),
            spec.symbol(),
            spec.quantity(),
            Self::spec_price(&spec),
            &details,
        );

        match self.exchange.create_order(&spec).await {
            Ok(order) => {
                let mut placed = details;
                placed.push(("order_id", order.order_id.to_string()));
                placed.push(("status", order.status.as_str().to_string()));
                self.logger.log_order(
                    "PLACED",
                    spec.type_name(),
                    spec.symbol(),
                    spec.quantity(),
                    Self::spec_price(&spec),
                    &placed,
                );
                Ok(order)
            }
            Err(e) => {
                self.log_failure(context, &e);
                Err(e)
            }
        }
    }

    /// 交易所拒单与传输失败分开记录
    fn log_failure(&self, context: &str, error: &ExecError) {
        match error.kind() {
            ErrorKind::ExchangeRejected => {
                self.logger
                    .error(&format!("{} 被交易所拒绝: {}", context, error));
            }
            _ => self.logger.log_error_trace(context, error),
        }
    }

    fn spec_price(spec: &OrderSpec) -> Option<f64> {
        match spec {
            OrderSpec::Limit { price, .. } | OrderSpec::StopLimit { price, .. } => Some(*price),
            OrderSpec::TakeProfit { price, .. } => *price,
            _ => None,
        }
    }

    fn spec_details(spec: &OrderSpec) -> Vec<(&'static str, String)> {
        let mut details = vec![("side", spec.side().as_str().to_string())];
        match spec {
            OrderSpec::StopLimit { stop_price, .. }
            | OrderSpec::StopMarket { stop_price, .. }
            | OrderSpec::TakeProfit { stop_price, .. } => {
                details.push(("stop_price", stop_price.to_string()));
            }
            _ => {}
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ErrorKind, ExecError};
    use crate::core::types::OrderStatus;
    use crate::strategies::testkit::{test_executor, MockExchange};

    #[tokio::test]
    async fn test_place_market_formats_quantity() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let executor = test_executor(exchange.clone());

        let order = executor
            .place_market("BTCUSDT", OrderSide::Buy, 0.0015, false)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);

        let specs = exchange.created_specs();
        assert_eq!(specs.len(), 1);
        match &specs[0] {
            OrderSpec::Market { quantity, .. } => {
                // 0.0015 按3位精度半偶舍入到 0.002
                assert!((quantity - 0.002).abs() < 1e-12);
            }
            other => panic!("unexpected spec: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_symbol_short_circuits_without_network() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let executor = test_executor(exchange.clone());

        let err = executor
            .place_market("btcusdt", OrderSide::Buy, 0.01, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(exchange.created_specs().is_empty());
    }

    #[tokio::test]
    async fn test_limit_notional_below_minimum_rejected() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let executor = test_executor(exchange.clone());

        // 0.0001 * 10000 = 1 USDT，低于最小名义价值5
        let err = executor
            .place_limit(
                "BTCUSDT",
                OrderSide::Buy,
                0.0001,
                10000.0,
                TimeInForce::GTC,
                false,
                false,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(exchange.created_specs().is_empty());
    }

    #[tokio::test]
    async fn test_stop_limit_checks_trigger_against_ticker() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let executor = test_executor(exchange.clone());

        // 买入止损触发价必须高于现价
        let err = executor
            .place_stop_limit(
                "BTCUSDT",
                OrderSide::Buy,
                0.01,
                49500.0,
                49000.0,
                TimeInForce::GTC,
                false,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let order = executor
            .place_stop_limit(
                "BTCUSDT",
                OrderSide::Buy,
                0.01,
                51500.0,
                51000.0,
                TimeInForce::GTC,
                false,
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::New);
    }

    #[tokio::test]
    async fn test_take_profit_allows_profit_side_trigger() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let executor = test_executor(exchange.clone());

        // 卖出止盈触发价高于现价，对止损规则是非法方向，对止盈必须放行
        let order = executor
            .place_take_profit("BTCUSDT", OrderSide::Sell, 0.01, 52000.0, None, true)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::New);

        let specs = exchange.created_specs();
        match &specs[0] {
            OrderSpec::TakeProfit { price: None, reduce_only: true, .. } => {}
            other => panic!("unexpected spec: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exchange_rejection_propagates_code() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        exchange.script_create_err(-2019, "Margin is insufficient.");
        let executor = test_executor(exchange.clone());

        let err = executor
            .place_market("BTCUSDT", OrderSide::Buy, 0.01, false)
            .await
            .unwrap_err();
        match err {
            ExecError::ExchangeRejected { code, .. } => assert_eq!(code, -2019),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_order_records_attempt() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let executor = test_executor(exchange.clone());

        executor.cancel_order("BTCUSDT", 42).await.unwrap();
        assert_eq!(
            exchange.canceled_orders(),
            vec![("BTCUSDT".to_string(), 42)]
        );
    }
}
