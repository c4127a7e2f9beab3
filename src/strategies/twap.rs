use std::sync::Arc;
use std::time::Duration;

use crate::core::config::TwapConfig;
use crate::core::exchange::Exchange;
use crate::core::types::{OrderResult, OrderSide, Result, TimeInForce};
use crate::core::validator::OrderValidator;
use crate::strategies::orders::OrderExecutor;
use crate::utils::ExecLogger;

/// 分片下单方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TwapMode {
    /// 每片市价成交
    Market,
    /// 每片按现价偏移挂IOC限价，未成交部分由末片吸收
    IocLimit { offset_percent: f64 },
}

/// TWAP执行计划
#[derive(Debug, Clone)]
pub struct TwapPlan {
    pub symbol: String,
    pub side: OrderSide,
    pub total_quantity: f64,
    pub chunks: u32,
    pub interval: Duration,
    /// 前 chunks-1 片的目标数量（已按精度格式化）
    pub chunk_size: f64,
}

impl TwapPlan {
    /// 各分片的目标数量，末片吸收格式化余数
    ///
    /// 实际执行时末片还会吸收前面分片的失败与部分成交缺口。
    pub fn target_sizes(&self) -> Vec<f64> {
        let body_chunks = (self.chunks - 1) as usize;
        let mut sizes = vec![self.chunk_size; body_chunks];
        sizes.push(self.total_quantity - self.chunk_size * body_chunks as f64);
        sizes
    }
}

/// TWAP执行汇总，只统计成交的分片
#[derive(Debug, Clone, Default)]
pub struct TwapSummary {
    pub total_orders: usize,
    pub total_quantity: f64,
    pub average_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_range: f64,
    pub total_value: f64,
}

impl TwapSummary {
    pub fn from_orders(orders: &[OrderResult]) -> TwapSummary {
        if orders.is_empty() {
            return TwapSummary::default();
        }

        let mut total_quantity = 0.0;
        let mut total_value = 0.0;
        let mut min_price = f64::MAX;
        let mut max_price = 0.0f64;

        for order in orders {
            total_quantity += order.executed_qty;
            total_value += order.executed_qty * order.avg_price;
            if order.avg_price > 0.0 {
                min_price = min_price.min(order.avg_price);
                max_price = max_price.max(order.avg_price);
            }
        }

        let average_price = if total_quantity > 0.0 {
            total_value / total_quantity
        } else {
            0.0
        };
        if min_price == f64::MAX {
            min_price = 0.0;
        }

        TwapSummary {
            total_orders: orders.len(),
            total_quantity,
            average_price,
            min_price,
            max_price,
            price_range: max_price - min_price,
            total_value,
        }
    }
}

/// 一次TWAP执行的完整结果
#[derive(Debug, Clone)]
pub struct TwapReport {
    pub plan: TwapPlan,
    /// 成交的分片订单，失败的分片不在其中
    pub orders: Vec<OrderResult>,
    pub failed_chunks: u32,
    pub summary: TwapSummary,
}

/// TWAP调度器
///
/// 把大单拆成等量分片按固定时间间隔执行。单片失败记录后跳过，
/// 从不中断整个执行；末片数量 = 总量减去已成交量，吸收所有缺口。
pub struct TwapScheduler {
    orders: Arc<OrderExecutor>,
    exchange: Arc<dyn Exchange>,
    validator: Arc<OrderValidator>,
    logger: ExecLogger,
    config: TwapConfig,
}

impl TwapScheduler {
    pub fn new(
        orders: Arc<OrderExecutor>,
        exchange: Arc<dyn Exchange>,
        validator: Arc<OrderValidator>,
        logger: ExecLogger,
        config: TwapConfig,
    ) -> Self {
        Self {
            orders,
            exchange,
            validator,
            logger,
            config,
        }
    }

    /// 执行TWAP，chunks与interval缺省取配置值
    pub async fn execute(
        &self,
        symbol: &str,
        side: OrderSide,
        total_quantity: f64,
        chunks: Option<u32>,
        interval_seconds: Option<u64>,
        mode: TwapMode,
    ) -> Result<TwapReport> {
        let chunks = chunks.unwrap_or(self.config.default_chunks);
        let interval_seconds = interval_seconds.unwrap_or(self.config.default_interval_seconds);

        self.validator
            .validate_twap_parameters(total_quantity, chunks, interval_seconds)?;
        self.validator.validate_symbol(symbol)?;

        let chunk_size = self
            .validator
            .format_quantity(total_quantity / chunks as f64);
        let plan = TwapPlan {
            symbol: symbol.to_string(),
            side,
            total_quantity,
            chunks,
            interval: Duration::from_secs(interval_seconds),
            chunk_size,
        };

        self.logger.info(&format!(
            "开始TWAP执行: {} {} 总量{} 分{}片 每片{} 间隔{}s",
            symbol,
            side.as_str(),
            total_quantity,
            chunks,
            chunk_size,
            interval_seconds
        ));

        let mut executed_orders: Vec<OrderResult> = Vec::new();
        let mut failed_chunks = 0u32;
        let mut executed_total = 0.0;

        for index in 0..chunks {
            let target = if index == chunks - 1 {
                // 末片吸收余数与前面分片的缺口
                self.validator
                    .format_quantity(total_quantity - executed_total)
            } else {
                chunk_size
            };

            if target <= 0.0 {
                self.logger.info(&format!(
                    "TWAP分片 {}/{} 数量为0，跳过",
                    index + 1,
                    chunks
                ));
                continue;
            }

            self.logger.info(&format!(
                "执行TWAP分片 {}/{}: {} {}",
                index + 1,
                chunks,
                target,
                symbol
            ));

            let placed = match mode {
                TwapMode::Market => {
                    self.orders
                        .place_market(symbol, side, target, false)
                        .await
                }
                TwapMode::IocLimit { offset_percent } => {
                    match self.chunk_limit_price(symbol, side, offset_percent).await {
                        Ok(price) => {
                            self.orders
                                .place_limit(
                                    symbol,
                                    side,
                                    target,
                                    price,
                                    TimeInForce::IOC,
                                    false,
                                    false,
                                )
                                .await
                        }
                        Err(e) => Err(e),
                    }
                }
            };

            match placed {
                Ok(order) => {
                    executed_total += order.executed_qty;
                    self.logger.info(&format!(
                        "TWAP分片 {}/{} 完成: #{} 状态{}",
                        index + 1,
                        chunks,
                        order.order_id,
                        order.status.as_str()
                    ));
                    executed_orders.push(order);
                }
                Err(e) => {
                    failed_chunks += 1;
                    self.logger.error(&format!(
                        "TWAP分片 {}/{} 执行失败: {}",
                        index + 1,
                        chunks,
                        e
                    ));
                }
            }

            if index < chunks - 1 {
                self.logger
                    .debug(&format!("等待{}s后执行下一分片", interval_seconds));
                tokio::time::sleep(plan.interval).await;
            }
        }

        let summary = TwapSummary::from_orders(&executed_orders);
        self.logger.info(&format!(
            "TWAP执行完成: 成交{}/{} 均价{:.2} 订单{}/{}",
            summary.total_quantity,
            total_quantity,
            summary.average_price,
            summary.total_orders,
            chunks
        ));

        Ok(TwapReport {
            plan,
            orders: executed_orders,
            failed_chunks,
            summary,
        })
    }

    /// IOC限价模式下按现价加减偏移计算分片限价
    async fn chunk_limit_price(
        &self,
        symbol: &str,
        side: OrderSide,
        offset_percent: f64,
    ) -> Result<f64> {
        let current_price = self.exchange.get_ticker_price(symbol).await?;
        let price = match side {
            OrderSide::Buy => current_price * (1.0 - offset_percent / 100.0),
            OrderSide::Sell => current_price * (1.0 + offset_percent / 100.0),
        };
        Ok(self.validator.format_price(price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::{OrderSpec, OrderStatus};
    use crate::strategies::testkit::{order_result, test_executor, test_logger, test_validator, MockExchange};

    fn scheduler(exchange: Arc<MockExchange>) -> TwapScheduler {
        TwapScheduler::new(
            test_executor(exchange.clone()),
            exchange,
            test_validator(),
            test_logger(),
            TwapConfig::default(),
        )
    }

    #[test]
    fn test_plan_target_sizes_sum_to_total() {
        let plan = TwapPlan {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            total_quantity: 0.01,
            chunks: 3,
            interval: Duration::from_secs(60),
            chunk_size: 0.003,
        };

        let sizes = plan.target_sizes();
        assert_eq!(sizes.len(), 3);
        assert!((sizes[0] - 0.003).abs() < 1e-12);
        assert!((sizes[1] - 0.003).abs() < 1e-12);
        // 末片吸收余数: 0.01 - 0.006 = 0.004
        assert!((sizes[2] - 0.004).abs() < 1e-12);
        assert!((sizes.iter().sum::<f64>() - plan.total_quantity).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_equal_chunks_execute_in_order() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let twap = scheduler(exchange.clone());

        let report = twap
            .execute(
                "BTCUSDT",
                OrderSide::Buy,
                0.003,
                Some(3),
                Some(1),
                TwapMode::Market,
            )
            .await
            .unwrap();

        assert_eq!(report.orders.len(), 3);
        assert_eq!(report.failed_chunks, 0);
        assert!((report.summary.total_quantity - 0.003).abs() < 1e-9);

        let specs = exchange.created_specs();
        assert_eq!(specs.len(), 3);
        for spec in &specs {
            match spec {
                OrderSpec::Market { quantity, .. } => assert!((quantity - 0.001).abs() < 1e-12),
                other => panic!("unexpected spec: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_is_skipped_and_absorbed() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        // 第一片成交0.001，第二片被拒，第三片吸收缺口
        exchange.script_create_ok(order_result(
            1,
            "BTCUSDT",
            OrderSide::Buy,
            OrderStatus::Filled,
            0.001,
            50000.0,
        ));
        exchange.script_create_err(-1003, "Too many requests.");
        let twap = scheduler(exchange.clone());

        let report = twap
            .execute(
                "BTCUSDT",
                OrderSide::Buy,
                0.003,
                Some(3),
                Some(1),
                TwapMode::Market,
            )
            .await
            .unwrap();

        assert_eq!(report.orders.len(), 2);
        assert_eq!(report.failed_chunks, 1);
        assert_eq!(report.summary.total_orders, 2);

        let specs = exchange.created_specs();
        match &specs[2] {
            OrderSpec::Market { quantity, .. } => {
                // 0.003 - 0.001 = 0.002
                assert!((quantity - 0.002).abs() < 1e-12);
            }
            other => panic!("unexpected spec: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_summary_reports_vwap_over_survivors() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        exchange.script_create_ok(order_result(
            1,
            "BTCUSDT",
            OrderSide::Buy,
            OrderStatus::Filled,
            0.001,
            50000.0,
        ));
        exchange.script_create_ok(order_result(
            2,
            "BTCUSDT",
            OrderSide::Buy,
            OrderStatus::Filled,
            0.003,
            51000.0,
        ));
        let twap = scheduler(exchange.clone());

        let report = twap
            .execute(
                "BTCUSDT",
                OrderSide::Buy,
                0.004,
                Some(2),
                Some(1),
                TwapMode::Market,
            )
            .await
            .unwrap();

        // VWAP = (0.001*50000 + 0.003*51000) / 0.004 = 50750
        assert!((report.summary.average_price - 50750.0).abs() < 1e-6);
        assert!((report.summary.min_price - 50000.0).abs() < 1e-9);
        assert!((report.summary.max_price - 51000.0).abs() < 1e-9);
        assert!((report.summary.price_range - 1000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ioc_limit_mode_follows_ticker_per_chunk() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        exchange.push_price(50000.0);
        exchange.push_price(51000.0);
        let twap = scheduler(exchange.clone());

        let report = twap
            .execute(
                "BTCUSDT",
                OrderSide::Buy,
                0.004,
                Some(2),
                Some(1),
                TwapMode::IocLimit {
                    offset_percent: 0.1,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.orders.len(), 2);

        let specs = exchange.created_specs();
        match (&specs[0], &specs[1]) {
            (
                OrderSpec::Limit {
                    price: first,
                    time_in_force,
                    ..
                },
                OrderSpec::Limit { price: second, .. },
            ) => {
                // 买入按各片现价下浮0.1%: 50000*0.999 / 51000*0.999
                assert!((first - 49950.0).abs() < 1e-9);
                assert!((second - 50949.0).abs() < 1e-9);
                assert_eq!(*time_in_force, TimeInForce::IOC);
            }
            other => panic!("unexpected specs: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_chunk_count_rejected() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let twap = scheduler(exchange.clone());

        let err = twap
            .execute(
                "BTCUSDT",
                OrderSide::Buy,
                0.003,
                Some(1),
                Some(1),
                TwapMode::Market,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(exchange.created_specs().is_empty());
    }
}
