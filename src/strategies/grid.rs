use std::sync::Arc;

use crate::core::config::GridConfig;
use crate::core::error::ExecError;
use crate::core::exchange::Exchange;
use crate::core::types::{GridMode, OrderSide, Result, TimeInForce};
use crate::core::validator::OrderValidator;
use crate::strategies::orders::OrderExecutor;
use crate::utils::ExecLogger;

/// 网格计划，一经构建不可变
#[derive(Debug, Clone)]
pub struct GridPlan {
    pub symbol: String,
    pub mode: GridMode,
    pub lower_price: f64,
    pub upper_price: f64,
    pub levels: u32,
    pub spacing: f64,
    pub spacing_percent: f64,
    /// 格式化后的网格价位，严格递增，长度等于levels
    pub prices: Vec<f64>,
    /// 每层数量 = 总量/层数，格式化后使用，层间残差不回补
    pub quantity_per_level: f64,
}

impl GridPlan {
    /// 构建等距价格阶梯
    ///
    /// 间距百分比低于配置下限直接拒绝；高于上限由调用方告警后继续。
    /// 价位经精度格式化后相邻层重合的阶梯同样拒绝。
    pub fn build(
        validator: &OrderValidator,
        config: &GridConfig,
        symbol: &str,
        lower_price: f64,
        upper_price: f64,
        total_quantity: f64,
        levels: u32,
        mode: GridMode,
    ) -> Result<GridPlan> {
        validator.validate_grid_parameters(lower_price, upper_price, levels)?;

        let spacing = (upper_price - lower_price) / (levels - 1) as f64;
        let spacing_percent = spacing / lower_price * 100.0;

        if spacing_percent < config.min_spacing_percent {
            return Err(ExecError::validation(
                "grid_spacing",
                format!(
                    "网格间距({:.2}%)低于最小值({}%)",
                    spacing_percent, config.min_spacing_percent
                ),
            ));
        }

        let prices: Vec<f64> = (0..levels)
            .map(|i| validator.format_price(lower_price + i as f64 * spacing))
            .collect();

        // 低价币种的窄区间里，间距可能小于一个价格刻度
        if !prices.windows(2).all(|pair| pair[1] > pair[0]) {
            return Err(ExecError::validation(
                "grid_spacing",
                format!("网格间距({:.6})经价格精度格式化后相邻层重合", spacing),
            ));
        }

        Ok(GridPlan {
            symbol: symbol.to_string(),
            mode,
            lower_price,
            upper_price,
            levels,
            spacing,
            spacing_percent,
            prices,
            quantity_per_level: validator.format_quantity(total_quantity / levels as f64),
        })
    }
}

/// 网格中被追踪的单个订单
#[derive(Debug, Clone)]
pub struct GridOrder {
    pub order_id: i64,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
}

/// 网格实例状态
///
/// 订单按本实例逐个追踪，撤销与补挂只作用于这里记录的订单，
/// 不影响同交易对上其他来源的挂单。
#[derive(Debug, Clone)]
pub struct GridState {
    pub plan: GridPlan,
    /// 建网时的市场价
    pub current_price: f64,
    pub buy_orders: Vec<GridOrder>,
    pub sell_orders: Vec<GridOrder>,
    /// 已成交并处理过的订单，防止补挂逻辑重复触发
    pub filled: Vec<GridOrder>,
}

impl GridState {
    pub fn open_order_count(&self) -> usize {
        self.buy_orders.len() + self.sell_orders.len()
    }
}

/// 网格统计
#[derive(Debug, Clone, Default)]
pub struct GridStatistics {
    pub total_buy_orders: usize,
    pub total_sell_orders: usize,
    pub filled_buys: usize,
    pub filled_sells: usize,
    pub open_orders: usize,
    pub total_buy_value: f64,
    pub total_sell_value: f64,
    pub realized_profit: f64,
}

/// 网格构建器
///
/// 在上下边界间铺设等距的只挂单(post-only)限价单，按方向模式决定
/// 每层的买卖方向。单层挂单失败记录后跳过。
pub struct GridBuilder {
    orders: Arc<OrderExecutor>,
    exchange: Arc<dyn Exchange>,
    validator: Arc<OrderValidator>,
    logger: ExecLogger,
    config: GridConfig,
}

impl GridBuilder {
    pub fn new(
        orders: Arc<OrderExecutor>,
        exchange: Arc<dyn Exchange>,
        validator: Arc<OrderValidator>,
        logger: ExecLogger,
        config: GridConfig,
    ) -> Self {
        Self {
            orders,
            exchange,
            validator,
            logger,
            config,
        }
    }

    /// 创建网格并挂出全部层级订单
    pub async fn create_grid(
        &self,
        symbol: &str,
        lower_price: f64,
        upper_price: f64,
        total_quantity: f64,
        levels: Option<u32>,
        mode: GridMode,
    ) -> Result<GridState> {
        let levels = levels.unwrap_or(self.config.default_levels);

        let plan = GridPlan::build(
            &self.validator,
            &self.config,
            symbol,
            lower_price,
            upper_price,
            total_quantity,
            levels,
            mode,
        )?;
        self.validator.validate_symbol(symbol)?;
        self.validator.validate_quantity(total_quantity, None)?;

        if plan.spacing_percent > self.config.max_spacing_percent {
            self.logger.warn(&format!(
                "网格间距({:.2}%)高于建议上限({}%)",
                plan.spacing_percent, self.config.max_spacing_percent
            ));
        }

        self.logger.info(&format!(
            "创建 {} 网格: 区间{}-{} {}层 间距{:.2}({:.2}%) 每层{}",
            symbol,
            lower_price,
            upper_price,
            levels,
            plan.spacing,
            plan.spacing_percent,
            plan.quantity_per_level
        ));

        let current_price = self.exchange.get_ticker_price(symbol).await?;
        self.logger.info(&format!("当前价格: {}", current_price));

        let mut state = GridState {
            plan,
            current_price,
            buy_orders: Vec::new(),
            sell_orders: Vec::new(),
            filled: Vec::new(),
        };

        let prices = state.plan.prices.clone();
        for price in prices {
            let side = match mode {
                GridMode::Neutral => {
                    if price < current_price {
                        Some(OrderSide::Buy)
                    } else if price > current_price {
                        Some(OrderSide::Sell)
                    } else {
                        // 与现价重合的层整条跳过
                        None
                    }
                }
                GridMode::Long => (price <= current_price).then_some(OrderSide::Buy),
                GridMode::Short => (price >= current_price).then_some(OrderSide::Sell),
            };

            let Some(side) = side else { continue };
            self.place_level(&mut state, side, price).await;
        }

        self.logger.info(&format!(
            "网格创建完成: {}买 {}卖",
            state.buy_orders.len(),
            state.sell_orders.len()
        ));

        Ok(state)
    }

    /// 巡检已成交层并补挂对手方向订单，返回补挂数量
    ///
    /// 买单成交在上一格补卖单；中性网格的卖单成交在下一格补买单。
    /// 处理过的成交单移入filled列表，重复巡检不会二次补挂。
    pub async fn refill(&self, state: &mut GridState) -> Result<u32> {
        let symbol = state.plan.symbol.clone();
        let spacing = state.plan.spacing;
        let mode = state.plan.mode;
        let mut refilled = 0u32;

        let buys = std::mem::take(&mut state.buy_orders);
        let mut open_buys = Vec::new();
        for tracked in buys {
            match self.orders.get_order_status(&symbol, tracked.order_id).await {
                Ok(status) if status.status.is_filled() => {
                    self.logger.info(&format!(
                        "网格买单 #{} 在 {} 成交",
                        tracked.order_id, tracked.price
                    ));
                    let sell_price = self.validator.format_price(tracked.price + spacing);
                    if self
                        .place_level(state, OrderSide::Sell, sell_price)
                        .await
                    {
                        refilled += 1;
                    }
                    state.filled.push(tracked);
                }
                Ok(status) if status.status.is_open() => open_buys.push(tracked),
                Ok(_) => {
                    // 已撤销或过期，不再追踪
                    self.logger
                        .debug(&format!("网格买单 #{} 已离场", tracked.order_id));
                }
                Err(e) => {
                    self.logger.warn(&format!(
                        "查询网格买单 #{} 失败: {}",
                        tracked.order_id, e
                    ));
                    open_buys.push(tracked);
                }
            }
        }
        state.buy_orders.extend(open_buys);

        let sells = std::mem::take(&mut state.sell_orders);
        let mut open_sells = Vec::new();
        for tracked in sells {
            match self.orders.get_order_status(&symbol, tracked.order_id).await {
                Ok(status) if status.status.is_filled() => {
                    self.logger.info(&format!(
                        "网格卖单 #{} 在 {} 成交",
                        tracked.order_id, tracked.price
                    ));
                    if mode == GridMode::Neutral {
                        let buy_price = self.validator.format_price(tracked.price - spacing);
                        if self.place_level(state, OrderSide::Buy, buy_price).await {
                            refilled += 1;
                        }
                    }
                    state.filled.push(tracked);
                }
                Ok(status) if status.status.is_open() => open_sells.push(tracked),
                Ok(_) => {
                    self.logger
                        .debug(&format!("网格卖单 #{} 已离场", tracked.order_id));
                }
                Err(e) => {
                    self.logger.warn(&format!(
                        "查询网格卖单 #{} 失败: {}",
                        tracked.order_id, e
                    ));
                    open_sells.push(tracked);
                }
            }
        }
        state.sell_orders.extend(open_sells);

        if refilled > 0 {
            self.logger.info(&format!("网格补挂 {} 笔订单", refilled));
        }
        Ok(refilled)
    }

    /// 撤销本网格实例追踪的全部挂单，返回撤销数量
    ///
    /// 已不存在的订单按成功计；撤销失败的订单保留在追踪列表中。
    pub async fn cancel_grid(&self, state: &mut GridState) -> Result<u32> {
        let symbol = state.plan.symbol.clone();
        self.logger.info(&format!("撤销 {} 网格", symbol));

        let mut pending = Vec::new();
        pending.append(&mut state.buy_orders);
        pending.append(&mut state.sell_orders);

        let mut canceled = 0u32;
        for order in pending {
            match self.orders.cancel_order(&symbol, order.order_id).await {
                Ok(()) => canceled += 1,
                Err(e) => {
                    self.logger.warn(&format!(
                        "撤销网格订单 #{} 失败: {}",
                        order.order_id, e
                    ));
                    match order.side {
                        OrderSide::Buy => state.buy_orders.push(order),
                        OrderSide::Sell => state.sell_orders.push(order),
                    }
                }
            }
        }

        self.logger
            .info(&format!("{} 网格撤销完成: {}笔", symbol, canceled));
        Ok(canceled)
    }

    /// 统计网格成交与浮盈情况
    pub async fn statistics(&self, state: &GridState) -> Result<GridStatistics> {
        let symbol = &state.plan.symbol;
        let mut stats = GridStatistics::default();

        for tracked in state
            .buy_orders
            .iter()
            .chain(state.filled.iter().filter(|o| o.side == OrderSide::Buy))
        {
            stats.total_buy_orders += 1;
            let status = self.orders.get_order_status(symbol, tracked.order_id).await?;
            if status.status.is_filled() {
                stats.filled_buys += 1;
                stats.total_buy_value += status.executed_qty * status.avg_price;
            } else if status.status.is_open() {
                stats.open_orders += 1;
            }
        }

        for tracked in state
            .sell_orders
            .iter()
            .chain(state.filled.iter().filter(|o| o.side == OrderSide::Sell))
        {
            stats.total_sell_orders += 1;
            let status = self.orders.get_order_status(symbol, tracked.order_id).await?;
            if status.status.is_filled() {
                stats.filled_sells += 1;
                stats.total_sell_value += status.executed_qty * status.avg_price;
            } else if status.status.is_open() {
                stats.open_orders += 1;
            }
        }

        stats.realized_profit = stats.total_sell_value - stats.total_buy_value;
        Ok(stats)
    }

    /// 挂出单层post-only限价单并登记到状态，失败记录后返回false
    async fn place_level(&self, state: &mut GridState, side: OrderSide, price: f64) -> bool {
        let quantity = state.plan.quantity_per_level;
        match self
            .orders
            .place_limit(
                &state.plan.symbol,
                side,
                quantity,
                price,
                TimeInForce::GTC,
                false,
                true,
            )
            .await
        {
            Ok(order) => {
                let tracked = GridOrder {
                    order_id: order.order_id,
                    side,
                    price,
                    quantity,
                };
                match side {
                    OrderSide::Buy => state.buy_orders.push(tracked),
                    OrderSide::Sell => state.sell_orders.push(tracked),
                }
                true
            }
            Err(e) => {
                self.logger
                    .warn(&format!("网格层 {} {} 挂单失败: {}", price, side.as_str(), e));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ValidationConfig;
    use crate::core::error::ErrorKind;
    use crate::core::types::{OrderSpec, OrderStatus};
    use crate::strategies::testkit::{order_result, test_executor, test_logger, test_validator, MockExchange};

    fn builder(exchange: Arc<MockExchange>) -> GridBuilder {
        GridBuilder::new(
            test_executor(exchange.clone()),
            exchange,
            test_validator(),
            test_logger(),
            GridConfig::default(),
        )
    }

    fn plain_validator() -> OrderValidator {
        OrderValidator::new(ValidationConfig::default())
    }

    #[test]
    fn test_plan_ladder_is_evenly_spaced() {
        let validator = plain_validator();
        let plan = GridPlan::build(
            &validator,
            &GridConfig::default(),
            "BTCUSDT",
            45000.0,
            55000.0,
            0.1,
            10,
            GridMode::Neutral,
        )
        .unwrap();

        assert_eq!(plan.prices.len(), 10);
        assert!((plan.spacing - 10000.0 / 9.0).abs() < 1e-9);
        assert!((plan.spacing_percent - 2.469).abs() < 0.01);
        assert!((plan.prices[0] - 45000.0).abs() < 0.01);
        assert!((plan.prices[9] - 55000.0).abs() < 0.01);
        for pair in plan.prices.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_plan_rejects_spacing_below_minimum() {
        let validator = plain_validator();
        // 10层在50000-50100之间，间距约0.02%
        let err = GridPlan::build(
            &validator,
            &GridConfig::default(),
            "BTCUSDT",
            50000.0,
            50100.0,
            0.1,
            10,
            GridMode::Neutral,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_plan_rejects_levels_collapsed_by_price_precision() {
        let validator = plain_validator();
        // 0.10-0.11的间距约1.11%，过了百分比下限，但两位小数格式化后相邻层同价
        let err = GridPlan::build(
            &validator,
            &GridConfig::default(),
            "BTCUSDT",
            0.10,
            0.11,
            100.0,
            10,
            GridMode::Neutral,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("重合"));
    }

    #[test]
    fn test_plan_rejects_inverted_bounds() {
        let validator = plain_validator();
        let err = GridPlan::build(
            &validator,
            &GridConfig::default(),
            "BTCUSDT",
            55000.0,
            45000.0,
            0.1,
            10,
            GridMode::Neutral,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_neutral_grid_splits_around_current_price() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let grid = builder(exchange.clone());

        let state = grid
            .create_grid("BTCUSDT", 45000.0, 55000.0, 0.1, Some(10), GridMode::Neutral)
            .await
            .unwrap();

        // 45000..55000 十层，现价50000: 5层在下方买，5层在上方卖
        assert_eq!(state.buy_orders.len(), 5);
        assert_eq!(state.sell_orders.len(), 5);

        for spec in exchange.created_specs() {
            match spec {
                OrderSpec::Limit {
                    price,
                    side,
                    post_only,
                    time_in_force,
                    ..
                } => {
                    assert!(post_only);
                    assert_eq!(time_in_force, TimeInForce::GTC);
                    match side {
                        OrderSide::Buy => assert!(price < 50000.0),
                        OrderSide::Sell => assert!(price > 50000.0),
                    }
                }
                other => panic!("unexpected spec: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_level_at_current_price_is_skipped() {
        // 现价正好落在一个网格层上
        let exchange = Arc::new(MockExchange::new(50000.0));
        let grid = builder(exchange.clone());

        let state = grid
            .create_grid("BTCUSDT", 48000.0, 52000.0, 0.1, Some(5), GridMode::Neutral)
            .await
            .unwrap();

        // 层: 48000 49000 [50000跳过] 51000 52000
        assert_eq!(state.buy_orders.len(), 2);
        assert_eq!(state.sell_orders.len(), 2);
        assert_eq!(exchange.created_specs().len(), 4);
    }

    #[tokio::test]
    async fn test_long_grid_only_buys_below_or_at_price() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let grid = builder(exchange.clone());

        let state = grid
            .create_grid("BTCUSDT", 48000.0, 52000.0, 0.1, Some(5), GridMode::Long)
            .await
            .unwrap();

        // 等于现价的50000层在多头模式下也挂买单
        assert_eq!(state.buy_orders.len(), 3);
        assert!(state.sell_orders.is_empty());
    }

    #[tokio::test]
    async fn test_short_grid_only_sells_above_or_at_price() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let grid = builder(exchange.clone());

        let state = grid
            .create_grid("BTCUSDT", 48000.0, 52000.0, 0.1, Some(5), GridMode::Short)
            .await
            .unwrap();

        assert!(state.buy_orders.is_empty());
        assert_eq!(state.sell_orders.len(), 3);
    }

    #[tokio::test]
    async fn test_refill_replaces_filled_buy_and_remembers_it() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let grid = builder(exchange.clone());

        let mut state = grid
            .create_grid("BTCUSDT", 48000.0, 52000.0, 0.1, Some(5), GridMode::Neutral)
            .await
            .unwrap();
        let filled_buy = state.buy_orders[0].clone();

        // 第一个买单已成交，其余保持挂单
        exchange.script_order_status(order_result(
            filled_buy.order_id,
            "BTCUSDT",
            OrderSide::Buy,
            OrderStatus::Filled,
            filled_buy.quantity,
            filled_buy.price,
        ));

        let refilled = grid.refill(&mut state).await.unwrap();
        assert_eq!(refilled, 1);
        assert_eq!(state.buy_orders.len(), 1);
        assert_eq!(state.sell_orders.len(), 3);
        assert_eq!(state.filled.len(), 1);

        // 新卖单价格在成交价上方一个间距
        let new_sell = state.sell_orders.last().unwrap();
        assert!((new_sell.price - (filled_buy.price + state.plan.spacing)).abs() < 0.011);

        // 第二次巡检不得重复补挂
        let refilled_again = grid.refill(&mut state).await.unwrap();
        assert_eq!(refilled_again, 0);
        assert_eq!(state.filled.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_grid_only_touches_tracked_orders() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let grid = builder(exchange.clone());

        let mut state = grid
            .create_grid("BTCUSDT", 48000.0, 52000.0, 0.1, Some(5), GridMode::Neutral)
            .await
            .unwrap();
        let tracked_ids: Vec<i64> = state
            .buy_orders
            .iter()
            .chain(state.sell_orders.iter())
            .map(|o| o.order_id)
            .collect();

        let canceled = grid.cancel_grid(&mut state).await.unwrap();
        assert_eq!(canceled, 4);
        assert_eq!(state.open_order_count(), 0);

        let mut canceled_ids: Vec<i64> = exchange
            .canceled_orders()
            .into_iter()
            .map(|(_, id)| id)
            .collect();
        let mut expected = tracked_ids;
        canceled_ids.sort_unstable();
        expected.sort_unstable();
        assert_eq!(canceled_ids, expected);
    }

    #[tokio::test]
    async fn test_statistics_counts_fills() {
        let exchange = Arc::new(MockExchange::new(50000.0));
        let grid = builder(exchange.clone());

        let mut state = grid
            .create_grid("BTCUSDT", 48000.0, 52000.0, 0.1, Some(5), GridMode::Neutral)
            .await
            .unwrap();
        let filled_buy = state.buy_orders[0].clone();
        exchange.script_order_status(order_result(
            filled_buy.order_id,
            "BTCUSDT",
            OrderSide::Buy,
            OrderStatus::Filled,
            filled_buy.quantity,
            filled_buy.price,
        ));
        grid.refill(&mut state).await.unwrap();

        // statistics查询时对filled列表里的买单再次返回FILLED
        exchange.script_order_status(order_result(
            filled_buy.order_id,
            "BTCUSDT",
            OrderSide::Buy,
            OrderStatus::Filled,
            filled_buy.quantity,
            filled_buy.price,
        ));

        let stats = grid.statistics(&state).await.unwrap();
        assert_eq!(stats.total_buy_orders, 2);
        assert_eq!(stats.total_sell_orders, 3);
        assert_eq!(stats.filled_buys, 1);
        assert!((stats.total_buy_value - filled_buy.quantity * filled_buy.price).abs() < 1e-6);
    }
}
