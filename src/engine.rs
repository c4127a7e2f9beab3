//! 执行引擎
//!
//! 装配交易所客户端、校验器、日志上下文与各策略执行器，
//! 并提供账户层操作（余额、持仓、平仓、杠杆、风险指标）。

use std::sync::Arc;

use crate::core::config::{ApiKeys, AppConfig, ExchangeConfig};
use crate::core::error::ExecError;
use crate::core::exchange::Exchange;
use crate::core::types::{AccountInfo, MarginType, OrderResult, OrderSide, PositionInfo, Result, RiskMetrics};
use crate::core::validator::OrderValidator;
use crate::exchanges::BinanceFutures;
use crate::strategies::{GridBuilder, OcoCoordinator, OrderExecutor, TwapScheduler};
use crate::utils::ExecLogger;

/// 执行引擎，持有全部组件的唯一装配点
///
/// 校验器与交易所客户端经`Arc`在各执行器间共享，日志上下文
/// 在此创建后显式传入各组件。
pub struct ExecutionEngine {
    config: AppConfig,
    exchange: Arc<dyn Exchange>,
    validator: Arc<OrderValidator>,
    logger: ExecLogger,
    orders: Arc<OrderExecutor>,
    oco: OcoCoordinator,
    twap: TwapScheduler,
    grid: GridBuilder,
}

impl ExecutionEngine {
    /// 按环境变量创建Binance客户端并装配引擎
    pub fn new(config: AppConfig) -> Result<Self> {
        let api_keys = ApiKeys::from_env()?;
        let exchange_config = ExchangeConfig::from_env();

        if exchange_config.testnet {
            log::info!("使用测试网环境: {}", exchange_config.base_url);
        } else {
            log::warn!("使用正式网环境，订单将真实成交");
        }

        let exchange = Arc::new(BinanceFutures::new(exchange_config, api_keys)?);
        Self::with_exchange(config, exchange)
    }

    /// 用给定的交易所实现装配引擎
    pub fn with_exchange(config: AppConfig, exchange: Arc<dyn Exchange>) -> Result<Self> {
        let validator = Arc::new(OrderValidator::new(config.validation.clone()));
        let logger = ExecLogger::new("engine", &config.logging)?;

        let orders = Arc::new(OrderExecutor::new(
            exchange.clone(),
            validator.clone(),
            logger.clone(),
        ));
        let oco = OcoCoordinator::new(orders.clone(), validator.clone(), logger.clone());
        let twap = TwapScheduler::new(
            orders.clone(),
            exchange.clone(),
            validator.clone(),
            logger.clone(),
            config.execution.twap.clone(),
        );
        let grid = GridBuilder::new(
            orders.clone(),
            exchange.clone(),
            validator.clone(),
            logger.clone(),
            config.execution.grid.clone(),
        );

        logger.info(&format!("执行引擎初始化完成, 交易所: {}", exchange.name()));

        Ok(Self {
            config,
            exchange,
            validator,
            logger,
            orders,
            oco,
            twap,
            grid,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn orders(&self) -> &OrderExecutor {
        &self.orders
    }

    pub fn oco(&self) -> &OcoCoordinator {
        &self.oco
    }

    pub fn twap(&self) -> &TwapScheduler {
        &self.twap
    }

    pub fn grid(&self) -> &GridBuilder {
        &self.grid
    }

    /// 查询账户余额
    pub async fn account(&self) -> Result<AccountInfo> {
        let account = self.exchange.get_account().await?;
        self.logger.info(&format!(
            "账户余额: 可用 {:.2} USDT, 总额 {:.2} USDT",
            account.available_balance, account.total_wallet_balance
        ));
        Ok(account)
    }

    /// 查询指定交易对的持仓，无持仓返回None
    pub async fn position(&self, symbol: &str) -> Result<Option<PositionInfo>> {
        self.validator.validate_symbol(symbol)?;

        let position = self.exchange.get_position(symbol).await?;
        match &position {
            Some(pos) => self.logger.info(&format!(
                "持仓: {} {} @ {}, 浮动盈亏 {:.2} USDT",
                pos.position_amount, pos.symbol, pos.entry_price, pos.unrealized_profit
            )),
            None => self.logger.info(&format!("{} 无持仓", symbol)),
        }
        Ok(position)
    }

    /// 查询最新成交价
    pub async fn current_price(&self, symbol: &str) -> Result<f64> {
        self.validator.validate_symbol(symbol)?;

        let price = self.exchange.get_ticker_price(symbol).await?;
        self.logger.debug(&format!("{} 最新价格: {}", symbol, price));
        Ok(price)
    }

    /// 按比例平仓
    ///
    /// 以持仓反方向的只减仓市价单平掉 |持仓| × percentage% 的数量，
    /// 数量按精度格式化。无持仓时返回验证错误。
    pub async fn close_position(&self, symbol: &str, percentage: f64) -> Result<OrderResult> {
        self.validator.validate_symbol(symbol)?;
        self.validator.validate_percentage(percentage)?;

        let position = self
            .exchange
            .get_position(symbol)
            .await?
            .ok_or_else(|| ExecError::validation("position", format!("{} 无持仓可平", symbol)))?;

        let close_quantity = self
            .validator
            .format_quantity(position.position_amount.abs() * percentage / 100.0);
        let side = if position.position_amount > 0.0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };

        self.logger.info(&format!(
            "平仓 {}% 持仓: {} {}",
            percentage, close_quantity, symbol
        ));
        self.orders
            .place_market(symbol, side, close_quantity, true)
            .await
    }

    /// 设置杠杆，上限取配置的max_leverage
    pub async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        self.validator.validate_symbol(symbol)?;
        self.validator
            .validate_leverage(leverage, self.config.trading.max_leverage)?;

        self.exchange.set_leverage(symbol, leverage).await?;
        self.logger
            .info(&format!("{} 杠杆已设置为 {}x", symbol, leverage));
        Ok(())
    }

    /// 设置保证金模式，重复设置由客户端视为成功
    pub async fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<()> {
        self.validator.validate_symbol(symbol)?;

        self.exchange.set_margin_type(symbol, margin_type).await?;
        self.logger.info(&format!(
            "{} 保证金模式已设置为 {}",
            symbol,
            margin_type.as_str()
        ));
        Ok(())
    }

    /// 计算当前持仓的风险指标，无持仓返回None
    ///
    /// 持仓价值按最新成交价计，账户价值取钱包总额；账户价值为0时
    /// 各占比记为0。
    pub async fn risk_metrics(&self, symbol: &str) -> Result<Option<RiskMetrics>> {
        self.validator.validate_symbol(symbol)?;

        let position = match self.exchange.get_position(symbol).await? {
            Some(position) => position,
            None => return Ok(None),
        };
        let account = self.exchange.get_account().await?;
        let current_price = self.exchange.get_ticker_price(symbol).await?;

        let position_value = position.position_amount.abs() * current_price;
        let account_value = account.total_wallet_balance;
        let (position_pct, pnl_pct) = if account_value > 0.0 {
            (
                position_value / account_value * 100.0,
                position.unrealized_profit / account_value * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        let metrics = RiskMetrics {
            symbol: symbol.to_string(),
            position_value,
            account_value,
            position_pct,
            unrealized_pnl: position.unrealized_profit,
            pnl_pct,
            leverage: position.leverage,
            effective_exposure: position_value * position.leverage as f64,
        };

        self.logger.info(&format!(
            "风险指标: 持仓占账户 {:.2}%, 浮动盈亏 {:.2}%",
            metrics.position_pct, metrics.pnl_pct
        ));
        Ok(Some(metrics))
    }

    /// 下单前的账户级风险检查
    ///
    /// 依次检查订单价值上限、可用余额、挂单数上限，任一越界
    /// 返回验证错误。
    pub async fn check_risk_limits(&self, symbol: &str, quantity: f64, price: f64) -> Result<()> {
        let order_value = quantity * price;

        let max_position = self.config.risk.max_position_size_usdt;
        if order_value > max_position {
            return Err(ExecError::validation(
                "order_value",
                format!(
                    "订单价值({:.2} USDT)超过最大持仓限制({} USDT)",
                    order_value, max_position
                ),
            ));
        }

        let account = self.exchange.get_account().await?;
        if order_value > account.available_balance {
            return Err(ExecError::validation(
                "order_value",
                format!(
                    "可用余额不足: 可用 {:.2} USDT, 需要 {:.2} USDT",
                    account.available_balance, order_value
                ),
            ));
        }

        let open_orders = self.exchange.get_open_orders(Some(symbol)).await?;
        if open_orders.len() >= self.config.risk.max_open_orders {
            return Err(ExecError::validation(
                "open_orders",
                format!("已达最大挂单数({})", self.config.risk.max_open_orders),
            ));
        }

        Ok(())
    }
}
