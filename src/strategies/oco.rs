use std::sync::Arc;
use std::time::Duration;

use crate::core::error::ExecError;
use crate::core::types::{OrderResult, OrderSide, Result, TimeInForce};
use crate::core::validator::OrderValidator;
use crate::strategies::orders::OrderExecutor;
use crate::utils::ExecLogger;

/// OCO订单对：止盈腿加止损腿
#[derive(Debug, Clone)]
pub struct OcoPair {
    pub take_profit: OrderResult,
    pub stop_loss: OrderResult,
}

/// 监控到的触发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcoTrigger {
    TakeProfit,
    StopLoss,
}

/// 入场单加保护性OCO的组合结果
///
/// OCO失败不作废已成交的入场单，pair为None表示敞口暂无保护。
#[derive(Debug, Clone)]
pub struct OcoEntry {
    pub entry: OrderResult,
    pub pair: Option<OcoPair>,
}

enum OcoPoll {
    Triggered(OcoTrigger),
    Active,
    Gone,
}

/// OCO协调器
///
/// 止盈与止损作为联动对提交，两次挂单之间无持久状态。第二腿失败时
/// 补偿撤销第一腿，绝不留下只挂一半的保护单。
pub struct OcoCoordinator {
    orders: Arc<OrderExecutor>,
    validator: Arc<OrderValidator>,
    logger: ExecLogger,
}

impl OcoCoordinator {
    pub fn new(
        orders: Arc<OrderExecutor>,
        validator: Arc<OrderValidator>,
        logger: ExecLogger,
    ) -> Self {
        Self {
            orders,
            validator,
            logger,
        }
    }

    /// 挂出OCO对，side为离场方向
    ///
    /// 先挂止盈（触发后市价），再挂止损（市价止损），两腿均为只减仓。
    pub async fn place_oco(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        take_profit_price: f64,
        stop_loss_price: f64,
    ) -> Result<OcoPair> {
        self.validator.validate_symbol(symbol)?;
        self.validator.validate_price(take_profit_price)?;
        self.validator.validate_price(stop_loss_price)?;
        Self::validate_price_ordering(side, take_profit_price, stop_loss_price)?;
        self.validator.validate_quantity(quantity, None)?;

        self.logger.info(&format!(
            "挂出 {} OCO: TP={} SL={}",
            symbol, take_profit_price, stop_loss_price
        ));

        let take_profit = self
            .orders
            .place_take_profit(symbol, side, quantity, take_profit_price, None, true)
            .await?;

        let stop_loss = match self
            .orders
            .place_stop_market(symbol, side, quantity, stop_loss_price, true)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                self.logger.error(&format!(
                    "止损腿挂单失败，补偿撤销止盈单 #{}",
                    take_profit.order_id
                ));
                if let Err(cancel_err) = self
                    .orders
                    .cancel_order(symbol, take_profit.order_id)
                    .await
                {
                    self.logger.error(&format!(
                        "补偿撤销失败，止盈单 #{} 可能仍在挂单: {}",
                        take_profit.order_id, cancel_err
                    ));
                }
                return Err(e);
            }
        };

        self.logger.info(&format!(
            "OCO挂单完成: TP #{} / SL #{}",
            take_profit.order_id, stop_loss.order_id
        ));

        Ok(OcoPair {
            take_profit,
            stop_loss,
        })
    }

    /// 先下入场单，成交方向的反向挂保护性OCO
    pub async fn place_oco_with_entry(
        &self,
        symbol: &str,
        entry_side: OrderSide,
        quantity: f64,
        entry_price: Option<f64>,
        take_profit_price: f64,
        stop_loss_price: f64,
    ) -> Result<OcoEntry> {
        let entry = match entry_price {
            None => {
                self.orders
                    .place_market(symbol, entry_side, quantity, false)
                    .await?
            }
            Some(price) => {
                self.orders
                    .place_limit(
                        symbol,
                        entry_side,
                        quantity,
                        price,
                        TimeInForce::GTC,
                        false,
                        false,
                    )
                    .await?
            }
        };
        self.logger
            .info(&format!("入场单已挂出: #{}", entry.order_id));

        let exit_side = entry_side.opposite();
        match self
            .place_oco(
                symbol,
                exit_side,
                quantity,
                take_profit_price,
                stop_loss_price,
            )
            .await
        {
            Ok(pair) => Ok(OcoEntry {
                entry,
                pair: Some(pair),
            }),
            Err(e) => {
                self.logger.warn(&format!(
                    "保护性OCO挂单失败，入场单 #{} 仍然有效: {}",
                    entry.order_id, e
                ));
                Ok(OcoEntry { entry, pair: None })
            }
        }
    }

    /// 轮询一次两腿状态，一腿成交则撤销另一腿
    pub async fn monitor_once(
        &self,
        symbol: &str,
        tp_order_id: i64,
        sl_order_id: i64,
    ) -> Result<Option<OcoTrigger>> {
        match self.poll(symbol, tp_order_id, sl_order_id).await? {
            OcoPoll::Triggered(trigger) => Ok(Some(trigger)),
            _ => Ok(None),
        }
    }

    /// 以固定间隔轮询，直到一腿触发或两腿都已离场
    ///
    /// 连续3次查询失败才放弃，单次网络抖动不中断监控。
    pub async fn watch(
        &self,
        symbol: &str,
        tp_order_id: i64,
        sl_order_id: i64,
        poll_interval: Duration,
    ) -> Result<Option<OcoTrigger>> {
        let mut consecutive_failures = 0u32;

        loop {
            match self.poll(symbol, tp_order_id, sl_order_id).await {
                Ok(OcoPoll::Triggered(trigger)) => return Ok(Some(trigger)),
                Ok(OcoPoll::Gone) => {
                    self.logger
                        .info(&format!("{} OCO两腿均已离场，停止监控", symbol));
                    return Ok(None);
                }
                Ok(OcoPoll::Active) => {
                    consecutive_failures = 0;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= 3 {
                        return Err(e);
                    }
                    self.logger.warn(&format!(
                        "OCO状态查询失败({}/3): {}",
                        consecutive_failures, e
                    ));
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn poll(&self, symbol: &str, tp_order_id: i64, sl_order_id: i64) -> Result<OcoPoll> {
        let tp = self.orders.get_order_status(symbol, tp_order_id).await?;
        if tp.status.is_filled() {
            self.logger.info(&format!(
                "止盈单 #{} 已成交，撤销止损单 #{}",
                tp_order_id, sl_order_id
            ));
            if let Err(e) = self.orders.cancel_order(symbol, sl_order_id).await {
                self.logger
                    .warn(&format!("撤销止损单 #{} 失败: {}", sl_order_id, e));
            }
            return Ok(OcoPoll::Triggered(OcoTrigger::TakeProfit));
        }

        let sl = self.orders.get_order_status(symbol, sl_order_id).await?;
        if sl.status.is_filled() {
            self.logger.info(&format!(
                "止损单 #{} 已成交，撤销止盈单 #{}",
                sl_order_id, tp_order_id
            ));
            if let Err(e) = self.orders.cancel_order(symbol, tp_order_id).await {
                self.logger
                    .warn(&format!("撤销止盈单 #{} 失败: {}", tp_order_id, e));
            }
            return Ok(OcoPoll::Triggered(OcoTrigger::StopLoss));
        }

        if !tp.status.is_open() && !sl.status.is_open() {
            return Ok(OcoPoll::Gone);
        }

        Ok(OcoPoll::Active)
    }

    /// 离场方向为SELL时止盈须高于止损，BUY时相反
    fn validate_price_ordering(
        side: OrderSide,
        take_profit_price: f64,
        stop_loss_price: f64,
    ) -> Result<()> {
        match side {
            OrderSide::Sell if take_profit_price <= stop_loss_price => Err(ExecError::validation(
                "take_profit_price",
                "卖出OCO要求止盈价高于止损价",
            )),
            OrderSide::Buy if stop_loss_price <= take_profit_price => Err(ExecError::validation(
                "stop_loss_price",
                "买入OCO要求止损价高于止盈价",
            )),
            _ => Ok(()),
        }
    }
}
