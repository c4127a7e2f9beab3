use chrono::{DateTime, Utc};
/// 统一的类型定义模块
/// 订单、持仓、账户相关的数据结构
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::error::ExecError;

// ============= 基础类型定义 =============

/// 结果类型别名
pub type Result<T> = std::result::Result<T, crate::core::error::ExecError>;

/// 订单方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// 交易所侧的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    /// 相反方向（平仓、OCO出场时使用）
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(ExecError::validation(
                "side",
                format!("无效的订单方向: {} (应为BUY或SELL)", s),
            )),
        }
    }
}

/// 时间有效性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GTC, // Good Till Cancel
    IOC, // Immediate Or Cancel
    FOK, // Fill Or Kill
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GTC => "GTC",
            TimeInForce::IOC => "IOC",
            TimeInForce::FOK => "FOK",
        }
    }
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeInForce {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GTC" => Ok(TimeInForce::GTC),
            "IOC" => Ok(TimeInForce::IOC),
            "FOK" => Ok(TimeInForce::FOK),
            _ => Err(ExecError::validation(
                "time_in_force",
                format!("无效的时间有效性: {} (应为GTC、IOC或FOK)", s),
            )),
        }
    }
}

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// 从交易所返回的状态字符串解析
    pub fn from_wire(s: &str) -> OrderStatus {
        match s {
            "NEW" => OrderStatus::New,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
            _ => OrderStatus::New,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_filled(&self) -> bool {
        *self == OrderStatus::Filled
    }

    /// 订单是否仍挂在交易所
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

/// 保证金模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginType {
    Isolated,
    Crossed,
}

impl MarginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginType::Isolated => "ISOLATED",
            MarginType::Crossed => "CROSSED",
        }
    }
}

impl FromStr for MarginType {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ISOLATED" => Ok(MarginType::Isolated),
            "CROSSED" | "CROSS" => Ok(MarginType::Crossed),
            _ => Err(ExecError::validation(
                "margin_type",
                format!("无效的保证金模式: {} (应为ISOLATED或CROSSED)", s),
            )),
        }
    }
}

/// 网格方向模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridMode {
    /// 现价下方挂买单、上方挂卖单
    Neutral,
    /// 仅在现价及下方挂买单
    Long,
    /// 仅在现价及上方挂卖单
    Short,
}

impl GridMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridMode::Neutral => "neutral",
            GridMode::Long => "long",
            GridMode::Short => "short",
        }
    }
}

impl FromStr for GridMode {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "neutral" => Ok(GridMode::Neutral),
            "long" => Ok(GridMode::Long),
            "short" => Ok(GridMode::Short),
            _ => Err(ExecError::validation(
                "mode",
                format!("无效的网格模式: {} (应为neutral、long或short)", s),
            )),
        }
    }
}

// ============= 订单请求 =============

/// 按订单类型封闭字段集的下单请求
/// 每个变体只携带该类型真正需要的参数
#[derive(Debug, Clone, PartialEq)]
pub enum OrderSpec {
    Market {
        symbol: String,
        side: OrderSide,
        quantity: f64,
        reduce_only: bool,
    },
    Limit {
        symbol: String,
        side: OrderSide,
        quantity: f64,
        price: f64,
        time_in_force: TimeInForce,
        reduce_only: bool,
        post_only: bool,
    },
    /// 触发后转限价单（Binance期货的STOP）
    StopLimit {
        symbol: String,
        side: OrderSide,
        quantity: f64,
        price: f64,
        stop_price: f64,
        time_in_force: TimeInForce,
        reduce_only: bool,
    },
    StopMarket {
        symbol: String,
        side: OrderSide,
        quantity: f64,
        stop_price: f64,
        reduce_only: bool,
    },
    /// 止盈单；带price为TAKE_PROFIT，不带为TAKE_PROFIT_MARKET
    TakeProfit {
        symbol: String,
        side: OrderSide,
        quantity: f64,
        stop_price: f64,
        price: Option<f64>,
        reduce_only: bool,
    },
}

impl OrderSpec {
    pub fn symbol(&self) -> &str {
        match self {
            OrderSpec::Market { symbol, .. }
            | OrderSpec::Limit { symbol, .. }
            | OrderSpec::StopLimit { symbol, .. }
            | OrderSpec::StopMarket { symbol, .. }
            | OrderSpec::TakeProfit { symbol, .. } => symbol,
        }
    }

    pub fn side(&self) -> OrderSide {
        match self {
            OrderSpec::Market { side, .. }
            | OrderSpec::Limit { side, .. }
            | OrderSpec::StopLimit { side, .. }
            | OrderSpec::StopMarket { side, .. }
            | OrderSpec::TakeProfit { side, .. } => *side,
        }
    }

    pub fn quantity(&self) -> f64 {
        match self {
            OrderSpec::Market { quantity, .. }
            | OrderSpec::Limit { quantity, .. }
            | OrderSpec::StopLimit { quantity, .. }
            | OrderSpec::StopMarket { quantity, .. }
            | OrderSpec::TakeProfit { quantity, .. } => *quantity,
        }
    }

    /// 交易所侧的订单类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            OrderSpec::Market { .. } => "MARKET",
            OrderSpec::Limit { .. } => "LIMIT",
            OrderSpec::StopLimit { .. } => "STOP",
            OrderSpec::StopMarket { .. } => "STOP_MARKET",
            OrderSpec::TakeProfit { price: Some(_), .. } => "TAKE_PROFIT",
            OrderSpec::TakeProfit { price: None, .. } => "TAKE_PROFIT_MARKET",
        }
    }
}

// ============= 订单与账户数据 =============

/// 交易所返回的订单数据
/// 引擎只读取字段驱动后续决策，从不修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: String,
    pub status: OrderStatus,
    pub orig_qty: f64,
    pub executed_qty: f64,
    pub avg_price: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub update_time: Option<DateTime<Utc>>,
}

/// 持仓信息（USDT本位合约）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub symbol: String,
    /// 带符号的持仓数量，正为多头、负为空头
    pub position_amount: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_profit: f64,
    pub leverage: u32,
    pub margin_type: String,
}

/// 期货账户概要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub total_wallet_balance: f64,
    pub available_balance: f64,
    pub total_unrealized_profit: f64,
    pub total_margin_balance: f64,
    pub max_withdraw_amount: f64,
}

/// 单一交易对的风险概览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub symbol: String,
    pub position_value: f64,
    pub account_value: f64,
    pub position_pct: f64,
    pub unrealized_pnl: f64,
    pub pnl_pct: f64,
    pub leverage: u32,
    pub effective_exposure: f64,
}
