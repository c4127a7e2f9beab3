use crate::core::types::{
    AccountInfo, MarginType, OrderResult, OrderSpec, PositionInfo, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 交易所能力接口
/// 引擎只依赖这组操作，不关心背后的具体API
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 获取交易所名称
    fn name(&self) -> &str;

    /// 创建订单，参数集由OrderSpec的变体决定
    async fn create_order(&self, spec: &OrderSpec) -> Result<OrderResult>;

    /// 取消订单；对已不存在的订单重复取消视为成功
    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()>;

    /// 取消交易对的全部挂单
    async fn cancel_all_orders(&self, symbol: &str) -> Result<()>;

    /// 查询订单状态
    async fn get_order(&self, symbol: &str, order_id: i64) -> Result<OrderResult>;

    /// 获取活跃订单，不给交易对时返回全部
    async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OrderResult>>;

    /// 获取最新成交价
    async fn get_ticker_price(&self, symbol: &str) -> Result<f64>;

    /// 获取持仓信息，无持仓时返回None
    async fn get_position(&self, symbol: &str) -> Result<Option<PositionInfo>>;

    /// 获取账户概要
    async fn get_account(&self) -> Result<AccountInfo>;

    /// 设置杠杆(仅期货)
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;

    /// 设置保证金模式；交易所提示无需变更时视为成功
    async fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<()>;

    /// 获取服务器时间
    async fn get_server_time(&self) -> Result<DateTime<Utc>>;

    /// 测试连接
    async fn ping(&self) -> Result<()>;
}
