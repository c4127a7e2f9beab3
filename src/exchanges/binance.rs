use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::core::config::{ApiKeys, ExchangeConfig};
use crate::core::error::ExecError;
use crate::core::exchange::Exchange;
use crate::core::types::{
    AccountInfo, MarginType, OrderResult, OrderSide, OrderSpec, OrderStatus, PositionInfo, Result,
};
use crate::utils::signature::SignatureHelper;

/// 取消一个已不存在的订单时币安返回的错误码
const CODE_UNKNOWN_ORDER: i64 = -2011;
/// 保证金模式已经是目标模式时币安返回的错误码
const CODE_NO_NEED_CHANGE_MARGIN: i64 = -4046;

/// Binance USDT本位合约交易所
///
/// 所有签名请求走 `/fapi` 接口，时间戳使用与服务器校正后的本地时间。
pub struct BinanceFutures {
    name: String,
    config: ExchangeConfig,
    api_keys: ApiKeys,
    client: reqwest::Client,
    /// 与币安服务器的时间偏移（毫秒），首次签名请求时同步
    time_offset: Mutex<Option<i64>>,
}

impl BinanceFutures {
    pub fn new(config: ExchangeConfig, api_keys: ApiKeys) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("RustExec/0.1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            name: "binance_futures".to_string(),
            config,
            api_keys,
            client,
            time_offset: Mutex::new(None),
        })
    }

    /// 获取校正后的毫秒时间戳
    ///
    /// 首次调用时向服务器同步一次时间偏移；同步失败则退回本地时间，
    /// 下次请求再重试同步。
    async fn corrected_timestamp_ms(&self) -> i64 {
        let cached = *self.time_offset.lock().expect("Lock poisoned");
        if let Some(offset) = cached {
            return Utc::now().timestamp_millis() + offset;
        }

        match self.server_time_ms().await {
            Ok(server_ms) => {
                let offset = server_ms - Utc::now().timestamp_millis();
                *self.time_offset.lock().expect("Lock poisoned") = Some(offset);
                log::debug!("Binance服务器时间同步完成，偏移: {}ms", offset);
                Utc::now().timestamp_millis() + offset
            }
            Err(e) => {
                log::warn!("同步Binance服务器时间失败: {}，暂用本地时间", e);
                Utc::now().timestamp_millis()
            }
        }
    }

    async fn server_time_ms(&self) -> Result<i64> {
        #[derive(Deserialize)]
        struct ServerTime {
            #[serde(rename = "serverTime")]
            server_time: i64,
        }

        let response: ServerTime = self.send_public_request("/fapi/v1/time", None).await?;
        Ok(response.server_time)
    }

    /// 发送认证请求
    async fn send_signed_request<T>(
        &self,
        method: &str,
        endpoint: &str,
        mut params: HashMap<String, String>,
    ) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let timestamp = self.corrected_timestamp_ms().await.to_string();
        params.insert("timestamp".to_string(), timestamp);
        params.insert(
            "recvWindow".to_string(),
            self.config.recv_window_ms.to_string(),
        );

        // 按字母顺序排序参数以生成签名
        let mut sorted_params: Vec<(&String, &String)> = params.iter().collect();
        sorted_params.sort_by_key(|&(k, _)| k);

        let query_string: Vec<String> = sorted_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let query_string = query_string.join("&");

        let signature =
            SignatureHelper::binance_signature(&self.api_keys.api_secret, &query_string);
        let final_query = format!("{}&signature={}", query_string, signature);
        let url = format!("{}{}?{}", self.config.base_url, endpoint, final_query);

        let response = match method.to_uppercase().as_str() {
            "GET" => {
                self.client
                    .get(&url)
                    .header("X-MBX-APIKEY", &self.api_keys.api_key)
                    .send()
                    .await?
            }
            "POST" => {
                self.client
                    .post(&url)
                    .header("X-MBX-APIKEY", &self.api_keys.api_key)
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .send()
                    .await?
            }
            "DELETE" => {
                self.client
                    .delete(&url)
                    .header("X-MBX-APIKEY", &self.api_keys.api_key)
                    .send()
                    .await?
            }
            _ => return Err(ExecError::Other(format!("不支持的HTTP方法: {}", method))),
        };

        Self::parse_response(response).await
    }

    /// 发送公共请求
    async fn send_public_request<T>(
        &self,
        endpoint: &str,
        params: Option<HashMap<String, String>>,
    ) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut url = format!("{}{}", self.config.base_url, endpoint);

        if let Some(params) = params {
            if !params.is_empty() {
                let query_string = SignatureHelper::build_query_string(&params);
                url = format!("{}?{}", url, query_string);
            }
        }

        let response = self.client.get(&url).send().await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T>(response: reqwest::Response) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        if response.status().is_success() {
            let data = response.json::<T>().await?;
            Ok(data)
        } else {
            let status_code = response.status().as_u16() as i64;
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "未知错误".to_string());
            Err(Self::rejection_from_body(status_code, &error_text))
        }
    }

    /// 解析币安错误响应体 `{"code": -xxxx, "msg": "..."}`
    ///
    /// 解析失败时退化为HTTP状态码加原始响应文本。
    fn rejection_from_body(status_code: i64, body: &str) -> ExecError {
        #[derive(Deserialize)]
        struct BinanceError {
            code: i64,
            msg: String,
        }

        match serde_json::from_str::<BinanceError>(body) {
            Ok(parsed) => ExecError::ExchangeRejected {
                code: parsed.code,
                message: parsed.msg,
            },
            Err(_) => ExecError::ExchangeRejected {
                code: status_code,
                message: body.to_string(),
            },
        }
    }

    /// 将订单描述映射为币安下单参数
    ///
    /// 每种订单类型对应一组固定参数；post_only通过timeInForce=GTX表达。
    fn build_order_params(spec: &OrderSpec) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("symbol".to_string(), spec.symbol().to_string());
        params.insert("side".to_string(), spec.side().as_str().to_string());
        params.insert("type".to_string(), spec.type_name().to_string());
        params.insert("quantity".to_string(), spec.quantity().to_string());

        match spec {
            OrderSpec::Market { reduce_only, .. } => {
                if *reduce_only {
                    params.insert("reduceOnly".to_string(), "true".to_string());
                }
            }
            OrderSpec::Limit {
                price,
                time_in_force,
                reduce_only,
                post_only,
                ..
            } => {
                params.insert("price".to_string(), price.to_string());
                let tif = if *post_only {
                    "GTX"
                } else {
                    time_in_force.as_str()
                };
                params.insert("timeInForce".to_string(), tif.to_string());
                if *reduce_only {
                    params.insert("reduceOnly".to_string(), "true".to_string());
                }
            }
            OrderSpec::StopLimit {
                price,
                stop_price,
                time_in_force,
                reduce_only,
                ..
            } => {
                params.insert("price".to_string(), price.to_string());
                params.insert("stopPrice".to_string(), stop_price.to_string());
                params.insert(
                    "timeInForce".to_string(),
                    time_in_force.as_str().to_string(),
                );
                if *reduce_only {
                    params.insert("reduceOnly".to_string(), "true".to_string());
                }
            }
            OrderSpec::StopMarket {
                stop_price,
                reduce_only,
                ..
            } => {
                params.insert("stopPrice".to_string(), stop_price.to_string());
                if *reduce_only {
                    params.insert("reduceOnly".to_string(), "true".to_string());
                }
            }
            OrderSpec::TakeProfit {
                stop_price,
                price,
                reduce_only,
                ..
            } => {
                params.insert("stopPrice".to_string(), stop_price.to_string());
                if let Some(price) = price {
                    params.insert("price".to_string(), price.to_string());
                    params.insert("timeInForce".to_string(), "GTC".to_string());
                }
                if *reduce_only {
                    params.insert("reduceOnly".to_string(), "true".to_string());
                }
            }
        }

        params
    }
}

/// 币安订单响应，下单、查单、撤单共用同一结构
#[derive(Debug, Deserialize)]
struct BinanceOrderResponse {
    #[serde(rename = "orderId")]
    order_id: i64,
    symbol: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    status: String,
    #[serde(rename = "origQty")]
    orig_qty: String,
    #[serde(rename = "executedQty")]
    executed_qty: String,
    #[serde(rename = "avgPrice", default)]
    avg_price: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(rename = "stopPrice", default)]
    stop_price: Option<String>,
    #[serde(rename = "updateTime", default)]
    update_time: Option<i64>,
}

impl BinanceOrderResponse {
    fn into_order_result(self) -> OrderResult {
        let side = match self.side.as_str() {
            "SELL" => OrderSide::Sell,
            _ => OrderSide::Buy,
        };

        OrderResult {
            order_id: self.order_id,
            symbol: self.symbol,
            side,
            order_type: self.order_type,
            status: OrderStatus::from_wire(&self.status),
            orig_qty: self.orig_qty.parse().unwrap_or(0.0),
            executed_qty: self.executed_qty.parse().unwrap_or(0.0),
            avg_price: self
                .avg_price
                .as_deref()
                .and_then(|p| p.parse().ok())
                .unwrap_or(0.0),
            price: parse_nonzero(self.price),
            stop_price: parse_nonzero(self.stop_price),
            update_time: self.update_time.and_then(DateTime::from_timestamp_millis),
        }
    }
}

/// 币安用 "0" / "0.00000000" 表示无此价格字段
fn parse_nonzero(value: Option<String>) -> Option<f64> {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|p| *p != 0.0)
}

#[async_trait]
impl Exchange for BinanceFutures {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_order(&self, spec: &OrderSpec) -> Result<OrderResult> {
        let params = Self::build_order_params(spec);
        let response: BinanceOrderResponse = self
            .send_signed_request("POST", "/fapi/v1/order", params)
            .await?;
        Ok(response.into_order_result())
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()> {
        let mut params = HashMap::new();
        params.insert("symbol".to_string(), symbol.to_string());
        params.insert("orderId".to_string(), order_id.to_string());

        let result: Result<BinanceOrderResponse> = self
            .send_signed_request("DELETE", "/fapi/v1/order", params)
            .await;

        match result {
            Ok(_) => Ok(()),
            // 订单已成交或已被取消，重复撤单视为成功
            Err(ExecError::ExchangeRejected {
                code: CODE_UNKNOWN_ORDER,
                ..
            }) => {
                log::debug!("{} 订单 {} 已不存在，撤单跳过", symbol, order_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<()> {
        #[derive(Deserialize)]
        struct BinanceAck {
            code: i64,
            msg: String,
        }

        let mut params = HashMap::new();
        params.insert("symbol".to_string(), symbol.to_string());

        let ack: BinanceAck = self
            .send_signed_request("DELETE", "/fapi/v1/allOpenOrders", params)
            .await?;
        log::debug!("{} 撤销全部挂单: code={} msg={}", symbol, ack.code, ack.msg);
        Ok(())
    }

    async fn get_order(&self, symbol: &str, order_id: i64) -> Result<OrderResult> {
        let mut params = HashMap::new();
        params.insert("symbol".to_string(), symbol.to_string());
        params.insert("orderId".to_string(), order_id.to_string());

        let response: BinanceOrderResponse = self
            .send_signed_request("GET", "/fapi/v1/order", params)
            .await?;
        Ok(response.into_order_result())
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OrderResult>> {
        let mut params = HashMap::new();
        if let Some(symbol) = symbol {
            params.insert("symbol".to_string(), symbol.to_string());
        }

        let response: Vec<BinanceOrderResponse> = self
            .send_signed_request("GET", "/fapi/v1/openOrders", params)
            .await?;
        Ok(response
            .into_iter()
            .map(BinanceOrderResponse::into_order_result)
            .collect())
    }

    async fn get_ticker_price(&self, symbol: &str) -> Result<f64> {
        #[derive(Deserialize)]
        struct BinanceTicker {
            price: String,
        }

        let mut params = HashMap::new();
        params.insert("symbol".to_string(), symbol.to_string());

        let ticker: BinanceTicker = self
            .send_public_request("/fapi/v1/ticker/price", Some(params))
            .await?;
        ticker
            .price
            .parse()
            .map_err(|_| ExecError::Other(format!("无法解析 {} 行情价格: {}", symbol, ticker.price)))
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<PositionInfo>> {
        #[derive(Deserialize)]
        struct BinancePosition {
            symbol: String,
            #[serde(rename = "positionAmt")]
            position_amt: String,
            #[serde(rename = "entryPrice")]
            entry_price: String,
            #[serde(rename = "markPrice")]
            mark_price: String,
            #[serde(rename = "unRealizedProfit")]
            unrealized_profit: String,
            leverage: String,
            #[serde(rename = "marginType", default)]
            margin_type: String,
        }

        let mut params = HashMap::new();
        params.insert("symbol".to_string(), symbol.to_string());

        let positions: Vec<BinancePosition> = self
            .send_signed_request("GET", "/fapi/v2/positionRisk", params)
            .await?;

        // 只返回有持仓的条目，双向持仓模式下取第一条非零记录
        for pos in positions {
            let amount = pos.position_amt.parse::<f64>().unwrap_or(0.0);
            if amount.abs() > 0.0 {
                return Ok(Some(PositionInfo {
                    symbol: pos.symbol,
                    position_amount: amount,
                    entry_price: pos.entry_price.parse().unwrap_or(0.0),
                    mark_price: pos.mark_price.parse().unwrap_or(0.0),
                    unrealized_profit: pos.unrealized_profit.parse().unwrap_or(0.0),
                    leverage: pos.leverage.parse().unwrap_or(1),
                    margin_type: pos.margin_type,
                }));
            }
        }

        Ok(None)
    }

    async fn get_account(&self) -> Result<AccountInfo> {
        #[derive(Deserialize)]
        struct BinanceAccount {
            #[serde(rename = "totalWalletBalance")]
            total_wallet_balance: String,
            #[serde(rename = "availableBalance")]
            available_balance: String,
            #[serde(rename = "totalUnrealizedProfit")]
            total_unrealized_profit: String,
            #[serde(rename = "totalMarginBalance")]
            total_margin_balance: String,
            #[serde(rename = "maxWithdrawAmount")]
            max_withdraw_amount: String,
        }

        let account: BinanceAccount = self
            .send_signed_request("GET", "/fapi/v2/account", HashMap::new())
            .await?;

        Ok(AccountInfo {
            total_wallet_balance: account.total_wallet_balance.parse().unwrap_or(0.0),
            available_balance: account.available_balance.parse().unwrap_or(0.0),
            total_unrealized_profit: account.total_unrealized_profit.parse().unwrap_or(0.0),
            total_margin_balance: account.total_margin_balance.parse().unwrap_or(0.0),
            max_withdraw_amount: account.max_withdraw_amount.parse().unwrap_or(0.0),
        })
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        #[derive(Deserialize)]
        struct BinanceLeverageResponse {
            leverage: u32,
            #[serde(rename = "maxNotionalValue")]
            max_notional_value: String,
        }

        let mut params = HashMap::new();
        params.insert("symbol".to_string(), symbol.to_string());
        params.insert("leverage".to_string(), leverage.to_string());

        let response: BinanceLeverageResponse = self
            .send_signed_request("POST", "/fapi/v1/leverage", params)
            .await?;
        log::info!(
            "{} 杠杆已设置为 {}x，最大名义价值: {}",
            symbol,
            response.leverage,
            response.max_notional_value
        );
        Ok(())
    }

    async fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<()> {
        #[derive(Deserialize)]
        struct BinanceAck {
            code: i64,
            msg: String,
        }

        let mut params = HashMap::new();
        params.insert("symbol".to_string(), symbol.to_string());
        params.insert("marginType".to_string(), margin_type.as_str().to_string());

        let result: Result<BinanceAck> = self
            .send_signed_request("POST", "/fapi/v1/marginType", params)
            .await;

        match result {
            Ok(ack) => {
                log::debug!(
                    "{} 保证金模式切换为 {}: code={} msg={}",
                    symbol,
                    margin_type.as_str(),
                    ack.code,
                    ack.msg
                );
                Ok(())
            }
            // 已经是目标模式，视为成功
            Err(ExecError::ExchangeRejected {
                code: CODE_NO_NEED_CHANGE_MARGIN,
                ..
            }) => {
                log::debug!("{} 保证金模式已是 {}，无需变更", symbol, margin_type.as_str());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>> {
        let server_ms = self.server_time_ms().await?;
        DateTime::from_timestamp_millis(server_ms)
            .ok_or_else(|| ExecError::Other(format!("非法的服务器时间戳: {}", server_ms)))
    }

    async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self.send_public_request("/fapi/v1/ping", None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TimeInForce;

    #[test]
    fn test_market_order_params() {
        let spec = OrderSpec::Market {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            quantity: 0.5,
            reduce_only: false,
        };

        let params = BinanceFutures::build_order_params(&spec);
        assert_eq!(params.get("symbol").unwrap(), "BTCUSDT");
        assert_eq!(params.get("side").unwrap(), "BUY");
        assert_eq!(params.get("type").unwrap(), "MARKET");
        assert_eq!(params.get("quantity").unwrap(), "0.5");
        assert!(!params.contains_key("price"));
        assert!(!params.contains_key("reduceOnly"));
    }

    #[test]
    fn test_limit_order_params_post_only_uses_gtx() {
        let spec = OrderSpec::Limit {
            symbol: "ETHUSDT".to_string(),
            side: OrderSide::Sell,
            quantity: 1.0,
            price: 2500.0,
            time_in_force: TimeInForce::GTC,
            reduce_only: true,
            post_only: true,
        };

        let params = BinanceFutures::build_order_params(&spec);
        assert_eq!(params.get("type").unwrap(), "LIMIT");
        assert_eq!(params.get("price").unwrap(), "2500");
        assert_eq!(params.get("timeInForce").unwrap(), "GTX");
        assert_eq!(params.get("reduceOnly").unwrap(), "true");
    }

    #[test]
    fn test_stop_limit_order_params() {
        let spec = OrderSpec::StopLimit {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Sell,
            quantity: 0.1,
            price: 48900.0,
            stop_price: 49000.0,
            time_in_force: TimeInForce::GTC,
            reduce_only: false,
        };

        let params = BinanceFutures::build_order_params(&spec);
        assert_eq!(params.get("type").unwrap(), "STOP");
        assert_eq!(params.get("price").unwrap(), "48900");
        assert_eq!(params.get("stopPrice").unwrap(), "49000");
        assert_eq!(params.get("timeInForce").unwrap(), "GTC");
    }

    #[test]
    fn test_take_profit_params() {
        let with_price = OrderSpec::TakeProfit {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Sell,
            quantity: 0.1,
            stop_price: 52000.0,
            price: Some(51950.0),
            reduce_only: true,
        };
        let params = BinanceFutures::build_order_params(&with_price);
        assert_eq!(params.get("type").unwrap(), "TAKE_PROFIT");
        assert_eq!(params.get("price").unwrap(), "51950");
        assert_eq!(params.get("stopPrice").unwrap(), "52000");

        let without_price = OrderSpec::TakeProfit {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Sell,
            quantity: 0.1,
            stop_price: 52000.0,
            price: None,
            reduce_only: true,
        };
        let params = BinanceFutures::build_order_params(&without_price);
        assert_eq!(params.get("type").unwrap(), "TAKE_PROFIT_MARKET");
        assert!(!params.contains_key("price"));
    }

    #[test]
    fn test_stop_market_order_params() {
        let spec = OrderSpec::StopMarket {
            symbol: "SOLUSDT".to_string(),
            side: OrderSide::Buy,
            quantity: 10.0,
            stop_price: 155.5,
            reduce_only: true,
        };

        let params = BinanceFutures::build_order_params(&spec);
        assert_eq!(params.get("type").unwrap(), "STOP_MARKET");
        assert_eq!(params.get("stopPrice").unwrap(), "155.5");
        assert_eq!(params.get("reduceOnly").unwrap(), "true");
        assert!(!params.contains_key("timeInForce"));
    }

    #[test]
    fn test_order_response_maps_to_result() {
        let body = r#"{
            "orderId": 283194212,
            "symbol": "BTCUSDT",
            "side": "BUY",
            "type": "LIMIT",
            "status": "PARTIALLY_FILLED",
            "origQty": "0.500",
            "executedQty": "0.200",
            "avgPrice": "49875.30",
            "price": "49880.00",
            "stopPrice": "0.00",
            "updateTime": 1700000000000
        }"#;

        let response: BinanceOrderResponse = serde_json::from_str(body).unwrap();
        let result = response.into_order_result();

        assert_eq!(result.order_id, 283194212);
        assert_eq!(result.side, OrderSide::Buy);
        assert_eq!(result.status, OrderStatus::PartiallyFilled);
        assert!((result.orig_qty - 0.5).abs() < 1e-9);
        assert!((result.executed_qty - 0.2).abs() < 1e-9);
        assert_eq!(result.price, Some(49880.0));
        assert_eq!(result.stop_price, None);
        assert!(result.update_time.is_some());
    }

    #[test]
    fn test_rejection_from_body_parses_binance_error() {
        let err = BinanceFutures::rejection_from_body(400, r#"{"code":-2019,"msg":"Margin is insufficient."}"#);
        match err {
            ExecError::ExchangeRejected { code, message } => {
                assert_eq!(code, -2019);
                assert_eq!(message, "Margin is insufficient.");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let fallback = BinanceFutures::rejection_from_body(502, "Bad Gateway");
        match fallback {
            ExecError::ExchangeRejected { code, message } => {
                assert_eq!(code, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_nonzero_filters_placeholder_prices() {
        assert_eq!(parse_nonzero(Some("0.00000000".to_string())), None);
        assert_eq!(parse_nonzero(Some("49880.5".to_string())), Some(49880.5));
        assert_eq!(parse_nonzero(None), None);
    }
}
