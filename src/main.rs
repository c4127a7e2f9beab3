use clap::{Arg, ArgAction, Command};
use rustexec::core::config::AppConfig;
use rustexec::core::types::{GridMode, MarginType, OrderResult, OrderSide, TimeInForce};
use rustexec::engine::ExecutionEngine;
use rustexec::strategies::{OcoPair, OcoTrigger, TwapMode};
use std::time::Duration;

fn symbol_arg() -> Arg {
    Arg::new("symbol")
        .long("symbol")
        .value_name("SYMBOL")
        .required(true)
        .help("交易对，如BTCUSDT")
}

fn side_arg() -> Arg {
    Arg::new("side")
        .long("side")
        .value_name("SIDE")
        .required(true)
        .help("订单方向: BUY或SELL")
}

fn quantity_arg() -> Arg {
    Arg::new("quantity")
        .long("quantity")
        .value_name("QTY")
        .value_parser(clap::value_parser!(f64))
        .required(true)
        .help("订单数量")
}

fn build_cli() -> Command {
    Command::new("rustexec")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Binance USDT-M合约下单与风控执行工具")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .default_value("config.yaml")
                .help("配置文件路径，不存在时使用内置默认值"),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("market")
                .about("市价单")
                .arg(symbol_arg())
                .arg(side_arg())
                .arg(quantity_arg())
                .arg(
                    Arg::new("reduce-only")
                        .long("reduce-only")
                        .action(ArgAction::SetTrue)
                        .help("只减仓"),
                ),
        )
        .subcommand(
            Command::new("limit")
                .about("限价单")
                .arg(symbol_arg())
                .arg(side_arg())
                .arg(quantity_arg())
                .arg(
                    Arg::new("price")
                        .long("price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("委托价格"),
                )
                .arg(
                    Arg::new("tif")
                        .long("tif")
                        .value_name("TIF")
                        .default_value("GTC")
                        .help("时间有效性: GTC、IOC或FOK"),
                )
                .arg(
                    Arg::new("reduce-only")
                        .long("reduce-only")
                        .action(ArgAction::SetTrue)
                        .help("只减仓"),
                )
                .arg(
                    Arg::new("post-only")
                        .long("post-only")
                        .action(ArgAction::SetTrue)
                        .help("只做Maker，吃单即撤"),
                ),
        )
        .subcommand(
            Command::new("stop-limit")
                .about("限价止损单")
                .arg(symbol_arg())
                .arg(side_arg())
                .arg(quantity_arg())
                .arg(
                    Arg::new("price")
                        .long("price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("触发后的委托价格"),
                )
                .arg(
                    Arg::new("stop-price")
                        .long("stop-price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("止损触发价"),
                )
                .arg(
                    Arg::new("tif")
                        .long("tif")
                        .value_name("TIF")
                        .default_value("GTC")
                        .help("时间有效性: GTC、IOC或FOK"),
                )
                .arg(
                    Arg::new("reduce-only")
                        .long("reduce-only")
                        .action(ArgAction::SetTrue)
                        .help("只减仓"),
                ),
        )
        .subcommand(
            Command::new("stop-market")
                .about("市价止损单")
                .arg(symbol_arg())
                .arg(side_arg())
                .arg(quantity_arg())
                .arg(
                    Arg::new("stop-price")
                        .long("stop-price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("止损触发价"),
                )
                .arg(
                    Arg::new("reduce-only")
                        .long("reduce-only")
                        .action(ArgAction::SetTrue)
                        .help("只减仓"),
                ),
        )
        .subcommand(
            Command::new("take-profit")
                .about("止盈单，默认只减仓")
                .arg(symbol_arg())
                .arg(side_arg())
                .arg(quantity_arg())
                .arg(
                    Arg::new("stop-price")
                        .long("stop-price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("止盈触发价"),
                )
                .arg(
                    Arg::new("price")
                        .long("price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .help("触发后的委托价格，省略则市价成交"),
                ),
        )
        .subcommand(
            Command::new("oco")
                .about("OCO止盈止损对，一腿成交另一腿撤销")
                .arg(symbol_arg())
                .arg(side_arg().help("离场方向；带入场参数时为入场方向"))
                .arg(quantity_arg())
                .arg(
                    Arg::new("tp-price")
                        .long("tp-price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("止盈价格"),
                )
                .arg(
                    Arg::new("sl-price")
                        .long("sl-price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("止损价格"),
                )
                .arg(
                    Arg::new("entry-price")
                        .long("entry-price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .help("先以该限价入场，再挂保护性OCO"),
                )
                .arg(
                    Arg::new("market-entry")
                        .long("market-entry")
                        .action(ArgAction::SetTrue)
                        .help("先市价入场，再挂保护性OCO"),
                )
                .arg(
                    Arg::new("watch")
                        .long("watch")
                        .action(ArgAction::SetTrue)
                        .help("挂出后持续监控，一腿成交即撤另一腿"),
                )
                .arg(
                    Arg::new("poll-interval")
                        .long("poll-interval")
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("5")
                        .help("监控轮询间隔(秒)"),
                ),
        )
        .subcommand(
            Command::new("twap")
                .about("TWAP分片执行")
                .arg(symbol_arg())
                .arg(side_arg())
                .arg(quantity_arg().help("总数量"))
                .arg(
                    Arg::new("chunks")
                        .long("chunks")
                        .value_name("N")
                        .value_parser(clap::value_parser!(u32))
                        .help("分片数量，缺省取配置值"),
                )
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(u64))
                        .help("分片间隔(秒)，缺省取配置值"),
                )
                .arg(
                    Arg::new("ioc-offset")
                        .long("ioc-offset")
                        .value_name("PERCENT")
                        .value_parser(clap::value_parser!(f64))
                        .help("用IOC限价分片，价格偏移现价该百分比；省略则市价分片"),
                ),
        )
        .subcommand(
            Command::new("grid")
                .about("网格挂单")
                .arg(symbol_arg())
                .arg(
                    Arg::new("lower-price")
                        .long("lower-price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("网格下界"),
                )
                .arg(
                    Arg::new("upper-price")
                        .long("upper-price")
                        .value_name("PRICE")
                        .value_parser(clap::value_parser!(f64))
                        .required(true)
                        .help("网格上界"),
                )
                .arg(quantity_arg().help("总数量，均分到各层"))
                .arg(
                    Arg::new("levels")
                        .long("levels")
                        .value_name("N")
                        .value_parser(clap::value_parser!(u32))
                        .help("网格层数，缺省取配置值"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_name("MODE")
                        .default_value("neutral")
                        .help("网格模式: neutral、long或short"),
                )
                .arg(
                    Arg::new("monitor")
                        .long("monitor")
                        .action(ArgAction::SetTrue)
                        .help("创建后持续补单，Ctrl+C时撤销全部挂单退出"),
                )
                .arg(
                    Arg::new("refill-interval")
                        .long("refill-interval")
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30")
                        .help("补单轮询间隔(秒)"),
                ),
        )
        .subcommand(Command::new("balance").about("账户余额"))
        .subcommand(
            Command::new("position")
                .about("持仓与风险指标")
                .arg(symbol_arg()),
        )
        .subcommand(
            Command::new("close")
                .about("市价平仓")
                .arg(symbol_arg())
                .arg(
                    Arg::new("percentage")
                        .long("percentage")
                        .value_name("PCT")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("100")
                        .help("平仓比例(0, 100]"),
                ),
        )
        .subcommand(
            Command::new("leverage")
                .about("设置杠杆")
                .arg(symbol_arg())
                .arg(
                    Arg::new("leverage")
                        .long("leverage")
                        .value_name("N")
                        .value_parser(clap::value_parser!(u32))
                        .required(true)
                        .help("杠杆倍数"),
                ),
        )
        .subcommand(
            Command::new("margin-type")
                .about("设置保证金模式")
                .arg(symbol_arg())
                .arg(
                    Arg::new("type")
                        .long("type")
                        .value_name("TYPE")
                        .required(true)
                        .help("ISOLATED或CROSSED"),
                ),
        )
        .subcommand(
            Command::new("cancel")
                .about("撤销单个订单")
                .arg(symbol_arg())
                .arg(
                    Arg::new("order-id")
                        .long("order-id")
                        .value_name("ID")
                        .value_parser(clap::value_parser!(i64))
                        .required(true)
                        .help("订单号"),
                ),
        )
        .subcommand(
            Command::new("cancel-all")
                .about("撤销交易对全部挂单")
                .arg(symbol_arg()),
        )
        .subcommand(
            Command::new("orders").about("当前挂单").arg(
                Arg::new("symbol")
                    .long("symbol")
                    .value_name("SYMBOL")
                    .help("交易对，省略则查询全部"),
            ),
        )
        .subcommand(
            Command::new("status")
                .about("查询订单状态")
                .arg(symbol_arg())
                .arg(
                    Arg::new("order-id")
                        .long("order-id")
                        .value_name("ID")
                        .value_parser(clap::value_parser!(i64))
                        .required(true)
                        .help("订单号"),
                ),
        )
        .subcommand(
            Command::new("price")
                .about("查询最新成交价")
                .arg(symbol_arg()),
        )
}

fn print_order(order: &OrderResult) {
    println!("  订单号: {}", order.order_id);
    println!("  状态: {}", order.status.as_str());
    if order.executed_qty > 0.0 {
        println!("  成交: {} @ {}", order.executed_qty, order.avg_price);
    }
}

fn print_oco_pair(pair: &OcoPair) {
    println!("✓ OCO订单已挂出");
    println!(
        "  止盈腿: #{} @ {}",
        pair.take_profit.order_id,
        pair.take_profit
            .stop_price
            .map(|p| p.to_string())
            .unwrap_or_default()
    );
    println!(
        "  止损腿: #{} @ {}",
        pair.stop_loss.order_id,
        pair.stop_loss
            .stop_price
            .map(|p| p.to_string())
            .unwrap_or_default()
    );
}

async fn run(
    engine: &ExecutionEngine,
    matches: &clap::ArgMatches,
) -> Result<(), rustexec::core::error::ExecError> {
    match matches.subcommand() {
        Some(("market", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let side: OrderSide = sub.get_one::<String>("side").unwrap().parse()?;
            let quantity = *sub.get_one::<f64>("quantity").unwrap();

            let order = engine
                .orders()
                .place_market(symbol, side, quantity, sub.get_flag("reduce-only"))
                .await?;
            println!("✓ 市价单已提交");
            print_order(&order);
        }
        Some(("limit", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let side: OrderSide = sub.get_one::<String>("side").unwrap().parse()?;
            let quantity = *sub.get_one::<f64>("quantity").unwrap();
            let price = *sub.get_one::<f64>("price").unwrap();
            let tif: TimeInForce = sub.get_one::<String>("tif").unwrap().parse()?;

            let order = engine
                .orders()
                .place_limit(
                    symbol,
                    side,
                    quantity,
                    price,
                    tif,
                    sub.get_flag("reduce-only"),
                    sub.get_flag("post-only"),
                )
                .await?;
            println!("✓ 限价单已提交");
            println!("  价格: {}", price);
            print_order(&order);
        }
        Some(("stop-limit", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let side: OrderSide = sub.get_one::<String>("side").unwrap().parse()?;
            let quantity = *sub.get_one::<f64>("quantity").unwrap();
            let price = *sub.get_one::<f64>("price").unwrap();
            let stop_price = *sub.get_one::<f64>("stop-price").unwrap();
            let tif: TimeInForce = sub.get_one::<String>("tif").unwrap().parse()?;

            let order = engine
                .orders()
                .place_stop_limit(
                    symbol,
                    side,
                    quantity,
                    price,
                    stop_price,
                    tif,
                    sub.get_flag("reduce-only"),
                )
                .await?;
            println!("✓ 限价止损单已提交");
            println!("  触发价: {}", stop_price);
            println!("  委托价: {}", price);
            print_order(&order);
        }
        Some(("stop-market", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let side: OrderSide = sub.get_one::<String>("side").unwrap().parse()?;
            let quantity = *sub.get_one::<f64>("quantity").unwrap();
            let stop_price = *sub.get_one::<f64>("stop-price").unwrap();

            let order = engine
                .orders()
                .place_stop_market(
                    symbol,
                    side,
                    quantity,
                    stop_price,
                    sub.get_flag("reduce-only"),
                )
                .await?;
            println!("✓ 市价止损单已提交");
            println!("  触发价: {}", stop_price);
            print_order(&order);
        }
        Some(("take-profit", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let side: OrderSide = sub.get_one::<String>("side").unwrap().parse()?;
            let quantity = *sub.get_one::<f64>("quantity").unwrap();
            let stop_price = *sub.get_one::<f64>("stop-price").unwrap();
            let price = sub.get_one::<f64>("price").copied();

            let order = engine
                .orders()
                .place_take_profit(symbol, side, quantity, stop_price, price, true)
                .await?;
            println!("✓ 止盈单已提交");
            println!("  触发价: {}", stop_price);
            print_order(&order);
        }
        Some(("oco", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let side: OrderSide = sub.get_one::<String>("side").unwrap().parse()?;
            let quantity = *sub.get_one::<f64>("quantity").unwrap();
            let tp_price = *sub.get_one::<f64>("tp-price").unwrap();
            let sl_price = *sub.get_one::<f64>("sl-price").unwrap();
            let entry_price = sub.get_one::<f64>("entry-price").copied();

            let pair = if sub.get_flag("market-entry") || entry_price.is_some() {
                let entry = engine
                    .oco()
                    .place_oco_with_entry(symbol, side, quantity, entry_price, tp_price, sl_price)
                    .await?;
                println!("✓ 入场单已提交, 订单号: {}", entry.entry.order_id);
                match entry.pair {
                    Some(pair) => {
                        print_oco_pair(&pair);
                        Some(pair)
                    }
                    None => {
                        println!("✗ 保护性OCO挂出失败，入场单仍有效，请人工处理敞口");
                        None
                    }
                }
            } else {
                let pair = engine
                    .oco()
                    .place_oco(symbol, side, quantity, tp_price, sl_price)
                    .await?;
                print_oco_pair(&pair);
                Some(pair)
            };

            if sub.get_flag("watch") {
                if let Some(pair) = pair {
                    let poll =
                        Duration::from_secs(*sub.get_one::<u64>("poll-interval").unwrap());
                    println!("开始监控OCO订单, Ctrl+C退出...");
                    match engine
                        .oco()
                        .watch(
                            symbol,
                            pair.take_profit.order_id,
                            pair.stop_loss.order_id,
                            poll,
                        )
                        .await?
                    {
                        Some(OcoTrigger::TakeProfit) => println!("✓ 止盈触发，止损腿已撤销"),
                        Some(OcoTrigger::StopLoss) => println!("✓ 止损触发，止盈腿已撤销"),
                        None => println!("两腿均已离场，监控结束"),
                    }
                }
            }
        }
        Some(("twap", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let side: OrderSide = sub.get_one::<String>("side").unwrap().parse()?;
            let quantity = *sub.get_one::<f64>("quantity").unwrap();
            let chunks = sub.get_one::<u32>("chunks").copied();
            let interval = sub.get_one::<u64>("interval").copied();
            let mode = match sub.get_one::<f64>("ioc-offset").copied() {
                Some(offset_percent) => TwapMode::IocLimit { offset_percent },
                None => TwapMode::Market,
            };

            let report = engine
                .twap()
                .execute(symbol, side, quantity, chunks, interval, mode)
                .await?;
            println!("✓ TWAP执行完成");
            println!(
                "  成交订单: {}笔 (失败分片: {})",
                report.summary.total_orders, report.failed_chunks
            );
            println!("  成交数量: {}", report.summary.total_quantity);
            println!("  成交均价: {:.2}", report.summary.average_price);
            println!(
                "  价格区间: {:.2} - {:.2}",
                report.summary.min_price, report.summary.max_price
            );
            println!("  成交额: {:.2} USDT", report.summary.total_value);
        }
        Some(("grid", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let lower_price = *sub.get_one::<f64>("lower-price").unwrap();
            let upper_price = *sub.get_one::<f64>("upper-price").unwrap();
            let quantity = *sub.get_one::<f64>("quantity").unwrap();
            let levels = sub.get_one::<u32>("levels").copied();
            let mode: GridMode = sub.get_one::<String>("mode").unwrap().parse()?;

            let mut state = engine
                .grid()
                .create_grid(symbol, lower_price, upper_price, quantity, levels, mode)
                .await?;
            println!("✓ 网格已创建");
            println!("  模式: {}", state.plan.mode.as_str());
            println!(
                "  层数: {} (间距 {:.2}, {:.2}%)",
                state.plan.levels, state.plan.spacing, state.plan.spacing_percent
            );
            println!(
                "  价格区间: {} - {}",
                state.plan.lower_price, state.plan.upper_price
            );
            println!(
                "  买单: {}笔  卖单: {}笔",
                state.buy_orders.len(),
                state.sell_orders.len()
            );

            if sub.get_flag("monitor") {
                let interval =
                    Duration::from_secs(*sub.get_one::<u64>("refill-interval").unwrap());
                println!("开始网格补单循环, Ctrl+C撤单退出...");
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        _ = tokio::time::sleep(interval) => {
                            match engine.grid().refill(&mut state).await {
                                Ok(0) => {}
                                Ok(n) => println!(
                                    "补挂 {} 笔订单, 当前挂单 {} 笔",
                                    n,
                                    state.open_order_count()
                                ),
                                Err(e) => eprintln!("补单失败: {}", e),
                            }
                        }
                    }
                }
                println!("收到停止信号，撤销网格挂单...");
                let canceled = engine.grid().cancel_grid(&mut state).await?;
                let stats = engine.grid().statistics(&state).await?;
                println!("✓ 已撤销 {} 笔挂单", canceled);
                println!(
                    "  买单成交: {}笔  卖单成交: {}笔",
                    stats.filled_buys, stats.filled_sells
                );
                println!("  预估已实现盈亏: {:.2} USDT", stats.realized_profit);
            }
        }
        Some(("balance", _)) => {
            let account = engine.account().await?;
            println!("📊 账户余额:");
            println!("  可用: {:.2} USDT", account.available_balance);
            println!("  钱包总额: {:.2} USDT", account.total_wallet_balance);
            println!("  未实现盈亏: {:.2} USDT", account.total_unrealized_profit);
            println!("  保证金余额: {:.2} USDT", account.total_margin_balance);
        }
        Some(("position", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            match engine.position(symbol).await? {
                Some(position) => {
                    println!("📈 {} 持仓:", symbol);
                    println!("  数量: {}", position.position_amount);
                    println!("  开仓均价: {:.2}", position.entry_price);
                    println!("  未实现盈亏: {:.2} USDT", position.unrealized_profit);
                    println!("  杠杆: {}x", position.leverage);
                    println!("  保证金模式: {}", position.margin_type);

                    if let Some(metrics) = engine.risk_metrics(symbol).await? {
                        println!("⚠️ 风险指标:");
                        println!("  持仓价值: {:.2} USDT", metrics.position_value);
                        println!("  持仓占比: {:.2}%", metrics.position_pct);
                        println!("  盈亏占比: {:.2}%", metrics.pnl_pct);
                        println!("  有效敞口: {:.2} USDT", metrics.effective_exposure);
                    }
                }
                None => println!("{} 无持仓", symbol),
            }
        }
        Some(("close", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let percentage = *sub.get_one::<f64>("percentage").unwrap();

            let order = engine.close_position(symbol, percentage).await?;
            println!("✓ 已平仓 {}%", percentage);
            print_order(&order);
        }
        Some(("leverage", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let leverage = *sub.get_one::<u32>("leverage").unwrap();

            engine.set_leverage(symbol, leverage).await?;
            println!("✓ {} 杠杆已设置为 {}x", symbol, leverage);
        }
        Some(("margin-type", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let margin_type: MarginType = sub.get_one::<String>("type").unwrap().parse()?;

            engine.set_margin_type(symbol, margin_type).await?;
            println!("✓ {} 保证金模式已设置为 {}", symbol, margin_type.as_str());
        }
        Some(("cancel", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let order_id = *sub.get_one::<i64>("order-id").unwrap();

            engine.orders().cancel_order(symbol, order_id).await?;
            println!("✓ 订单 {} 已撤销", order_id);
        }
        Some(("cancel-all", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();

            engine.orders().cancel_all_orders(symbol).await?;
            println!("✓ {} 全部挂单已撤销", symbol);
        }
        Some(("orders", sub)) => {
            let symbol = sub.get_one::<String>("symbol").map(|s| s.as_str());
            let orders = engine.orders().get_open_orders(symbol).await?;

            if orders.is_empty() {
                println!("无挂单");
            } else {
                println!("当前挂单 {} 笔:", orders.len());
                for order in &orders {
                    let price = order
                        .price
                        .or(order.stop_price)
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  #{} {} {} {} {} @ {} [{}]",
                        order.order_id,
                        order.symbol,
                        order.order_type,
                        order.side,
                        order.orig_qty,
                        price,
                        order.status.as_str()
                    );
                }
            }
        }
        Some(("status", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let order_id = *sub.get_one::<i64>("order-id").unwrap();

            let order = engine.orders().get_order_status(symbol, order_id).await?;
            println!("订单 {} ({} {}):", order.order_id, order.symbol, order.order_type);
            println!("  方向: {}", order.side);
            println!("  状态: {}", order.status.as_str());
            println!("  委托数量: {}", order.orig_qty);
            println!("  成交数量: {}", order.executed_qty);
            if order.executed_qty > 0.0 {
                println!("  成交均价: {}", order.avg_price);
            }
            if let Some(price) = order.price {
                println!("  委托价: {}", price);
            }
            if let Some(stop_price) = order.stop_price {
                println!("  触发价: {}", stop_price);
            }
        }
        Some(("price", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let price = engine.current_price(symbol).await?;
            println!("{} 最新价格: {}", symbol, price);
        }
        _ => unreachable!("subcommand_required保证到不了这里"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载环境变量
    dotenv::dotenv().ok();

    let matches = build_cli().get_matches();
    let config_path = matches.get_one::<String>("config").unwrap();
    let config = AppConfig::load_or_default(config_path)?;

    // 控制台日志走log门面，级别取自配置
    if config.logging.console_output {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(config.logging.level.to_lowercase()),
        )
        .init();
    }

    let engine = match ExecutionEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("✗ 引擎初始化失败: {}", e);
            eprintln!("  请确认.env中已配置BINANCE_API_KEY与BINANCE_API_SECRET，参考.env.example");
            return Err(e.into());
        }
    };

    if let Err(e) = run(&engine, &matches).await {
        eprintln!("✗ 执行失败: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
