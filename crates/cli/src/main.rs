use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use flashsale_rust::admin::{
    parse_goods_ids, BatchCreateParams, LoadTestParams, OperationMix, DEFAULT_FAULT_TABLE,
};
use flashsale_rust::countdown::SaleStatus;
use flashsale_rust::listing::FetchOutcome;
use flashsale_rust::prelude::*;

#[derive(Parser, Debug)]
#[clap(name = "flashsale", version)]
#[clap(about = "Command line client for the flash sale backend", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Directory holding the persisted session
    #[clap(long, env = "FLASHSALE_STATE_DIR", default_value = ".flashsale")]
    state_dir: PathBuf,

    /// Output debug logs to stderr
    #[clap(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and persist the session
    Login {
        username: String,
        #[clap(long)]
        password: String,
    },
    /// Clear the persisted session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List products
    Products {
        #[clap(long, default_value = "1")]
        page: u32,
        /// all, upcoming, active or ended
        #[clap(long, default_value = "active")]
        tab: ProductTab,
        #[clap(long)]
        page_size: Option<u32>,
        /// created_at, stock, start_time or end_time
        #[clap(long)]
        sort_by: Option<SortBy>,
        /// asc or desc
        #[clap(long)]
        sort_order: Option<SortOrder>,
        /// Only expired products
        #[clap(long)]
        expired: bool,
    },
    /// Try to buy a product from the given listing page
    Buy {
        id: i64,
        #[clap(long, default_value = "1")]
        page: u32,
        #[clap(long, default_value = "active")]
        tab: ProductTab,
    },
    /// List your orders
    Orders {
        #[clap(long, default_value = "1")]
        page: u32,
        /// all, pending, paid or cancelled
        #[clap(long, default_value = "all")]
        tab: OrderTab,
    },
    /// Follow the countdown of one product until its sale ends
    Watch {
        id: i64,
        #[clap(long, default_value = "1")]
        page: u32,
        #[clap(long, default_value = "all")]
        tab: ProductTab,
    },
    /// Show or change the rate limits
    Ratelimit {
        #[clap(subcommand)]
        command: RateLimitCommand,
    },
    /// Turnover and per-product sales
    Business,
    /// Drive the load-test service
    Loadtest {
        #[clap(subcommand)]
        command: LoadTestCommand,
    },
    /// Bulk-create products for load testing
    Seed {
        #[clap(long, default_value = "1000")]
        count: u32,
        #[clap(long, default_value = "10000")]
        stock: u32,
        #[clap(long, default_value = "9.9")]
        price: f64,
        #[clap(long, default_value = "19.9")]
        original_price: f64,
        #[clap(long)]
        prefix: Option<String>,
    },
    /// Database fault injection
    Faults {
        #[clap(subcommand)]
        command: FaultCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RateLimitCommand {
    Get,
    /// Change the given fields, keep the rest
    Set {
        #[clap(long)]
        seckill_window: Option<u64>,
        #[clap(long)]
        seckill_max: Option<u64>,
        #[clap(long)]
        api_window: Option<u64>,
        #[clap(long)]
        api_max: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum LoadTestCommand {
    /// Start a load test
    Start {
        #[clap(long, default_value = "1000")]
        users: u32,
        #[clap(long, default_value = "200")]
        concurrency: u32,
        #[clap(long, default_value = "60")]
        duration: u32,
        #[clap(long, default_value = "10")]
        ramp_up: u32,
        #[clap(long, default_value = "50")]
        query_pct: u32,
        #[clap(long, default_value = "50")]
        seckill_pct: u32,
        #[clap(long, default_value = "50")]
        think_min: u32,
        #[clap(long, default_value = "150")]
        think_max: u32,
        #[clap(long, default_value = "0")]
        qps: u32,
        /// Comma separated product ids
        #[clap(long, default_value = "")]
        goods_ids: String,
        #[clap(long, default_value = "0")]
        retry: u32,
        /// Ask the service for verbose task logs
        #[clap(long)]
        verbose_task: bool,
        /// Poll the status until Ctrl-C, then stop and print the results
        #[clap(long)]
        watch: bool,
    },
    Status {
        task_id: String,
    },
    /// Stop a task and print its results
    Stop {
        task_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum FaultCommand {
    Status,
    Lock {
        #[clap(long, default_value = DEFAULT_FAULT_TABLE)]
        table: String,
    },
    Unlock,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if cli.debug {
        std::env::set_var("RUST_LOG", "flashsale_rust=debug,flashsale=debug");
    }
    pretty_env_logger::init();

    let config = FlashSaleConfig::from_env().context("Failed to read backend configuration")?;
    let storage = Arc::new(FileStorage::new(&cli.state_dir));
    let client = FlashSale::new(config, storage)?;
    client.session.restore().await?;

    match cli.command {
        Commands::Login { username, password } => {
            let user = client.session.login(&username, &password).await?;
            println!("Logged in as {} (id {})", user.username, user.id);
        }
        Commands::Logout => {
            client.session.logout().await?;
            println!("Logged out");
        }
        Commands::Whoami => {
            let session = client.session.snapshot().await;
            match session.user {
                Some(user) if session.is_authenticated => {
                    println!("{} (id {})", user.username, user.id)
                }
                _ => println!("Not logged in"),
            }
        }
        Commands::Products {
            page,
            tab,
            page_size,
            sort_by,
            sort_order,
            expired,
        } => {
            if let Some(page_size) = page_size {
                client.products.set_page_size(page_size).await;
            }
            if sort_by.is_some() || sort_order.is_some() {
                let params = client.products.snapshot().await.params;
                client
                    .products
                    .set_sort(
                        sort_by.unwrap_or(params.sort_by),
                        sort_order.unwrap_or(params.sort_order),
                    )
                    .await;
            }
            client.products.set_expired_only(expired).await;
            client.products.fetch_tab(page, tab).await?;
            print_products(&client).await;
        }
        Commands::Buy { id, page, tab } => {
            client.products.fetch_tab(page, tab).await?;
            let outcome = client.purchase(id, tab).await;
            println!("{}", outcome.user_message());
            if outcome.is_success() {
                print_products(&client).await;
            }
        }
        Commands::Orders { page, tab } => {
            client.orders.fetch_orders(page, tab.status()).await?;
            let listing = client.orders.snapshot().await;
            println!("{} ({} orders)", tab.label(), listing.total_orders);
            for order in &listing.orders {
                println!(
                    "#{:<8} {:<32} {:>10} {:<6} {}",
                    order.id,
                    order.goods_name.as_deref().unwrap_or("-"),
                    order.seckill_price,
                    order.status.label(),
                    order.created_display()
                );
            }
            print_pagination(client.orders.pagination().await);
        }
        Commands::Watch { id, page, tab } => {
            if client.products.fetch_tab(page, tab).await? == FetchOutcome::Stale {
                anyhow::bail!("listing changed while loading");
            }
            let product = client
                .products
                .product_by_id(id)
                .await
                .with_context(|| {
                    format!("product {} is not on page {} of {}", id, page, tab.label())
                })?;
            watch_countdown(&client, &product).await?;
        }
        Commands::Ratelimit { command } => {
            let ratelimit = client.ratelimit();
            let config = match command {
                RateLimitCommand::Get => ratelimit.get().await?,
                RateLimitCommand::Set {
                    seckill_window,
                    seckill_max,
                    api_window,
                    api_max,
                } => {
                    let mut config = ratelimit.get().await?;
                    config.seckill_window_seconds =
                        seckill_window.unwrap_or(config.seckill_window_seconds);
                    config.seckill_max = seckill_max.unwrap_or(config.seckill_max);
                    config.api_window_seconds = api_window.unwrap_or(config.api_window_seconds);
                    config.api_max = api_max.unwrap_or(config.api_max);
                    let updated = ratelimit.update(&config).await?;
                    println!("限流配置已更新");
                    updated
                }
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Business => {
            let dashboard = client.business().load().await?;
            println!("成交额: {}", dashboard.overview.turnover);
            println!(
                "售出件数: {}",
                dashboard.overview.total_sold.unwrap_or_default()
            );
            for item in &dashboard.items {
                println!(
                    "{:<8} {:<32} {:>10} x {:<6} = {}",
                    item.goods_id,
                    item.goods_name,
                    item.seckill_price,
                    item.sold_count,
                    item.revenue()
                );
            }
        }
        Commands::Loadtest { command } => run_loadtest(&client, command).await?,
        Commands::Seed {
            count,
            stock,
            price,
            original_price,
            prefix,
        } => {
            let mut params = BatchCreateParams::default();
            params.count = count;
            params.stock_per_item = stock;
            params.seckill_price = price;
            params.original_price = original_price;
            if let Some(prefix) = prefix {
                params.name_prefix = prefix;
            }
            let created = client.loadtest().batch_create(&params).await?;
            println!("{}", created.message());
        }
        Commands::Faults { command } => {
            let faults = client.faults();
            match command {
                FaultCommand::Status => {
                    let status = faults.status().await?;
                    println!(
                        "locked: {} (table {})",
                        status.locked,
                        status.table.as_deref().unwrap_or(DEFAULT_FAULT_TABLE)
                    );
                }
                FaultCommand::Lock { table } => {
                    faults.lock(&table).await.context("注入失败")?;
                    println!("已注入：表锁生效");
                }
                FaultCommand::Unlock => {
                    faults.unlock().await.context("恢复失败")?;
                    println!("已恢复：表锁释放");
                }
            }
        }
    }

    Ok(())
}

async fn print_products(client: &FlashSale) {
    let listing = client.products.snapshot().await;
    if let Some(error) = &listing.error {
        println!("{}", error);
    }
    for product in &listing.products {
        let availability = client.availability(product).await;
        println!(
            "{:<8} {:<35} {:>10} {:>10} stock {:<6} {:<6} [{}]",
            product.id,
            product.short_name(),
            product.seckill_price,
            product.original_price,
            product.stock,
            client.sale_status(product).label(),
            availability
        );
    }
    print_pagination(client.products.pagination().await);
}

fn print_pagination(pagination: flashsale_rust::listing::Pagination) {
    let window: Vec<String> = pagination
        .window
        .iter()
        .map(|page| {
            if *page == pagination.current_page {
                format!("[{}]", page)
            } else {
                page.to_string()
            }
        })
        .collect();
    println!(
        "page {} of {}: {}",
        pagination.current_page,
        pagination.total_pages,
        window.join(" ")
    );
}

async fn watch_countdown(
    client: &FlashSale,
    product: &flashsale_rust::products::Product,
) -> anyhow::Result<()> {
    let id = product.id;
    let timer = client
        .countdown(product, move |status| println!("product {} is now {}", id, status))
        .context("product has no readable sale window")?;

    let mut updates = timer.subscribe();
    println!("{}", timer.latest());
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let evaluation = *updates.borrow();
                println!("{}", evaluation);
                if evaluation.status == SaleStatus::Ended {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn run_loadtest(client: &FlashSale, command: LoadTestCommand) -> anyhow::Result<()> {
    match command {
        LoadTestCommand::Start {
            users,
            concurrency,
            duration,
            ramp_up,
            query_pct,
            seckill_pct,
            think_min,
            think_max,
            qps,
            goods_ids,
            retry,
            verbose_task,
            watch,
        } => {
            let params = LoadTestParams {
                user_count: users,
                concurrency,
                duration_seconds: duration,
                ramp_up_seconds: ramp_up,
                operation_mix: OperationMix {
                    query_pct,
                    seckill_pct,
                },
                think_time_ms_min: think_min,
                think_time_ms_max: think_max,
                qps_target: qps,
                goods_ids: parse_goods_ids(&goods_ids),
                retry_on_fail: retry,
                debug: verbose_task,
            };

            if !watch {
                let task_id = client.loadtest().start(&params).await.context("启动压测失败")?;
                println!("task {}", task_id);
                return Ok(());
            }

            let mut run = client.loadtest_run();
            let task_id = run.start(&params).await.context("启动压测失败")?;
            println!("task {} (Ctrl-C to stop)", task_id);
            if let Some(mut updates) = run.subscribe() {
                loop {
                    tokio::select! {
                        changed = updates.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            if let Some(status) = updates.borrow().clone() {
                                println!("{}", status);
                            }
                        }
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
            }
            let results = run.stop().await.context("停止/获取结果失败")?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        LoadTestCommand::Status { task_id } => {
            let status = client.loadtest().status(&task_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        LoadTestCommand::Stop { task_id } => {
            let loadtest = client.loadtest();
            loadtest.stop(&task_id).await.context("停止/获取结果失败")?;
            let results = loadtest.results(&task_id).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }
    Ok(())
}
