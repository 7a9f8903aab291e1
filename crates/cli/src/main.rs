use anyhow::Context;
use carteira_core::backend::http::BackendClient;
use carteira_core::backend::{ClientId, OrderExecutionService, PortfolioDataService};
use carteira_core::config::Settings;
use carteira_core::domain::order::{EntryAmount, Execution, GroupId};
use carteira_core::domain::portfolio::open_tickers;
use carteira_core::domain::recommendation::{AiFeedFilter, Side};
use carteira_core::workflow::{BuyDialog, SellDialog, Services, SubmitOutcome};
use carteira_core::{exposure, recommend};
use clap::Parser;
use std::sync::Arc;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Debug, Parser)]
#[command(name = "carteira_cli")]
struct Args {
    /// Client whose portfolio is being worked on.
    #[arg(long)]
    client_id: ClientId,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Merged classic + AI candidates, minus tickers already held.
    Candidates {
        #[arg(long, default_value = "todos")]
        ai_tipo: String,
        #[arg(long)]
        min_prob: Option<f64>,
        /// AI feed date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,
    },
    /// Operations, summary and the exposure cap.
    Positions,
    Buy(BuyArgs),
    Sell {
        #[arg(long)]
        operation_id: i64,
        /// Limit price; market when omitted.
        #[arg(long)]
        limit: Option<f64>,
        /// Actually send the order.
        #[arg(long)]
        yes: bool,
    },
    /// One-shot status of an order group.
    Status {
        #[arg(long)]
        group: String,
        #[arg(long)]
        sell: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Candidates { .. } => "candidates",
            Command::Positions => "positions",
            Command::Buy(_) => "buy",
            Command::Sell { .. } => "sell",
            Command::Status { .. } => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

#[derive(Debug, clap::Args)]
struct BuyArgs {
    #[arg(long)]
    ticker: String,
    #[arg(long, value_enum, default_value = "buy")]
    side: SideArg,
    #[arg(long, conflicts_with = "value", required_unless_present = "value")]
    quantity: Option<f64>,
    /// Amount in currency to distribute over the legs.
    #[arg(long)]
    value: Option<f64>,
    /// Limit price; market when omitted.
    #[arg(long)]
    limit: Option<f64>,
    /// Target (take-profit) price; defaults to the suggested target.
    #[arg(long)]
    tp: Option<f64>,
    #[arg(long)]
    refresh_quote: bool,
    /// Leg override after validation, e.g. `--leg PETR4F=30`.
    #[arg(long = "leg", value_parser = parse_leg)]
    legs: Vec<(String, f64)>,
    /// Actually send the order.
    #[arg(long)]
    yes: bool,
}

fn parse_leg(s: &str) -> Result<(String, f64), String> {
    let (symbol, qty) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=QTY, got {s}"))?;
    let qty = qty
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid quantity in {s}: {e}"))?;
    Ok((symbol.trim().to_uppercase(), qty))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let session_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "session",
        %session_id,
        client_id = args.client_id,
        command = args.command.name()
    );

    let result = run(args, settings).instrument(span).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(%session_id, error = %err, "command failed");
    }
    result
}

async fn run(args: Args, settings: Settings) -> anyhow::Result<()> {
    let backend = Arc::new(BackendClient::from_settings(&settings)?);
    let client_id = args.client_id;
    let today = chrono::Local::now().date_naive();

    match args.command {
        Command::Candidates {
            ai_tipo,
            min_prob,
            date,
        } => {
            let filter = AiFeedFilter {
                tipo: ai_tipo,
                date: date.as_deref().map(parse_date).transpose()?,
                min_prob,
            };
            let operations = backend
                .operations(client_id)
                .await
                .context("load operations for the open-position filter")?;
            let list = recommend::gather_candidates(
                &*backend,
                client_id,
                &filter,
                &open_tickers(&operations),
            )
            .await;
            for failure in &list.failures {
                eprintln!("[warning] {:?} feed unavailable: {}", failure.feed, failure.error);
            }
            render::print_candidates(&list.candidates);
        }

        Command::Positions => {
            let (client, operations, summary) = tokio::join!(
                backend.client(client_id),
                backend.operations(client_id),
                backend.summary(client_id)
            );
            let client = client.context("load client record")?;
            let operations = operations.context("load operations")?;
            let summary = summary.context("load portfolio summary")?;

            let max = exposure::max_buy_value_for(
                summary.patrimonio,
                client.percentual_patrimonio.or(summary.percentual_patrimonio),
                summary.valor_disponivel,
            );
            println!(
                "Client {} {}",
                client.id,
                client.nome.as_deref().unwrap_or("")
            );
            render::print_operations(&operations, today);
            render::print_summary(&summary, max);
        }

        Command::Buy(buy) => run_buy(backend, &settings, client_id, today, buy).await?,

        Command::Sell {
            operation_id,
            limit,
            yes,
        } => {
            let operations = backend
                .operations(client_id)
                .await
                .context("load operations")?;
            let operation = operations
                .into_iter()
                .find(|op| op.id == operation_id)
                .with_context(|| format!("operation {operation_id} not found for client {client_id}"))?;

            let mut dialog = SellDialog::new(
                client_id,
                Services::from_backend(backend.clone()),
                Arc::new(render::CliObserver { today }),
                settings.poll_interval(),
            );
            println!(
                "SELL {} qty={} bought at {}",
                operation.ticker().unwrap_or_else(|| "?".to_string()),
                operation.quantidade.unwrap_or_default(),
                operation
                    .preco_unitario
                    .map(|p| format!("{p:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
            );
            dialog.open(operation);
            dialog.set_execution(execution_for(limit));

            if !yes {
                println!("Dry run; pass --yes to send the sell order.");
                return Ok(());
            }
            let outcome = dialog.submit().await?;
            if let SubmitOutcome::Polling { legs, .. } | SubmitOutcome::NothingToExecute { legs } =
                &outcome
            {
                render::print_submission(legs);
            }
            if outcome.group_id().is_some() {
                let interrupted = tokio::select! {
                    _ = dialog.finished() => false,
                    signal = tokio::signal::ctrl_c() => {
                        signal.context("listen for ctrl-c")?;
                        true
                    }
                };
                if interrupted {
                    dialog.close();
                    println!("Stopped watching; the order stays live on the server.");
                }
            }
        }

        Command::Status { group, sell } => {
            let group_id = GroupId::new(group);
            let status = if sell {
                backend.sell_status(client_id, &group_id).await
            } else {
                backend.buy_status(client_id, &group_id).await
            };
            let status = status.with_context(|| format!("fetch status of group {group_id}"))?;
            render::print_status(&status);
        }
    }

    Ok(())
}

async fn run_buy(
    backend: Arc<BackendClient>,
    settings: &Settings,
    client_id: ClientId,
    today: chrono::NaiveDate,
    args: BuyArgs,
) -> anyhow::Result<()> {
    let ticker = args.ticker.trim().to_uppercase();
    let side = match args.side {
        SideArg::Buy => Side::Buy,
        SideArg::Sell => Side::Sell,
    };

    let operations = backend
        .operations(client_id)
        .await
        .context("load operations for the open-position filter")?;
    let open = open_tickers(&operations);
    if open.contains(&ticker) {
        anyhow::bail!("client {client_id} already holds an open position in {ticker}");
    }

    let list =
        recommend::gather_candidates(&*backend, client_id, &AiFeedFilter::default(), &open)
            .await;
    let candidate = list
        .candidates
        .into_iter()
        .find(|c| c.ticker == ticker && c.side == side)
        .with_context(|| format!("no {} candidate for {ticker}", side.as_str()))?;

    let mut dialog = BuyDialog::new(
        client_id,
        Services::from_backend(backend.clone()),
        Arc::new(render::CliObserver { today }),
        settings.poll_interval(),
    );
    dialog.load_exposure().await;
    dialog.open(candidate);
    dialog.set_execution(execution_for(args.limit));
    if args.refresh_quote {
        dialog.refresh_quote().await;
    }
    if let Some(tp) = args.tp {
        dialog.set_target_price(Some(tp));
    }
    let amount = match (args.quantity, args.value) {
        (Some(q), _) => EntryAmount::Quantity(q),
        (None, Some(v)) => EntryAmount::Value(v),
        (None, None) => anyhow::bail!("either --quantity or --value is required"),
    };
    dialog.set_amount(amount);

    dialog.validate().await?;
    for (symbol, qty) in &args.legs {
        if !dialog.set_leg_quantity(symbol, *qty) {
            tracing::warn!(%symbol, "leg override ignored; no such leg in the distribution");
        }
    }

    if let Some(ticket) = dialog.ticket() {
        render::print_ticket(ticket, dialog.estimated_total(), dialog.max_buy_value());
    }
    if !args.yes {
        println!("Dry run; pass --yes to send the order.");
        return Ok(());
    }

    let outcome = dialog.submit().await?;
    if let SubmitOutcome::Polling { legs, .. } | SubmitOutcome::NothingToExecute { legs } = &outcome
    {
        render::print_submission(legs);
    }
    if outcome.group_id().is_some() {
        let interrupted = tokio::select! {
            _ = dialog.finished() => false,
            signal = tokio::signal::ctrl_c() => {
                signal.context("listen for ctrl-c")?;
                true
            }
        };
        if interrupted {
            dialog.close();
            println!("Stopped watching; the order stays live on the server.");
        }
    }
    Ok(())
}

fn execution_for(limit: Option<f64>) -> Execution {
    match limit {
        Some(price) => Execution::Limit { price },
        None => Execution::Market,
    }
}

fn parse_date(s: &str) -> anyhow::Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date: {s}"))
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
