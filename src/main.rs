use clap::Parser;
use miette::{IntoDiagnostic, Result};
use order_capture::application::capture::CaptureReconciler;
use order_capture::application::resolver::PaymentMethodResolver;
use order_capture::config::CaptureConfig;
use order_capture::domain::OrderId;
use order_capture::domain::order::OrderStatus;
use order_capture::domain::ports::{InstrumentStore, OrderStore, PaymentStore};
use order_capture::infrastructure::in_memory::InMemoryLedger;
use order_capture::infrastructure::simulated_gateway::SimulatedGateway;
use order_capture::interfaces::csv::report_writer::CaptureReportWriter;
use order_capture::interfaces::fixtures::Fixtures;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Fixtures JSON file with the cards, orders and payments to load
    fixtures: PathBuf,

    /// Order to capture. Repeat for several; defaults to every draft order.
    #[arg(long = "order")]
    orders: Vec<OrderId>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Maximum gateway submissions in flight per order (1 = sequential)
    #[arg(long, default_value_t = CaptureConfig::DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Per-payment gateway timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    gateway_timeout_ms: u64,
}

/// Initialize tracing from the ORDER_CAPTURE_LOG environment variable,
/// defaulting to "info". Logs go to stderr; stdout carries the report.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("ORDER_CAPTURE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(db_path) = cli.db_path.clone() {
        #[cfg(feature = "storage-rocksdb")]
        {
            let ledger = order_capture::infrastructure::rocksdb::RocksDBLedger::open(&db_path)
                .into_diagnostic()?;
            return run(cli, ledger).await;
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        warn!(
            db_path = %db_path.display(),
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }

    run(cli, InMemoryLedger::new()).await
}

async fn run<L>(cli: Cli, ledger: L) -> Result<()>
where
    L: OrderStore + PaymentStore + InstrumentStore + Clone + 'static,
{
    let config = CaptureConfig::default()
        .with_max_concurrency(cli.max_concurrency)
        .with_gateway_timeout(Duration::from_millis(cli.gateway_timeout_ms));

    let file = File::open(&cli.fixtures).into_diagnostic()?;
    let fixtures = Fixtures::from_reader(file).into_diagnostic()?;
    let resolver = PaymentMethodResolver::new(Box::new(ledger.clone()));
    fixtures
        .seed(&ledger, &ledger, &ledger, &resolver)
        .await
        .into_diagnostic()?;

    let targets: Vec<OrderId> = if cli.orders.is_empty() {
        OrderStore::all(&ledger)
            .await
            .into_diagnostic()?
            .into_iter()
            .filter(|order| order.status == OrderStatus::Draft)
            .map(|order| order.id)
            .collect()
    } else {
        cli.orders
    };

    let reconciler = CaptureReconciler::new(
        Box::new(ledger.clone()),
        Box::new(ledger.clone()),
        resolver,
        Box::new(SimulatedGateway::new()),
        config,
    );

    let stdout = io::stdout();
    let mut writer = CaptureReportWriter::new(stdout.lock());
    for order_id in targets {
        match reconciler.capture(order_id).await {
            Ok(order) => {
                let payments = ledger.for_order(order_id).await.into_diagnostic()?;
                writer.write_capture(&order, &payments).into_diagnostic()?;
            }
            Err(e) => {
                error!(order_id, error = %e, "Error capturing order");
            }
        }
    }
    writer.flush().into_diagnostic()?;

    Ok(())
}
