use clap::Parser;
use courtpay::application::booking::BookingService;
use courtpay::application::notifications::NotificationQueue;
use courtpay::application::onboarding::CompanyOnboarding;
use courtpay::application::payment::PaymentService;
use courtpay::config::{Cli, Command, QuoteArgs, ServeArgs};
use courtpay::domain::money::Split;
use courtpay::domain::ports::{
    SharedBookingStore, SharedCompanyStore, SharedCourtDirectory, SharedNotificationSender,
    SharedPaymentStore,
};
use courtpay::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryDirectory, InMemoryPaymentStore,
};
use courtpay::infrastructure::openpix::OpenPixClient;
use courtpay::infrastructure::smtp::{LogSender, SmtpSender};
use courtpay::interfaces::http::{AppState, router};
use miette::{IntoDiagnostic, Result, miette};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct Stores {
    bookings: SharedBookingStore,
    payments: SharedPaymentStore,
    courts: SharedCourtDirectory,
    companies: SharedCompanyStore,
}

fn in_memory_stores() -> Stores {
    let directory = InMemoryDirectory::new();
    Stores {
        bookings: Arc::new(InMemoryBookingStore::new(directory.clone())),
        payments: Arc::new(InMemoryPaymentStore::new()),
        courts: Arc::new(directory.clone()),
        companies: Arc::new(directory),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    use courtpay::infrastructure::rocksdb::RocksDBStore;

    let Some(path) = db_path else {
        return Ok(in_memory_stores());
    };
    let store = RocksDBStore::open(path).into_diagnostic()?;
    info!(path = %path.display(), "using rocksdb storage");
    Ok(Stores {
        bookings: Arc::new(store.clone()),
        payments: Arc::new(store.clone()),
        courts: Arc::new(store.clone()),
        companies: Arc::new(store),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    if db_path.is_some() {
        warn!("built without the storage-rocksdb feature, --db-path ignored; using in-memory storage");
    }
    Ok(in_memory_stores())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn serve(args: ServeArgs) -> Result<()> {
    let settings = args.payment_settings().into_diagnostic()?;
    let stores = open_stores(args.db_path.as_deref())?;

    let sender: SharedNotificationSender = if args.smtp.host.is_some() {
        Arc::new(SmtpSender::new(&args.smtp).into_diagnostic()?)
    } else {
        warn!("SMTP host not configured, guest emails will only be logged");
        Arc::new(LogSender)
    };
    let (queue, _worker) = NotificationQueue::spawn(sender, args.notification_retry.policy());

    if args.webhook_secret.is_none() {
        warn!("webhook secret not configured, webhook payloads are trusted without verification");
    }

    let gateway = Arc::new(OpenPixClient::new(&args.openpix).into_diagnostic()?);
    let payments = Arc::new(PaymentService::new(
        gateway,
        stores.payments,
        stores.bookings.clone(),
        queue.clone(),
        settings,
    ));
    let bookings = Arc::new(BookingService::new(
        stores.bookings,
        stores.courts.clone(),
        payments.clone(),
    ));
    let onboarding = Arc::new(CompanyOnboarding::new(stores.companies, payments.clone()));

    let app = router(AppState {
        bookings,
        payments,
        onboarding,
        courts: stores.courts,
        webhook_secret: args.webhook_secret.map(Arc::from),
    });

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .into_diagnostic()?;
    info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    queue.flush().await.into_diagnostic()?;
    Ok(())
}

fn quote(args: &QuoteArgs) -> Result<()> {
    if args.hourly_price < Decimal::ZERO {
        return Err(miette!("hourly price must not be negative"));
    }
    if args.end <= args.start {
        return Err(miette!("end must be after start"));
    }
    let split = Split::quote(args.hourly_price, Some(args.start), Some(args.end));
    println!(
        "{},{},{}",
        split.total.value(),
        split.gas_price.value(),
        split.net.value()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Quote(args) => quote(&args),
        Command::Serve(args) => {
            init_tracing();
            serve(args).await
        }
    }
}
