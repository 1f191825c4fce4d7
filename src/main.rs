//! # Cat Ticker CLI
//!
//! Command-line interface for the market quote ticker.
//!
//! ## Usage
//!
//! ```bash
//! # Run the ticker (prompts for anything not configured)
//! cat-ticker --account demo --printer-name GB02
//!
//! # Settings from a file, password from the environment
//! CAT_TICKER_PASSWORD=... cat-ticker --config ticker.json run
//!
//! # Print right away, then every 5 minutes
//! cat-ticker --print-minutes 5 --print-now
//!
//! # Render one report to PNG without a printer
//! cat-ticker preview --png report.png
//!
//! # Dump the provider's symbol list
//! cat-ticker symbols --output all_symbols.json
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | stopped with ESC |
//! | 1 | configuration or usage error |
//! | 2 | startup failed (login or printer) |
//! | 3 | keep-alive ping failed |
//! | 4 | market data could not be fetched |
//! | 5 | printing failed |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cat_ticker::{
    TickerError,
    config::{AccountKind, Config, PartialConfig},
    console::{self, ConsoleLog, KeyboardCancel},
    market::{MarketSession, XapiClient},
    printer::PrinterConfig,
    render::ReportRenderer,
    scheduler::{Scheduler, TerminationReason, bounded, collect_snapshot},
    transport::BleTransport,
};

/// Cat Ticker - market quotes on a Bluetooth thermal printer
#[derive(Parser, Debug)]
#[command(name = "cat-ticker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the ticker until ESC (the default)
    Run,

    /// Fetch one report and save it as PNG instead of printing
    Preview {
        /// Output PNG file
        #[arg(long, value_name = "FILE")]
        png: PathBuf,
    },

    /// Save the provider's full symbol list as JSON
    Symbols {
        /// Output file
        #[arg(long, value_name = "FILE", default_value = "all_symbols.json")]
        output: PathBuf,
    },
}

/// Settings layer from flags and environment. Wins over the config file.
#[derive(Args, Debug)]
struct Settings {
    /// JSON config file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Numeric brokerage user id
    #[arg(long, global = true)]
    user_id: Option<u64>,

    /// Brokerage password
    #[arg(long, env = "CAT_TICKER_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Account kind
    #[arg(long, value_enum, global = true)]
    account: Option<AccountKind>,

    /// Advertised Bluetooth name (or address) of the printer
    #[arg(long, global = true)]
    printer_name: Option<String>,

    /// Comma-separated symbols, in print order
    #[arg(long, value_delimiter = ',', global = true)]
    symbols: Option<Vec<String>>,

    /// Minutes between keep-alive pings
    #[arg(long, global = true)]
    ping_minutes: Option<u64>,

    /// Minutes between print-outs
    #[arg(long, global = true)]
    print_minutes: Option<u64>,

    /// Monospaced TrueType font (embedded bitmap font when omitted)
    #[arg(long, value_name = "FILE", global = true)]
    font: Option<PathBuf>,

    /// Extra blank paper fed after each report, in dots
    #[arg(long, global = true)]
    extra_feed: Option<u16>,

    /// Print energy (heat), 0..=65535
    #[arg(long, global = true)]
    energy: Option<u16>,

    /// Print speed, 1..=255 (lower is faster)
    #[arg(long, global = true)]
    speed: Option<u16>,

    /// Timezone of the exchange's daily candles
    #[arg(long, global = true)]
    timezone: Option<String>,

    /// Print the first report right after connecting
    #[arg(long, global = true)]
    print_now: bool,
}

impl Settings {
    fn layer(&self) -> PartialConfig {
        PartialConfig {
            user_id: self.user_id,
            password: self.password.clone(),
            account: self.account,
            symbols: self.symbols.clone(),
            ping_minutes: self.ping_minutes,
            report_minutes: self.print_minutes,
            printer_name: self.printer_name.clone(),
            font_path: self.font.clone(),
            extra_feed: self.extra_feed,
            energy: self.energy,
            speed: self.speed,
            timezone: self.timezone.clone(),
            report_on_start: self.print_now.then_some(true),
            ..Default::default()
        }
    }

    /// File layer (if any) with the flags on top, prompting for the rest.
    fn resolve(&self, needs_printer: bool) -> Result<Config, TickerError> {
        let file = match &self.config {
            Some(path) => PartialConfig::from_file(path)?,
            None => PartialConfig::default(),
        };
        let mut partial = file.merge(self.layer());

        console::fill_missing(&mut partial, needs_printer)?;

        if needs_printer {
            partial.resolve()
        } else {
            partial.resolve_without_printer()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cat_ticker=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ConsoleLog)
        .with_target(false)
        .init();
}

async fn run() -> Result<i32, TickerError> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_ticker(&cli.settings).await,
        Commands::Preview { png } => {
            preview(&cli.settings, png).await?;
            Ok(0)
        }
        Commands::Symbols { output } => {
            dump_symbols(&cli.settings, output).await?;
            Ok(0)
        }
    }
}

async fn run_ticker(settings: &Settings) -> Result<i32, TickerError> {
    let config = settings.resolve(true)?;
    let renderer = ReportRenderer::from_config(&config)?;
    println!(
        "\nConnecting to broker and printer {}; ticker every {} minute(s).",
        config.print.printer_name,
        config.report_minutes()
    );
    let cancel = KeyboardCancel::new()?;
    let mut scheduler = Scheduler::new(config, renderer, cancel).with_status(console::show_status);

    let termination = scheduler
        .run(XapiClient::new(), BleTransport::new(PrinterConfig::CAT_384))
        .await;
    // leaves raw mode
    drop(scheduler);

    if termination.reason == TerminationReason::UserCancelled {
        println!("\rDisconnected from broker and printer. Goodbye");
    } else {
        println!("\r{}, quitting", termination);
    }
    Ok(termination.exit_code())
}

async fn preview(settings: &Settings, png: PathBuf) -> Result<(), TickerError> {
    let config = settings.resolve(false)?;
    let renderer = ReportRenderer::from_config(&config)?;

    println!("Connecting to broker...");
    let mut market = bounded(
        config.call_timeout,
        "market login",
        MarketSession::connect(XapiClient::new(), &config),
    )
    .await?;
    let snapshot = collect_snapshot(&mut market, &config).await;
    market.disconnect().await;
    let snapshot = snapshot?;

    let text = renderer.compose(&snapshot);
    println!("{}", text.header);
    for line in &text.body {
        println!("{}", line);
    }
    println!("{}", text.footer);

    renderer.render_text(&text).save_png(&png)?;
    println!("Saved to {}", png.display());
    Ok(())
}

async fn dump_symbols(settings: &Settings, output: PathBuf) -> Result<(), TickerError> {
    let config = settings.resolve(false)?;

    println!("Getting all symbols...");
    let mut market = bounded(
        config.call_timeout,
        "market login",
        MarketSession::connect(XapiClient::new(), &config),
    )
    .await?;
    let symbols = bounded(config.call_timeout, "getAllSymbols", market.all_symbols()).await;
    market.disconnect().await;

    std::fs::write(&output, serde_json::to_string_pretty(&symbols?)?)?;
    println!("Saved to {}", output.display());
    Ok(())
}
