// # fwsync - IPv6 firewall allow-list reconciler
//
// This binary is a THIN integration layer:
// - Reading configuration from environment variables
// - Initializing logging and the runtime
// - Registering router drivers and address sources
// - Running one reconciliation and mapping its outcome to an exit code
//
// All reconciliation logic lives in fwsync-core.
//
// ## Configuration
//
// ### Address Source
// - `FWSYNC_ADDRESS_SOURCE`: interfaces (default), hostname, http
// - `FWSYNC_INTERFACE`: Only consider this interface (interfaces)
// - `FWSYNC_ADDRESS_URL`: Echo service URL (http)
// - `FWSYNC_ADDRESS_TIMEOUT_SECS`: Echo service timeout (http)
//
// ### Router
// - `FWSYNC_ROUTER_URL`: Management URL (default http://192.168.29.1)
// - `FWSYNC_ROUTER_USER`: Login name (default admin)
// - `FWSYNC_ROUTER_PASSWORD`: Login password
// - `FWSYNC_REQUEST_TIMEOUT_SECS`: Per-request HTTP timeout
// - `FWSYNC_DRY_RUN`: Read the table but never change it (true/false)
//
// ### Engine
// - `FWSYNC_OPERATION_TIMEOUT_SECS`: Bound for each router call
// - `FWSYNC_SETTLE_MS`: Pause after each mutation
// - `FWSYNC_CONFIRM_DELETE_TWICE`: Issue every delete twice (true/false)
// - `FWSYNC_VERIFY`: Re-read the table after changing it (true/false)
//
// ### Output
// - `FWSYNC_LOG_LEVEL`: trace, debug, info (default), warn, error
// - `FWSYNC_REPORT`: text (default) or json (run report on stdout)
//
// ## Example
//
// ```bash
// export FWSYNC_ROUTER_PASSWORD=changeme
// export FWSYNC_INTERFACE=eth0
//
// fwsync
// ```

use anyhow::{Context, Result};
use fwsync_core::config::{
    AddressSourceConfig, Credentials, EngineConfig, RouterConfig, SyncConfig,
    DEFAULT_ROUTER_URL, DEFAULT_USERNAME,
};
use fwsync_core::{DriverRegistry, RunReport, SyncEngine};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Fallback echo service for the http source
const DEFAULT_ADDRESS_URL: &str = "https://api6.ipify.org";

/// Exit codes for the possible run outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FwsyncExitCode {
    /// Rule table converged (or already was)
    Converged = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Run aborted before completing (no address, login, navigation,
    /// timeout, or a signal)
    Aborted = 2,
    /// Run completed without converging: some delete, the create or
    /// verification failed, or a dry run left changes pending
    Partial = 3,
}

impl From<FwsyncExitCode> for ExitCode {
    fn from(code: FwsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// How to present the finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => anyhow::bail!(
                "FWSYNC_REPORT '{}' is not valid. Valid formats: text, json",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    sync: SyncConfig,
    log_level: String,
    report: ReportFormat,
    password_from_env: bool,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, with defaults for anything unset
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parsed = |name: &str| -> Result<Option<u64>> {
            lookup(name)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .with_context(|| format!("{} must be a non-negative integer, got '{}'", name, raw))
                })
                .transpose()
        };
        let flag = |name: &str| -> Result<Option<bool>> {
            lookup(name)
                .map(|raw| match raw.trim().to_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Ok(true),
                    "0" | "false" | "no" | "off" => Ok(false),
                    _ => Err(anyhow::anyhow!("{} must be true or false, got '{}'", name, raw)),
                })
                .transpose()
        };

        let address_source = match lookup("FWSYNC_ADDRESS_SOURCE")
            .unwrap_or_else(|| "interfaces".to_string())
            .as_str()
        {
            "interfaces" => AddressSourceConfig::Interfaces {
                interface: lookup("FWSYNC_INTERFACE"),
            },
            "hostname" => AddressSourceConfig::Hostname,
            "http" => AddressSourceConfig::Http {
                url: lookup("FWSYNC_ADDRESS_URL").unwrap_or_else(|| DEFAULT_ADDRESS_URL.to_string()),
                timeout_secs: parsed("FWSYNC_ADDRESS_TIMEOUT_SECS")?.unwrap_or(10),
            },
            other => anyhow::bail!(
                "FWSYNC_ADDRESS_SOURCE '{}' is not supported. \
                Supported sources: interfaces, hostname, http",
                other
            ),
        };

        let router = RouterConfig::Web {
            base_url: lookup("FWSYNC_ROUTER_URL").unwrap_or_else(|| DEFAULT_ROUTER_URL.to_string()),
            dry_run: flag("FWSYNC_DRY_RUN")?.unwrap_or(false),
            request_timeout_secs: parsed("FWSYNC_REQUEST_TIMEOUT_SECS")?.unwrap_or(30),
        };

        let password = lookup("FWSYNC_ROUTER_PASSWORD");
        let password_from_env = password.is_some();
        let defaults = Credentials::default();
        let credentials = Credentials::new(
            lookup("FWSYNC_ROUTER_USER").unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password.unwrap_or(defaults.password),
        );

        let engine_defaults = EngineConfig::default();
        let engine = EngineConfig {
            operation_timeout_secs: parsed("FWSYNC_OPERATION_TIMEOUT_SECS")?
                .unwrap_or(engine_defaults.operation_timeout_secs),
            mutation_settle_ms: parsed("FWSYNC_SETTLE_MS")?
                .unwrap_or(engine_defaults.mutation_settle_ms),
            confirm_delete_twice: flag("FWSYNC_CONFIRM_DELETE_TWICE")?
                .unwrap_or(engine_defaults.confirm_delete_twice),
            verify_after_apply: flag("FWSYNC_VERIFY")?
                .unwrap_or(engine_defaults.verify_after_apply),
            ..engine_defaults
        };

        Ok(Self {
            sync: SyncConfig {
                address_source,
                router,
                credentials,
                engine,
            },
            log_level: lookup("FWSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            report: lookup("FWSYNC_REPORT")
                .map(|raw| raw.parse::<ReportFormat>())
                .transpose()?
                .unwrap_or(ReportFormat::Text),
            password_from_env,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.sync.validate()?;

        if let AddressSourceConfig::Http { url, .. } = &self.sync.address_source
            && url.starts_with("http://")
        {
            eprintln!(
                "WARNING: FWSYNC_ADDRESS_URL uses HTTP (not HTTPS). \
                The reported address could be tampered with."
            );
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "FWSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FwsyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return FwsyncExitCode::ConfigError.into();
    }

    // Initialize tracing; logs go to stderr so a JSON report owns stdout
    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FwsyncExitCode::ConfigError.into();
    }

    info!("Starting fwsync");
    if !config.password_from_env {
        warn!("FWSYNC_ROUTER_PASSWORD not set, using the factory default password");
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FwsyncExitCode::ConfigError.into();
        }
    };

    let code = rt.block_on(async {
        match run(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Startup error: {:#}", e);
                FwsyncExitCode::ConfigError
            }
        }
    });

    code.into()
}

/// Build the registry with every compiled-in driver and source
fn registry() -> DriverRegistry {
    let registry = DriverRegistry::new();

    #[cfg(feature = "web")]
    fwsync_router_web::register(&registry);

    #[cfg(feature = "local")]
    fwsync_ip_local::register(&registry);

    #[cfg(feature = "http")]
    fwsync_ip_http::register(&registry);

    debug!(
        "Registered routers {:?}, address sources {:?}",
        registry.list_routers(),
        registry.list_address_sources()
    );
    registry
}

/// Run one reconciliation
///
/// `Err` means the run could not be started at all.
async fn run(config: Config) -> Result<FwsyncExitCode> {
    let registry = registry();

    let source = registry
        .create_address_source(&config.sync.address_source)
        .context("Failed to create address source")?;
    let router = registry
        .create_router(&config.sync.router)
        .context("Failed to create router driver")?;

    info!(
        "Address source: {}, router driver: {}",
        source.source_name(),
        router.driver_name()
    );

    let (engine, mut events) = SyncEngine::new(source, router, config.sync)?;

    // Decisions are already logged by the engine
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Event: {:?}", event);
        }
    });

    let outcome = tokio::select! {
        result = engine.run() => Some(result),
        signal = wait_for_shutdown_signal() => {
            match signal {
                Ok(name) => warn!("Received {}, abandoning run", name),
                Err(e) => error!("Signal handling failed: {}", e),
            }
            None
        }
    };

    if outcome.is_none() {
        // Close any admin session the dropped run left open
        engine.abandon().await;
    }

    drop(engine);
    if let Err(e) = event_log.await {
        debug!("Event logger ended abnormally: {}", e);
    }

    let code = match outcome {
        None => {
            report_abort(config.report, "interrupted");
            FwsyncExitCode::Aborted
        }
        Some(Err(e)) => {
            error!("Run aborted: {}", e);
            report_abort(config.report, &e.to_string());
            FwsyncExitCode::Aborted
        }
        Some(Ok(report)) => {
            let code = exit_code_for(&report);
            print_report(config.report, &report)?;
            code
        }
    };

    Ok(code)
}

fn exit_code_for(report: &RunReport) -> FwsyncExitCode {
    if report.is_converged() {
        FwsyncExitCode::Converged
    } else {
        FwsyncExitCode::Partial
    }
}

fn print_report(format: ReportFormat, report: &RunReport) -> Result<()> {
    match format {
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        ReportFormat::Text => {
            info!(
                "{:?} for {}: {} deletion(s), {} failed, verified={:?}{}",
                report.summary,
                report.address,
                report.deletions.len(),
                report.failed_deletions(),
                report.verified,
                if report.dry_run { " [DRY-RUN]" } else { "" }
            );
        }
    }
    Ok(())
}

fn report_abort(format: ReportFormat, reason: &str) {
    if format == ReportFormat::Json {
        println!("{}", serde_json::json!({ "aborted": reason }));
    }
}

/// Wait for SIGTERM or SIGINT
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
