//! SecurityProfile operator - namespace mTLS and network restriction from a CRD

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, CustomResourceExt};

use security_profile_operator::config::{
    OperatorConfig, DEFAULT_CONFLICT_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_REQUEUE_INTERVAL,
    DEFAULT_RETRY_INITIAL_DELAY,
};
use security_profile_operator::controller::{error_policy, reconcile, Context};
use security_profile_operator::crd::SecurityProfile;
use security_profile_operator::kube_utils::{
    apply_crd, create_client_with_timeout, DEFAULT_CONNECT_TIMEOUT,
};
use security_profile_operator::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use security_profile_operator::FIELD_MANAGER;

/// SecurityProfile operator - converges namespace security posture
#[derive(Parser, Debug)]
#[command(name = "security-profile-operator", version, about, long_about = None)]
struct Cli {
    /// Print the SecurityProfile CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Installs the SecurityProfile CRD, then watches SecurityProfiles and
    /// converges their target namespaces.
    Controller(ControllerArgs),
}

/// Controller mode arguments
#[derive(Parser, Debug)]
struct ControllerArgs {
    /// Path to a kubeconfig file (default: in-cluster, then ~/.kube/config)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Field manager recorded on every write
    #[arg(long, env = "SECPROF_FIELD_MANAGER", default_value = FIELD_MANAGER)]
    field_manager: String,

    /// Attempts for a conflicting write, including the first
    #[arg(long, default_value_t = DEFAULT_CONFLICT_RETRIES)]
    conflict_retries: u32,

    /// Delay before the first conflict retry, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_INITIAL_DELAY.as_millis() as u64)]
    retry_initial_delay_ms: u64,

    /// Bound on a single API request, in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout_secs: u64,

    /// Interval between periodic reconciliations of a converged profile, in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEUE_INTERVAL.as_secs())]
    requeue_secs: u64,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Default for ControllerArgs {
    fn default() -> Self {
        // Same values clap would fill in for `controller` with no flags
        Self::parse_from(["controller"])
    }
}

impl From<ControllerArgs> for OperatorConfig {
    fn from(args: ControllerArgs) -> Self {
        Self {
            kubeconfig: args.kubeconfig,
            field_manager: args.field_manager,
            conflict_retries: args.conflict_retries,
            retry_initial_delay: Duration::from_millis(args.retry_initial_delay_ms),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            requeue_interval: Duration::from_secs(args.requeue_secs),
            log_format: args.log_format,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The kube client's rustls backend needs a process-wide crypto provider
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&SecurityProfile::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let args = match cli.command {
        Some(Commands::Controller(args)) => args,
        None => ControllerArgs::default(),
    };
    run_controller(OperatorConfig::from(args)).await
}

/// Run the SecurityProfile controller until a shutdown signal arrives
async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    init_telemetry(TelemetryConfig {
        format: config.log_format,
        filter: None,
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    tracing::info!(
        field_manager = %config.field_manager,
        conflict_retries = config.conflict_retries,
        "starting security profile operator"
    );

    let client = create_client_with_timeout(
        config.kubeconfig.as_deref(),
        DEFAULT_CONNECT_TIMEOUT,
        config.request_timeout,
    )
    .await?;

    apply_crd::<SecurityProfile>(&client, &config.field_manager).await?;

    let ctx = Arc::new(Context::new(client.clone(), &config));
    let profiles: Api<SecurityProfile> = Api::all(client);

    tracing::info!("watching SecurityProfile resources");

    Controller::new(profiles, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "SecurityProfile reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "SecurityProfile reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("controller stopped");
    Ok(())
}
