//! Watches one or more deployments and periodically prints the generated
//! LLM context block, the way the host assistant would consume it.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use kubewatch::{summary, MultiWatchConfig, MultiWatcher, WatchConfig};
use kubewatch_prometheus::PrometheusRecorder;
use tokio::time;
use tracing::info;

#[derive(Parser)]
#[clap(version)]
struct Args {
    /// The tracing filter used for logs
    #[clap(long, env = "KUBEWATCH_LOG", default_value = "watch=info,kubewatch=info,warn")]
    log_level: String,

    /// Path to a multi-target YAML configuration
    #[clap(long)]
    config: Option<PathBuf>,

    /// Deployment to watch when no configuration file is given
    #[clap(long)]
    deployment: Option<String>,

    /// Namespace of the deployment
    #[clap(long, default_value = "default")]
    namespace: String,

    /// Path to a kubeconfig (defaults to the usual lookup, then in-cluster)
    #[clap(long)]
    kubeconfig: Option<PathBuf>,

    /// How often to print the assembled context, in seconds
    #[clap(long, default_value = "60")]
    print_every: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match (&args.config, &args.deployment) {
        (Some(path), _) => MultiWatchConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(deployment)) => {
            let mut single = WatchConfig::new(deployment.clone());
            single.namespace = args.namespace.clone();
            single.kubeconfig = args.kubeconfig.clone();
            MultiWatchConfig::from(single)
        }
        (None, None) => bail!("either --config or --deployment is required"),
    };

    let client = kubewatch::client::init(config.kubeconfig.as_deref())
        .await
        .context("initializing the Kubernetes client")?;

    let mut prom = prometheus_client::registry::Registry::default();
    let recorder = PrometheusRecorder::register(prom.sub_registry_with_prefix("kubewatch"));

    let mut watcher = MultiWatcher::new(client, &config);
    watcher.set_metrics(Arc::new(recorder));
    let stores = watcher.stores();

    let (shutdown, watch) = kubewatch::shutdown::channel();
    let watchers = tokio::spawn(watcher.run(watch));

    let max_chars = config.max_context_chars;
    let printer = tokio::spawn(async move {
        let mut ticker = time::interval(time::Duration::from_secs(args.print_every.max(1)));
        loop {
            ticker.tick().await;
            info!("{}", summary::render_multi_status(&stores));
            println!("{}", summary::render_multi_context(&stores, max_chars));
        }
    });

    shutdown
        .on_signal()
        .await
        .context("waiting for shutdown")?;
    printer.abort();
    watchers.await.context("watcher task")?;

    info!("done");
    Ok(())
}
