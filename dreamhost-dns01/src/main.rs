mod cli;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use dh_acme::{
    ACME_CHALLENGE_LABEL, Authenticator, AuthenticatorConfig, ChallengeRecords, DomainResolver,
    DreamHostClient, challenge_name,
};
use dh_common::config::EnvConfig;
use dh_common::credentials::resolve_api_key;
use dh_dns::{CanonicalResolver, DnsConfig};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use cli::{ChallengeArg, Command};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match cli::parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}\n\n{}", e, cli::USAGE);
            std::process::exit(2);
        }
    };
    if opts.command == Command::Help {
        println!("{}\n\n{}", dh_acme::DESCRIPTION, cli::USAGE);
        return Ok(());
    }

    // .env may set variables, so it is read while this is still the only thread
    let mut env = EnvConfig::load(opts.env_file.as_deref());
    opts.overrides.apply(&mut env);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dreamhost_dns01=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(execute(opts.command, env))
}

async fn execute(command: Command, env: EnvConfig) -> Result<()> {
    let dns_config = dns_config(&env);
    debug!(servers = ?dns_config.upstream_servers, "DNS upstream servers");
    let resolver = DomainResolver::new(CanonicalResolver::from_config(&dns_config));

    match command {
        Command::Resolve(domains) => resolve(&resolver, &domains).await,
        Command::Run(challenges) => {
            let client = dreamhost_client(&env)?;
            let config = AuthenticatorConfig {
                propagation_seconds: env.propagation_seconds,
                min_propagation_seconds: env.min_propagation_seconds,
            };
            let auth = Authenticator::new(config, resolver, Arc::new(client), ChallengeRecords::new());
            run(Arc::new(auth), challenges).await
        }
        Command::List(domain) => {
            let client = dreamhost_client(&env)?;
            list(&resolver, &client, &domain).await
        }
        Command::Help => Ok(()),
    }
}

fn dns_config(env: &EnvConfig) -> DnsConfig {
    DnsConfig {
        upstream_servers: env.dns_upstream_servers.clone().unwrap_or_default(),
        upstream_timeout_ms: env.dns_upstream_timeout_ms,
        max_redirects: env.dns_max_redirects,
    }
}

fn dreamhost_client(env: &EnvConfig) -> Result<DreamHostClient> {
    let api_key = resolve_api_key(env)?;
    DreamHostClient::with_base_url(
        env.dreamhost_api_url.clone(),
        api_key,
        Duration::from_secs(env.http_timeout_secs),
    )
    .context("Failed to build DreamHost API client")
}

async fn resolve(resolver: &DomainResolver, domains: &[String]) -> Result<()> {
    let mut failed = 0;
    for domain in domains {
        match resolver.resolve(domain).await {
            Ok(split) => println!(
                "{}\tzone={}\trelative={}\trecord={}",
                domain,
                split.zone,
                split.relative_name,
                split.record_name()
            ),
            Err(e) => {
                error!(domain = %domain, "{}", e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} domains could not be resolved", failed, domains.len());
    }
    Ok(())
}

/// Create every challenge record, wait for propagation, then remove them again
async fn run(auth: Arc<Authenticator>, challenges: Vec<ChallengeArg>) -> Result<()> {
    let mut performs = JoinSet::new();
    for challenge in challenges.iter().cloned() {
        let auth = auth.clone();
        performs.spawn(async move {
            let validation_name = challenge_name(&challenge.domain);
            let result = auth
                .perform(&challenge.domain, &validation_name, &challenge.validation)
                .await;
            (challenge, result)
        });
    }

    let mut placed = Vec::new();
    let mut failures = 0;
    while let Some(joined) = performs.join_next().await {
        let (challenge, result) = joined.context("perform task panicked")?;
        match result {
            Ok(()) => placed.push(challenge),
            Err(e) => {
                error!(domain = %challenge.domain, retryable = e.is_retryable(), "{}", e);
                failures += 1;
            }
        }
    }

    if !placed.is_empty() {
        wait_for_propagation(auth.config().propagation_seconds).await?;
    }

    let mut cleanups = JoinSet::new();
    for challenge in placed {
        let auth = auth.clone();
        cleanups.spawn(async move {
            let validation_name = challenge_name(&challenge.domain);
            let result = auth
                .cleanup(&challenge.domain, &validation_name, &challenge.validation)
                .await;
            (challenge, result)
        });
    }
    while let Some(joined) = cleanups.join_next().await {
        let (challenge, result) = joined.context("cleanup task panicked")?;
        if let Err(e) = result {
            error!(domain = %challenge.domain, "Cleanup failed, remove the record manually: {}", e);
            failures += 1;
        }
    }

    for leftover in auth.outstanding().await {
        warn!(record_name = %leftover.record_name(), "Challenge record still tracked after cleanup");
    }

    if failures > 0 {
        bail!("{} of {} challenge operations failed", failures, challenges.len());
    }
    info!(count = challenges.len(), "All challenges completed");
    Ok(())
}

/// Sleep for the propagation period; SIGINT/SIGTERM cut it short so records still get removed
async fn wait_for_propagation(seconds: u64) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();

    info!(seconds, "Waiting for DNS propagation");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        signal = signals.next() => {
            if let Some(signal) = signal {
                warn!(signal, "Interrupted, cleaning up challenge records now");
            }
        }
    }

    handle.close();
    Ok(())
}

async fn list(resolver: &DomainResolver, client: &DreamHostClient, domain: &str) -> Result<()> {
    let placement = resolver.resolve(domain).await?;
    let record_name = placement.record_name();

    let records = client.list_records().await?;
    let mut seen = HashSet::new();
    for entry in records.iter().filter(|e| {
        e.record_type == "TXT"
            && e.zone == placement.zone
            && (e.record == record_name || e.record.starts_with(ACME_CHALLENGE_LABEL))
    }) {
        if seen.insert((&entry.record, &entry.value)) {
            println!("{}\tTXT\t{}", entry.record, entry.value);
        }
    }

    if seen.is_empty() {
        info!(zone = %placement.zone, "No challenge TXT records found");
    }
    Ok(())
}
