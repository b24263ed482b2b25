use std::sync::Arc;

use serde::Serialize;

use crate::config::{Settings, ENV_GITHUB_TOKEN};
use crate::data::cache::RefreshPolicy;
use crate::data::country::{CountryIndex, ResolveError};
use crate::data::license::{check_license, license_report};
use crate::fetch::{
    lookup_boundary, run_full_analysis, BoundaryLookup, Collector, DatasetOrigin, HttpTransport,
    LookupError, ReqwestTransport,
};
use crate::github::{summarize_pull_request, GithubError};
use crate::server;

const USAGE: &str =
    "usage: geoguardian <collect|licenses|resolve|boundary|issues|prs|pr|status|serve>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Collect,
    Licenses,
    Resolve,
    Boundary,
    Issues,
    PullRequests,
    PullRequest,
    Status,
    Serve,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("collect") => Some(Command::Collect),
        Some("licenses") => Some(Command::Licenses),
        Some("resolve") => Some(Command::Resolve),
        Some("boundary") => Some(Command::Boundary),
        Some("issues") => Some(Command::Issues),
        Some("prs") => Some(Command::PullRequests),
        Some("pr") => Some(Command::PullRequest),
        Some("status") => Some(Command::Status),
        Some("serve") => Some(Command::Serve),
        _ => None,
    }
}

pub async fn run_with_args(args: &[String]) -> i32 {
    let Some(command) = parse_command(args) else {
        eprintln!("{USAGE}");
        return 2;
    };
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return 2;
        }
    };

    match command {
        Command::Collect => handle_collect(args, settings).await,
        Command::Licenses => handle_licenses(&settings),
        Command::Resolve => handle_resolve(args, &settings),
        Command::Boundary => handle_boundary(args, &settings).await,
        Command::Issues => handle_issues(&settings).await,
        Command::PullRequests => handle_pull_requests(&settings).await,
        Command::PullRequest => handle_pull_request(args, &settings).await,
        Command::Status => handle_status(&settings),
        Command::Serve => handle_serve(settings).await,
    }
}

#[derive(Debug, Serialize)]
struct CollectSummary {
    #[serde(flatten)]
    origin: DatasetOrigin,
    records: usize,
    missing: usize,
    metadata_path: String,
    missing_path: String,
}

async fn handle_collect(args: &[String], settings: Settings) -> i32 {
    let policy = match refresh_override(&args[2..]) {
        Ok(policy) => policy.unwrap_or(settings.refresh),
        Err(message) => {
            eprintln!("{message}");
            eprintln!("usage: geoguardian collect [--refresh <never|always|DAYS>]");
            return 2;
        }
    };
    let Some(transport) = build_transport(&settings) else {
        return 1;
    };
    let collector = Collector::new(settings.boundary_fetcher(transport));

    match run_full_analysis(&settings.paths, policy, &collector).await {
        Ok(outcome) => print_json(&CollectSummary {
            origin: outcome.origin,
            records: outcome.collection.records.len(),
            missing: outcome.collection.missing.len(),
            metadata_path: settings.paths.metadata.display().to_string(),
            missing_path: settings.paths.missing.display().to_string(),
        }),
        Err(err) => {
            eprintln!("collection failed: {err}");
            eprintln!("previous dataset (if any) was left untouched");
            1
        }
    }
}

fn refresh_override(flags: &[String]) -> Result<Option<RefreshPolicy>, String> {
    match flags {
        [] => Ok(None),
        [flag, value] if flag == "--refresh" => RefreshPolicy::parse(value)
            .map(Some)
            .ok_or_else(|| format!("invalid refresh policy '{value}'")),
        _ => Err(format!("unexpected arguments: {}", flags.join(" "))),
    }
}

fn handle_licenses(settings: &Settings) -> i32 {
    match check_license(&settings.paths.metadata, &settings.acceptable_licenses) {
        Ok(classification) => print_json(&serde_json::json!({
            "report": license_report(&classification),
            "unacceptable": classification.unacceptable,
        })),
        Err(err) => {
            eprintln!("license check failed: {err}");
            1
        }
    }
}

fn handle_resolve(args: &[String], settings: &Settings) -> i32 {
    if args.len() < 3 {
        eprintln!("usage: geoguardian resolve <country name or ISO code>");
        return 2;
    }
    let input = args[2..].join(" ");
    let index = match CountryIndex::load(&settings.paths.iso) {
        Ok(index) => index,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    match index.resolve(&input) {
        Ok(iso) => print_json(&serde_json::json!({
            "input": input.trim(),
            "country": index.country_for_iso(&iso),
            "iso": iso,
        })),
        Err(err) => resolve_failure(&err),
    }
}

fn resolve_failure(err: &ResolveError) -> i32 {
    eprintln!("{err}");
    match err {
        ResolveError::NotFound { .. } => 1,
        ResolveError::InvalidInput(_) => 2,
    }
}

async fn handle_boundary(args: &[String], settings: &Settings) -> i32 {
    let (Some(country), Some(adm)) = (args.get(2), args.get(3)) else {
        eprintln!("usage: geoguardian boundary <country name or ISO code> <ADM level>");
        return 2;
    };
    let index = match CountryIndex::load(&settings.paths.iso) {
        Ok(index) => index,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let Some(transport) = build_transport(settings) else {
        return 1;
    };
    let fetcher = settings.boundary_fetcher(transport);

    match lookup_boundary(&index, &fetcher, country, adm).await {
        Ok(BoundaryLookup::Found(record)) => print_json(&serde_json::json!({
            "status": "found",
            "boundary": record,
        })),
        Ok(BoundaryLookup::NotFound) => print_json(&serde_json::json!({
            "status": "not_found",
            "country": country,
            "adm": adm,
        })),
        Err(LookupError::Adm(err)) => {
            eprintln!("{err}");
            2
        }
        Err(LookupError::Resolve(err)) => resolve_failure(&err),
        Err(LookupError::Fetch(err)) => {
            eprintln!("boundary lookup failed: {err}");
            1
        }
    }
}

async fn handle_issues(settings: &Settings) -> i32 {
    let Some(transport) = build_transport(settings) else {
        return 1;
    };
    match settings.github_client(transport).list_issues().await {
        Ok(issues) => print_json(&issues),
        Err(err) => github_failure(&err),
    }
}

async fn handle_pull_requests(settings: &Settings) -> i32 {
    let Some(transport) = build_transport(settings) else {
        return 1;
    };
    match settings.github_client(transport).list_pull_requests().await {
        Ok(pulls) => print_json(&pulls),
        Err(err) => github_failure(&err),
    }
}

async fn handle_pull_request(args: &[String], settings: &Settings) -> i32 {
    let Some(number) = args.get(2).and_then(|raw| raw.trim_start_matches('#').parse::<u64>().ok())
    else {
        eprintln!("usage: geoguardian pr <number>");
        return 2;
    };
    let Some(transport) = build_transport(settings) else {
        return 1;
    };
    let client = settings.github_client(transport);

    let pull = match client.pull_request(number).await {
        Ok(Some(pull)) => pull,
        Ok(None) => {
            eprintln!("pull request #{number} not found");
            return 1;
        }
        Err(err) => return github_failure(&err),
    };
    let issues = match client.list_issues().await {
        Ok(issues) => issues,
        Err(err) => return github_failure(&err),
    };
    match summarize_pull_request(&client, &pull, &issues).await {
        Ok(summary) => print_json(&summary),
        Err(err) => github_failure(&err),
    }
}

fn github_failure(err: &GithubError) -> i32 {
    eprintln!("GitHub request failed: {err}");
    if let GithubError::RateLimited {
        reset_at,
        authenticated,
        ..
    } = err
    {
        if let Some(reset_at) = reset_at {
            eprintln!("rate limit resets at unix time {reset_at}");
        }
        if !authenticated {
            eprintln!("set {ENV_GITHUB_TOKEN} for a higher rate limit");
        }
    }
    1
}

fn handle_status(settings: &Settings) -> i32 {
    match server::api::dataset_status(settings, chrono::Local::now()) {
        Ok(status) => print_json(&status),
        Err(err) => {
            eprintln!("status check failed: {err}");
            1
        }
    }
}

async fn handle_serve(settings: Settings) -> i32 {
    match tokio::task::spawn_blocking(move || server::run_server(&settings)).await {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            eprintln!("server error: {err}");
            1
        }
        Err(err) => {
            eprintln!("server task failed: {err}");
            1
        }
    }
}

fn build_transport(settings: &Settings) -> Option<Arc<dyn HttpTransport>> {
    match ReqwestTransport::new(settings.http.timeout()) {
        Ok(transport) => Some(Arc::new(transport)),
        Err(err) => {
            eprintln!("{err}");
            None
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize result: {err}");
            1
        }
    }
}
