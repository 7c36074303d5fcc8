use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use quarry_core::report::{self, ReportFormat};
use quarry_core::wordlist::{BuiltinWordlist, load_wordlist};
use quarry_core::{ScanConfig, Scanner, Stats};
use quarry_scanner::{Endpoint, EndpointSource, ProbeResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Install the stderr log subscriber; `RUST_LOG` wins over `--verbose`
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_banner() {
    print_divider();
    println!(
        "{}  {}",
        "  QUARRY".bright_white().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!("{}", "  Endpoint discovery and probing".bright_blue());
    print_divider();
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

// Input parsing helpers

/// Read a newline-delimited file, skipping blank lines and `#` comments
pub fn load_lines_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let content = fs::read_to_string(&expanded)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

/// Load proxy URLs from a file; bare `host:port` lines get an `http://` scheme
pub fn load_proxies_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let proxies: Vec<String> = load_lines_from_file(path)?
        .iter()
        .filter_map(|line| parse_url_line(line))
        .collect();

    if proxies.is_empty() {
        return Err(format!("No valid proxies found in {}", path.display()));
    }

    Ok(proxies)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Split a comma-separated method list, uppercasing each entry
pub fn parse_methods(methods: &str) -> Vec<String> {
    methods
        .split(',')
        .map(|m| m.trim().to_uppercase())
        .filter(|m| !m.is_empty())
        .collect()
}

/// Parse `Name: value`
pub fn parse_header_pair(header: &str) -> Result<(String, String), String> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| format!("Invalid header '{}', expected 'Name: value'", header))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid header '{}', name is empty", header));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse `name=value`
pub fn parse_cookie_pair(cookie: &str) -> Result<(String, String), String> {
    let (name, value) = cookie
        .split_once('=')
        .ok_or_else(|| format!("Invalid cookie '{}', expected 'name=value'", cookie))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid cookie '{}', name is empty", cookie));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Path component of a URL, `/` for the root
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| {
            let path = u.path();
            if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            }
        })
        .unwrap_or_else(|_| url.to_string())
}

/// Scan configuration from an optional config file, overridden by command line flags
pub fn build_config(args: &ArgMatches) -> Result<ScanConfig, String> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => ScanConfig::from_file(path).map_err(|e| e.to_string())?,
        None => ScanConfig::default(),
    };

    if let Some(url) = args.get_one::<Url>("url") {
        config.base_url = url.as_str().to_string();
    }
    if let Some(&timeout) = args.get_one::<u64>("timeout") {
        config.timeout_secs = timeout;
    }
    if let Some(agent) = args.get_one::<String>("user-agent") {
        config.user_agent = agent.clone();
    }
    if let Some(&max_redirects) = args.get_one::<usize>("max-redirects") {
        config.max_redirects = max_redirects;
    }
    if args.get_flag("insecure") {
        config.insecure_tls = true;
    }
    if let Some(path) = args.get_one::<PathBuf>("proxies") {
        config.proxy_urls = load_proxies_from_file(path)?;
        config.proxy_rotate = true;
        debug!("Loaded {} proxies from {}", config.proxy_urls.len(), path.display());
    }
    if args.get_flag("no-rotate") {
        config.proxy_rotate = false;
    }
    if let Some(headers) = args.get_many::<String>("header") {
        for header in headers {
            let (name, value) = parse_header_pair(header)?;
            config.headers.insert(name, value);
        }
    }
    if let Some(cookies) = args.get_many::<String>("cookie") {
        for cookie in cookies {
            let (name, value) = parse_cookie_pair(cookie)?;
            config.cookies.insert(name, value);
        }
    }

    Ok(config)
}

/// Wordlist chosen by `--wordlist-file` or `--builtin`, the common list otherwise
pub fn resolve_wordlist(args: &ArgMatches) -> Result<Vec<String>, String> {
    if let Some(path) = args.get_one::<PathBuf>("wordlist-file") {
        return load_wordlist(path).map_err(|e| e.to_string());
    }

    let builtin = args
        .get_one::<String>("builtin")
        .and_then(|name| BuiltinWordlist::from_str(name))
        .unwrap_or(BuiltinWordlist::Common);
    Ok(builtin.words())
}

pub fn output_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

// Handlers

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let mut config = build_config(args).map_err(anyhow::Error::msg)?;
    if let Some(&depth) = args.get_one::<usize>("depth") {
        config.scan_depth = depth;
    }
    if let Some(&threads) = args.get_one::<usize>("threads") {
        config.crawl_concurrency = threads;
    }

    if !quiet {
        println!("{} Crawling {}", "→".blue(), config.base_url.bright_white());
        println!("  Max depth: {}", config.scan_depth);
        println!("  Concurrent fetches: {}", config.crawl_concurrency);
        print_proxy_summary(&config);
        println!();
    }

    let spinner = new_spinner(quiet);
    let progress_spinner = spinner.clone();
    let scanner = Scanner::new(config)
        .context("Failed to create scanner")?
        .with_progress_callback(Arc::new(move |depth: usize, url: String| {
            progress_spinner.set_message(format!("[depth {}] {}", depth, extract_url_path(&url)));
        }));
    let scanner = Arc::new(scanner);
    stop_on_ctrl_c(&scanner);

    let endpoints = scanner.discover().await;
    spinner.finish_and_clear();

    if quiet {
        for endpoint in &endpoints {
            println!("{} {}", endpoint.method, endpoint.url);
        }
    } else {
        println!("{} Crawl complete!\n", "✓".green().bold());
        print_endpoint_summary(&endpoints);
        print_stats(&scanner.stats());
    }

    let format = output_format(args);
    let rendered =
        report::render_endpoints(&endpoints, format).context("Failed to render report")?;
    emit_report(&rendered, args.get_one::<PathBuf>("output"), quiet)
}

pub async fn handle_fuzz(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let mut config = build_config(args).map_err(anyhow::Error::msg)?;
    if let Some(&threads) = args.get_one::<usize>("threads") {
        config.workers = threads;
    }
    let workers = config.workers;

    let wordlist = resolve_wordlist(args).map_err(anyhow::Error::msg)?;
    let methods = args
        .get_one::<String>("methods")
        .map(|m| parse_methods(m))
        .unwrap_or_default();
    let delay = Duration::from_millis(*args.get_one::<u64>("delay").unwrap_or(&0));

    if !quiet {
        println!("{} Fuzzing {}", "→".blue(), config.base_url.bright_white());
        println!("  Wordlist: {} entries", wordlist.len());
        println!("  Methods: {}", methods.join(", "));
        println!("  Workers: {}, Delay: {}ms", workers, delay.as_millis());
        print_proxy_summary(&config);
        println!();
    }

    let method_count = if methods.is_empty() {
        quarry_core::DEFAULT_METHODS.len()
    } else {
        methods.len()
    };
    let total = (wordlist.len() * method_count) as u64;
    let progress = new_progress_bar(total, quiet);
    let result_progress = progress.clone();

    let scanner = Scanner::new(config)
        .context("Failed to create scanner")?
        .with_result_callback(Arc::new(move |_: &ProbeResult| result_progress.inc(1)));
    let scanner = Arc::new(scanner);
    stop_on_ctrl_c(&scanner);

    if args.get_flag("discover") {
        progress.set_message("discovering");
        let endpoints = scanner.discover().await;
        progress.println(format!(
            "{} Discovered {} endpoints",
            "✓".green().bold(),
            endpoints.len()
        ));
    }

    progress.set_message("probing");
    let results = scanner
        .scan_with_wordlist(&wordlist, &methods, workers, delay)
        .await
        .context("Scan failed")?;
    progress.finish_and_clear();

    if quiet {
        for result in results.iter().filter(|r| r.is_success()) {
            println!("{} {} [{}]", result.method, result.url, result.status_code);
        }
    } else {
        println!(
            "{} Completed {} of {} requests\n",
            "✓".green().bold(),
            results.len(),
            total
        );
        print_result_summary(&results);
        print_stats(&scanner.stats());
    }

    let format = output_format(args);
    let rendered = report::render_results(&results, format).context("Failed to render report")?;
    emit_report(&rendered, args.get_one::<PathBuf>("output"), quiet)
}

fn stop_on_ctrl_c(scanner: &Arc<Scanner>) {
    let scanner = Arc::clone(scanner);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Interrupted, finishing in-flight requests...", "⚠".yellow());
            scanner.stop();
        }
    });
}

fn new_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn new_progress_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn emit_report(content: &str, output: Option<&PathBuf>, quiet: bool) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            report::save_report(content, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                println!(
                    "\n{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None if !quiet => {
            println!();
            print!("{}", content);
        }
        None => {}
    }
    Ok(())
}

fn print_proxy_summary(config: &ScanConfig) {
    if config.proxy_urls.is_empty() {
        return;
    }
    println!(
        "  Proxies: {} ({})",
        config.proxy_urls.len(),
        if config.proxy_rotate { "rotating" } else { "fixed" }
    );
}

fn print_endpoint_summary(endpoints: &[Endpoint]) {
    let mut by_source: BTreeMap<EndpointSource, usize> = BTreeMap::new();
    for endpoint in endpoints {
        *by_source.entry(endpoint.source).or_default() += 1;
    }

    println!("{}", "Endpoints by source:".bright_white().bold());
    for (source, count) in by_source {
        println!("  {} {}: {}", "•".cyan(), source, count);
    }
    println!();
}

fn print_result_summary(results: &[ProbeResult]) {
    let mut by_status: BTreeMap<u16, usize> = BTreeMap::new();
    for result in results {
        *by_status.entry(result.status_code).or_default() += 1;
    }

    println!("{}", "Status code summary:".bright_white().bold());
    for (status, count) in by_status {
        let label = match status {
            0 => "ERR".red().to_string(),
            200..=299 => status.to_string().green().to_string(),
            300..=399 => status.to_string().cyan().to_string(),
            400..=499 => status.to_string().yellow().to_string(),
            _ => status.to_string().red().to_string(),
        };
        println!("  {}: {} requests", label, count);
    }

    let successful: Vec<&ProbeResult> = results.iter().filter(|r| r.is_success()).collect();
    println!(
        "\n{}",
        format!("Successful endpoints ({}):", successful.len())
            .bright_white()
            .bold()
    );
    for result in successful.iter().take(20) {
        println!(
            "  {} [{}] {} {} ({} bytes)",
            "•".green(),
            result.status_code,
            result.method,
            result.url,
            result.size
        );
    }
    if successful.len() > 20 {
        println!("  ... and {} more", successful.len() - 20);
    }
    println!();
}

fn print_stats(stats: &Stats) {
    println!("{}", "Statistics:".bright_white().bold());
    if stats.total_discovered > 0 {
        println!("  Endpoints discovered: {}", stats.total_discovered);
    }
    if stats.total_requests > 0 {
        println!("  Total requests: {}", stats.total_requests);
        println!("  Successful (2xx): {}", stats.successful.to_string().green());
        println!("  Failed (4xx/5xx): {}", stats.failed.to_string().yellow());
        println!("  Errored: {}", stats.errored.to_string().red());
        println!("  Requests/sec: {:.1}", stats.requests_per_second());
    }
    println!("  Total time: {:.2?}", stats.duration);
}
