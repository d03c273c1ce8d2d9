use crate::analytics::{QueryRequest, ReportClient};
use crate::auth::resolve_access_token;
use crate::error::FatalError;
use crate::metrics::{Entry, Metrics};
use crate::network::build_client;
use crate::options::Cli;
use crate::sitemap::get_sitemap_urls;
use crate::storage::{CsvReport, OutputSink};
use crate::utils;
use console::style;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum SiteOutcome {
    /// Rows were appended to the output.
    Written(usize),
    /// The query succeeded but the property has no data for the range.
    NoData,
    /// The query failed; nothing was written for this site.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SiteResult {
    pub site_url: String,
    pub outcome: SiteOutcome,
}

#[derive(Debug)]
pub struct RunSummary {
    pub sitemap_url: String,
    pub discovered: usize,
    pub sites: Vec<SiteResult>,
    pub rows_written: usize,
    pub header_written: bool,
    pub output: String,
    pub total_time: Duration,
}

impl RunSummary {
    pub fn failed_sites(&self) -> Vec<&SiteResult> {
        self.sites
            .iter()
            .filter(|s| matches!(s.outcome, SiteOutcome::Failed(_)))
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.sites.len() - self.failed_sites().len()
    }

    pub fn metrics(&self) -> Metrics {
        let without_data = self
            .sites
            .iter()
            .filter(|s| s.outcome == SiteOutcome::NoData)
            .count();
        Metrics(vec![
            Entry {
                label: "Sites in Sitemap",
                value: self.discovered.to_string(),
            },
            Entry {
                label: "Sites Queried",
                value: self.sites.len().to_string(),
            },
            Entry {
                label: "Succeeded",
                value: self.succeeded().to_string(),
            },
            Entry {
                label: "Without Data",
                value: without_data.to_string(),
            },
            Entry {
                label: "Failed",
                value: self.failed_sites().len().to_string(),
            },
            Entry {
                label: "Rows Written",
                value: self.rows_written.to_string(),
            },
            Entry {
                label: "Output",
                value: self.output.clone(),
            },
            Entry {
                label: "Elapsed Time",
                value: utils::ms(self.total_time),
            },
        ])
    }

    pub fn show_text_report(&self) {
        println!(
            "\n{} {}\n",
            style("Summary for").bold(),
            style(&self.sitemap_url).bold().underlined()
        );
        println!("{}", self.metrics().build_table());

        let failed = self.failed_sites();
        if !failed.is_empty() {
            println!("{}\n", style("Failed Sites:").bold());
            for site in failed {
                if let SiteOutcome::Failed(reason) = &site.outcome {
                    println!("{} {}", site.site_url, style(reason).dim());
                }
            }
            println!();
        }

        if self.rows_written > 0 {
            println!(
                "📊 {} appended to {}",
                utils::plural(self.rows_written, "row", "rows"),
                style(&self.output).underlined().cyan()
            );
        }
    }
}

/// The sites that will be queried: the first `limit` entries, in sitemap order.
pub fn select_sites(urls: Vec<String>, limit: usize) -> Vec<String> {
    urls.into_iter().take(limit).collect()
}

/// Runs one complete report: credentials, sitemap, then one query per site.
///
/// Failures before the site loop and output failures are fatal. A failing
/// site is reported and skipped.
pub async fn run_report<S: OutputSink>(options: &Cli, sink: S) -> Result<RunSummary, FatalError> {
    let start_time = Instant::now();

    let access_token = resolve_access_token(
        options.access_token.as_deref(),
        options.credentials_file.as_deref(),
    )?;
    let client = build_client(options)?;
    let reporter = ReportClient::new(client.clone(), options.api_base.clone(), access_token);

    println!("{} 🔎 Fetch sitemap...", style("[1/3]").dim());
    let urls = get_sitemap_urls(options.sitemap_url.as_str(), &client).await?;
    let discovered = urls.len();
    if discovered == 0 {
        tracing::warn!(sitemap = %options.sitemap_url, "Sitemap does not list any <loc> entries");
    }

    let selected = select_sites(urls, options.site_limit as usize);
    println!(
        "{} 🚚 Found {} in sitemap, querying {}...",
        style("[2/3]").dim(),
        utils::plural(discovered, "site", "sites"),
        selected.len()
    );

    let request = QueryRequest::top_queries(&options.start_date, &options.end_date, options.row_limit);
    let mut output = CsvReport::new(sink);
    let mut sites = Vec::with_capacity(selected.len());

    for site_url in selected {
        let outcome = process_site(&reporter, &request, &mut output, &site_url).await?;
        sites.push(SiteResult { site_url, outcome });
    }

    let output_name = output.describe();
    let header_written = output.header_written();
    let rows_written = output.finish()?;

    Ok(RunSummary {
        sitemap_url: options.sitemap_url.to_string(),
        discovered,
        sites,
        rows_written,
        header_written,
        output: output_name,
        total_time: start_time.elapsed(),
    })
}

/// Queries one site and appends its rows. Only output errors escape.
async fn process_site<S: OutputSink>(
    reporter: &ReportClient,
    request: &QueryRequest,
    output: &mut CsvReport<S>,
    site_url: &str,
) -> Result<SiteOutcome, FatalError> {
    println!(
        "{} 📥 Reading property data from: {}",
        style("[3/3]").dim(),
        site_url
    );

    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_message(format!("Querying {}", utils::truncate_message(site_url, 60)));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = reporter.query(site_url, request).await;
    spinner.finish_and_clear();

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            eprintln!(
                "{} Couldn't access query data from {}: {}",
                style("[ERROR]").red(),
                site_url,
                e
            );
            tracing::debug!(site = site_url, error = %e, "Skipping site");
            return Ok(SiteOutcome::Failed(e.to_string()));
        }
    };

    if response.rows.is_empty() {
        println!("      {}", style(format!("No data for {}", site_url)).dim());
        return Ok(SiteOutcome::NoData);
    }

    let written = output.append_rows(&response.rows, site_url)?;
    tracing::debug!(site = site_url, rows = written, "Appended rows");
    Ok(SiteOutcome::Written(written))
}
