use crate::utils::expand_path;
use clap::{Parser, ValueHint, value_parser};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use url::Url;

/// Default values used throughout the project.
pub mod defaults {
    /// Number of sites from the sitemap that are queried.
    pub const SITE_LIMIT: u32 = 4;

    /// Number of top queries requested per site.
    pub const ROW_LIMIT: u32 = 10;

    /// Largest row limit the reporting API accepts in one call.
    pub const MAX_ROW_LIMIT: u32 = 25_000;

    /// The default timeout for network requests, in seconds.
    pub const TIMEOUT: u16 = 30;

    /// Where the results are appended to.
    pub const OUTPUT_FILE: &str = "data_file.csv";

    /// Base URL of the Search Console API.
    pub const API_BASE: &str = "https://searchconsole.googleapis.com";

    /// Config file picked up from the working directory when `--config` is not given.
    pub const CONFIG_FILE: &str = ".queryprobe.toml";

    /// The default user agent header value used for network requests.
    pub const USER_AGENT: &str = concat!(
        "Mozilla/5.0 (compatible; Queryprobe/",
        env!("CARGO_PKG_VERSION"),
        ")"
    );
}

#[derive(Debug, Parser)]
#[command(term_width = 80, version, about)]
pub struct Cli {
    #[arg(
        help = "The URL of the sitemap listing the properties to query.",
        value_hint = ValueHint::Url,
        value_parser = value_parser!(Url)
    )]
    pub sitemap_url: Url,

    #[arg(help = "Start date of the requested date range in YYYY-MM-DD format.")]
    pub start_date: String,

    #[arg(help = "End date of the requested date range in YYYY-MM-DD format.")]
    pub end_date: String,

    #[arg(
        short = 'c',
        long,
        help = "Path to a TOML config file. Defaults to `.queryprobe.toml` in the current directory if present.",
        value_hint = ValueHint::FilePath,
        value_parser = expand_path
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "QUERYPROBE_ACCESS_TOKEN",
        hide_env_values = true,
        help = "OAuth2 access token with the webmasters.readonly scope"
    )]
    pub access_token: Option<String>,

    #[arg(
        long,
        help = "JSON token file written by an OAuth2 helper, containing an `access_token`",
        value_hint = ValueHint::FilePath,
        value_parser = expand_path
    )]
    pub credentials_file: Option<PathBuf>,

    #[arg(
        short = 'o',
        long,
        help = "CSV file the results are appended to",
        default_value = defaults::OUTPUT_FILE,
        value_hint = ValueHint::FilePath,
        value_parser = expand_path
    )]
    pub output: PathBuf,

    #[arg(
        short = 'n',
        long,
        help = "Number of sites from the sitemap to query",
        default_value_t = defaults::SITE_LIMIT,
        value_parser = value_parser!(u32).range(1..)
    )]
    pub site_limit: u32,

    #[arg(
        long,
        help = "Number of top queries requested per site",
        default_value_t = defaults::ROW_LIMIT,
        value_parser = value_parser!(u32).range(1..=defaults::MAX_ROW_LIMIT as i64)
    )]
    pub row_limit: u32,

    #[arg(
        long,
        help = "Base URL of the reporting API",
        default_value = defaults::API_BASE,
        value_hint = ValueHint::Url,
        value_parser = value_parser!(Url)
    )]
    pub api_base: Url,

    #[arg(
        short = 't',
        long,
        help = "Timeout (in seconds) for each request",
        default_value_t = defaults::TIMEOUT,
        value_parser = value_parser!(u16).range(1..=300)
    )]
    pub request_timeout: u16,

    #[arg(
        long,
        help = "Custom User-Agent header to be used in requests",
        default_value_t = defaults::USER_AGENT.to_string(),
    )]
    pub user_agent: String,

    #[arg(short = 'v', long, help = "Enable debug logging")]
    pub verbose: bool,
}

/// Values read from a TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub access_token: Option<String>,
    pub credentials_file: Option<String>,
    pub output: Option<String>,
    pub site_limit: Option<u32>,
    pub row_limit: Option<u32>,
    pub api_base: Option<String>,
    pub request_timeout: Option<u16>,
    pub user_agent: Option<String>,
}

impl ConfigFile {
    /// Loads the config file.
    ///
    /// An explicit path must exist. Without one, `.queryprobe.toml` in the
    /// current directory is used when present, otherwise an empty config.
    pub fn load(path: Option<&PathBuf>) -> Result<Self, String> {
        let path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(format!("Config file not found: {}", path.display()));
                }
                path.clone()
            }
            None => {
                let default_path = PathBuf::from(defaults::CONFIG_FILE);
                if !default_path.exists() {
                    return Ok(ConfigFile::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))
    }
}

/// Whether an option was given on the command line, as opposed to holding its
/// clap default.
fn arg_provided(long: &str, short: Option<char>) -> bool {
    args_contain(std::env::args().skip(1), long, short)
}

/// Short flags that take no value and may lead a cluster such as `-vn 2`.
const SHORT_SWITCHES: [char; 3] = ['v', 'h', 'V'];

fn args_contain(args: impl IntoIterator<Item = String>, long: &str, short: Option<char>) -> bool {
    let long_flag = format!("--{long}");
    let long_prefix = format!("--{long}=");
    args.into_iter()
        .take_while(|arg| arg != "--")
        .any(|arg| {
            arg == long_flag
                || arg.starts_with(&long_prefix)
                || short.is_some_and(|s| short_cluster_contains(&arg, s))
        })
}

/// Walks a cluster like `-vn2` up to the first flag that takes a value; the
/// rest of the cluster is that flag's value.
fn short_cluster_contains(arg: &str, short: char) -> bool {
    let Some(cluster) = arg.strip_prefix('-') else {
        return false;
    };
    if cluster.starts_with('-') {
        return false;
    }
    for c in cluster.chars() {
        if c == short {
            return true;
        }
        if !SHORT_SWITCHES.contains(&c) {
            return false;
        }
    }
    false
}

impl Cli {
    /// Fills in values from the config file. Options given on the command
    /// line keep priority.
    ///
    /// Credentials are taken as a unit: once the command line (or
    /// `QUERYPROBE_ACCESS_TOKEN`) names a token or a token file, neither
    /// config credential is used.
    pub fn apply_config(&mut self, config: &ConfigFile) -> Result<(), String> {
        if self.access_token.is_none() && self.credentials_file.is_none() {
            self.access_token = config.access_token.clone();
            if let Some(path) = &config.credentials_file {
                self.credentials_file = Some(expand_path(path)?);
            }
        }
        if let Some(output) = &config.output {
            if !arg_provided("output", Some('o')) {
                self.output = expand_path(output)?;
            }
        }
        if let Some(site_limit) = config.site_limit {
            if site_limit == 0 {
                return Err("site_limit in config file must be at least 1".to_string());
            }
            if !arg_provided("site-limit", Some('n')) {
                self.site_limit = site_limit;
            }
        }
        if let Some(row_limit) = config.row_limit {
            if !(1..=defaults::MAX_ROW_LIMIT).contains(&row_limit) {
                return Err(format!(
                    "row_limit in config file must be between 1 and {}",
                    defaults::MAX_ROW_LIMIT
                ));
            }
            if !arg_provided("row-limit", None) {
                self.row_limit = row_limit;
            }
        }
        if let Some(api_base) = &config.api_base {
            if !arg_provided("api-base", None) {
                self.api_base = Url::parse(api_base)
                    .map_err(|e| format!("Invalid api_base '{}' in config file: {}", api_base, e))?;
            }
        }
        if let Some(request_timeout) = config.request_timeout {
            if !(1..=300).contains(&request_timeout) {
                return Err("request_timeout in config file must be between 1 and 300".to_string());
            }
            if !arg_provided("request-timeout", Some('t')) {
                self.request_timeout = request_timeout;
            }
        }
        if let Some(user_agent) = &config.user_agent {
            if !arg_provided("user-agent", None) {
                self.user_agent = user_agent.clone();
            }
        }
        Ok(())
    }
}
