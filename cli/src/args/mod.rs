use caravan_core::Method;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "caravan",
    version,
    about,
    long_about = "Talk to a REST backend the way the caravan client layer does"
)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args, Serialize)]
pub struct ConfigArgs {
    /// Profile name or path to a profile file
    #[arg(long, short, env = "CARAVAN_PROFILE")]
    pub profile_path: Option<String>,

    /// Backend base URL, overrides the profile
    #[arg(long, env = "CARAVAN_BASE_URL")]
    pub base_url: Option<String>,

    /// Session token sent as a bearer credential
    #[arg(long, env = "CARAVAN_TOKEN", hide_env_values = true)]
    #[serde(skip)]
    pub token: Option<String>,

    /// Value of the Accept-Language header
    #[arg(long, env = "CARAVAN_LOCALE")]
    pub locale: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prints out current configuration
    Config,
    /// Writes a new profile with the current settings
    Init(InitArgs),
    /// Sends one request and prints the classified result
    Request(RequestArgs),
    /// Pages through a remote option list
    Options(OptionsArgs),
    /// Merges parameter updates into a query string
    Query(QueryArgs),
    /// Generates shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args, PartialEq)]
pub struct InitArgs {
    /// Overwrite an existing profile
    #[arg(long, short, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args, PartialEq)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    #[arg(value_parser = parse_method)]
    pub method: Method,

    /// Endpoint path relative to the base URL
    pub endpoint: String,

    /// JSON request body
    #[arg(long, short)]
    pub body: Option<String>,

    /// Send without credentials and report 401 as returned
    #[arg(long, default_value_t = false)]
    pub skip_auth: bool,

    /// Extra header, can be repeated
    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Ask intermediaries not to store the response
    #[arg(long, default_value_t = false)]
    pub no_store: bool,

    /// Cache tags (can be specified multiple times or comma-separated)
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    pub tag: Vec<String>,
}

#[derive(Debug, Args, PartialEq)]
pub struct OptionsArgs {
    /// Endpoint returning option pages
    pub endpoint: String,

    /// Search text
    #[arg(long, short)]
    pub search: Option<String>,

    /// Maximum number of pages to load
    #[arg(long, default_value_t = 1)]
    pub pages: u32,

    /// Page size, overrides the profile
    #[arg(long)]
    pub limit: Option<u32>,

    /// Extra query parameter, can be repeated
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_pair)]
    pub params: Vec<(String, String)>,

    /// Currently selected option, shown even when not fetched
    #[arg(long, value_name = "VALUE:LABEL", value_parser = parse_header)]
    pub selected: Option<(String, String)>,

    /// Output format (pretty, plain, or json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,
}

#[derive(Debug, Args, PartialEq)]
pub struct QueryArgs {
    /// Current query string
    #[arg(default_value = "")]
    pub current: String,

    /// Parameter to set, can be repeated
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_pair)]
    pub set: Vec<(String, String)>,

    /// Parameter to remove, can be repeated
    #[arg(long = "unset", value_name = "NAME")]
    pub unset: Vec<String>,

    /// Replace the current history entry instead of pushing
    #[arg(long, default_value_t = false)]
    pub replace: bool,
}

#[derive(Debug, Clone, Default, ValueEnum, PartialEq, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Plain,
    Json,
}

pub fn parse_method(s: &str) -> Result<Method, String> {
    s.parse()
}

pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    split_once(s, '=')
}

pub fn parse_header(s: &str) -> Result<(String, String), String> {
    split_once(s, ':')
}

fn split_once(s: &str, separator: char) -> Result<(String, String), String> {
    match s.split_once(separator) {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME{}VALUE, got '{}'", separator, s)),
    }
}
