use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PREVIEW_URL: &str =
    "http://www.todayonline.com/sites/default/files/styles/large/public/{date}_AP_page_{page}.jpg";
const DEFAULT_PDF_URL: &str =
    "http://www.todayonline.com/sites/default/files/{date}_AP_page_{page}.pdf";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Directory holding the `css`, `fonts` and `js` asset folders
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Time allowed for a client to send request headers, in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    /// Cap on the connection read buffer, which bounds request header size
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Whole-request timeout in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
    /// Per upstream request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,
    /// Bound on a single discovery loop in seconds
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout: u64,
    /// Maximum number of pages probed per refresh
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:40947".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_read_timeout() -> u64 {
    10
}

fn default_max_header_bytes() -> usize {
    1 << 20
}

fn default_write_timeout() -> u64 {
    600
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_refresh_timeout() -> u64 {
    540
}

fn default_max_pages() -> usize {
    200
}

/// Where the publisher keeps each day's files.
///
/// Both URL templates are expanded by substituting `{date}` (rendered with
/// `date_format`) and `{page}` (1-based page index).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub preview_url: String,
    pub pdf_url: String,
    pub date_format: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            preview_url: DEFAULT_PREVIEW_URL.to_string(),
            pdf_url: DEFAULT_PDF_URL.to_string(),
            date_format: "%Y%m%d".to_string(),
        }
    }
}

impl UpstreamConfig {
    pub fn preview_url(&self, date: NaiveDate, page: usize) -> String {
        self.expand(&self.preview_url, date, page)
    }

    pub fn pdf_url(&self, date: NaiveDate, page: usize) -> String {
        self.expand(&self.pdf_url, date, page)
    }

    fn expand(&self, template: &str, date: NaiveDate, page: usize) -> String {
        template
            .replace("{date}", &date.format(&self.date_format).to_string())
            .replace("{page}", &page.to_string())
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (name, template) in [
            ("preview_url", &self.upstream.preview_url),
            ("pdf_url", &self.upstream.pdf_url),
        ] {
            if !template.contains("{page}") {
                anyhow::bail!("upstream.{} must contain a {{page}} placeholder", name);
            }
        }
        if StrftimeItems::new(&self.upstream.date_format).any(|item| item == Item::Error) {
            anyhow::bail!(
                "upstream.date_format {:?} is not a valid strftime format",
                self.upstream.date_format
            );
        }
        // hyper refuses read buffers smaller than 8 KiB
        if self.max_header_bytes < 8192 {
            anyhow::bail!("max_header_bytes must be at least 8192");
        }
        if self.read_timeout == 0 {
            anyhow::bail!("read_timeout must be at least 1 second");
        }
        if self.max_pages == 0 {
            anyhow::bail!("max_pages must be at least 1");
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout)
    }
}
