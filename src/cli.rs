//! Command-line interface definitions for News Ingest.
//!
//! Every option can also come from the environment. Values given here
//! override the YAML configuration file.

use clap::Parser;
use news_ingest::PipelineConfig;

/// Command-line arguments for one ingestion run.
///
/// # Examples
///
/// ```sh
/// # Keywords from the command line, defaults for everything else
/// news_ingest --keywords "ilhabela,são sebastião" --output-dir ./reports
///
/// # YAML config plus a persistent signature file
/// KEYWORDS=ubatuba news_ingest -c config.yaml --signature-file ./signatures.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Comma-separated search keywords
    #[arg(short, long, env = "KEYWORDS", value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// Minimum characters in an accepted article body
    #[arg(long, env = "MIN_CHARS")]
    pub min_chars: Option<usize>,

    /// Minimum text blocks in an accepted article body
    #[arg(long, env = "MIN_PARAGRAPHS")]
    pub min_paragraphs: Option<usize>,

    /// Recency window in hours
    #[arg(long, env = "RECENT_HOURS")]
    pub recent_hours: Option<u64>,

    /// Stop after this many accepted articles
    #[arg(long, env = "MAX_PER_RUN")]
    pub max_per_run: Option<usize>,

    /// JSON file the deduplication ledger is loaded from and saved to
    #[arg(long, env = "SIGNATURE_FILE")]
    pub signature_file: Option<String>,

    /// Directory for run reports
    #[arg(short, long, env = "OUTPUT_DIR", default_value = "./reports")]
    pub output_dir: String,

    /// Keywords processed concurrently
    #[arg(long, env = "KEYWORD_LANES")]
    pub lanes: Option<usize>,
}

impl Cli {
    /// Overlay the arguments that were given on top of `config`.
    pub fn apply_to(&self, config: &mut PipelineConfig) {
        if !self.keywords.is_empty() {
            config.keywords = self.keywords.clone();
        }
        if let Some(min_chars) = self.min_chars {
            config.gate.min_chars = min_chars;
        }
        if let Some(min_paragraphs) = self.min_paragraphs {
            config.gate.min_paragraphs = min_paragraphs;
        }
        if let Some(hours) = self.recent_hours {
            config.gate.recency_window_minutes = hours.saturating_mul(60);
        }
        if let Some(max) = self.max_per_run {
            config.run.max_accepted_per_run = Some(max);
        }
        if let Some(lanes) = self.lanes {
            config.run.keyword_lanes = lanes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "news_ingest",
            "--keywords",
            "ilhabela,são sebastião",
            "--min-chars",
            "400",
            "--recent-hours",
            "6",
            "--output-dir",
            "/tmp/reports",
        ]);

        assert_eq!(cli.keywords, vec!["ilhabela", "são sebastião"]);
        assert_eq!(cli.min_chars, Some(400));
        assert_eq!(cli.output_dir, "/tmp/reports");
        assert_eq!(cli.signature_file, None);
    }

    #[test]
    fn test_apply_overrides_only_given_values() {
        let cli = Cli::parse_from([
            "news_ingest",
            "-k",
            "ubatuba",
            "--recent-hours",
            "2",
            "--max-per-run",
            "3",
            "--lanes",
            "2",
        ]);
        let mut config = PipelineConfig::default();
        let defaults = PipelineConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(config.keywords, vec!["ubatuba"]);
        assert_eq!(config.gate.recency_window_minutes, 120);
        assert_eq!(config.run.max_accepted_per_run, Some(3));
        assert_eq!(config.run.keyword_lanes, 2);
        assert_eq!(config.gate.min_chars, defaults.gate.min_chars);
        assert_eq!(config.gate.min_paragraphs, defaults.gate.min_paragraphs);
    }
}
