// Output formatting for CLI
//
// Reports go to stdout; everything else (logs, progress) goes to stderr.

use anyhow::Result;
use inferload_core::RunReport;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }

    /// Print one value as a single JSON line
    pub fn print_json_line<T: Serialize>(value: &T) -> Result<()> {
        println!("{}", serde_json::to_string(value)?);
        Ok(())
    }

    pub fn print_report(&self, report: &RunReport) -> Result<()> {
        match self {
            OutputFormat::Json => println!("{}", report.to_json()?),
            OutputFormat::Text => print!("{}", report.render_text()),
        }
        Ok(())
    }
}
