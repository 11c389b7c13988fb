//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{KioskArgs, OutputFormat};
use crate::error::Result;
use crate::ingest::IngestReport;
use crate::product::SearchResult;

/// Result structure for a one-shot search.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub duration_ms: u64,
    /// Whether scores are shown in human output.
    #[serde(skip)]
    pub show_scores: bool,
}

/// Output a value in the selected format.
pub fn output_result<T: Serialize + HumanOutput>(result: &T, args: &KioskArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            print!("{}", result.render_human(args.verbosity()));
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &KioskArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

/// Human-readable rendering.
pub trait HumanOutput {
    fn render_human(&self, verbosity: u8) -> String;
}

impl HumanOutput for SearchOutput {
    fn render_human(&self, verbosity: u8) -> String {
        let mut out = String::new();
        if verbosity > 0 {
            out.push_str(&format!("Search Results for {:?}:\n", self.query));
            out.push_str("═══════════════\n");
        }
        if self.results.is_empty() {
            out.push_str("No products found.\n");
        }
        for (i, result) in self.results.iter().enumerate() {
            let product = &result.product;
            if self.show_scores {
                out.push_str(&format!(
                    "{:>2}. {} ({:.2}) [score {:.3}]\n",
                    i + 1,
                    product.name,
                    product.price,
                    result.score
                ));
            } else {
                out.push_str(&format!("{:>2}. {} ({:.2})\n", i + 1, product.name, product.price));
            }
            if verbosity > 1 {
                out.push_str(&format!("    id: {}\n", product.id));
                out.push_str(&format!("    {}\n", product.description));
            }
        }
        if verbosity > 1 {
            out.push_str(&format!("\n{} results in {} ms\n", self.results.len(), self.duration_ms));
        }
        out
    }
}

impl HumanOutput for IngestReport {
    fn render_human(&self, verbosity: u8) -> String {
        let mut out = format!(
            "Seeded {}/{} products in {} ms\n",
            self.succeeded, self.total, self.elapsed_ms
        );
        if !self.failed.is_empty() {
            out.push_str(&format!("{} failed:\n", self.failed.len()));
            for failure in &self.failed {
                out.push_str(&format!("  {}: {}\n", failure.id, failure.message));
            }
        }
        if verbosity > 1 {
            out.push_str(&format!("Started at {}\n", self.started_at.to_rfc3339()));
        }
        out
    }
}
