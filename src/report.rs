use crate::config::CheckpointId;
use anyhow::Result;
use log::info;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const TOKEN_HEADER: &str = "Token";
const PROBABILITY_HEADER: &str = "Probability";

/// One row of the report: a decoded token and its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub token: String,
    pub probability: f32,
}

pub fn format_probability(probability: f32) -> String {
    format!("{probability:.4}")
}

/// `<dir>/torch-<short name>.txt`
pub fn output_path(dir: &Path, checkpoint: &CheckpointId) -> PathBuf {
    dir.join(format!("torch-{}.txt", checkpoint.short_name()))
}

// keep every row on one line
fn display_token(token: &str) -> String {
    token
        .chars()
        .map(|c| {
            if c.is_control() {
                c.escape_default().to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}

fn column_width<'a>(header: &str, cells: impl Iterator<Item = &'a String>) -> usize {
    cells
        .map(|cell| cell.chars().count())
        .fold(header.chars().count(), usize::max)
}

/// Renders a two column box table: heavy header, light body.
pub fn render_table(predictions: &[Prediction]) -> String {
    let rows: Vec<(String, String)> = predictions
        .iter()
        .map(|p| (display_token(&p.token), format_probability(p.probability)))
        .collect();

    let token_width = column_width(TOKEN_HEADER, rows.iter().map(|(t, _)| t));
    let prob_width = column_width(PROBABILITY_HEADER, rows.iter().map(|(_, p)| p));

    let rule = |n: usize, c: &str| c.repeat(n + 2);
    let cell = |text: &str, n: usize| {
        let pad = n - text.chars().count();
        format!(" {}{} ", text, " ".repeat(pad))
    };

    let mut out = String::new();
    out.push_str(&format!("┏{}┳{}┓\n", rule(token_width, "━"), rule(prob_width, "━")));
    out.push_str(&format!(
        "┃{}┃{}┃\n",
        cell(TOKEN_HEADER, token_width),
        cell(PROBABILITY_HEADER, prob_width)
    ));
    out.push_str(&format!("┡{}╇{}┩\n", rule(token_width, "━"), rule(prob_width, "━")));
    for (token, probability) in &rows {
        out.push_str(&format!(
            "│{}│{}│\n",
            cell(token, token_width),
            cell(probability, prob_width)
        ));
    }
    out.push_str(&format!("└{}┴{}┘\n", rule(token_width, "─"), rule(prob_width, "─")));
    out
}

/// Prints the table to the console and, when configured, writes the same
/// rendering to the report file, replacing any previous content.
pub struct Reporter {
    output_path: Option<PathBuf>,
}

impl Reporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn emit(&self, predictions: &[Prediction]) -> Result<()> {
        let stdout = io::stdout();
        let mut console = stdout.lock();
        self.emit_to(&mut console, predictions)
    }

    pub fn emit_to<W: Write>(&self, console: &mut W, predictions: &[Prediction]) -> Result<()> {
        let table = render_table(predictions);
        console.write_all(table.as_bytes())?;
        console.flush()?;

        if let Some(path) = &self.output_path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &table)?;
            info!("Wrote report to {:?}", path);
        }
        Ok(())
    }
}
