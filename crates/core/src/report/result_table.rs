use std::fmt::Write;

use crate::alphabet::domain::alphabet_transcoder::{render, Notation};
use crate::analysis::domain::analysis::{Analysis, AnalysisException};
use crate::analysis::domain::analysis_collection::AnalysisCollection;
use crate::analysis::domain::diff_step::DiffStep;
use crate::shared::constants::NOT_APPLICABLE;

const ERROR_MARK: char = '^';
const INDENT: &str = "  ";

/// Plain-text rendering of an analysis collection for the terminal.
///
/// Each utterance shows its phoneme alignment as two label rows with a
/// marker row under the steps that cost something, then its FER and PER.
/// Failed utterances are listed after the successful ones and the
/// aggregate rates close the table.
pub struct ResultTable<'a> {
    collection: &'a AnalysisCollection,
    labels: [&'a str; 2],
    notation: Notation,
}

impl<'a> ResultTable<'a> {
    pub fn new(collection: &'a AnalysisCollection, labels: [&'a str; 2], notation: Notation) -> Self {
        Self {
            collection,
            labels,
            notation,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let label_width = self.labels.iter().map(|l| display_width(l)).max().unwrap_or(0);

        for analysis in self.collection.analyses() {
            self.render_analysis(&mut out, analysis, label_width);
        }
        for exception in self.collection.exceptions() {
            self.render_exception(&mut out, exception);
        }
        self.render_footer(&mut out);

        out
    }

    fn render_analysis(&self, out: &mut String, analysis: &Analysis, label_width: usize) {
        let _ = writeln!(out, "{}", analysis.id);

        let steps = analysis.phonemes.steps();
        let lefts: Vec<String> = steps.iter().map(|s| self.cell(s.left())).collect();
        let rights: Vec<String> = steps.iter().map(|s| self.cell(s.right())).collect();
        let width = lefts
            .iter()
            .chain(&rights)
            .map(|c| display_width(c))
            .max()
            .unwrap_or(0);

        let row = |label: &str, cells: &[String]| {
            let cells: Vec<String> = cells.iter().map(|c| pad(c, width)).collect();
            format!(
                "{INDENT}{}  {}",
                pad(label, label_width),
                cells.join(" ")
            )
        };
        let _ = writeln!(out, "{}", row(self.labels[0], &lefts).trim_end());
        let _ = writeln!(out, "{}", row(self.labels[1], &rights).trim_end());

        if steps.iter().any(DiffStep::is_error) {
            let marks: Vec<String> = steps
                .iter()
                .map(|s| {
                    let mark = if s.is_error() { ERROR_MARK.to_string() } else { String::new() };
                    pad(&mark, width)
                })
                .collect();
            let _ = writeln!(
                out,
                "{INDENT}{}  {}",
                " ".repeat(label_width),
                marks.join(" ").trim_end()
            );
        }

        let _ = writeln!(
            out,
            "{INDENT}FER {} ({})  PER {} ({})",
            analysis.fer.as_percent(),
            analysis.features.counts_label(),
            analysis.per.as_percent(),
            analysis.phonemes.counts_label()
        );
        out.push('\n');
    }

    fn render_exception(&self, out: &mut String, exception: &AnalysisException) {
        let _ = writeln!(out, "{}", exception.id);
        let _ = writeln!(out, "{INDENT}failed: {}", exception.message);
        let _ = writeln!(out, "{INDENT}FER {NOT_APPLICABLE}  PER {NOT_APPLICABLE}");
        out.push('\n');
    }

    fn render_footer(&self, out: &mut String) {
        let collection = self.collection;
        let _ = writeln!(
            out,
            "Total: {} analyzed, {} failed",
            collection.analyses().len(),
            collection.exceptions().len()
        );
        let _ = writeln!(
            out,
            "{INDENT}FER {} ({})  PER {} ({})",
            collection.fer().as_percent(),
            collection.aggregate_features().counts_label(),
            collection.per().as_percent(),
            collection.aggregate_phonemes().counts_label()
        );
    }

    fn cell(&self, token: Option<&str>) -> String {
        match token {
            Some(t) => render(t, self.notation),
            None => "-".to_string(),
        }
    }
}

/// Terminal columns taken by `text`, ignoring combining marks such as the
/// tie bar in `t͡ʃ`.
fn display_width(text: &str) -> usize {
    text.chars()
        .filter(|c| !matches!(*c as u32, 0x0300..=0x036F))
        .count()
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(text));
    format!("{text}{}", " ".repeat(fill))
}
