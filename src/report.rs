use chrono::NaiveDateTime;
use ratatui::text::Line;

use crate::config::ClientVariant;
use crate::markdown::{
    CodeBlock, RenderedMarkdown, escape_html, plain_text, render_markdown, render_markdown_from,
    to_lines, to_lines_from,
};
use crate::protocol::{Evaluation, ResearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Self::Excellent
        } else if score >= 7.0 {
            Self::Good
        } else if score >= 5.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricBar {
    pub name: &'static str,
    pub value: f64,
}

impl MetricBar {
    /// Fill width in percent of the bar, 0..=100.
    pub fn width_percent(&self) -> f64 {
        (self.value * 10.0).clamp(0.0, 100.0)
    }

    pub fn display(&self) -> String {
        format!("{:.1}/10", self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationView {
    pub overall_score: f64,
    pub tier: ScoreTier,
    pub bars: [MetricBar; 5],
    pub reasoning: String,
    pub action: Option<String>,
}

impl EvaluationView {
    pub fn from_evaluation(evaluation: &Evaluation) -> Self {
        let metrics = evaluation.metrics;
        Self {
            overall_score: evaluation.overall_score,
            tier: ScoreTier::from_score(evaluation.overall_score),
            bars: [
                MetricBar {
                    name: "Accuracy",
                    value: metrics.accuracy,
                },
                MetricBar {
                    name: "Completeness",
                    value: metrics.completeness,
                },
                MetricBar {
                    name: "Relevance",
                    value: metrics.relevance,
                },
                MetricBar {
                    name: "Clarity",
                    value: metrics.clarity,
                },
                MetricBar {
                    name: "Confidence",
                    value: metrics.confidence,
                },
            ],
            reasoning: evaluation.reasoning.clone(),
            action: evaluation.action.clone(),
        }
    }

    pub fn score_label(&self) -> String {
        format!("{:.1}/10 ({})", self.overall_score, self.tier.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepView {
    pub number: u32,
    pub query: String,
    pub analysis_markdown: String,
    pub analysis: RenderedMarkdown,
    pub analysis_lines: Vec<Line<'static>>,
    expanded: bool,
}

impl StepView {
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn arrow(&self) -> &'static str {
        if self.expanded { "▲" } else { "▼" }
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }
}

/// The rendered final answer card.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub answer_markdown: String,
    pub answer: RenderedMarkdown,
    pub answer_lines: Vec<Line<'static>>,
    pub steps: Vec<StepView>,
    pub evaluation: Option<EvaluationView>,
    pub session_id: String,
}

impl ResultView {
    pub fn from_result(result: &ResearchResult) -> Self {
        let answer = render_markdown(&result.answer);
        let mut next_index = answer.code_blocks.len();
        let steps = result
            .numbered_steps()
            .map(|(number, step)| {
                let analysis = render_markdown_from(&step.analysis, next_index);
                let analysis_lines = to_lines_from(&step.analysis, next_index);
                next_index += analysis.code_blocks.len();
                StepView {
                    number,
                    query: step.query.clone(),
                    analysis_markdown: step.analysis.clone(),
                    analysis,
                    analysis_lines,
                    expanded: false,
                }
            })
            .collect();
        Self {
            answer_markdown: result.answer.clone(),
            answer,
            answer_lines: to_lines(&result.answer),
            steps,
            evaluation: result
                .evaluation_result
                .as_ref()
                .map(EvaluationView::from_evaluation),
            session_id: result.session_id.clone(),
        }
    }

    /// Every code block of the answer and the step analyses, in copy-index order.
    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.answer
            .code_blocks
            .iter()
            .chain(self.steps.iter().flat_map(|step| step.analysis.code_blocks.iter()))
    }

    pub fn code_block(&self, index: usize) -> Option<&CodeBlock> {
        self.code_blocks().nth(index)
    }

    /// Flips one step by its zero-based position; false when there is no such step.
    pub fn toggle_step(&mut self, index: usize) -> bool {
        match self.steps.get_mut(index) {
            Some(step) => {
                step.toggle();
                true
            }
            None => false,
        }
    }

    pub fn transcript_text(&self) -> String {
        let mut out = String::from("Research Results\n\nAnswer\n");
        out.push_str(&plain_text(&self.answer_markdown));
        out.push('\n');

        if !self.steps.is_empty() {
            out.push_str("\nResearch Steps\n");
            for step in &self.steps {
                out.push_str(&format!("\nStep {}: {}\n", step.number, step.query));
                let analysis = plain_text(&step.analysis_markdown);
                if !analysis.is_empty() {
                    out.push_str(&analysis);
                    out.push('\n');
                }
            }
        }

        if let Some(evaluation) = &self.evaluation {
            out.push_str("\nEvaluation\n");
            out.push_str(&format!("Overall score: {}\n", evaluation.score_label()));
            for bar in &evaluation.bars {
                out.push_str(&format!("{}: {}\n", bar.name, bar.display()));
            }
            if !evaluation.reasoning.trim().is_empty() {
                out.push_str(&format!("Reasoning: {}\n", evaluation.reasoning.trim()));
            }
        }

        if !self.session_id.is_empty() {
            out.push_str(&format!("\nSession ID: {}\n", self.session_id));
        }
        out
    }

    /// Standalone page for the export action; all server text is escaped or sanitized.
    pub fn html_document(&self) -> String {
        let mut body = String::new();
        body.push_str("<section class=\"answer\"><h2>Answer</h2>\n");
        body.push_str(&self.answer.html);
        body.push_str("</section>\n");

        if !self.steps.is_empty() {
            body.push_str("<section class=\"steps\"><h2>Research Steps</h2>\n");
            for step in &self.steps {
                let open = if step.is_expanded() { " open" } else { "" };
                body.push_str(&format!(
                    "<details class=\"step\"{open}><summary>Step {}: {}</summary>\n{}</details>\n",
                    step.number,
                    escape_html(&step.query),
                    step.analysis.html
                ));
            }
            body.push_str("</section>\n");
        }

        if let Some(evaluation) = &self.evaluation {
            body.push_str(&format!(
                "<section class=\"evaluation\"><h2>Evaluation</h2>\n<p class=\"score {}\">{}</p>\n",
                evaluation.tier.css_class(),
                escape_html(&evaluation.score_label())
            ));
            for bar in &evaluation.bars {
                body.push_str(&format!(
                    "<div class=\"metric\"><span>{}</span><div class=\"bar\"><div class=\"fill\" style=\"width: {:.0}%\"></div></div><span>{}</span></div>\n",
                    bar.name,
                    bar.width_percent(),
                    bar.display()
                ));
            }
            if !evaluation.reasoning.is_empty() {
                body.push_str(&format!(
                    "<p class=\"reasoning\">{}</p>\n",
                    escape_html(&evaluation.reasoning)
                ));
            }
            body.push_str("</section>\n");
        }

        if !self.session_id.is_empty() {
            body.push_str(&format!(
                "<p class=\"session\">Session ID: {}</p>\n",
                escape_html(&self.session_id)
            ));
        }

        format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Research Results</title>\n<style>{REPORT_CSS}</style></head>\n<body>\n{body}</body></html>\n"
        )
    }
}

const REPORT_CSS: &str = "body{font-family:sans-serif;max-width:60rem;margin:2rem auto;}\
pre{background:#2b303b;color:#c0c5ce;padding:.75rem;overflow:auto;}\
.bar{display:inline-block;width:12rem;height:.6rem;background:#ddd;margin:0 .5rem;}\
.fill{height:100%;background:#4a90d9;}\
.score.excellent{color:#2e7d32;}.score.good{color:#558b2f;}.score.fair{color:#f9a825;}.score.poor{color:#c62828;}";

/// A bare `host:port` origin is served over plain http, matching `endpoint_url`.
pub fn share_url(origin: &str, session_id: &str) -> String {
    let origin = origin.trim().trim_end_matches('/');
    let scheme = if origin.contains("://") { "" } else { "http://" };
    format!(
        "{scheme}{origin}/?session={}",
        urlencoding::encode(session_id)
    )
}

pub fn download_file_name(
    variant: ClientVariant,
    session_id: Option<&str>,
    now: NaiveDateTime,
) -> String {
    match (variant, session_id.filter(|id| !id.is_empty())) {
        (ClientVariant::Report, Some(id)) => format!("rag-session-{}.txt", file_safe(id)),
        _ => format!("rag-research-{}.txt", now.format("%Y-%m-%dT%H-%M-%S")),
    }
}

fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../tests/unit/report_tests.rs"]
mod tests;
