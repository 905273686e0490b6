//! Plain-text rendering of analysis results and failures.

use std::fmt::Write as _;

use dialectic_types::{
    AnalysisPayload, DisplayMode, DualResponse, ErrorKind, FallacyEntry, GatewayError, Settings,
};

/// Which optional sections to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub show_toulmin: bool,
    pub show_suggestions: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_toulmin: true,
            show_suggestions: true,
        }
    }
}

impl From<&Settings> for RenderOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            show_toulmin: settings.show_toulmin_analysis,
            show_suggestions: settings.show_suggestions,
        }
    }
}

#[must_use]
pub fn render_dual(response: &DualResponse, mode: DisplayMode, opts: RenderOptions) -> String {
    render_payload(response.view(mode), mode, opts)
}

#[must_use]
pub fn render_payload(payload: &AnalysisPayload, mode: DisplayMode, opts: RenderOptions) -> String {
    let mut out = String::new();
    match mode {
        DisplayMode::Support => render_support(&mut out, payload, opts),
        DisplayMode::Defence => render_defence(&mut out, payload),
    }
    if out.is_empty() {
        out.push_str("No analysis returned.\n");
    }
    out
}

fn render_support(out: &mut String, payload: &AnalysisPayload, opts: RenderOptions) {
    if opts.show_toulmin
        && let Some(elements) = &payload.elements
    {
        let mut any = false;
        for (name, element) in elements.iter() {
            if !any {
                out.push_str("Argument structure:\n");
                any = true;
            }
            let _ = writeln!(
                out,
                "  {name} ({}/10): {}",
                format_score(element.strength),
                element.text.trim()
            );
        }
    }

    let names = payload.fallacy_names();
    if names.is_empty() {
        if !payload.fallacies.is_empty()
            || !payload.fallacies_present.is_empty()
            || !payload.fallacy_details.is_empty()
        {
            out.push_str("No fallacies detected.\n");
        }
    } else {
        out.push_str("Fallacies:\n");
        for name in names {
            match confidence_for(payload, name) {
                Some(confidence) => {
                    let _ = writeln!(out, "  - {name} ({}% confidence)", format_score(confidence));
                }
                None => {
                    let _ = writeln!(out, "  - {name}");
                }
            }
            if let Some(explanation) = explanation_for(payload, name) {
                let _ = writeln!(out, "    {}", explanation.trim());
            }
        }
    }

    let scores = [
        ("Fallacy resistance", payload.fallacy_resistance_score),
        ("Logical consistency", payload.logical_consistency_score),
        ("Clarity", payload.clarity_score),
    ];
    for (label, score) in scores {
        if let Some(score) = score {
            let _ = writeln!(out, "{label}: {}/100", format_score(score));
        }
    }

    if opts.show_suggestions {
        let suggestions: Vec<&str> = payload
            .suggestions
            .iter()
            .map(|s| s.text().trim())
            .filter(|s| !s.is_empty())
            .collect();
        if !suggestions.is_empty() {
            out.push_str("Suggestions:\n");
            for suggestion in suggestions {
                let _ = writeln!(out, "  - {suggestion}");
            }
        }
        if let Some(improved) = non_empty(payload.improved_statement.as_deref()) {
            let _ = writeln!(out, "Improved: {improved}");
        }
    }

    if let Some(feedback) = non_empty(payload.feedback.as_deref()) {
        let _ = writeln!(out, "{feedback}");
    }
    if let Some(assessment) = non_empty(payload.overall_assessment.as_deref()) {
        let _ = writeln!(out, "Assessment: {assessment}");
    }

    if !payload.replies.is_empty() {
        out.push_str("Replies:\n");
        for reply in &payload.replies {
            let _ = writeln!(out, "  [{}] {}", reply.tone.as_str(), reply.text.trim());
        }
    }
    if let Some(counter) = non_empty(payload.counter_argument.as_deref()) {
        let _ = writeln!(out, "Counter-argument: {counter}");
    }
    if let Some(rewritten) = non_empty(payload.rewritten_text.as_deref()) {
        let _ = writeln!(out, "Rewritten: {rewritten}");
    }
}

fn render_defence(out: &mut String, payload: &AnalysisPayload) {
    if let Some(response) = non_empty(payload.response.as_deref()) {
        let _ = writeln!(out, "{response}");
    }
    if let Some(assessment) = non_empty(payload.overall_assessment.as_deref()) {
        let _ = writeln!(out, "Assessment: {assessment}");
    }
}

fn confidence_for(payload: &AnalysisPayload, name: &str) -> Option<f64> {
    payload
        .fallacies
        .iter()
        .find_map(|entry| match entry {
            FallacyEntry::Detailed(f) if f.kind.eq_ignore_ascii_case(name) => f.confidence,
            _ => None,
        })
        .or_else(|| {
            payload
                .fallacy_details
                .iter()
                .find(|d| d.label.eq_ignore_ascii_case(name))
                .map(|d| d.score * 100.0)
        })
}

fn explanation_for<'a>(payload: &'a AnalysisPayload, name: &str) -> Option<&'a str> {
    payload.fallacies.iter().find_map(|entry| match entry {
        FallacyEntry::Detailed(f) if f.kind.eq_ignore_ascii_case(name) => {
            non_empty(f.explanation.as_deref())
        }
        _ => None,
    })
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// User-facing text for a failed request. Never echoes raw transport detail.
#[must_use]
pub fn user_message(error: &GatewayError) -> String {
    match error.kind {
        ErrorKind::NetworkError | ErrorKind::TimeoutError => {
            "Could not reach the analysis service. Check your connection and try again.".into()
        }
        ErrorKind::QuotaError => {
            "The analysis service is out of quota right now. Please try again later.".into()
        }
        ErrorKind::UpstreamError
            if error.status.is_some_and(|s| (400..500).contains(&s))
                || (error.status.is_none() && !error.message.is_empty()) =>
        {
            format!("The analysis service rejected the request: {}", error.message)
        }
        ErrorKind::UpstreamError | ErrorKind::UnknownError => {
            "Something went wrong while analysing. Please try again.".into()
        }
    }
}
