//! Terminal rendering of reports, progress and tooltips.

use colored::{ColoredString, Colorize};

use sentinel_runtime::ServiceRegistry;

use sentinel_core::{
    AgentInfo, AnalysisReport, RenderSegment, Severity, SpanCategory, Step, StepStatus, Tier,
    Tooltip, WorkflowState,
};

const GAUGE_WIDTH: usize = 20;

/// Paint `text` in the dashboard color of `tier`.
pub fn tier_color(text: &str, tier: Tier) -> ColoredString {
    let (r, g, b) = hex_rgb(tier.color_hex());
    text.truecolor(r, g, b)
}

fn hex_rgb(hex: &str) -> (u8, u8, u8) {
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0)
    };
    (channel(1), channel(3), channel(5))
}

/// A fixed-width bar for a `0..=100` fill.
pub fn gauge(severity: &Severity) -> String {
    let filled = ((severity.fill / 100.0) * GAUGE_WIDTH as f64).round() as usize;
    let filled = filled.min(GAUGE_WIDTH);
    format!(
        "{}{}",
        tier_color(&"█".repeat(filled), severity.tier),
        "░".repeat(GAUGE_WIDTH - filled).dimmed()
    )
}

/// Highlighted text; `focused` is drawn reversed.
pub fn segments(segments: &[RenderSegment<'_>], focused: Option<usize>) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let painted = match segment.span.map(|s| s.category) {
                None => segment.text.normal(),
                Some(SpanCategory::Pii) => segment.text.red().underline(),
                Some(SpanCategory::Injection) => segment.text.yellow().bold(),
            };
            if focused == Some(i) {
                painted.reversed().to_string()
            } else {
                painted.to_string()
            }
        })
        .collect()
}

pub fn report(report: &AnalysisReport<'_>, focused: Option<usize>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", report.title.bold()));
    out.push_str(&format!(
        "  {}\n",
        tier_color(&report.risk_label(), report.risk_band).bold()
    ));
    out.push_str(&format!(
        "  Overall Severity  {} {}\n",
        gauge(&report.overall),
        report.overall.label
    ));

    if let Some(segs) = &report.segments {
        out.push_str(&format!("\n  {}\n", segments(segs, focused)));
    }

    if !report.bias.is_empty() {
        out.push('\n');
        for row in &report.bias {
            out.push_str(&format!(
                "  {:<16}  {} {}\n",
                row.label,
                gauge(&row.severity),
                row.severity.label
            ));
        }
    }

    if !report.notes.is_empty() {
        out.push('\n');
        for note in report.notes {
            out.push_str(&format!("  • {}\n", note));
        }
    }
    out
}

pub fn progress(state: &WorkflowState) -> String {
    state
        .progress()
        .iter()
        .map(|(step, status)| step_marker(*step, *status))
        .collect::<Vec<_>>()
        .join(" → ")
}

fn step_marker(step: Step, status: StepStatus) -> String {
    match status {
        StepStatus::Completed => format!("✓ {}", step.label()).green().to_string(),
        StepStatus::Current => format!("● {}", step.label()).cyan().bold().to_string(),
        StepStatus::Pending => format!("○ {}", step.label()).dimmed().to_string(),
    }
}

pub fn agents(agents: &[AgentInfo], selected: Option<&str>) -> String {
    agents
        .iter()
        .map(|agent| {
            let marker = if selected == Some(agent.id.as_str()) {
                "*".green().bold().to_string()
            } else {
                " ".to_string()
            };
            format!(
                "{} {:<12} {:<16} {}",
                marker,
                agent.id.bold(),
                agent.name,
                agent.description.dimmed()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per registered backend; `selected` is the configured one.
pub fn services(registry: &ServiceRegistry, selected: &str) -> String {
    registry
        .available_types()
        .into_iter()
        .filter_map(|name| registry.get_factory(name).map(|f| (name, f)))
        .map(|(name, factory)| {
            let marker = if name == selected {
                "*".green().bold().to_string()
            } else {
                " ".to_string()
            };
            let defaults = registry.default_config(name).unwrap_or_default();
            format!(
                "{} {:<6} {}\n    {}\n",
                marker,
                name.bold(),
                factory.description(),
                defaults.to_string().dimmed()
            )
        })
        .collect()
}

pub fn health(name: &str, healthy: bool) -> String {
    if healthy {
        format!("{} {} is reachable", "ok".green().bold(), name)
    } else {
        format!("{} {} is not reachable", "down".red().bold(), name)
    }
}

pub fn tooltip(tooltip: &Tooltip<'_>) -> String {
    tooltip
        .rows()
        .into_iter()
        .map(|(label, value)| format!("  {} {}", format!("{}:", label).bold(), value))
        .collect::<Vec<_>>()
        .join("\n")
}
