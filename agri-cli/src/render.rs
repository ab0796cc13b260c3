//! Terminal rendering of results.

use agri_core::{
    ChatReply, DetectionKind, PredictionView, ReplyFormat, WeatherView,
    session::WEATHER_UNAVAILABLE,
};

pub fn prediction(kind: DetectionKind, view: &PredictionView) -> String {
    let mut lines = Vec::new();

    match kind {
        DetectionKind::Disease => {
            lines.push(format!("Plant:      {}", view.plant().unwrap_or("--")));
            lines.push(format!("Disease:    {}", view.label()));
        }
        DetectionKind::Pest => lines.push(format!("Pest:       {}", view.label())),
    }
    lines.push(format!("Confidence: {}", view.confidence_text()));

    match view {
        PredictionView::Ready(d) => {
            if d.healthy {
                lines.push("The plant looks healthy.".to_string());
            } else if d.needs_solution() {
                lines.push("Run again with --solution for treatment advice.".to_string());
            }
            if d.candidates.len() > 1 {
                lines.push("Other candidates:".to_string());
                lines.extend(
                    d.candidates.iter().skip(1).map(|c| format!("  {} ({}%)", c.label, c.confidence)),
                );
            }
        }
        PredictionView::Rejected { message } => lines.push(format!("Error: {message}")),
        PredictionView::Failed { .. } => {
            lines.push(format!("Error predicting {kind}. Please try again."))
        }
    }

    lines.join("\n")
}

pub fn weather(view: &WeatherView) -> String {
    let report = match view {
        WeatherView::Ready(report) => report,
        WeatherView::Unavailable => return WEATHER_UNAVAILABLE.to_string(),
    };

    let feels = report.feels_like.map(|f| format!(" (feels like {f}°C)")).unwrap_or_default();
    let dir = report.wind_direction.as_deref().map(|d| format!(" {d}")).unwrap_or_default();

    let mut lines = vec![
        format!("Weather in {}", report.display_name()),
        format!("  {}°C, {}{feels}", report.temperature, report.condition_text()),
        format!("  Humidity:   {}%", report.humidity),
        format!("  Rainfall:   {} mm", report.rainfall),
        format!("  Wind:       {} km/h{dir}", report.wind_speed),
        format!("  UV index:   {}", report.uv_index),
    ];
    if let Some(icon) = report.icon_url() {
        lines.push(format!("  Icon:       {icon}"));
    }

    for day in report.forecast.iter().skip(1) {
        let (Some(date), Some(max), Some(min)) =
            (day.date.as_deref(), day.day.maxtemp_c, day.day.mintemp_c)
        else {
            continue;
        };
        lines.push(format!("  {date}: {min}–{max}°C, {}", day.day.condition.text));
    }

    lines.join("\n")
}

pub fn reply(reply: &ChatReply) -> String {
    match reply.format {
        ReplyFormat::Text => reply.body.clone(),
        ReplyFormat::Markup => markup_to_text(&reply.body),
    }
}

/// Flatten sanitized chatbot markup into terminal text.
pub fn markup_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let tag = &rest[start + 1..start + end];
        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match (name.as_str(), closing) {
            ("br", _) => out.push('\n'),
            ("li", false) => out.push_str("\n  • "),
            ("p" | "div" | "ul" | "ol" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6", _) => {
                out.push('\n')
            }
            ("td" | "th", true) => out.push('\t'),
            _ => {}
        }

        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);

    decode_entities(&out)
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
