//! Plotly scatter figures, HTML pages and CSV export for a [`Galaxy`].
//!
//! The figure is plain Plotly JSON built with `serde_json`; the browser
//! loads plotly.js from its CDN and draws it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::pipeline::{Galaxy, GalaxyPoint, Summary};

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Labels are drawn only for maps this small; beyond that they overlap.
pub const MAX_LABELLED_POINTS: usize = 30;

/// Largest marker diameter in pixels.
const SIZE_MAX: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBy {
    #[default]
    Language,
    Stars,
}

impl std::str::FromStr for ColorBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "language" => Ok(Self::Language),
            "stars" => Ok(Self::Stars),
            _ => Err(format!("unknown color key: {s}. Supported: language, stars")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScatterOptions {
    pub title: String,
    pub color_by: ColorBy,
    pub show_labels: bool,
}

impl ScatterOptions {
    pub fn for_keyword(keyword: &str) -> Self {
        Self {
            title: format!("Semantic map of '{keyword}'"),
            color_by: ColorBy::default(),
            show_labels: false,
        }
    }
}

/// Build the Plotly figure (`{"data": [...], "layout": {...}}`).
pub fn scatter_figure(points: &[GalaxyPoint], opts: &ScatterOptions) -> Value {
    let max_stars = points.iter().map(|p| p.repo.stars).max().unwrap_or(0).max(1) as f64;
    // plotly.express convention for area-scaled markers
    let sizeref = 2.0 * max_stars / (SIZE_MAX * SIZE_MAX);

    let mut traces = match opts.color_by {
        ColorBy::Language => group_by_language(points)
            .into_iter()
            .map(|(language, group)| marker_trace(&group, Some(language), None, sizeref))
            .collect::<Vec<_>>(),
        ColorBy::Stars => {
            let all: Vec<&GalaxyPoint> = points.iter().collect();
            let colors: Vec<u64> = points.iter().map(|p| p.repo.stars).collect();
            vec![marker_trace(&all, None, Some(colors), sizeref)]
        }
    };

    if opts.show_labels && points.len() <= MAX_LABELLED_POINTS {
        traces.push(json!({
            "type": "scatter",
            "mode": "text",
            "x": points.iter().map(|p| p.x).collect::<Vec<_>>(),
            "y": points.iter().map(|p| p.y).collect::<Vec<_>>(),
            "text": points.iter().map(|p| p.repo.short_name()).collect::<Vec<_>>(),
            "textposition": "top center",
            "textfont": { "size": 8, "color": "gray" },
            "showlegend": false,
            "hoverinfo": "skip",
        }));
    }

    let hidden_axis = json!({ "showgrid": false, "showticklabels": false, "zeroline": false });

    json!({
        "data": traces,
        "layout": {
            "title": {
                "text": opts.title,
                "font": { "size": 20, "color": "#2c3e50" },
                "x": 0.5,
                "xanchor": "center",
            },
            "showlegend": opts.color_by == ColorBy::Language,
            "legend": { "title": { "text": "Language" } },
            "hovermode": "closest",
            "plot_bgcolor": "rgba(240, 240, 250, 0.5)",
            "paper_bgcolor": "white",
            "font": { "family": "Arial, sans-serif", "size": 12 },
            "xaxis": hidden_axis,
            "yaxis": hidden_axis,
            "height": 700,
            "margin": { "l": 50, "r": 50, "t": 80, "b": 50 },
        }
    })
}

fn group_by_language(points: &[GalaxyPoint]) -> Vec<(&str, Vec<&GalaxyPoint>)> {
    let mut order: Vec<(&str, Vec<&GalaxyPoint>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for p in points {
        let lang = p.repo.language.as_str();
        let slot = *index.entry(lang).or_insert_with(|| {
            order.push((lang, Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(p);
    }
    order
}

fn marker_trace(
    points: &[&GalaxyPoint],
    name: Option<&str>,
    colors: Option<Vec<u64>>,
    sizeref: f64,
) -> Value {
    let mut marker = json!({
        "size": points.iter().map(|p| p.repo.stars).collect::<Vec<_>>(),
        "sizemode": "area",
        "sizeref": sizeref,
        "sizemin": 4,
        "opacity": 0.8,
        "line": { "width": 1, "color": "white" },
    });
    if let Some(colors) = colors {
        marker["color"] = json!(colors);
        marker["colorscale"] = json!("Viridis");
        marker["showscale"] = json!(true);
        marker["colorbar"] = json!({ "title": { "text": "Stars" } });
    }

    let mut trace = json!({
        "type": "scatter",
        "mode": "markers",
        "x": points.iter().map(|p| p.x).collect::<Vec<_>>(),
        "y": points.iter().map(|p| p.y).collect::<Vec<_>>(),
        "hovertext": points.iter().map(|p| p.repo.name.as_str()).collect::<Vec<_>>(),
        "customdata": points
            .iter()
            .map(|p| {
                json!([
                    format_thousands(p.repo.stars),
                    p.repo.language,
                    escape_html(&p.repo.description),
                    p.repo.url,
                ])
            })
            .collect::<Vec<_>>(),
        "hovertemplate": "<b>%{hovertext}</b><br>⭐ %{customdata[0]} stars<br>💻 %{customdata[1]}<br>📝 %{customdata[2]}<extra></extra>",
        "marker": marker,
    });
    if let Some(name) = name {
        trace["name"] = json!(name);
    }
    trace
}

/// `<div>` plus inline script drawing `figure` with plotly.js.
///
/// Clicking a point opens its repository.
pub fn chart_html(figure: &Value, div_id: &str) -> String {
    // keep "</script>" inside JSON strings from closing the tag
    let data = figure.to_string().replace("</", "<\\/");
    format!(
        r#"<div id="{div_id}"></div>
<script>
  (function () {{
    var fig = {data};
    Plotly.newPlot("{div_id}", fig.data, fig.layout, {{responsive: true}});
    document.getElementById("{div_id}").on("plotly_click", function (ev) {{
      var p = ev.points[0];
      if (p && p.customdata && p.customdata[3]) {{ window.open(p.customdata[3], "_blank"); }}
    }});
  }})();
</script>"#
    )
}

pub fn summary_html(summary: &Summary) -> String {
    let metric = |label: &str, value: String| {
        format!(
            r#"<div class="metric"><div class="label">{}</div><div class="value">{}</div></div>"#,
            escape_html(label),
            escape_html(&value)
        )
    };
    format!(
        r#"<div class="metrics">{}{}{}{}</div>"#,
        metric("Repositories", summary.total_repos.to_string()),
        metric("Total stars", format_thousands(summary.total_stars)),
        metric("Top language", summary.top_language.clone()),
        metric("Average stars", format_thousands(summary.avg_stars)),
    )
}

pub const STYLE: &str = r#"
body { font-family: Arial, sans-serif; margin: 0; color: #2c3e50; }
main { padding: 1.5rem 2rem; }
.metrics { display: flex; gap: 2rem; margin: 1rem 0; }
.metric .label { font-size: 0.85rem; color: #7f8c8d; }
.metric .value { font-size: 1.6rem; }
.notice { padding: 0.8rem 1rem; border-radius: 6px; margin: 1rem 0; }
.notice.info { background: #eaf2fb; }
.notice.warn { background: #fdf5e6; }
.notice.error { background: #fdecea; }
"#;

/// Self-contained page for `galaxy explore --output`.
pub fn standalone_page(galaxy: &Galaxy, opts: &ScatterOptions) -> String {
    let figure = scatter_figure(&galaxy.points, opts);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
<style>{STYLE}</style>
</head>
<body>
<main>
<h1>🌌 GitHub Galaxy Explorer</h1>
<p>Nearby points are semantically similar projects. Hover for details, click to open.</p>
{chart}
{summary}
</main>
</body>
</html>
"#,
        title = escape_html(&opts.title),
        chart = chart_html(&figure, "galaxy"),
        summary = summary_html(&galaxy.summary),
    )
}

/// CSV export with RFC 4180 quoting. Topics are `;`-joined.
pub fn to_csv(points: &[GalaxyPoint]) -> String {
    let mut out = String::from("name,description,stars,url,topics,language,x,y\r\n");
    for p in points {
        let fields = [
            csv_field(&p.repo.name),
            csv_field(&p.repo.description),
            p.repo.stars.to_string(),
            csv_field(&p.repo.url),
            csv_field(&p.repo.topics.join(";")),
            csv_field(&p.repo.language),
            p.x.to_string(),
            p.y.to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `1234567` → `"1,234,567"`.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::Repository;

    fn point(name: &str, language: &str, stars: u64, x: f64) -> GalaxyPoint {
        GalaxyPoint {
            repo: Repository {
                id: stars,
                name: name.into(),
                description: format!("{name} <b>desc</b>"),
                language: language.into(),
                stars,
                url: format!("https://github.com/{name}"),
                topics: vec!["a".into(), "b".into()],
            },
            x,
            y: -x,
        }
    }

    fn sample() -> Vec<GalaxyPoint> {
        vec![
            point("pallets/flask", "Python", 1000, 1.2),
            point("django/django", "Python", 5000, 3.5),
            point("d3/d3", "JavaScript", 2000, 1.8),
            point("gin-gonic/gin", "Go", 3000, 3.2),
        ]
    }

    #[test]
    fn language_coloring_makes_one_trace_per_language() {
        let fig = scatter_figure(&sample(), &ScatterOptions::for_keyword("web"));
        let data = fig["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["name"], "Python");
        assert_eq!(data[0]["x"].as_array().unwrap().len(), 2);
        assert_eq!(data[1]["name"], "JavaScript");
        assert_eq!(data[2]["name"], "Go");
        assert_eq!(fig["layout"]["showlegend"], true);
        assert_eq!(data[0]["customdata"][1][0], "5,000");
        assert_eq!(data[0]["customdata"][0][2], "pallets/flask &lt;b&gt;desc&lt;/b&gt;");
    }

    #[test]
    fn star_coloring_uses_one_scaled_trace() {
        let opts = ScatterOptions {
            color_by: ColorBy::Stars,
            ..ScatterOptions::for_keyword("web")
        };
        let fig = scatter_figure(&sample(), &opts);
        let data = fig["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["marker"]["colorscale"], "Viridis");
        assert_eq!(data[0]["marker"]["color"].as_array().unwrap().len(), 4);
        let sizeref = data[0]["marker"]["sizeref"].as_f64().unwrap();
        assert!((sizeref - 2.0 * 5000.0 / 900.0).abs() < 1e-9);
    }

    #[test]
    fn labels_only_for_small_maps() {
        let opts = ScatterOptions {
            show_labels: true,
            ..ScatterOptions::for_keyword("web")
        };
        let fig = scatter_figure(&sample(), &opts);
        let data = fig["data"].as_array().unwrap();
        let labels = data.last().unwrap();
        assert_eq!(labels["mode"], "text");
        assert_eq!(labels["text"][0], "flask");

        let many: Vec<GalaxyPoint> = (0..31)
            .map(|i| point(&format!("o/r{i}"), "Rust", i, i as f64))
            .collect();
        let fig = scatter_figure(&many, &opts);
        assert!(fig["data"]
            .as_array()
            .unwrap()
            .iter()
            .all(|t| t["mode"] == "markers"));
    }

    #[test]
    fn chart_html_escapes_script_close() {
        let fig = json!({ "data": [], "layout": { "title": "</script><script>alert(1)" } });
        let html = chart_html(&fig, "c");
        assert!(!html.contains("</script><script>alert"));
        assert!(html.contains("Plotly.newPlot(\"c\""));
    }

    #[test]
    fn csv_quotes_special_fields() {
        let mut points = sample();
        points[0].repo.description = "fast, \"simple\"".into();
        let csv = to_csv(&points[..1]);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "name,description,stars,url,topics,language,x,y");
        assert_eq!(
            lines.next().unwrap(),
            "pallets/flask,\"fast, \"\"simple\"\"\",1000,https://github.com/pallets/flask,a;b,Python,1.2,-1.2"
        );
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }
}
