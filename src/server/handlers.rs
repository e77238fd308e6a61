//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::inference::{predict_once, MushroomRecord, Prediction};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Response body of the JSON prediction endpoint
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: Prediction,
}

// ============================================================================
// Prediction
// ============================================================================

/// Inference reads artifacts from disk and runs the model synchronously, so
/// it is moved off the async executor.
async fn classify(pipeline: PipelineConfig, record: MushroomRecord) -> Result<Prediction> {
    let prediction = tokio::task::spawn_blocking(move || predict_once(&pipeline, &record))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))??;
    Ok(prediction)
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(record): Json<MushroomRecord>,
) -> Result<Json<PredictResponse>> {
    let prediction = classify(state.pipeline.clone(), record).await?;
    info!(prediction = %prediction, "Served JSON prediction");
    Ok(Json(PredictResponse { prediction }))
}

pub async fn predict_form(
    State(state): State<Arc<AppState>>,
    Form(record): Form<MushroomRecord>,
) -> Response {
    match classify(state.pipeline.clone(), record.clone()).await {
        Ok(prediction) => {
            info!(prediction = %prediction, "Served form prediction");
            Html(render_form(&record, Some(prediction), None)).into_response()
        }
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                tracing::error!(detail = %err, "Form prediction failed");
            }
            let page = render_form(&record, None, Some(&err.public_message()));
            (status, Html(page)).into_response()
        }
    }
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_ready": state.artifacts_ready(),
        "uptime_secs": state.uptime_secs(),
    }))
}

pub async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": true,
            "message": "Not found. Visit /predict_datapoint for the form or /api/health to check status.",
        })),
    )
}

// ============================================================================
// UI
// ============================================================================

pub async fn serve_form() -> Html<String> {
    Html(render_form(&MushroomRecord::default(), None, None))
}

/// Form fields: column name, label and the dataset's category codes
const FORM_FIELDS: [(&str, &str, &[(&str, &str)]); 7] = [
    ("bruises", "Bruises", &[("t", "bruises"), ("f", "no bruises")]),
    (
        "gill-spacing",
        "Gill spacing",
        &[("c", "close"), ("w", "crowded"), ("d", "distant")],
    ),
    ("gill-size", "Gill size", &[("b", "broad"), ("n", "narrow")]),
    (
        "gill-color",
        "Gill color",
        &[
            ("k", "black"),
            ("n", "brown"),
            ("b", "buff"),
            ("h", "chocolate"),
            ("g", "gray"),
            ("r", "green"),
            ("o", "orange"),
            ("p", "pink"),
            ("u", "purple"),
            ("e", "red"),
            ("w", "white"),
            ("y", "yellow"),
        ],
    ),
    (
        "stalk-root",
        "Stalk root",
        &[
            ("b", "bulbous"),
            ("c", "club"),
            ("u", "cup"),
            ("e", "equal"),
            ("z", "rhizomorphs"),
            ("r", "rooted"),
            ("?", "missing"),
        ],
    ),
    (
        "ring-type",
        "Ring type",
        &[
            ("c", "cobwebby"),
            ("e", "evanescent"),
            ("f", "flaring"),
            ("l", "large"),
            ("n", "none"),
            ("p", "pendant"),
            ("s", "sheathing"),
            ("z", "zone"),
        ],
    ),
    (
        "spore-print-color",
        "Spore print color",
        &[
            ("k", "black"),
            ("n", "brown"),
            ("b", "buff"),
            ("h", "chocolate"),
            ("r", "green"),
            ("o", "orange"),
            ("u", "purple"),
            ("w", "white"),
            ("y", "yellow"),
        ],
    ),
];

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

pub(crate) fn render_form(
    record: &MushroomRecord,
    prediction: Option<Prediction>,
    error: Option<&str>,
) -> String {
    let mut fields = String::new();
    for (column, label, options) in FORM_FIELDS {
        let selected = record.get(column);
        fields.push_str(&format!(
            "<label for=\"{column}\">{label}</label>\n<select id=\"{column}\" name=\"{column}\">\n<option value=\"\">Select {lower}</option>\n",
            column = column,
            label = label,
            lower = label.to_lowercase(),
        ));
        for (code, name) in options.iter() {
            let marker = if selected == Some(*code) { " selected" } else { "" };
            fields.push_str(&format!(
                "<option value=\"{}\"{}>{}</option>\n",
                escape_html(code),
                marker,
                name
            ));
        }
        fields.push_str("</select>\n");
    }

    let outcome = match (prediction, error) {
        (Some(prediction), _) => format!(
            "<h2 class=\"result\">The mushroom is {}</h2>",
            prediction
        ),
        (None, Some(message)) => format!("<p class=\"error\">{}</p>", escape_html(message)),
        (None, None) => String::new(),
    };

    format!(
        "{head}<form action=\"/predict_datapoint\" method=\"post\">\n{fields}<button type=\"submit\">Predict</button>\n</form>\n{outcome}\n</body>\n</html>\n",
        head = PAGE_HEAD,
        fields = fields,
        outcome = outcome,
    )
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Mushroom Classification</title>
    <style>
        body{font-family:sans-serif;max-width:32rem;margin:2rem auto;color:#222}
        label{display:block;margin-top:.75rem;font-weight:600}
        select{width:100%;padding:.3rem}
        button{margin-top:1rem;padding:.5rem 1.5rem}
        .result{margin-top:1.5rem}
        .error{margin-top:1.5rem;color:#b00020}
    </style>
</head>
<body>
<h1>Mushroom Classification</h1>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_keeps_selected_values() {
        let record = MushroomRecord::from_values(["t", "c", "n", "k", "e", "p", "k"]);
        let page = render_form(&record, Some(Prediction::Edible), None);
        assert!(page.contains("<option value=\"t\" selected>bruises</option>"));
        assert!(page.contains("The mushroom is edible"));
    }

    #[test]
    fn test_error_message_is_escaped() {
        let page = render_form(&MushroomRecord::default(), None, Some("<bad>"));
        assert!(page.contains("&lt;bad&gt;"));
        assert!(!page.contains("The mushroom is"));
    }
}
