//! `colonylab submit`: Send a plate photo to a running API.

use anyhow::{Context, bail};
use std::path::Path;

pub async fn run(image: &Path, api_url: &str, structured: bool) -> anyhow::Result<()> {
    let mime = mime_for(image)?;
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plate".into());

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime)?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let url = endpoint(api_url, structured);
    tracing::debug!(%url, "Submitting plate photo");
    let response = reqwest::Client::new()
        .post(&url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("Could not reach {url}"))?;

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("API answered with something other than JSON")?;

    if !status.is_success() {
        let message = body["message"].as_str().unwrap_or("unknown error");
        let code = body["code"].as_str().unwrap_or("?");
        bail!("API returned {status} ({code}): {message}");
    }

    match body.get("data").and_then(|d| d.as_str()) {
        Some(markdown) if !structured => println!("{markdown}"),
        _ => println!("{}", serde_json::to_string_pretty(&body)?),
    }
    Ok(())
}

fn endpoint(api_url: &str, structured: bool) -> String {
    let route = if structured { "analysis" } else { "completion" };
    format!("{}/api/v1/{route}", api_url.trim_end_matches('/'))
}

/// The upload type, from the file extension.
fn mime_for(path: &Path) -> anyhow::Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg" | "jpeg") => Ok("image/jpeg"),
        _ => bail!("Image format not supported: {} (use JPEG or PNG)", path.display()),
    }
}
