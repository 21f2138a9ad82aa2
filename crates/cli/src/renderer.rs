//! Built-in report renderer for the worker
//!
//! Summarizes archived recording files. No target connector ships with recap,
//! so live-target locators fail with a connection error.

use async_trait::async_trait;
use recap_cache::{RenderError, ReportRenderer, WorkerRequest};
use std::path::Path;
use tokio::io::AsyncReadExt;
use url::Url;

/// Leading bytes shown as the recording's magic number
const MAGIC_LEN: usize = 4;

pub struct ArchiveSummaryRenderer;

#[async_trait]
impl ReportRenderer for ArchiveSummaryRenderer {
    async fn render(&self, request: &WorkerRequest) -> Result<String, RenderError> {
        let url = Url::parse(&request.locator)
            .ok()
            .filter(|url| url.scheme() == "file")
            .ok_or_else(|| {
                RenderError::TargetConnection(format!(
                    "no connector available for '{}'",
                    request.locator
                ))
            })?;
        let path = url
            .to_file_path()
            .map_err(|()| RenderError::Recording(format!("'{url}' is not a local file")))?;

        let summary = summarize(&path).await?;
        Ok(render_html(request, &path, &summary))
    }
}

struct Summary {
    size: u64,
    magic: Vec<u8>,
}

async fn summarize(path: &Path) -> Result<Summary, RenderError> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RenderError::NoSuchRecording(path.display().to_string()))
        }
        Err(e) => return Err(RenderError::Recording(format!("{}: {e}", path.display()))),
    };

    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(RenderError::Recording(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(RenderError::Recording(format!(
            "{} is empty",
            path.display()
        )));
    }

    let mut magic = vec![0u8; MAGIC_LEN];
    let read = file.read(&mut magic).await?;
    magic.truncate(read);

    Ok(Summary {
        size: metadata.len(),
        magic,
    })
}

fn render_html(request: &WorkerRequest, path: &Path, summary: &Summary) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let magic: String = summary.magic.iter().map(|b| format!("{b:02x}")).collect();
    let filter = if request.filter.is_empty() {
        "(none)"
    } else {
        request.filter.as_str()
    };
    let transformers = if request.transformers.is_empty() {
        "(none)".to_string()
    } else {
        request.transformers.join(", ")
    };

    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n\
         <h1>{title}</h1>\n<table>\n\
         <tr><th>Size</th><td>{size} bytes</td></tr>\n\
         <tr><th>Magic</th><td>{magic}</td></tr>\n\
         <tr><th>Filter</th><td>{filter}</td></tr>\n\
         <tr><th>Transformers</th><td>{transformers}</td></tr>\n\
         </table>\n</body>\n</html>\n",
        title = escape(&name),
        size = summary.size,
        filter = escape(filter),
        transformers = escape(&transformers),
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
