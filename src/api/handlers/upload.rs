use crate::{
    types::{AppError, Result, UploadResponse},
    AppState,
};
use axum::extract::{Multipart, State};
use axum::Json;
use std::path::Path;

/// Extensions accepted for analysis input.
const ALLOWED_EXTENSIONS: &[&str] = &["csv", "json", "txt", "tsv"];

/// Upload a data file for the analysis stage
#[utoipa::path(
    post,
    path = "/api/upload",
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing or unsupported file")
    ),
    tag = "execution"
)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(sanitize_filename)
            .ok_or_else(|| AppError::InvalidInput("file field has no filename".to_string()))?;

        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "unsupported file type .{}; expected one of {:?}",
                extension, ALLOWED_EXTENSIONS
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("failed to read upload: {}", e)))?;
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("uploaded file is empty".to_string()));
        }

        let uploads_dir = &state.config.orchestrator.uploads_dir;
        tokio::fs::create_dir_all(uploads_dir).await?;
        let stored = uploads_dir.join(&filename);
        tokio::fs::write(&stored, &bytes).await?;
        tracing::info!(file = %stored.display(), size = bytes.len(), "data file uploaded");

        return Ok(Json(UploadResponse {
            success: true,
            file_path: stored.display().to_string(),
            filename,
            size: bytes.len(),
        }));
    }

    Err(AppError::InvalidInput(
        "multipart body has no `file` field".to_string(),
    ))
}

/// Strip path components and shell-unfriendly characters from an
/// uploaded filename.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\data\\set.csv"), "set.csv");
        assert_eq!(sanitize_filename("my data (1).csv"), "mydata1.csv");
    }
}
