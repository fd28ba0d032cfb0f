use anyhow::{Context, Result};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::Document;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Returns true when the attachment's filename says it is a PDF.
pub fn is_pdf_filename(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Download the attached document to a unique temporary path, extract its
/// text and remove the file again. Pages without extractable text contribute
/// nothing; the caller decides what an empty result means.
///
/// The temp file is tied to the returned guard's scope, so it is deleted on
/// every exit path, including download and extraction failures.
pub async fn extract_document_text(bot: &Bot, doc: &Document) -> Result<String> {
    let file = bot
        .get_file(doc.file.id.clone())
        .await
        .context("Failed to resolve attachment on Telegram servers")?;

    let tmp = tempfile::Builder::new()
        .prefix("paperbot-")
        .suffix(".pdf")
        .tempfile()
        .context("Failed to create temporary download file")?;

    let mut dst = tokio::fs::File::create(tmp.path())
        .await
        .context("Failed to open temporary download file")?;
    bot.download_file(&file.path, &mut dst)
        .await
        .context("Failed to download attachment")?;
    dst.flush().await.context("Failed to flush downloaded file")?;
    drop(dst);

    let text = pdf_extract::extract_text(tmp.path())
        .context("Failed to extract text from PDF")?;

    info!(
        "Extracted {} chars from {}",
        text.len(),
        doc.file_name.as_deref().unwrap_or("attachment")
    );

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_filename_accepted() {
        assert!(is_pdf_filename("report.pdf"));
        assert!(is_pdf_filename("Quarterly Report.PDF"));
    }

    #[test]
    fn test_non_pdf_filename_rejected() {
        assert!(!is_pdf_filename("report.docx"));
        assert!(!is_pdf_filename("report.pdf.exe"));
        assert!(!is_pdf_filename("pdf"));
        assert!(!is_pdf_filename(""));
    }
}
