//! DOCX paragraph extraction.
//!
//! A .docx file is a ZIP whose main body lives in `word/document.xml`;
//! paragraphs are `<w:p>` elements holding one or more `<w:t>` text runs.
//! A lightweight scan over those two tags is all the policy indexer needs,
//! no styles, tables or headers.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Extract non-empty paragraphs from a .docx file, in document order.
pub fn extract_paragraphs(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open DOCX: {}", path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read DOCX as ZIP: {}", path.display()))?;

    let mut xml_content = String::new();
    {
        let mut document_xml = archive
            .by_name("word/document.xml")
            .with_context(|| format!("DOCX missing word/document.xml: {}", path.display()))?;
        document_xml
            .read_to_string(&mut xml_content)
            .context("Failed to read document.xml from DOCX")?;
    }

    Ok(paragraphs_from_xml(&xml_content))
}

fn paragraphs_from_xml(xml: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut pos = 0;

    while let Some(p_start) = xml[pos..].find("<w:p") {
        let abs_p_start = pos + p_start;
        let p_end = match xml[abs_p_start..].find("</w:p>") {
            Some(end) => abs_p_start + end + "</w:p>".len(),
            None => xml.len(),
        };

        let text = runs_text(&xml[abs_p_start..p_end]);
        let text = text.trim();
        if !text.is_empty() {
            paragraphs.push(text.to_string());
        }

        pos = p_end;
    }

    paragraphs
}

/// Concatenate the contents of every `<w:t>` run within one paragraph.
/// `<w:t>` may carry attributes (e.g. `xml:space="preserve"`), so scan to the
/// closing `>` of the opening tag rather than assuming a fixed prefix.
fn runs_text(paragraph: &str) -> String {
    let mut text = String::new();
    let mut pos = 0;

    while let Some(t_start) = paragraph[pos..].find("<w:t") {
        let abs_t_start = pos + t_start;
        let Some(tag_end) = paragraph[abs_t_start..].find('>') else {
            break;
        };
        // Skip self-closing runs like <w:t/>
        if paragraph[abs_t_start..abs_t_start + tag_end].ends_with('/') {
            pos = abs_t_start + tag_end + 1;
            continue;
        }
        let content_start = abs_t_start + tag_end + 1;
        match paragraph[content_start..].find("</w:t>") {
            Some(t_end) => {
                text.push_str(&paragraph[content_start..content_start + t_end]);
                pos = content_start + t_end + "</w:t>".len();
            }
            None => break,
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_paragraphs_in_order() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>제1조 목적</w:t></w:r></w:p>
            <w:p><w:r><w:t>이 규정은 </w:t></w:r><w:r><w:t>근무기준을 정한다.</w:t></w:r></w:p>
            <w:p></w:p>
        </w:body></w:document>"#;

        let paragraphs = paragraphs_from_xml(xml);
        assert_eq!(paragraphs, vec!["제1조 목적", "이 규정은 근무기준을 정한다."]);
    }

    #[test]
    fn handles_attributed_and_self_closing_runs() {
        let xml = r#"<w:p><w:r><w:t xml:space="preserve">휴가 </w:t></w:r><w:r><w:t/></w:r><w:r><w:t>규정</w:t></w:r></w:p>"#;
        assert_eq!(paragraphs_from_xml(xml), vec!["휴가 규정"]);
    }

    #[test]
    fn empty_document_yields_no_paragraphs() {
        assert!(paragraphs_from_xml("<w:document/>").is_empty());
    }
}
