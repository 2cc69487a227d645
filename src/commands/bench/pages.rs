use super::*;

/// Source of PDF page counts for the page-coverage check.
pub trait PageCounter {
    fn page_count(&self, pdf_path: &Path) -> Result<u32>;
}

/// Reads the `Pages:` line printed by poppler's `pdfinfo`.
pub struct PdfinfoPageCounter;

impl PageCounter for PdfinfoPageCounter {
    fn page_count(&self, pdf_path: &Path) -> Result<u32> {
        let output = Command::new("pdfinfo")
            .arg(pdf_path)
            .output()
            .with_context(|| format!("failed to execute pdfinfo for {}", pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdfinfo returned non-zero exit status for {}: {}",
                pdf_path.display(),
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_pdfinfo_pages(&stdout).with_context(|| {
            format!("pdfinfo output has no page count for {}", pdf_path.display())
        })
    }
}

pub fn parse_pdfinfo_pages(stdout: &str) -> Option<u32> {
    stdout.lines().find_map(|line| {
        line.strip_prefix("Pages:")
            .and_then(|value| value.trim().parse::<u32>().ok())
    })
}
