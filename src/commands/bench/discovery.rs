use super::*;

static REPEAT_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)_pg(\d+)_repeat(\d+)\.([A-Za-z]+)$").expect("valid repeat file regex")
});

/// Generated documents found for one source PDF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfDocuments {
    /// Per-page repeat files, ordered by repeat number.
    pub repeats: BTreeMap<u32, Vec<PathBuf>>,
    /// Single document covering the whole PDF.
    pub whole: Option<PathBuf>,
}

impl PdfDocuments {
    pub fn is_empty(&self) -> bool {
        self.repeats.is_empty() && self.whole.is_none()
    }

    /// Repeat files for `page`, falling back to the whole-PDF document.
    pub fn for_page(&self, page: u32) -> Vec<PathBuf> {
        match self.repeats.get(&page) {
            Some(files) if !files.is_empty() => files.clone(),
            _ => self.whole.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentIndex {
    by_pdf: HashMap<String, PdfDocuments>,
}

impl DocumentIndex {
    pub fn build(search_root: &Path, pdfs: &[String]) -> Result<Self> {
        let mut relative_files = list_relative_files(search_root)?;
        relative_files.sort();

        let mut repeats_by_stem: HashMap<String, BTreeMap<u32, Vec<(u32, PathBuf)>>> =
            HashMap::new();
        let mut whole_by_stem: HashMap<String, PathBuf> = HashMap::new();

        for relative in &relative_files {
            let path = Path::new(relative);
            let Some(extension) = path.extension().and_then(|value| value.to_str()) else {
                continue;
            };
            if !is_document_extension(extension) {
                continue;
            }

            if let Some(captures) = REPEAT_FILE_RE.captures(relative) {
                let page = captures[2].parse::<u32>();
                let repeat = captures[3].parse::<u32>();
                if let (Ok(page), Ok(repeat)) = (page, repeat) {
                    repeats_by_stem
                        .entry(captures[1].to_string())
                        .or_default()
                        .entry(page)
                        .or_default()
                        .push((repeat, search_root.join(relative)));
                    continue;
                }
            }

            let stem = &relative[..relative.len() - extension.len() - 1];
            whole_by_stem
                .entry(stem.to_string())
                .or_insert_with(|| search_root.join(relative));
        }

        let mut by_pdf = HashMap::with_capacity(pdfs.len());
        for pdf in pdfs {
            let stem = document_stem(pdf);
            let repeats: BTreeMap<u32, Vec<PathBuf>> = repeats_by_stem
                .get(stem)
                .map(|pages| {
                    pages
                        .iter()
                        .map(|(page, files)| {
                            let mut files = files.clone();
                            files.sort_by_key(|(repeat, _)| *repeat);
                            (*page, files.into_iter().map(|(_, path)| path).collect())
                        })
                        .collect()
                })
                .unwrap_or_default();

            by_pdf.insert(
                pdf.clone(),
                PdfDocuments {
                    repeats,
                    whole: whole_by_stem.get(stem).cloned(),
                },
            );
        }

        Ok(Self { by_pdf })
    }

    pub fn documents(&self, pdf: &str) -> Option<&PdfDocuments> {
        self.by_pdf.get(pdf)
    }

    pub fn documents_for(&self, pdf: &str, page: u32) -> Vec<PathBuf> {
        self.documents(pdf)
            .map(|documents| documents.for_page(page))
            .unwrap_or_default()
    }
}

fn is_document_extension(extension: &str) -> bool {
    DOCUMENT_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(extension))
}

/// Relative PDF path without its `.pdf` extension.
pub fn document_stem(pdf: &str) -> &str {
    match pdf.rsplit_once('.') {
        Some((stem, extension)) if extension.eq_ignore_ascii_case("pdf") && !stem.is_empty() => {
            stem
        }
        _ => pdf,
    }
}

/// Regular files below `root`, as `/`-separated paths relative to it.
/// Symlinked directories are not followed.
pub fn list_relative_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(directory) = pending.pop() {
        let entries = fs::read_dir(&directory)
            .with_context(|| format!("failed to read directory {}", directory.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read entry in {}", directory.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to stat {}", entry.path().display()))?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() || path.is_file() {
                let relative = path.strip_prefix(root).with_context(|| {
                    format!("{} is not below {}", path.display(), root.display())
                })?;
                files.push(
                    relative
                        .components()
                        .map(|component| component.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/"),
                );
            }
        }
    }

    Ok(files)
}
