//! Text intake: loading raw texts from disk and cleaning a submission.
//!
//! A file is read as one text per non-empty line, or as a JSON array of
//! strings when it ends in `.json`. A directory yields one text per `.txt`
//! file found under it, in path order.
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone)]
pub struct TextLoader;

impl TextLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self, path: &Path) -> Result<Vec<String>> {
        if path.is_dir() {
            return self.load_directory(path);
        }
        let content = self.read_file_content(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            let texts: Vec<String> = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("{} is not a JSON array of strings: {}", path.display(), e))?;
            return Ok(texts);
        }
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    pub fn load_directory(&self, root: &Path) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for file in self.list_txt_files(root) {
            let content = self.read_file_content(&file)?;
            let content = content.trim();
            if !content.is_empty() {
                texts.push(content.to_string());
            }
        }
        Ok(texts)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
            .collect();
        txt_files.sort();
        txt_files
    }
}

/// Trims every text, drops blank ones and truncates the rest to
/// `max_len` characters (trimming again after the cut).
pub fn clean_texts<I, S>(texts: I, max_len: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .filter_map(|t| {
            let t = t.as_ref().trim();
            if t.is_empty() {
                return None;
            }
            if t.chars().count() <= max_len {
                return Some(t.to_string());
            }
            let cut: String = t.chars().take(max_len).collect();
            Some(cut.trim().to_string())
        })
        .filter(|t| !t.is_empty())
        .collect()
}
