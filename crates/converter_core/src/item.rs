use std::path::Path;

/// Folder, relative to the destination prefix, that receives published documents.
pub const CONVERTED_FOLDER: &str = "converted";

/// How an item reaches the target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    /// Needs a pass through the conversion service.
    Convert,
    /// Already in a publishable format; copied unchanged.
    CopyAsIs,
}

impl ItemCategory {
    /// Classifies a storage id by its extension. Unsupported extensions yield `None`.
    pub fn classify(id: &str) -> Option<Self> {
        match extension_of(id).as_deref() {
            Some(
                "doc" | "docx" | "txt" | "rtf" | "odt" | "html" | "htm" | "jpg" | "jpeg" | "png",
            ) => Some(ItemCategory::Convert),
            Some("pdf" | "tif" | "tiff") => Some(ItemCategory::CopyAsIs),
            _ => None,
        }
    }
}

/// A single document to process within one job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub category: ItemCategory,
    /// Best effort; zero when the listing did not report a size.
    pub size_bytes: u64,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, category: ItemCategory) -> Self {
        Self {
            id: id.into(),
            category,
            size_bytes: 0,
        }
    }

    /// Builds an item from a listed id, or `None` if the extension is not supported.
    pub fn classify(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let category = ItemCategory::classify(&id)?;
        Some(Self::new(id, category))
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// Last path segment of the id.
    pub fn file_name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.id)
    }
}

/// Destination id for a processed item: `{prefix}/converted/{name}`.
///
/// TIFF files keep their original name; everything else is published as `{stem}.pdf`.
pub fn destination_name(item: &WorkItem, prefix: &str) -> String {
    let file_name = item.file_name();
    let published = match item.extension().as_deref() {
        Some("tif" | "tiff") => file_name.to_string(),
        _ => {
            let stem = Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file_name);
            format!("{stem}.pdf")
        }
    };
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{CONVERTED_FOLDER}/{published}")
    } else {
        format!("{prefix}/{CONVERTED_FOLDER}/{published}")
    }
}

fn extension_of(id: &str) -> Option<String> {
    let name = id.rsplit('/').next().unwrap_or(id);
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
