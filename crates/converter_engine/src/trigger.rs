use engine_logging::engine_debug;

use crate::decode::{decode_text, DecodeError};
use crate::storage::{SasLocation, StorageError};

pub const SOURCE_KEY: &str = "source_sas_url";
pub const DEST_KEY: &str = "dest_sas_url";

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("trigger file is not readable text: {0}")]
    Decode(#[from] DecodeError),
    #[error("trigger file has no `{0}` entry")]
    MissingKey(&'static str),
    #[error("invalid `{key}`: {source}")]
    InvalidLocation {
        key: &'static str,
        #[source]
        source: StorageError,
    },
}

/// Locations named by a trigger file.
#[derive(Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    pub source: String,
    pub destination: String,
}

// Locations carry SAS signatures; keep them out of debug output.
impl std::fmt::Debug for TriggerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerSpec")
            .field("source", &redact(&self.source))
            .field("destination", &redact(&self.destination))
            .finish()
    }
}

/// Parses a trigger file.
///
/// Lines are `key: value`; keys are case-insensitive, blank lines and `#`
/// comments are ignored, unknown keys are skipped and the last occurrence of a
/// key wins. `http(s)` values must be SAS URLs; anything else names a local
/// directory.
pub fn parse_trigger(bytes: &[u8]) -> Result<TriggerSpec, TriggerError> {
    let text = decode_text(bytes)?;
    let mut source = None;
    let mut destination = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            SOURCE_KEY => source = Some(value),
            DEST_KEY => destination = Some(value),
            other => engine_debug!("Ignoring trigger key `{other}`"),
        }
    }

    let source = source.ok_or(TriggerError::MissingKey(SOURCE_KEY))?;
    let destination = destination.ok_or(TriggerError::MissingKey(DEST_KEY))?;
    validate(SOURCE_KEY, &source)?;
    validate(DEST_KEY, &destination)?;
    Ok(TriggerSpec {
        source,
        destination,
    })
}

fn validate(key: &'static str, value: &str) -> Result<(), TriggerError> {
    if value.is_empty() {
        return Err(TriggerError::InvalidLocation {
            key,
            source: StorageError::InvalidLocation("empty value".into()),
        });
    }
    if is_url(value) {
        SasLocation::parse(value).map_err(|source| TriggerError::InvalidLocation { key, source })?;
    }
    Ok(())
}

fn is_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

fn redact(value: &str) -> String {
    if is_url(value) {
        SasLocation::parse(value)
            .map(|location| location.redacted())
            .unwrap_or_else(|_| "<invalid url>".to_string())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_signatures() {
        let spec = parse_trigger(
            b"source_sas_url: https://acct.blob.core.windows.net/in?sv=1&sig=SECRET\n\
              dest_sas_url: /tmp/out\n",
        )
        .unwrap();
        let debug = format!("{spec:?}");
        assert!(!debug.contains("SECRET"), "{debug}");
        assert!(debug.contains("/tmp/out"));
    }
}
