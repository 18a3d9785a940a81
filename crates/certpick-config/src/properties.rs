use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::manifest::MAX_LINE_LEN;
use crate::ConfigError;

const ENGINE_TAG: &str = "engine=";

/// Scans a properties file for the crypto engine line.
///
/// A missing file means no engine is configured and is not an error;
/// over-long lines are skipped rather than failing the whole file.
pub fn load_engine_hint(path: &Path) -> Result<Option<String>, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    Ok(parse_engine_hint(&text))
}

pub fn parse_engine_hint(text: &str) -> Option<String> {
    for line in text.lines() {
        if line.len() > MAX_LINE_LEN {
            tracing::warn!(length = line.len(), "skipping over-long engine property line");
            continue;
        }
        if let Some(value) = line.strip_prefix(ENGINE_TAG) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{load_engine_hint, parse_engine_hint};
    use crate::manifest::MAX_LINE_LEN;
    use std::path::Path;

    #[test]
    fn finds_the_engine_line_among_other_properties() {
        let text = "vendor=acme\nengine=e4tstdef\nslots=4\n";
        assert_eq!(parse_engine_hint(text), Some("e4tstdef".to_string()));
    }

    #[test]
    fn absent_tag_or_empty_value_yields_no_engine() {
        assert_eq!(parse_engine_hint("vendor=acme\n"), None);
        assert_eq!(parse_engine_hint("engine=\n"), None);
        assert_eq!(parse_engine_hint(""), None);
    }

    #[test]
    fn over_long_lines_are_skipped_not_fatal() {
        let text = format!("x{}\nengine=hw1\n", "y".repeat(MAX_LINE_LEN));
        assert_eq!(parse_engine_hint(&text), Some("hw1".to_string()));
    }

    #[test]
    fn missing_properties_file_means_no_engine() {
        let hint =
            load_engine_hint(Path::new("/nonexistent/certpick/engine.properties")).expect("ok");
        assert_eq!(hint, None);
    }
}
