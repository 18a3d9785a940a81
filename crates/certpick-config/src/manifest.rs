use std::fs;
use std::path::Path;

use crate::ConfigError;

/// Manifest lines longer than this are treated as file corruption.
pub const MAX_LINE_LEN: usize = 1024;

const FIELD_COUNT: usize = 5;
const FIELD_DELIM: char = ',';
const GROUP_DELIM: char = '|';
const FILE_SCHEME: &str = "file://";

/// One certificate manifest line:
/// `<groups>,<reference>,<kind>,<uri>,<credential_ref>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Groups this certificate serves; `|`-separated in the file.
    pub groups: Vec<String>,
    /// Stable name used by the locator and as the engine certificate id.
    pub reference: String,
    /// Usage kind tag (e.g. MTLS); opaque to the selector.
    pub kind: String,
    pub uri: String,
    pub credential_ref: String,
}

impl ManifestEntry {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|candidate| candidate == group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        for (number, raw) in text.lines().enumerate() {
            let line = number + 1;
            if raw.len() > MAX_LINE_LEN {
                return Err(ConfigError::LineTooLong { line });
            }
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split(FIELD_DELIM).collect();
            if fields.len() != FIELD_COUNT || fields.iter().any(|field| field.is_empty()) {
                return Err(ConfigError::MalformedLine { line });
            }
            let groups: Vec<String> = fields[0].split(GROUP_DELIM).map(str::to_string).collect();
            if groups.iter().any(|group| group.is_empty()) {
                return Err(ConfigError::MalformedLine { line });
            }
            entries.push(ManifestEntry {
                groups,
                reference: fields[1].to_string(),
                kind: fields[2].to_string(),
                uri: fields[3].to_string(),
                credential_ref: fields[4].to_string(),
            });
        }
        if entries.is_empty() {
            return Err(ConfigError::EmptyManifest);
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Entries belonging to `group`, in manifest order. Manifest order is
    /// the failover priority order.
    pub fn entries_for_group(&self, group: &str) -> Result<Vec<&ManifestEntry>, ConfigError> {
        validate_group_name(group)?;
        let selected: Vec<&ManifestEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.in_group(group))
            .collect();
        if selected.is_empty() {
            return Err(ConfigError::UnknownGroup {
                group: group.to_string(),
            });
        }
        Ok(selected)
    }

    pub fn entry_for_reference(&self, reference: &str) -> Option<&ManifestEntry> {
        self.entries
            .iter()
            .find(|entry| entry.reference == reference)
    }
}

/// Group names share the manifest line with the field and group delimiters,
/// so neither may appear in a name.
pub fn validate_group_name(group: &str) -> Result<(), ConfigError> {
    if group.is_empty() || group.contains(FIELD_DELIM) || group.contains(GROUP_DELIM) {
        return Err(ConfigError::BadGroupName {
            group: group.to_string(),
        });
    }
    Ok(())
}

/// Resolves a manifest uri to a filesystem path, stripping an optional
/// `file://` scheme.
pub fn uri_to_path(uri: &str) -> &str {
    uri.strip_prefix(FILE_SCHEME).unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::{uri_to_path, validate_group_name, Manifest, MAX_LINE_LEN};
    use crate::ConfigError;

    const MANIFEST: &str = "\
group1,first,MTLS,file:///etc/certs/first.p12,pc1
group1|group2,second,MTLS,file:///etc/certs/second.p12,pc2
group2,alpha,MTLS,/etc/certs/alpha.p12,pcalpha
# trailing comment line

group1,third,MTLS,file:///etc/certs/third.p12,pc3
";

    #[test]
    fn parses_entries_and_preserves_group_order() {
        let manifest = Manifest::parse(MANIFEST).expect("manifest");
        assert_eq!(manifest.entries().len(), 4);

        let group1 = manifest.entries_for_group("group1").expect("group1");
        let refs: Vec<&str> = group1
            .iter()
            .map(|entry| entry.reference.as_str())
            .collect();
        assert_eq!(refs, vec!["first", "second", "third"]);

        let group2 = manifest.entries_for_group("group2").expect("group2");
        let refs: Vec<&str> = group2
            .iter()
            .map(|entry| entry.reference.as_str())
            .collect();
        assert_eq!(refs, vec!["second", "alpha"]);
    }

    #[test]
    fn looks_up_entries_by_reference() {
        let manifest = Manifest::parse(MANIFEST).expect("manifest");
        let alpha = manifest.entry_for_reference("alpha").expect("alpha");
        assert_eq!(alpha.credential_ref, "pcalpha");
        assert!(manifest.entry_for_reference("missing").is_none());
    }

    #[test]
    fn unknown_group_is_an_error() {
        let manifest = Manifest::parse(MANIFEST).expect("manifest");
        assert!(matches!(
            manifest.entries_for_group("group9"),
            Err(ConfigError::UnknownGroup { .. })
        ));
    }

    #[test]
    fn malformed_lines_are_rejected_with_their_line_number() {
        let error = Manifest::parse("group1,first,MTLS,uri\n").expect_err("four fields");
        assert!(matches!(error, ConfigError::MalformedLine { line: 1 }));

        let error =
            Manifest::parse("ok|,first,MTLS,uri,pc1\n").expect_err("empty group in list");
        assert!(matches!(error, ConfigError::MalformedLine { line: 1 }));

        let error = Manifest::parse("group1,first,MTLS,uri,pc1\n,x,MTLS,uri,pc2\n")
            .expect_err("empty first field");
        assert!(matches!(error, ConfigError::MalformedLine { line: 2 }));
    }

    #[test]
    fn over_long_lines_are_a_file_error() {
        let long = format!("group1,first,MTLS,{},pc1\n", "u".repeat(MAX_LINE_LEN));
        let error = Manifest::parse(&long).expect_err("long line");
        assert!(matches!(error, ConfigError::LineTooLong { line: 1 }));
    }

    #[test]
    fn empty_manifest_is_an_error() {
        assert!(matches!(
            Manifest::parse("# only comments\n\n"),
            Err(ConfigError::EmptyManifest)
        ));
    }

    #[test]
    fn group_names_may_not_contain_delimiters() {
        validate_group_name("group1").expect("plain name");
        for bad in ["", "a,b", "a|b"] {
            assert!(matches!(
                validate_group_name(bad),
                Err(ConfigError::BadGroupName { .. })
            ));
        }
    }

    #[test]
    fn uri_scheme_is_stripped_for_paths() {
        assert_eq!(uri_to_path("file:///etc/c.p12"), "/etc/c.p12");
        assert_eq!(uri_to_path("file://./relative/c.p12"), "./relative/c.p12");
        assert_eq!(uri_to_path("/etc/c.p12"), "/etc/c.p12");
    }
}
