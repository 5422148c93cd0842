//! Plug-in metadata: decoding and version compatibility.
//!
//! Every plug-in embeds a UTF-8 JSON document describing itself. The
//! decoder validates the document against the host plug-in API version
//! and produces a [`PluginInfo`] with owned strings and parsed semver
//! versions. All decode failures are typed ([`MetadataError`]); the
//! manager folds them to [`Outcome::CannotParseMetadata`](crate::Outcome).

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

/// Plug-in API version implemented by this host.
///
/// A plug-in is accepted when its declared `api` shares the major
/// component and is at least this version.
pub const PLUGIN_API: &str = "1.0.0";

/// [`PLUGIN_API`] as a parsed version.
pub fn host_api() -> Version {
    Version::new(1, 0, 0)
}

/// Semantic-version compatibility: `have` satisfies `want` iff both share
/// the same major component and `have` is at least `want`.
pub fn compatible(have: &Version, want: &Version) -> bool {
    have.major == want.major && have >= want
}

/// True for ASCII identifiers: letters, digits and `_`, not starting with
/// a digit.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A named, version-constrained reference to another plug-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: Version,
}

/// Decoded plug-in metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique plug-in identifier; equals the exported `name` symbol.
    pub name: String,
    pub pretty_name: String,
    pub version: Version,
    pub author: String,
    pub url: String,
    pub license: String,
    pub copyright: String,
    /// Declared dependencies, in declaration order. May be empty.
    pub dependencies: Vec<Dependency>,
}

// Wire shape of the embedded document. Unknown fields are ignored;
// every listed field is required.
#[derive(Deserialize)]
struct RawMetadata {
    api: String,
    name: String,
    #[serde(rename = "prettyName")]
    pretty_name: String,
    version: String,
    author: String,
    url: String,
    license: String,
    copyright: String,
    dependencies: Vec<RawDependency>,
}

#[derive(Deserialize)]
struct RawDependency {
    name: String,
    version: String,
}

fn parse_version(field: &str, value: &str) -> Result<Version, MetadataError> {
    value.parse().map_err(|e| MetadataError::Version {
        field: field.to_string(),
        source: e,
    })
}

/// Decode the content of the exported `metadata` symbol.
pub fn parse_metadata(bytes: &[u8]) -> Result<PluginInfo, MetadataError> {
    let raw: RawMetadata = serde_json::from_slice(bytes)?;

    let api = parse_version("api", &raw.api)?;
    if !compatible(&api, &host_api()) {
        return Err(MetadataError::IncompatibleApi {
            expected: host_api(),
            found: api,
        });
    }

    if !is_valid_name(&raw.name) {
        return Err(MetadataError::InvalidName(raw.name));
    }

    let version = parse_version("version", &raw.version)?;

    let mut dependencies = Vec::with_capacity(raw.dependencies.len());
    for dep in raw.dependencies {
        let dep_version = parse_version(&format!("dependencies.{}", dep.name), &dep.version)?;
        dependencies.push(Dependency {
            name: dep.name,
            version: dep_version,
        });
    }

    Ok(PluginInfo {
        name: raw.name,
        pretty_name: raw.pretty_name,
        version,
        author: raw.author,
        url: raw.url,
        license: raw.license,
        copyright: raw.copyright,
        dependencies,
    })
}

impl std::fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Plugin info:")?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Pretty name: {}", self.pretty_name)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Author: {}", self.author)?;
        writeln!(f, "Url: {}", self.url)?;
        writeln!(f, "License: {}", self.license)?;
        writeln!(f, "Copyright: {}", self.copyright)?;
        writeln!(f, "Dependencies:")?;
        for dep in &self.dependencies {
            writeln!(f, " - {} ({})", dep.name, dep.version)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_document() -> String {
        r#"{
            "api": "1.0.0",
            "name": "plugin_a",
            "prettyName": "Plugin A",
            "version": "1.2.3",
            "author": "Someone",
            "url": "https://example.com",
            "license": "MIT",
            "copyright": "(c) Someone",
            "dependencies": [
                {"name": "plugin_b", "version": "1.0.0"}
            ]
        }"#
        .to_string()
    }

    #[test]
    fn test_parse_full_document() {
        let info = parse_metadata(full_document().as_bytes()).unwrap();
        assert_eq!(info.name, "plugin_a");
        assert_eq!(info.pretty_name, "Plugin A");
        assert_eq!(info.version, Version::new(1, 2, 3));
        assert_eq!(info.dependencies.len(), 1);
        assert_eq!(info.dependencies[0].name, "plugin_b");
        assert_eq!(info.dependencies[0].version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let result = parse_metadata(b"not json at all");
        assert!(matches!(result, Err(MetadataError::Json(_))));
    }

    #[test]
    fn test_parse_rejects_missing_required_field() {
        let doc = full_document().replace("\"author\"", "\"writer\"");
        assert!(matches!(
            parse_metadata(doc.as_bytes()),
            Err(MetadataError::Json(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_dependencies_field() {
        let doc = full_document().replace("\"dependencies\"", "\"requires\"");
        assert!(matches!(
            parse_metadata(doc.as_bytes()),
            Err(MetadataError::Json(_))
        ));
    }

    #[test]
    fn test_parse_rejects_incompatible_api() {
        let doc = full_document().replace("\"api\": \"1.0.0\"", "\"api\": \"2.0.0\"");
        assert!(matches!(
            parse_metadata(doc.as_bytes()),
            Err(MetadataError::IncompatibleApi { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_dependency() {
        let doc = full_document().replace(
            r#"{"name": "plugin_b", "version": "1.0.0"}"#,
            r#"{"name": "plugin_b"}"#,
        );
        assert!(matches!(
            parse_metadata(doc.as_bytes()),
            Err(MetadataError::Json(_))
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_identifier() {
        let doc = full_document().replace("plugin_a", "9starts_with_digit");
        assert!(matches!(
            parse_metadata(doc.as_bytes()),
            Err(MetadataError::InvalidName(_))
        ));
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let doc = full_document().replace(
            "\"api\"",
            "\"homepage\": \"https://example.org\", \"api\"",
        );
        assert!(parse_metadata(doc.as_bytes()).is_ok());
    }

    #[test]
    fn test_parse_accepts_empty_dependencies() {
        let doc = full_document().replace(
            r#"[
                {"name": "plugin_b", "version": "1.0.0"}
            ]"#,
            "[]",
        );
        let info = parse_metadata(doc.as_bytes()).unwrap();
        assert!(info.dependencies.is_empty());
    }

    #[test]
    fn test_compatible_same_major_higher_have() {
        let have = Version::new(1, 2, 3);
        assert!(compatible(&have, &Version::new(1, 0, 0)));
        assert!(compatible(&have, &Version::new(1, 2, 3)));
        assert!(!compatible(&have, &Version::new(1, 3, 0)));
        assert!(!compatible(&have, &Version::new(2, 0, 0)));
        assert!(!compatible(&have, &Version::new(0, 9, 0)));
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("plugin_a"));
        assert!(is_valid_name("_private"));
        assert!(is_valid_name("p2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("2fast"));
        assert!(!is_valid_name("has-dash"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("ünïcode"));
    }

    #[test]
    fn test_display_lists_dependencies() {
        let info = parse_metadata(full_document().as_bytes()).unwrap();
        let rendered = info.to_string();
        assert!(rendered.starts_with("Plugin info:"));
        assert!(rendered.contains("Name: plugin_a"));
        assert!(rendered.contains(" - plugin_b (1.0.0)"));
    }
}
