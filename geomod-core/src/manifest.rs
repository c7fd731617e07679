//! Manifest codec - plugin descriptors on disk
//!
//! A manifest is a JSON object:
//!
//! ```json
//! {
//!   "name": "te.da.pgis",
//!   "title": "PostGIS data source",
//!   "description": "PostGIS driver",
//!   "dependencies": ["te.da.gdal"],
//!   "resources": ["share/pgis"],
//!   "library": "libterralib_mod_postgis.so"
//! }
//! ```
//!
//! `name` and `library` are required; `dependencies` and `resources` default
//! to empty. Unknown fields are rejected so typos surface as parse errors.

use std::io::{Read, Write};
use std::path::Path;

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;

/// File name suffix that marks a plugin manifest.
pub const MANIFEST_EXTENSION: &str = ".plugin.json";

const STREAM_ORIGIN: &str = "<stream>";

/// Parse a manifest from a JSON string.
pub fn from_str(text: &str) -> Result<PluginDescriptor, PluginError> {
    decode(serde_json::from_str(text), Path::new(STREAM_ORIGIN))
}

/// Read a manifest from any reader.
pub fn read_from<R: Read>(reader: R) -> Result<PluginDescriptor, PluginError> {
    decode(serde_json::from_reader(reader), Path::new(STREAM_ORIGIN))
}

/// Read a manifest file. IO failures are reported as [`PluginError::ParseError`].
pub fn read(path: &Path) -> Result<PluginDescriptor, PluginError> {
    let content = std::fs::read_to_string(path).map_err(|e| PluginError::ParseError {
        path: path.to_path_buf(),
        cause: e.to_string(),
    })?;
    decode(serde_json::from_str(&content), path)
}

/// Render a descriptor as pretty-printed JSON.
pub fn to_string(descriptor: &PluginDescriptor) -> Result<String, PluginError> {
    descriptor.validate()?;
    serde_json::to_string_pretty(descriptor).map_err(|e| PluginError::Io(std::io::Error::other(e)))
}

/// Write a descriptor to any writer.
pub fn write_to<W: Write>(descriptor: &PluginDescriptor, mut writer: W) -> Result<(), PluginError> {
    let content = to_string(descriptor)?;
    writer.write_all(content.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write a descriptor to a file, creating parent directories as needed.
pub fn write(descriptor: &PluginDescriptor, path: &Path) -> Result<(), PluginError> {
    let content = to_string(descriptor)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content + "\n")?;
    Ok(())
}

/// Whether `path` names a manifest file by the given extension convention.
pub fn is_manifest(path: &Path, extension: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.len() > extension.len() && n.ends_with(extension))
}

fn decode(
    parsed: Result<PluginDescriptor, serde_json::Error>,
    origin: &Path,
) -> Result<PluginDescriptor, PluginError> {
    let descriptor = parsed.map_err(|e| PluginError::ParseError {
        path: origin.to_path_buf(),
        cause: e.to_string(),
    })?;

    descriptor.validate().map_err(|e| PluginError::ParseError {
        path: origin.to_path_buf(),
        cause: e.to_string(),
    })?;

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Provider;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn pgis() -> PluginDescriptor {
        PluginDescriptor::new("te.da.pgis", "libterralib_mod_postgis.so")
            .with_title("PostGIS")
            .with_description("PostGIS data source driver")
            .with_version("5.0.0")
            .with_category("Data Access")
            .with_dependency("te.da.gdal")
            .with_dependency("te.da.ogr")
            .with_resource("share/pgis/sql")
            .with_resource("share/pgis/capabilities")
            .with_provider(Provider {
                name: "INPE".to_string(),
                site: Some("https://www.dpi.inpe.br".to_string()),
                email: None,
            })
    }

    #[test]
    fn test_roundtrip_through_stream() {
        let desc = pgis();
        let mut buf = Vec::new();
        write_to(&desc, &mut buf).unwrap();

        let parsed = read_from(buf.as_slice()).unwrap();
        assert_eq!(parsed, desc);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/te.da.pgis.plugin.json");

        let desc = pgis();
        write(&desc, &path).unwrap();

        assert_eq!(read(&path).unwrap(), desc);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let desc = from_str(r#"{"name": "te.da.ogr", "library": "libogr.so"}"#).unwrap();
        assert_eq!(desc.name, "te.da.ogr");
        assert!(desc.dependencies.is_empty());
        assert!(desc.resources.is_empty());
        assert!(desc.title.is_empty());
        assert!(desc.version.is_none());
    }

    #[test]
    fn test_missing_library_is_parse_error() {
        let err = from_str(r#"{"name": "te.da.ogr"}"#).unwrap_err();
        assert!(matches!(err, PluginError::ParseError { .. }));
        assert!(err.to_string().contains("library"));
    }

    #[test]
    fn test_empty_name_is_parse_error() {
        let err = from_str(r#"{"name": "", "library": "x.so"}"#).unwrap_err();
        assert!(matches!(err, PluginError::ParseError { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = from_str(r#"{"name": "a", "library": "a.so", "dependecies": []}"#).unwrap_err();
        assert!(err.to_string().contains("dependecies"));
    }

    #[test]
    fn test_read_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.plugin.json");
        std::fs::write(&path, "{ not json").unwrap();

        match read(&path).unwrap_err() {
            PluginError::ParseError { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_missing_file_is_parse_error() {
        let err = read(&PathBuf::from("/nonexistent/a.plugin.json")).unwrap_err();
        assert!(matches!(err, PluginError::ParseError { .. }));
    }

    #[test]
    fn test_write_rejects_invalid_descriptor() {
        let mut buf = Vec::new();
        let err = write_to(&PluginDescriptor::new("", "x.so"), &mut buf).unwrap_err();
        assert!(matches!(err, PluginError::InvalidDescriptor { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_is_manifest() {
        assert!(is_manifest(Path::new("/p/gdal.plugin.json"), MANIFEST_EXTENSION));
        assert!(!is_manifest(Path::new("/p/gdal.json"), MANIFEST_EXTENSION));
        assert!(!is_manifest(Path::new("/p/.plugin.json"), MANIFEST_EXTENSION));
        assert!(!is_manifest(Path::new("/p/libgdal.so"), MANIFEST_EXTENSION));
    }
}
