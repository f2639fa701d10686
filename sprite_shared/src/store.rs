//! Entity file store.
//!
//! Loads and saves an [`EntityList`] as JSON or XML. The format comes from the
//! file extension (`json` or `xml`, case-sensitive). Any other extension is
//! [`Format::Unknown`]: load and save log a warning and do nothing.
//!
//! Both formats carry the same record shape, an ordered list of entities with
//! integer `x`, `y`, `w`, `h` fields:
//!
//! ```text
//! {"entities": [{"x": 100, "y": 100, "w": 64, "h": 64}]}
//!
//! <entities><entity><x>100</x><y>100</y><w>64</w><h>64</h></entity></entities>
//! ```

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entity::{Entity, EntityList};
use crate::error::{CodecError, StoreError};

/// Root element name of the XML encoding.
pub const XML_ROOT: &str = "entities";

/// Persistence format, classified from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Xml,
    Unknown,
}

impl Format {
    /// Classifies `path` by its extension. A leading dot in the file name
    /// (`.json`) is not an extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("json") => Format::Json,
            Some("xml") => Format::Xml,
            _ => Format::Unknown,
        }
    }

    /// Codec for this format, `None` for [`Format::Unknown`].
    pub fn codec(self) -> Option<&'static dyn StructuredCodec> {
        match self {
            Format::Json => Some(&JsonCodec),
            Format::Xml => Some(&XmlCodec),
            Format::Unknown => None,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Converts entity sequences to and from a structured text document.
pub trait StructuredCodec: Send + Sync {
    fn encode(&self, entities: &[Entity]) -> Result<String, CodecError>;
    fn decode(&self, text: &str) -> Result<Vec<Entity>, CodecError>;
}

#[derive(Serialize)]
struct JsonDocumentRef<'a> {
    entities: &'a [Entity],
}

#[derive(Deserialize)]
struct JsonDocument {
    entities: Vec<Entity>,
}

/// Pretty-printed JSON object with an `entities` array.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl StructuredCodec for JsonCodec {
    fn encode(&self, entities: &[Entity]) -> Result<String, CodecError> {
        let mut text = serde_json::to_string_pretty(&JsonDocumentRef { entities })?;
        text.push('\n');
        Ok(text)
    }

    fn decode(&self, text: &str) -> Result<Vec<Entity>, CodecError> {
        let doc: JsonDocument = serde_json::from_str(text)?;
        Ok(doc.entities)
    }
}

#[derive(Serialize)]
struct XmlDocumentRef<'a> {
    #[serde(rename = "entity")]
    entities: &'a [Entity],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlDocument {
    #[serde(rename = "entity", default)]
    entities: Vec<Entity>,
}

/// Name of the first element in `text`. The serde layer ignores the root
/// tag, so it is checked separately.
fn xml_root_name(text: &str) -> Result<String, CodecError> {
    let mut reader = quick_xml::Reader::from_str(text);
    loop {
        match reader
            .read_event()
            .map_err(|e| CodecError::Xml(e.to_string()))?
        {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned())
            }
            Event::Eof => return Err(CodecError::Xml("no root element".to_string())),
            _ => {}
        }
    }
}

/// Indented XML element tree rooted at `<entities>`, one `<entity>` per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlCodec;

impl StructuredCodec for XmlCodec {
    fn encode(&self, entities: &[Entity]) -> Result<String, CodecError> {
        let mut text = String::new();
        let mut ser = quick_xml::se::Serializer::with_root(&mut text, Some(XML_ROOT))
            .map_err(|e| CodecError::Xml(e.to_string()))?;
        ser.indent(' ', 2);
        XmlDocumentRef { entities }
            .serialize(ser)
            .map_err(|e| CodecError::Xml(e.to_string()))?;
        text.push('\n');
        Ok(text)
    }

    /// Accepts only an `<entities>` root whose children are all `<entity>`.
    /// `<entities/>` is the empty list.
    fn decode(&self, text: &str) -> Result<Vec<Entity>, CodecError> {
        let root = xml_root_name(text)?;
        if root != XML_ROOT {
            return Err(CodecError::Xml(format!(
                "root element <{root}>, expected <{XML_ROOT}>"
            )));
        }
        let doc: XmlDocument =
            quick_xml::de::from_str(text).map_err(|e| CodecError::Xml(e.to_string()))?;
        Ok(doc.entities)
    }
}

/// Result of a load or save that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The file was read or written; `entities` records were transferred.
    Completed { entities: usize },
    /// The path has an unknown format; nothing was read or written.
    Skipped,
}

/// Entity file at a fixed path.
#[derive(Debug, Clone)]
pub struct EntityStore {
    path: PathBuf,
    format: Format,
}

impl EntityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = Format::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Replaces the contents of `target` with the entities in the file.
    ///
    /// `target` is only modified when the whole file decodes.
    pub fn load(&self, target: &mut EntityList) -> Result<StoreOutcome, StoreError> {
        let Some(codec) = self.format.codec() else {
            warn!(path = %self.path.display(), "Unknown entity file format, not loading");
            return Ok(StoreOutcome::Skipped);
        };

        let bytes = fs::read(&self.path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                path: self.path.clone(),
            },
            _ => StoreError::Read {
                path: self.path.clone(),
                source,
            },
        })?;

        let entities = std::str::from_utf8(&bytes)
            .map_err(CodecError::from)
            .and_then(|text| codec.decode(text))
            .map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                format: self.format,
                source,
            })?;

        let count = entities.len();
        target.replace(entities);
        info!(path = %self.path.display(), format = %self.format, entities = count, "Loaded entities");
        Ok(StoreOutcome::Completed { entities: count })
    }

    /// Loads the file into a new list. `Ok(None)` for an unknown format.
    pub fn read(&self) -> Result<Option<EntityList>, StoreError> {
        let mut entities = EntityList::new();
        match self.load(&mut entities)? {
            StoreOutcome::Completed { .. } => Ok(Some(entities)),
            StoreOutcome::Skipped => Ok(None),
        }
    }

    /// Writes `entities` to the file, replacing previous content.
    ///
    /// The document is written to a sibling temporary file and renamed over
    /// the target, so readers see either the old or the new file.
    pub fn save(&self, entities: &EntityList) -> Result<StoreOutcome, StoreError> {
        let Some(codec) = self.format.codec() else {
            warn!(path = %self.path.display(), "Unknown entity file format, not saving");
            return Ok(StoreOutcome::Skipped);
        };

        let text = codec
            .encode(entities.as_slice())
            .map_err(|source| StoreError::Encode {
                path: self.path.clone(),
                format: self.format,
                source,
            })?;

        let tmp = temp_path(&self.path);
        let written = fs::write(&tmp, text.as_bytes()).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(source) = written {
            if let Err(e) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %e, "Temporary entity file not removed");
            }
            return Err(StoreError::Write {
                path: self.path.clone(),
                source,
            });
        }

        info!(path = %self.path.display(), format = %self.format, entities = entities.len(), "Saved entities");
        Ok(StoreOutcome::Completed {
            entities: entities.len(),
        })
    }
}

/// `dir/name.ext` -> `dir/.name.ext.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}
