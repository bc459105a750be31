use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use super::binary::{BinaryTimeSeriesDecoder, LittleEndianF64Decoder};
use super::xml::{QuickXmlDecoder, XmlNode, XmlTreeDecoder};
use crate::error::{Result, SolutionError};

/// Upper bound on the buffer reserved from an entry's declared size
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Everything read out of a solution archive
#[derive(Debug, Clone)]
pub struct LoadedArchive {
    /// Root of the XML metadata document
    pub root: XmlNode,
    /// Decoded binary payloads keyed by entry name
    pub payloads: BTreeMap<String, Vec<f64>>,
}

/// Reads a solution zip: one XML metadata entry plus `.bin` payloads
pub struct ArchiveLoader<X = QuickXmlDecoder, B = LittleEndianF64Decoder> {
    xml: X,
    binary: B,
}

impl ArchiveLoader {
    pub fn new() -> Self {
        Self::with_decoders(QuickXmlDecoder, LittleEndianF64Decoder)
    }
}

impl Default for ArchiveLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: XmlTreeDecoder, B: BinaryTimeSeriesDecoder> ArchiveLoader<X, B> {
    pub fn with_decoders(xml: X, binary: B) -> Self {
        Self { xml, binary }
    }

    pub fn xml_decoder(&self) -> &X {
        &self.xml
    }

    /// Load an archive from disk. The file is closed before returning.
    pub fn load_path(&self, path: &Path) -> Result<LoadedArchive> {
        let file = File::open(path)?;
        self.load(BufReader::new(file))
    }

    pub fn load_bytes(&self, bytes: &[u8]) -> Result<LoadedArchive> {
        self.load(Cursor::new(bytes))
    }

    pub fn load<R: Read + Seek>(&self, reader: R) -> Result<LoadedArchive> {
        let mut archive = ZipArchive::new(reader)?;

        let mut root = None;
        let mut payloads = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();

            let is_xml = name.contains(".xml");
            let is_bin = !is_xml && name.to_lowercase().contains(".bin");
            if !is_xml && !is_bin {
                debug!(entry = %name, "ignoring archive entry");
                continue;
            }

            let mut bytes = Vec::with_capacity(size_hint(file.size()));
            file.read_to_end(&mut bytes)?;

            if is_xml {
                if root.is_some() {
                    debug!(entry = %name, "archive holds more than one XML document; keeping the last");
                }
                root = Some(self.xml.parse(&name, &bytes)?);
            } else {
                let samples = self.binary.decode(&name, &bytes)?;
                debug!(entry = %name, samples = samples.len(), "decoded binary payload");
                payloads.insert(name, samples);
            }
        }

        let root = root.ok_or(SolutionError::ArchiveFormat)?;
        Ok(LoadedArchive { root, payloads })
    }
}

/// Initial buffer size for an entry. The declared size comes from the zip
/// header and is not trusted beyond [`MAX_PREALLOC`].
fn size_hint(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOC)).unwrap_or(0)
}
