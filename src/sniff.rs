//! Header sniffing: decide from a file's first bytes which drawing version it holds.

use crate::error::SniffError;
use crate::types::DrawingVersion;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Classifies a single file by inspecting its header.
///
/// Implementations must be callable from many worker threads at once.
/// Any `Fn(&Path) -> Result<DrawingVersion, SniffError>` closure is a
/// sniffer too, which is handy for instrumenting a scan.
pub trait FormatSniffer: Send + Sync {
    fn classify(&self, path: &Path) -> Result<DrawingVersion, SniffError>;
}

impl<F> FormatSniffer for F
where
    F: Fn(&Path) -> Result<DrawingVersion, SniffError> + Send + Sync,
{
    fn classify(&self, path: &Path) -> Result<DrawingVersion, SniffError> {
        self(path)
    }
}

/// Reads the six-byte DWG version header. Never reads past it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DwgSniffer;

impl FormatSniffer for DwgSniffer {
    fn classify(&self, path: &Path) -> Result<DrawingVersion, SniffError> {
        let file = File::open(path).map_err(|e| SniffError::io(path, e))?;
        let mut header = [0u8; DrawingVersion::HEADER_LEN];
        let mut filled = 0;
        let mut reader = file.take(DrawingVersion::HEADER_LEN as u64);
        while filled < header.len() {
            match reader.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SniffError::io(path, e)),
            }
        }
        if filled < header.len() {
            return Err(SniffError::NotRecognized(path.to_path_buf()));
        }
        DrawingVersion::from_header(&header)
            .ok_or_else(|| SniffError::NotRecognized(path.to_path_buf()))
    }
}
