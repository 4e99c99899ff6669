use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A drawing file recognized during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFile {
    /// The path as discovered by the crawler.
    pub path: PathBuf,
    /// The version code read from the file header.
    pub version: DrawingVersion,
}

/// A drawing format version, as stored in the first bytes of the file.
///
/// Versions order by release chronology. Header codes from the `AC`
/// family that are not in the release table are kept as
/// [`DrawingVersion::Unknown`], which ranks below every known release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DrawingVersion {
    Mc00,
    Ac12,
    Ac14,
    Ac150,
    Ac210,
    Ac1002,
    Ac1003,
    Ac1004,
    Ac1006,
    Ac1009,
    Ac1012,
    Ac1014,
    Ac1015,
    Ac1018,
    Ac1021,
    Ac1024,
    Ac1027,
    Ac1032,
    Unknown(String),
}

const KNOWN: [(DrawingVersion, &str, &str); 18] = [
    (DrawingVersion::Mc00, "MC0.0", "Release 1.1"),
    (DrawingVersion::Ac12, "AC1.2", "Release 1.2"),
    (DrawingVersion::Ac14, "AC1.4", "Release 1.4"),
    (DrawingVersion::Ac150, "AC1.50", "Release 2.0"),
    (DrawingVersion::Ac210, "AC2.10", "Release 2.10"),
    (DrawingVersion::Ac1002, "AC1002", "Release 2.5"),
    (DrawingVersion::Ac1003, "AC1003", "Release 2.6"),
    (DrawingVersion::Ac1004, "AC1004", "Release 9"),
    (DrawingVersion::Ac1006, "AC1006", "Release 10"),
    (DrawingVersion::Ac1009, "AC1009", "Release 11/12 (LT R1/R2)"),
    (DrawingVersion::Ac1012, "AC1012", "Release 13 (LT95)"),
    (DrawingVersion::Ac1014, "AC1014", "Release 14, 14.01 (LT97/LT98)"),
    (DrawingVersion::Ac1015, "AC1015", "AutoCAD 2000/2000i/2002"),
    (DrawingVersion::Ac1018, "AC1018", "AutoCAD 2004/2005/2006"),
    (DrawingVersion::Ac1021, "AC1021", "AutoCAD 2007/2008/2009"),
    (DrawingVersion::Ac1024, "AC1024", "AutoCAD 2010/2011/2012"),
    (DrawingVersion::Ac1027, "AC1027", "AutoCAD 2013/2014/2015/2016/2017"),
    (DrawingVersion::Ac1032, "AC1032", "AutoCAD 2018/2019/2020"),
];

impl DrawingVersion {
    /// Length of the header prefix that identifies a drawing.
    pub const HEADER_LEN: usize = 6;

    /// Decodes a header prefix, or `None` if it matches no drawing magic.
    pub fn from_header(header: &[u8; Self::HEADER_LEN]) -> Option<Self> {
        match header {
            [b'A', b'C', b'1', b'.', b'2', _] => Some(DrawingVersion::Ac12),
            [b'A', b'C', b'1', b'.', b'4', _] => Some(DrawingVersion::Ac14),
            [b'A', b'C', ..] => Some(Self::from(String::from_utf8_lossy(header).into_owned())),
            [b'M', b'C', b'0', b'.', b'0', _] => Some(DrawingVersion::Mc00),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DrawingVersion::Unknown(raw) => raw,
            known => KNOWN
                .iter()
                .find(|(v, _, _)| v == known)
                .map(|(_, code, _)| *code)
                .unwrap_or_default(),
        }
    }

    /// Chronological rank; 0 for codes outside the release table.
    pub fn release(&self) -> u32 {
        KNOWN
            .iter()
            .position(|(v, _, _)| v == self)
            .map_or(0, |i| i as u32 + 1)
    }

    /// Which product releases read this version; empty when unknown.
    pub fn release_name(&self) -> &'static str {
        KNOWN
            .iter()
            .find(|(v, _, _)| v == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("")
    }
}

impl From<String> for DrawingVersion {
    fn from(raw: String) -> Self {
        KNOWN
            .iter()
            .find(|(_, code, _)| *code == raw)
            .map(|(v, _, _)| v.clone())
            .unwrap_or(DrawingVersion::Unknown(raw))
    }
}

impl From<DrawingVersion> for String {
    fn from(version: DrawingVersion) -> Self {
        version.as_str().to_string()
    }
}

impl FromStr for DrawingVersion {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for DrawingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Ord for DrawingVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release()
            .cmp(&other.release())
            .then_with(|| self.as_str().cmp(other.as_str()))
    }
}

impl PartialOrd for DrawingVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-scan counters. Skips stay silent in the results; these only
/// make them countable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Candidate paths handed over by the crawler.
    pub discovered: u64,
    /// Files that produced a classification.
    pub classified: u64,
    /// Candidates dropped as unreadable or unrecognized.
    pub skipped: u64,
    /// Whether the scan ended through cancellation.
    pub cancelled: bool,
}
