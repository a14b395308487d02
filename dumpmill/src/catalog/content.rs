//! Content kinds carried by monthly data dumps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of record a dump file contains.
///
/// Each monthly dump ships one archive per kind. The kind determines the
/// plural token in filenames (`discogs_20240101_releases.xml.gz`) and the
/// singular element name used for records inside the XML (`<release>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Artist records (`<artist>` elements).
    Artists,
    /// Label records (`<label>` elements).
    Labels,
    /// Master release records (`<master>` elements).
    Masters,
    /// Release records (`<release>` elements).
    Releases,
}

impl ContentKind {
    /// All kinds, in the order they are listed on disk.
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Artists,
        ContentKind::Labels,
        ContentKind::Masters,
        ContentKind::Releases,
    ];

    /// The plural token used in dump filenames and folder names.
    ///
    /// # Example
    ///
    /// ```
    /// use dumpmill::catalog::ContentKind;
    ///
    /// assert_eq!(ContentKind::Releases.plural(), "releases");
    /// assert_eq!(ContentKind::Artists.plural(), "artists");
    /// ```
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Artists => "artists",
            Self::Labels => "labels",
            Self::Masters => "masters",
            Self::Releases => "releases",
        }
    }

    /// The singular element name that wraps one record in the XML.
    ///
    /// # Example
    ///
    /// ```
    /// use dumpmill::catalog::ContentKind;
    ///
    /// assert_eq!(ContentKind::Releases.singular(), "release");
    /// assert_eq!(ContentKind::Labels.singular(), "label");
    /// ```
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Artists => "artist",
            Self::Labels => "label",
            Self::Masters => "master",
            Self::Releases => "release",
        }
    }

    /// Parse a plural token from a filename back into a kind.
    pub fn from_plural(token: &str) -> Option<Self> {
        match token {
            "artists" => Some(Self::Artists),
            "labels" => Some(Self::Labels),
            "masters" => Some(Self::Masters),
            "releases" => Some(Self::Releases),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plural())
    }
}
