//! Ranked socio-economic zones and the repository that filters them.
//!
//! Higher ranks and deciles always mean "less deprived" within a category.
//! Thresholds are expressed as deciles (1 to 10) and translated per
//! jurisdiction before comparison with stored values.

mod repository;
mod scotland;

use std::collections::BTreeMap;
use std::fmt;

use geo::Polygon;
use thiserror::Error;

use crate::cache::{Fingerprint, Fingerprinter};

pub use repository::{QualifyingZones, RankZoneRepository};
pub use scotland::{SCOTLAND_DATA_ZONES, scotland_rank_cutoff};

/// Highest decile threshold.
pub const MAX_DECILE: u8 = 10;

/// A socio-economic ranking domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RankCategory {
    /// Overall multiple deprivation.
    Deprivation,
    /// Income deprivation.
    Income,
    /// Crime.
    Crime,
    /// Health deprivation and disability.
    Health,
    /// Education, skills and training.
    Education,
    /// Access to housing and services.
    Services,
    /// Living environment.
    Environment,
}

impl RankCategory {
    /// Every category in pipeline order.
    pub const ALL: [Self; 7] = [
        Self::Deprivation,
        Self::Income,
        Self::Crime,
        Self::Health,
        Self::Education,
        Self::Services,
        Self::Environment,
    ];

    /// Stable machine key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Deprivation => "deprivation",
            Self::Income => "income",
            Self::Crime => "crime",
            Self::Health => "health",
            Self::Education => "education",
            Self::Services => "services",
            Self::Environment => "environment",
        }
    }

    /// Human-readable name used in region labels.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Deprivation => "Deprivation Rank",
            Self::Income => "Income Rank",
            Self::Crime => "Crime Rank",
            Self::Health => "Health Rank",
            Self::Education => "Education Rank",
            Self::Services => "Access to Services Rank",
            Self::Environment => "Living Environment Rank",
        }
    }
}

impl fmt::Display for RankCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Fingerprint for RankCategory {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_str(self.key());
    }
}

/// A national dataset with its own zones and ranking scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Jurisdiction {
    /// English indices of deprivation; every category is a decile.
    England,
    /// Scottish index; only deprivation is a decile, the rest are ranks.
    Scotland,
}

impl Jurisdiction {
    /// Every jurisdiction, in the order national results are concatenated.
    pub const ALL: [Self; 2] = [Self::England, Self::Scotland];

    /// Stable machine key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::England => "england",
            Self::Scotland => "scotland",
        }
    }

    /// Translate a decile threshold into the value stored for `category`.
    ///
    /// Returns `None` when `decile` exceeds [`MAX_DECILE`].
    #[must_use]
    pub fn stored_threshold(self, category: RankCategory, decile: u8) -> Option<u32> {
        if decile > MAX_DECILE {
            return None;
        }
        match (self, category) {
            (Self::Scotland, RankCategory::Deprivation) | (Self::England, _) => {
                Some(u32::from(decile))
            }
            (Self::Scotland, _) => scotland_rank_cutoff(decile),
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Fingerprint for Jurisdiction {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_str(self.key());
    }
}

/// A zone boundary with its stored value per category.
///
/// Values are only comparable within one category and jurisdiction.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedZone {
    /// Dataset identifier, e.g. an LSOA or data zone code.
    pub code: String,
    /// Dataset the zone belongs to.
    pub jurisdiction: Jurisdiction,
    /// Zone boundary in the engine's coordinate system.
    pub polygon: Polygon<f64>,
    /// Decile or rank per category, as published.
    pub ranks: BTreeMap<RankCategory, u32>,
}

impl RankedZone {
    /// Create a zone with no ranks.
    #[must_use]
    pub fn new(code: impl Into<String>, jurisdiction: Jurisdiction, polygon: Polygon<f64>) -> Self {
        Self {
            code: code.into(),
            jurisdiction,
            polygon,
            ranks: BTreeMap::new(),
        }
    }

    /// Attach a stored value for `category`.
    #[must_use]
    pub fn with_rank(mut self, category: RankCategory, value: u32) -> Self {
        self.ranks.insert(category, value);
        self
    }

    /// Stored value for `category`, if published.
    #[must_use]
    pub fn rank(&self, category: RankCategory) -> Option<u32> {
        self.ranks.get(&category).copied()
    }
}

/// Errors raised by a [`ZoneDataSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneSourceError {
    /// No dataset is configured for the jurisdiction.
    #[error("no zone dataset configured for {jurisdiction}")]
    NotConfigured {
        /// Jurisdiction that was requested.
        jurisdiction: Jurisdiction,
    },
    /// The dataset could not be read.
    #[error("failed to read {jurisdiction} zones from {location}: {message}")]
    Read {
        /// Jurisdiction being loaded.
        jurisdiction: Jurisdiction,
        /// Where the dataset lives.
        location: String,
        /// Underlying failure.
        message: String,
    },
    /// The dataset was read but a record could not be interpreted.
    #[error("invalid {jurisdiction} zone record {record}: {message}")]
    InvalidRecord {
        /// Jurisdiction being loaded.
        jurisdiction: Jurisdiction,
        /// Index or code of the record.
        record: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Loads every ranked zone for a jurisdiction.
///
/// Zones are expected in the engine's coordinate system already.
pub trait ZoneDataSource: Send + Sync {
    /// Load all zones for `jurisdiction`.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneSourceError`] when the dataset cannot be read.
    fn load(&self, jurisdiction: Jurisdiction) -> Result<Vec<RankedZone>, ZoneSourceError>;
}

/// Errors raised by [`RankZoneRepository`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankZoneError {
    /// The threshold lies outside the decile range.
    #[error("threshold {threshold} for {category} exceeds the maximum decile of 10")]
    InvalidThreshold {
        /// Category being filtered.
        category: RankCategory,
        /// Requested threshold.
        threshold: u8,
    },
    /// Loading zones failed.
    #[error(transparent)]
    Source(#[from] ZoneSourceError),
}
