//! In-memory collaborators used by unit and behaviour tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use geo::{Coord, Point, Polygon, Rect};

use crate::{
    GeocodeError, GeocodeProvider, IsochroneProvider, Jurisdiction, PolygonSet, ProviderError,
    RankedZone, TransportMode, ZoneDataSource, ZoneSourceError,
};

/// Axis-aligned square with its lower-left corner at `(x, y)`.
#[must_use]
pub fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
    Rect::new(Coord { x, y }, Coord { x: x + size, y: y + size }).to_polygon()
}

/// Geocoder answering from a fixed address table.
///
/// Unknown addresses yield [`GeocodeError::NoMatch`].
#[derive(Debug, Default)]
pub struct StubGeocoder {
    addresses: BTreeMap<String, Point<f64>>,
    calls: AtomicUsize,
}

impl StubGeocoder {
    /// Create a geocoder that knows no addresses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `address` to `point`.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>, point: Point<f64>) -> Self {
        self.addresses.insert(address.into(), point);
        self
    }

    /// Number of lookups performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeocodeProvider for StubGeocoder {
    fn resolve(&self, address: &str) -> Result<Point<f64>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if address.trim().is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }
        self.addresses
            .get(address)
            .copied()
            .ok_or_else(|| GeocodeError::NoMatch {
                address: address.to_owned(),
            })
    }
}

/// Isochrone provider returning canned shapes per mode.
///
/// The origin and time limit are ignored. Modes without a canned answer
/// yield an empty set.
#[derive(Debug, Default)]
pub struct StubIsochroneProvider {
    answers: BTreeMap<TransportMode, Result<PolygonSet, ProviderError>>,
    calls: AtomicUsize,
}

impl StubIsochroneProvider {
    /// Create a provider with no canned answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `mode` with `shape`.
    #[must_use]
    pub fn with_shape(mut self, mode: TransportMode, shape: PolygonSet) -> Self {
        self.answers.insert(mode, Ok(shape));
        self
    }

    /// Fail `mode` with `error`.
    #[must_use]
    pub fn with_error(mut self, mode: TransportMode, error: ProviderError) -> Self {
        self.answers.insert(mode, Err(error));
        self
    }

    /// Number of fetches performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IsochroneProvider for StubIsochroneProvider {
    fn fetch(
        &self,
        _origin: Point<f64>,
        mode: TransportMode,
        _max_minutes: u32,
    ) -> Result<PolygonSet, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(&mode)
            .cloned()
            .unwrap_or_else(|| Ok(PolygonSet::empty()))
    }
}

/// Shared count of dataset loads per jurisdiction.
#[derive(Debug, Clone, Default)]
pub struct LoadCounter(Arc<Mutex<BTreeMap<Jurisdiction, usize>>>);

impl LoadCounter {
    /// Loads recorded for `jurisdiction`.
    pub fn get(&self, jurisdiction: Jurisdiction) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&jurisdiction)
            .copied()
            .unwrap_or(0)
    }

    fn bump(&self, jurisdiction: Jurisdiction) {
        *self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(jurisdiction)
            .or_default() += 1;
    }
}

/// Zone source serving an in-memory list.
///
/// Every jurisdiction is configured unless removed with
/// [`MemoryZoneSource::without`].
#[derive(Debug, Clone, Default)]
pub struct MemoryZoneSource {
    zones: Vec<RankedZone>,
    missing: BTreeSet<Jurisdiction>,
    loads: LoadCounter,
}

impl MemoryZoneSource {
    /// Serve `zones`, split by their jurisdiction.
    #[must_use]
    pub fn new(zones: Vec<RankedZone>) -> Self {
        Self {
            zones,
            ..Self::default()
        }
    }

    /// Report `jurisdiction` as not configured.
    #[must_use]
    pub fn without(mut self, jurisdiction: Jurisdiction) -> Self {
        self.missing.insert(jurisdiction);
        self
    }

    /// Handle observing how often each jurisdiction is loaded.
    #[must_use]
    pub fn load_counter(&self) -> LoadCounter {
        self.loads.clone()
    }
}

impl ZoneDataSource for MemoryZoneSource {
    fn load(&self, jurisdiction: Jurisdiction) -> Result<Vec<RankedZone>, ZoneSourceError> {
        if self.missing.contains(&jurisdiction) {
            return Err(ZoneSourceError::NotConfigured { jurisdiction });
        }
        self.loads.bump(jurisdiction);
        Ok(self
            .zones
            .iter()
            .filter(|zone| zone.jurisdiction == jurisdiction)
            .cloned()
            .collect())
    }
}
