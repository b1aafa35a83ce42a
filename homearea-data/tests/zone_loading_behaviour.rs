//! Behavioural tests for [`GeoJsonZoneSource`] feeding the rank repository.

use std::cell::RefCell;
use std::fs;

use camino::Utf8PathBuf;
use geo::{Contains, Point};
use homearea_core::{
    Jurisdiction, NoCache, PolygonSet, RankCategory, RankZoneError, RankZoneRepository,
    ZoneSourceError,
};
use homearea_data::{GeoJsonZoneSource, ZoneSchema};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use tempfile::TempDir;

/// World state for zone loading scenarios.
struct ZoneWorld {
    dir: TempDir,
    source: RefCell<GeoJsonZoneSource>,
    outcome: RefCell<Option<Result<PolygonSet, RankZoneError>>>,
}

impl ZoneWorld {
    fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(self.dir.path().join(name))
            .expect("temp dir should be UTF-8");
        fs::write(&path, contents).expect("dataset should be written");
        path
    }

    fn add_dataset(&self, jurisdiction: Jurisdiction, path: Utf8PathBuf) {
        self.source.replace_with(|current| {
            std::mem::take(current).with_dataset(
                jurisdiction,
                path,
                ZoneSchema::for_jurisdiction(jurisdiction),
            )
        });
    }

    fn kept(&self) -> PolygonSet {
        self.outcome
            .borrow()
            .as_ref()
            .expect("selection should have run")
            .clone()
            .expect("selection should succeed")
    }

    fn keeps(&self, x: f64) -> bool {
        let point = Point::new(x + 0.5, 0.5);
        self.kept().iter().any(|polygon| polygon.contains(&point))
    }
}

fn collection(features: Vec<Value>) -> String {
    json!({"type": "FeatureCollection", "features": features}).to_string()
}

fn zone(properties: Value, x: f64) -> Value {
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0], [x, 0.0]]]
        }
    })
}

#[fixture]
fn world() -> ZoneWorld {
    ZoneWorld {
        dir: TempDir::new().expect("temp dir should be created"),
        source: RefCell::new(GeoJsonZoneSource::new()),
        outcome: RefCell::new(None),
    }
}

#[given("an English dataset with deciles 9 and 3")]
fn given_english(world: &ZoneWorld) {
    let path = world.write(
        "england.geojson",
        &collection(vec![
            zone(json!({"lsoa11cd": "E01000001", "IncDec": 9}), 0.0),
            zone(json!({"lsoa11cd": "E01000002", "IncDec": 3}), 2.0),
        ]),
    );
    world.add_dataset(Jurisdiction::England, path);
}

#[given("a Scottish dataset with income ranks 1200 and 4000")]
fn given_scottish(world: &ZoneWorld) {
    let path = world.write(
        "scotland.geojson",
        &collection(vec![
            zone(json!({"DataZone": "S01000001", "IncRank": 1200}), 10.0),
            zone(json!({"DataZone": "S01000002", "IncRank": "4000"}), 12.0),
        ]),
    );
    world.add_dataset(Jurisdiction::Scotland, path);
}

#[given("an English dataset that is not valid JSON")]
fn given_corrupt(world: &ZoneWorld) {
    let path = world.write("england.geojson", "{\"type\": \"FeatureCollection\", \"features\": [");
    world.add_dataset(Jurisdiction::England, path);
}

#[when("I select national income zones at decile 5")]
fn when_select(world: &ZoneWorld) {
    let repository = RankZoneRepository::new(world.source.take(), NoCache);
    let outcome = repository.national_zones_above(RankCategory::Income, 5);
    world.outcome.replace(Some(outcome));
}

#[then("the English zone ranked 9 is kept")]
fn then_english_kept(world: &ZoneWorld) {
    assert!(world.keeps(0.0));
    assert!(!world.keeps(2.0));
}

#[then("the Scottish zone ranked 4000 is kept")]
fn then_scottish_kept(world: &ZoneWorld) {
    assert!(world.keeps(12.0));
    assert!(!world.keeps(10.0));
}

#[then("English zones come before Scottish zones")]
fn then_ordered(world: &ZoneWorld) {
    let kept = world.kept();
    assert_eq!(kept.len(), 2);
    assert!(kept.polygons()[0].contains(&Point::new(0.5, 0.5)));
    assert!(kept.polygons()[1].contains(&Point::new(12.5, 0.5)));
}

#[then("no Scottish zone is kept")]
fn then_no_scottish(world: &ZoneWorld) {
    assert_eq!(world.kept().len(), 1);
}

#[then("a read error names the English dataset")]
fn then_read_error(world: &ZoneWorld) {
    let outcome = world.outcome.borrow();
    let error = outcome
        .as_ref()
        .expect("selection should have run")
        .as_ref()
        .expect_err("corrupt dataset should fail");
    assert!(
        matches!(
            error,
            RankZoneError::Source(ZoneSourceError::Read { jurisdiction: Jurisdiction::England, location, .. })
                if location.ends_with("england.geojson")
        ),
        "unexpected error {error:?}"
    );
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/zone_loading.feature", name = $title)]
        fn $fn_name(world: ZoneWorld) {
            let _ = world;
        }
    };
}

register_scenario!(
    national_selection,
    "National selection reads both datasets"
);
register_scenario!(
    missing_scottish_dataset,
    "A missing Scottish dataset leaves only English zones"
);
register_scenario!(
    corrupt_dataset,
    "A corrupt dataset is reported with its path"
);
