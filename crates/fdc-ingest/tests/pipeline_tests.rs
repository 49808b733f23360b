//! End-to-end tests for the database build
//!
//! Each test writes a small CSV export into a temp directory, runs the full
//! pipeline against an on-disk database, and inspects the result with a
//! separate connection.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fdc_ingest::verify::nutrients_for_food;
use fdc_ingest::{pipeline, BuildConfig, BuildReport};
use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

const FOOD_HEADER: &str = "fdc_id,data_type,description,food_category_id,publication_date\n";
const BRANDED_HEADER: &str =
    "fdc_id,brand_owner,brand_name,subbrand_name,gtin_upc,ingredients,serving_size\n";
const NUTRIENT_HEADER: &str = "id,name,unit_name,nutrient_nbr,rank\n";
const FOOD_NUTRIENT_HEADER: &str = "id,fdc_id,nutrient_id,amount,data_points\n";
const FOOD_PORTION_HEADER: &str =
    "id,fdc_id,seq_num,amount,measure_unit_id,portion_description,modifier,gram_weight\n";

/// Temp source directory plus a config pointing at it
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("FOODS")).unwrap();
        Self { dir }
    }

    fn write(&self, file: &str, contents: &str) -> &Self {
        std::fs::write(self.source_dir().join(file), contents).unwrap();
        self
    }

    fn source_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("FOODS")
    }

    fn db_path(&self) -> std::path::PathBuf {
        self.dir.path().join("usda.sqlite")
    }

    fn config(&self) -> BuildConfig {
        BuildConfig::builder()
            .source_dir(self.source_dir())
            .database_path(self.db_path())
            .batch_size(2)
            .commit_every(3)
            .build()
    }

    fn run(&self) -> BuildReport {
        pipeline::run(&self.config()).unwrap()
    }

    fn open(&self) -> Connection {
        Connection::open(self.db_path()).unwrap()
    }

    fn write_full_export(&self) -> &Self {
        self.write(
            "food.csv",
            &format!(
                "{}1,sr_legacy_food,\"Chicken, broilers or fryers, breast\",5,2019-04-01\n\
                 2,branded_food,Apple juice,,2021-10-28\n\
                 3,branded_food,Oat cereal,8,2021-10-28\n",
                FOOD_HEADER
            ),
        )
        .write(
            "branded_food.csv",
            &format!(
                "{}2,Orchard Co,ORCHARD,,012345678905,\"APPLE JUICE, VITAMIN C\",240\n\
                 3,Mill Co,MILL,,,OATS,30\n",
                BRANDED_HEADER
            ),
        )
        .write(
            "nutrient.csv",
            &format!("{}1003,Protein,G,203,600\n1008,Energy,KCAL,208,300\n", NUTRIENT_HEADER),
        )
        .write(
            "food_nutrient.csv",
            &format!(
                "{}100,1,1003,20.5,\n101,1,1008,165,\n102,3,1003,13.2,4\n",
                FOOD_NUTRIENT_HEADER
            ),
        )
        .write(
            "food_portion.csv",
            &format!(
                "{}500,1,1,1,9999,1 breast,,172\n501,3,1,1,9999,1 cup,,\n",
                FOOD_PORTION_HEADER
            ),
        )
    }
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

fn counts(conn: &Connection) -> Vec<i64> {
    fdc_ingest::schema::TABLES
        .iter()
        .map(|table| count(conn, table))
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_full_build() {
    let fixture = Fixture::new();
    fixture.write_full_export();

    let report = fixture.run();

    assert!(report.missing_sources().is_empty());
    assert_eq!(report.total_rows_read(), 3 + 2 + 2 + 3 + 2);
    assert_eq!(report.total_rows_skipped(), 0);
    assert!(report.verification.database_size.unwrap() > 0);
    assert_eq!(report.verification.search_hits.len(), 1);

    let conn = fixture.open();
    assert_eq!(counts(&conn), vec![3, 2, 2, 3, 2]);

    let upc: Option<String> = conn
        .query_row("SELECT upc FROM branded_food WHERE fdc_id = 3", [], |row| row.get(0))
        .unwrap();
    assert_eq!(upc, None);

    let indexes: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(indexes, 5);
}

#[test]
fn test_duplicate_food_id_keeps_first_occurrence() {
    let fixture = Fixture::new();
    fixture.write(
        "food.csv",
        &format!(
            "{}1,foundation_food,Hummus,16,2020-10-30\n\
             2,foundation_food,Egg whole raw,1,2020-10-30\n\
             2,foundation_food,Egg white raw,1,2020-10-30\n",
            FOOD_HEADER
        ),
    );

    let report = fixture.run();

    let food = report.import("food").unwrap();
    assert_eq!(food.rows_read, 3);
    assert_eq!(food.rows_ignored, 1);

    let conn = fixture.open();
    assert_eq!(count(&conn, "food"), 2);
    let description: String = conn
        .query_row("SELECT description FROM food WHERE fdc_id = 2", [], |row| row.get(0))
        .unwrap();
    assert_eq!(description, "Egg whole raw");
}

#[test]
fn test_nutrient_lookup_join() {
    let fixture = Fixture::new();
    fixture
        .write(
            "food.csv",
            &format!("{}1,sr_legacy_food,Tofu,16,2019-04-01\n", FOOD_HEADER),
        )
        .write("nutrient.csv", &format!("{}1003,Protein,G,203,600\n", NUTRIENT_HEADER))
        .write(
            "food_nutrient.csv",
            &format!("{}1,1,1003,20.5,\n", FOOD_NUTRIENT_HEADER),
        );

    let report = fixture.run();

    let conn = fixture.open();
    let rows = nutrients_for_food(&conn, 1, 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name.as_deref(), Some("Protein"));
    assert_eq!(rows[0].amount, Some(20.5));
    assert_eq!(rows[0].unit_name.as_deref(), Some("G"));

    let lookup = report.verification.nutrient_lookup.unwrap();
    assert_eq!(lookup.fdc_id, 1);
    assert_eq!(lookup.nutrients, rows);
}

#[test]
fn test_missing_branded_source_still_completes() {
    let fixture = Fixture::new();
    fixture.write_full_export();
    std::fs::remove_file(fixture.source_dir().join("branded_food.csv")).unwrap();

    let report = fixture.run();

    assert_eq!(report.missing_sources(), vec!["branded_food.csv"]);
    let branded = report.import("branded_food").unwrap();
    assert!(branded.missing);
    assert_eq!(branded.rows_read, 0);

    let conn = fixture.open();
    assert_eq!(count(&conn, "food"), 3);
    assert_eq!(count(&conn, "branded_food"), 0);
}

#[test]
fn test_orphan_food_nutrient_is_accepted() {
    let fixture = Fixture::new();
    fixture
        .write(
            "food.csv",
            &format!("{}1,sr_legacy_food,Tofu,16,2019-04-01\n", FOOD_HEADER),
        )
        .write(
            "food_nutrient.csv",
            &format!("{}9,424242,1003,1.5,\n", FOOD_NUTRIENT_HEADER),
        );

    fixture.run();

    let conn = fixture.open();
    let fdc_id: i64 = conn
        .query_row("SELECT fdc_id FROM food_nutrient WHERE id = 9", [], |row| row.get(0))
        .unwrap();
    assert_eq!(fdc_id, 424242);
}

#[test]
fn test_empty_fields_read_back_as_null_everywhere() {
    let fixture = Fixture::new();
    fixture
        .write("food.csv", &format!("{}1,,,,\n", FOOD_HEADER))
        .write("branded_food.csv", &format!("{}1,,  ,,,,\n", BRANDED_HEADER))
        .write("nutrient.csv", &format!("{}5,,,,\n", NUTRIENT_HEADER))
        .write("food_nutrient.csv", &format!("{}6,,,,\n", FOOD_NUTRIENT_HEADER))
        .write("food_portion.csv", &format!("{}7,,,,,,,\n", FOOD_PORTION_HEADER));

    fixture.run();

    let conn = fixture.open();
    let checks = [
        "SELECT COUNT(*) FROM food WHERE description IS NULL AND data_type IS NULL AND food_category_id IS NULL",
        "SELECT COUNT(*) FROM branded_food WHERE upc IS NULL AND brand_name IS NULL AND ingredients IS NULL",
        "SELECT COUNT(*) FROM nutrient WHERE name IS NULL AND unit_name IS NULL",
        "SELECT COUNT(*) FROM food_nutrient WHERE fdc_id IS NULL AND nutrient_id IS NULL AND amount IS NULL",
        "SELECT COUNT(*) FROM food_portion WHERE fdc_id IS NULL AND portion_description IS NULL AND gram_weight IS NULL",
    ];
    for sql in checks {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0)).unwrap();
        assert_eq!(n, 1, "{}", sql);
    }

    let empty_strings: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM food WHERE description = '' OR data_type = ''",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(empty_strings, 0);
}

#[test]
fn test_rebuild_is_deterministic() {
    let fixture = Fixture::new();
    fixture.write_full_export();

    fixture.run();
    let first = counts(&fixture.open());

    fixture.run();
    let second = counts(&fixture.open());

    assert_eq!(first, second);
    assert_eq!(first, vec![3, 2, 2, 3, 2]);
}

#[test]
fn test_existing_database_is_replaced() {
    let fixture = Fixture::new();
    fixture.write_full_export();
    std::fs::write(fixture.db_path(), b"not a sqlite database").unwrap();

    fixture.run();

    assert_eq!(count(&fixture.open(), "food"), 3);
}

#[test]
fn test_malformed_rows_are_skipped() {
    let fixture = Fixture::new();
    fixture.write(
        "food.csv",
        &format!(
            "{}1,sr_legacy_food,Tofu,16,2019-04-01\n\
             2\n\
             3,sr_legacy_food,Tempeh,16,2019-04-01\n",
            FOOD_HEADER
        ),
    );

    let report = fixture.run();

    let food = report.import("food").unwrap();
    assert_eq!(food.rows_read, 2);
    assert_eq!(food.rows_skipped, 1);
    assert_eq!(food.skipped[0].record, 2);
    assert_eq!(count(&fixture.open(), "food"), 2);
}

#[test]
fn test_invalid_utf8_is_replaced() {
    let fixture = Fixture::new();
    let mut bytes = FOOD_HEADER.as_bytes().to_vec();
    bytes.extend_from_slice(b"1,sr_legacy_food,Cr\xe8me fra\xeeche,1,2019-04-01\n");
    std::fs::write(fixture.source_dir().join("food.csv"), bytes).unwrap();

    fixture.run();

    let description: String = fixture
        .open()
        .query_row("SELECT description FROM food WHERE fdc_id = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(description, "Cr\u{fffd}me fra\u{fffd}che");
}

#[test]
fn test_source_dir_missing_entirely() {
    let fixture = Fixture::new();
    let config = BuildConfig::builder()
        .source_dir(Path::new("/nonexistent/fdc/export"))
        .database_path(fixture.db_path())
        .build();

    let report = pipeline::run(&config).unwrap();

    assert_eq!(report.missing_sources().len(), 5);
    assert_eq!(count(&fixture.open(), "food"), 0);
}

#[test]
fn test_build_writes_offline_bundles() {
    let fixture = Fixture::new();
    fixture.write_full_export();
    let bundle_dir = fixture.dir.path().join("bundles");
    let config = BuildConfig::builder()
        .source_dir(fixture.source_dir())
        .database_path(fixture.db_path())
        .bundle_dir(&bundle_dir)
        .build();

    let report = pipeline::run(&config).unwrap();

    let labels: Vec<_> = report.bundles.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, ["Core Foods", "Proteins", "Dairy", "Test sample"]);

    // Only the sr_legacy chicken breast is a core food
    let core = Connection::open(bundle_dir.join("usda-core.sqlite")).unwrap();
    assert_eq!(counts(&core), vec![1, 0, 2, 2, 1]);

    let sample = Connection::open(bundle_dir.join("usda-test.sqlite")).unwrap();
    assert_eq!(count(&sample, "food"), 1);

    // The main build is untouched
    assert_eq!(counts(&fixture.open()), vec![3, 2, 2, 3, 2]);
}

#[test]
fn test_bundles_rejected_for_in_memory_build() {
    let fixture = Fixture::new();
    let config = BuildConfig::builder()
        .source_dir(fixture.source_dir())
        .in_memory()
        .bundle_dir(fixture.dir.path().join("bundles"))
        .build();

    assert!(matches!(
        pipeline::run(&config),
        Err(fdc_ingest::IngestError::Config(_))
    ));
}
