//! Offline bundle extraction
//!
//! A bundle is a smaller database cut from a finished build: the full schema
//! and indexes, every nutrient, and the foods picked by a [`FoodSelector`]
//! together with their branded, nutrient and portion rows. Bundles are
//! written after the main connection is closed, reading the build through
//! `ATTACH`.

use crate::config::{BuildConfig, DatabaseLocation, Durability};
use crate::database;
use crate::error::Result;
use crate::indexes::create_indexes;
use crate::schema::create_schema;
use fdc_common::{format_bytes, format_count};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Data types that make up the core bundle
pub const CORE_DATA_TYPES: [&str; 3] = ["sr_legacy_food", "foundation_food", "survey_fndds_food"];

/// Branded food categories for the proteins bundle, as spelled in the export
pub const PROTEIN_CATEGORIES: [&str; 26] = [
    "Pepperoni, Salami & Cold Cuts",
    "Sausages, Hotdogs & Brats",
    "Bacon, Sausages & Ribs",
    "Poultry, Chicken & Turkey",
    "Other Meats",
    "Fish & Seafood",
    "Frozen Fish & Seafood",
    "Canned Seafood",
    "Canned Tuna",
    "Canned Meat",
    "Other Deli",
    "Frozen Poultry, Chicken & Turkey",
    "Frozen Bacon, Sausages & Ribs",
    "Frozen Sausages, Hotdogs & Brats",
    "Other Frozen Meats",
    "Shellfish Unprepared/Unprocessed",
    "Fish  Unprepared/Unprocessed",
    "Fish \u{2013} Unprepared/Unprocessed",
    "Meat/Poultry/Other Animals  Prepared/Processed",
    "Meat/Poultry/Other Animals - Prepared/Processed",
    "Meat/Poultry/Other Animals \u{2013} Prepared/Processed",
    "Meat/Poultry/Other Animals  Unprepared/Unprocessed",
    "Meat/Poultry/Other Animals \u{2013} Unprepared/Unprocessed",
    "Meat/Poultry/Other Animals Sausages  Prepared/Processed",
    "Meat/Poultry/Other Animals Sausages - Prepared/Processed",
    "Meat/Poultry/Other Animals Sausages \u{2013} Prepared/Processed",
];

/// Branded food categories for the dairy bundle
pub const DAIRY_CATEGORIES: [&str; 12] = [
    "Cheese",
    "Yogurt",
    "Milk",
    "Cream",
    "Butter & Spread",
    "Eggs & Egg Substitutes",
    "Plant Based Milk",
    "Ice Cream & Frozen Yogurt",
    "Yogurt/Yogurt Substitutes",
    "Cheese/Cheese Substitutes",
    "Butter/Butter Substitutes",
    "Cream/Cream Substitutes",
];

/// Foods copied into the test sample bundle
pub const SAMPLE_BUNDLE_LIMIT: usize = 100;

/// Which foods a bundle keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoodSelector {
    /// Foods whose `data_type` is one of these
    DataTypes(Vec<String>),
    /// Foods whose `food_category_id` is one of these
    Categories(Vec<String>),
    /// First `limit` foods, by id, whose description contains `term`
    DescriptionSample { term: String, limit: usize },
}

impl FoodSelector {
    /// SQL filter on `src.food` and its bound values
    fn filter(&self) -> (String, Vec<Value>) {
        match self {
            Self::DataTypes(types) => (
                format!("data_type IN ({})", placeholders(types.len())),
                types.iter().cloned().map(Value::Text).collect(),
            ),
            Self::Categories(categories) => (
                format!("food_category_id IN ({})", placeholders(categories.len())),
                categories.iter().cloned().map(Value::Text).collect(),
            ),
            Self::DescriptionSample { term, limit } => (
                "description LIKE ?1 ORDER BY fdc_id LIMIT ?2".to_string(),
                vec![
                    Value::Text(format!("%{}%", term)),
                    Value::Integer(*limit as i64),
                ],
            ),
        }
    }
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|idx| format!("?{}", idx))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One bundle to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSpec {
    /// File name inside the bundle directory
    pub file_name: String,
    /// Name used in log output
    pub label: String,
    pub selector: FoodSelector,
}

impl BundleSpec {
    pub fn new(file_name: &str, label: &str, selector: FoodSelector) -> Self {
        Self {
            file_name: file_name.to_string(),
            label: label.to_string(),
            selector,
        }
    }
}

/// Core, proteins and dairy bundles plus a small test sample of foods
/// matching `search_term`
pub fn standard_bundles(search_term: &str) -> Vec<BundleSpec> {
    vec![
        BundleSpec::new(
            "usda-core.sqlite",
            "Core Foods",
            FoodSelector::DataTypes(owned(&CORE_DATA_TYPES)),
        ),
        BundleSpec::new(
            "usda-proteins.sqlite",
            "Proteins",
            FoodSelector::Categories(owned(&PROTEIN_CATEGORIES)),
        ),
        BundleSpec::new(
            "usda-dairy.sqlite",
            "Dairy",
            FoodSelector::Categories(owned(&DAIRY_CATEGORIES)),
        ),
        BundleSpec::new(
            "usda-test.sqlite",
            "Test sample",
            FoodSelector::DescriptionSample {
                term: search_term.to_string(),
                limit: SAMPLE_BUNDLE_LIMIT,
            },
        ),
    ]
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// What a written bundle holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub label: String,
    pub path: PathBuf,
    pub foods: u64,
    pub nutrients: u64,
    /// File size after `VACUUM`
    pub size: u64,
}

/// Write every standard bundle for the build at `source` into `dir`
pub fn write_bundles(
    source: &Path,
    dir: &Path,
    config: &BuildConfig,
) -> Result<Vec<BundleSummary>> {
    std::fs::create_dir_all(dir)?;

    let summaries = standard_bundles(&config.search_term)
        .iter()
        .map(|spec| write_bundle(source, dir, spec, config.durability))
        .collect::<Result<Vec<_>>>()?;

    for summary in &summaries {
        info!(
            "{:<12} {:>8} foods | {:>10}",
            summary.label,
            format_count(summary.foods),
            format_bytes(summary.size)
        );
    }
    info!("✓ Offline bundles saved to: {}", dir.display());
    Ok(summaries)
}

/// Write one bundle, replacing any file of the same name
#[instrument(skip_all, fields(bundle = %spec.file_name))]
pub fn write_bundle(
    source: &Path,
    dir: &Path,
    spec: &BundleSpec,
    durability: Durability,
) -> Result<BundleSummary> {
    info!("Creating {} bundle...", spec.label);
    let path = dir.join(&spec.file_name);
    database::prepare_output(&path)?;

    let mut conn = database::open_at(&DatabaseLocation::File(path.clone()), durability)?;
    create_schema(&mut conn)?;

    conn.execute(
        "ATTACH DATABASE ?1 AS src",
        [source.to_string_lossy().into_owned()],
    )?;
    let foods = copy_selection(&mut conn, &spec.selector)?;
    conn.execute("DETACH DATABASE src", [])?;

    if foods == 0 {
        warn!("  No foods matched for {}", spec.label);
    }

    create_indexes(&mut conn)?;
    conn.execute_batch("VACUUM; ANALYZE;")?;

    let nutrients: i64 = conn.query_row("SELECT COUNT(*) FROM nutrient", [], |row| row.get(0))?;
    drop(conn);

    let summary = BundleSummary {
        label: spec.label.clone(),
        size: database::file_size(&path)?,
        path,
        foods,
        nutrients: nutrients.max(0) as u64,
    };
    info!(
        "  ✓ {}: {} foods, {}",
        summary.label,
        format_count(summary.foods),
        format_bytes(summary.size)
    );
    Ok(summary)
}

/// Copy the selected foods, all nutrients, and rows tied to the selected foods
///
/// Returns the number of foods copied.
fn copy_selection(conn: &mut Connection, selector: &FoodSelector) -> Result<u64> {
    let (filter, values) = selector.filter();
    let tx = conn.transaction()?;

    let foods = tx.execute(
        &format!("INSERT OR IGNORE INTO main.food SELECT * FROM src.food WHERE {}", filter),
        params_from_iter(values),
    )?;
    tx.execute("INSERT OR IGNORE INTO main.nutrient SELECT * FROM src.nutrient", [])?;
    for table in ["branded_food", "food_nutrient", "food_portion"] {
        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO main.{0} SELECT * FROM src.{0} \
                 WHERE fdc_id IN (SELECT fdc_id FROM main.food)",
                table
            ),
            [],
        )?;
    }

    tx.commit()?;
    Ok(foods as u64)
}
