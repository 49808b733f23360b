//! Post-build diagnostics
//!
//! Read-only queries that show whether the build looks sane: row counts, a
//! description search, a nutrient join, barcode and portion samples, and the
//! database size. The results are for a human reading the console; nothing
//! downstream asserts on them.

use crate::config::BuildConfig;
use crate::database::database_size;
use crate::error::Result;
use crate::schema::TABLES;
use fdc_common::{format_bytes, format_count};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fmt;

/// Nutrient rows shown for the sampled food
pub const NUTRIENT_LOOKUP_LIMIT: usize = 10;

/// Characters of a food description shown in the portion sample
const PORTION_DESCRIPTION_WIDTH: usize = 40;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct TableCount {
    pub table: String,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoodMatch {
    pub fdc_id: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NutrientAmount {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub unit_name: Option<String>,
}

/// Nutrients recorded for one food
#[derive(Debug, Clone, PartialEq)]
pub struct NutrientLookup {
    pub fdc_id: i64,
    pub nutrients: Vec<NutrientAmount>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarcodeSample {
    pub fdc_id: i64,
    pub upc: String,
    pub brand_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortionSample {
    pub food_description: Option<String>,
    pub portion_description: Option<String>,
    pub gram_weight: Option<f64>,
}

/// Everything the verifier found
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub counts: Vec<TableCount>,
    pub search_term: String,
    pub search_hits: Vec<FoodMatch>,
    /// `None` when the food table is empty
    pub nutrient_lookup: Option<NutrientLookup>,
    pub barcodes: Vec<BarcodeSample>,
    pub portions: Vec<PortionSample>,
    /// Main database file size; `None` for in-memory builds
    pub database_size: Option<u64>,
}

impl VerificationReport {
    /// Row count for `table`, if it was counted
    pub fn count(&self, table: &str) -> Option<u64> {
        self.counts.iter().find(|c| c.table == table).map(|c| c.rows)
    }
}

/// Run all diagnostics against a populated database
pub fn verify(conn: &Connection, config: &BuildConfig) -> Result<VerificationReport> {
    Ok(VerificationReport {
        counts: table_counts(conn)?,
        search_term: config.search_term.clone(),
        search_hits: search_foods(conn, &config.search_term, config.sample_limit)?,
        nutrient_lookup: nutrient_lookup(conn)?,
        barcodes: barcode_samples(conn, config.sample_limit)?,
        portions: portion_samples(conn, config.sample_limit)?,
        database_size: database_size(config)?,
    })
}

pub fn table_counts(conn: &Connection) -> Result<Vec<TableCount>> {
    TABLES
        .iter()
        .map(|table| -> Result<TableCount> {
            let rows: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(TableCount {
                table: table.to_string(),
                rows: rows.max(0) as u64,
            })
        })
        .collect()
}

/// Foods whose description contains `term` (case-insensitive for ASCII)
pub fn search_foods(conn: &Connection, term: &str, limit: usize) -> Result<Vec<FoodMatch>> {
    let mut stmt = conn.prepare(
        "SELECT fdc_id, description FROM food WHERE description LIKE ?1 LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![format!("%{}%", term), limit as i64], |row| {
        Ok(FoodMatch {
            fdc_id: row.get(0)?,
            description: row.get(1)?,
        })
    })?;

    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Nutrients of the first food in the table
pub fn nutrient_lookup(conn: &Connection) -> Result<Option<NutrientLookup>> {
    let fdc_id: Option<i64> = conn
        .query_row("SELECT fdc_id FROM food LIMIT 1", [], |row| row.get(0))
        .optional()?;

    match fdc_id {
        Some(fdc_id) => Ok(Some(NutrientLookup {
            fdc_id,
            nutrients: nutrients_for_food(conn, fdc_id, NUTRIENT_LOOKUP_LIMIT)?,
        })),
        None => Ok(None),
    }
}

/// Join food_nutrient to nutrient for one food
pub fn nutrients_for_food(
    conn: &Connection,
    fdc_id: i64,
    limit: usize,
) -> Result<Vec<NutrientAmount>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT n.name, fn.amount, n.unit_name
        FROM food_nutrient fn
        JOIN nutrient n ON fn.nutrient_id = n.id
        WHERE fn.fdc_id = ?1
        LIMIT ?2
        "#,
    )?;
    let rows = stmt.query_map(params![fdc_id, limit as i64], |row| {
        Ok(NutrientAmount {
            name: row.get(0)?,
            amount: real(row, 1)?,
            unit_name: row.get(2)?,
        })
    })?;

    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn barcode_samples(conn: &Connection, limit: usize) -> Result<Vec<BarcodeSample>> {
    let mut stmt = conn.prepare(
        "SELECT fdc_id, upc, brand_name FROM branded_food WHERE upc IS NOT NULL LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(BarcodeSample {
            fdc_id: row.get(0)?,
            upc: row.get(1)?,
            brand_name: row.get(2)?,
        })
    })?;

    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn portion_samples(conn: &Connection, limit: usize) -> Result<Vec<PortionSample>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT f.description, fp.portion_description, fp.gram_weight
        FROM food_portion fp
        JOIN food f ON fp.fdc_id = f.fdc_id
        WHERE fp.gram_weight IS NOT NULL
        LIMIT ?1
        "#,
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(PortionSample {
            food_description: row.get(0)?,
            portion_description: row.get(1)?,
            gram_weight: real(row, 2)?,
        })
    })?;

    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Numeric value of a REAL-affinity column; text that SQLite could not
/// convert reads as `None`
fn real(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Real(value) => Some(value),
        ValueRef::Integer(value) => Some(value as f64),
        _ => None,
    })
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn or_dash_num(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(f, "{}", rule)?;
        writeln!(f, "VERIFICATION TESTS")?;
        writeln!(f, "{}", rule)?;

        writeln!(f, "\n1. Record counts:")?;
        for count in &self.counts {
            writeln!(f, "   {}: {} records", count.table, format_count(count.rows))?;
        }

        writeln!(f, "\n2. Search test ({}):", self.search_term)?;
        for hit in &self.search_hits {
            writeln!(f, "   {}: {}", hit.fdc_id, or_dash(&hit.description))?;
        }

        writeln!(f, "\n3. Nutrient lookup test:")?;
        match &self.nutrient_lookup {
            Some(lookup) => {
                writeln!(f, "   Nutrients for fdc_id {}:", lookup.fdc_id)?;
                for n in &lookup.nutrients {
                    writeln!(
                        f,
                        "   - {}: {} {}",
                        or_dash(&n.name),
                        or_dash_num(n.amount),
                        or_dash(&n.unit_name)
                    )?;
                }
            },
            None => writeln!(f, "   No foods loaded")?,
        }

        writeln!(f, "\n4. Barcode lookup test:")?;
        for sample in &self.barcodes {
            writeln!(
                f,
                "   UPC {}: {} (fdc_id: {})",
                sample.upc,
                or_dash(&sample.brand_name),
                sample.fdc_id
            )?;
        }

        writeln!(f, "\n5. Portion size test:")?;
        for sample in &self.portions {
            let food: String = or_dash(&sample.food_description)
                .chars()
                .take(PORTION_DESCRIPTION_WIDTH)
                .collect();
            writeln!(
                f,
                "   {}: {} = {}g",
                food,
                or_dash(&sample.portion_description),
                or_dash_num(sample.gram_weight)
            )?;
        }

        writeln!(f, "\n6. Database statistics:")?;
        match self.database_size {
            Some(bytes) => writeln!(f, "   Database size: {}", format_bytes(bytes))?,
            None => writeln!(f, "   Database size: n/a (in-memory)")?,
        }

        writeln!(f, "\n{}", rule)?;
        writeln!(f, "✓ All verification tests completed")?;
        write!(f, "{}", rule)
    }
}
