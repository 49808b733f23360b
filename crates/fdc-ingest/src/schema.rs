//! SQLite schema for the FoodData Central tables

use crate::error::Result;
use rusqlite::Connection;
use tracing::info;

/// Tables in creation order. Dropped in reverse.
pub const TABLES: [&str; 5] = [
    "food",
    "branded_food",
    "nutrient",
    "food_nutrient",
    "food_portion",
];

const CREATE_TABLES: &str = r#"
    CREATE TABLE food (
        fdc_id INTEGER PRIMARY KEY,
        description TEXT,
        data_type TEXT,
        food_category_id INTEGER
    );

    CREATE TABLE branded_food (
        fdc_id INTEGER PRIMARY KEY,
        upc TEXT,
        brand_name TEXT,
        ingredients TEXT,
        FOREIGN KEY(fdc_id) REFERENCES food(fdc_id)
    );

    CREATE TABLE nutrient (
        id INTEGER PRIMARY KEY,
        name TEXT,
        unit_name TEXT
    );

    CREATE TABLE food_nutrient (
        id INTEGER PRIMARY KEY,
        fdc_id INTEGER,
        nutrient_id INTEGER,
        amount REAL,
        FOREIGN KEY(fdc_id) REFERENCES food(fdc_id),
        FOREIGN KEY(nutrient_id) REFERENCES nutrient(id)
    );

    CREATE TABLE food_portion (
        id INTEGER PRIMARY KEY,
        fdc_id INTEGER,
        portion_description TEXT,
        gram_weight REAL,
        FOREIGN KEY(fdc_id) REFERENCES food(fdc_id)
    );
"#;

/// Drop and recreate all five tables
///
/// Runs in a single transaction. Safe to call on a fresh or a previously
/// built database.
pub fn create_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    for table in TABLES.iter().rev() {
        tx.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
    }
    tx.execute_batch(CREATE_TABLES)?;

    tx.commit()?;
    info!("✓ Schema created successfully");
    Ok(())
}
