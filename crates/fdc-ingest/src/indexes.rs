//! Secondary indexes, built once the bulk load is done

use crate::error::Result;
use rusqlite::Connection;
use tracing::info;

/// (index name, table, column)
pub const INDEXES: [(&str, &str, &str); 5] = [
    ("idx_food_description", "food", "description"),
    ("idx_branded_upc", "branded_food", "upc"),
    ("idx_foodnutrient_fdc", "food_nutrient", "fdc_id"),
    ("idx_foodnutrient_nutrient", "food_nutrient", "nutrient_id"),
    ("idx_foodportion_fdc", "food_portion", "fdc_id"),
];

/// Create the lookup indexes if they do not exist yet
pub fn create_indexes(conn: &mut Connection) -> Result<()> {
    info!("Creating indexes...");
    let tx = conn.transaction()?;

    for (name, table, column) in INDEXES {
        tx.execute(
            &format!("CREATE INDEX IF NOT EXISTS {} ON {}({})", name, table, column),
            [],
        )?;
        info!("  ✓ Created index on {}.{}", table, column);
    }

    tx.commit()?;
    info!("✓ All indexes created");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::create_schema;

    #[test]
    fn test_create_indexes_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_schema(&mut conn).unwrap();

        create_indexes(&mut conn).unwrap();
        create_indexes(&mut conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_index_on_missing_table_fails() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(create_indexes(&mut conn).is_err());
    }
}
