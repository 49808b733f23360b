//! Import job descriptors
//!
//! Each job says which CSV file feeds which table and how source columns map
//! onto target columns. The importer is generic over these descriptors; no
//! table has bespoke import code.

/// One target column and the CSV header it is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Column in the SQLite table
    pub target: String,
    /// Header name in the CSV file
    pub source: String,
}

impl ColumnMapping {
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Mapping where the CSV header and the table column share a name
    pub fn same(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            target: name.clone(),
            source: name,
        }
    }
}

/// A CSV file to load into one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    /// File name relative to the source directory
    pub source_file: String,
    /// Target table
    pub table: String,
    /// Projected columns, in insert order
    pub columns: Vec<ColumnMapping>,
}

impl ImportJob {
    pub fn new(
        source_file: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<ColumnMapping>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            table: table.into(),
            columns,
        }
    }

    /// `INSERT OR IGNORE` statement with one positional parameter per column
    ///
    /// Duplicate primary keys are dropped by SQLite, so within a run the
    /// first occurrence in source order wins.
    pub fn insert_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| c.target.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            self.table, columns, placeholders
        )
    }
}

/// The five FoodData Central imports, in load order
pub fn usda_jobs() -> Vec<ImportJob> {
    vec![
        ImportJob::new(
            "food.csv",
            "food",
            vec![
                ColumnMapping::same("fdc_id"),
                ColumnMapping::same("description"),
                ColumnMapping::same("data_type"),
                ColumnMapping::same("food_category_id"),
            ],
        ),
        ImportJob::new(
            "branded_food.csv",
            "branded_food",
            vec![
                ColumnMapping::same("fdc_id"),
                ColumnMapping::new("upc", "gtin_upc"),
                ColumnMapping::same("brand_name"),
                ColumnMapping::same("ingredients"),
            ],
        ),
        ImportJob::new(
            "nutrient.csv",
            "nutrient",
            vec![
                ColumnMapping::same("id"),
                ColumnMapping::same("name"),
                ColumnMapping::same("unit_name"),
            ],
        ),
        ImportJob::new(
            "food_nutrient.csv",
            "food_nutrient",
            vec![
                ColumnMapping::same("id"),
                ColumnMapping::same("fdc_id"),
                ColumnMapping::same("nutrient_id"),
                ColumnMapping::same("amount"),
            ],
        ),
        ImportJob::new(
            "food_portion.csv",
            "food_portion",
            vec![
                ColumnMapping::same("id"),
                ColumnMapping::same("fdc_id"),
                ColumnMapping::same("portion_description"),
                ColumnMapping::same("gram_weight"),
            ],
        ),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_usda_jobs_order() {
        let tables: Vec<_> = usda_jobs().into_iter().map(|j| j.table).collect();
        assert_eq!(
            tables,
            ["food", "branded_food", "nutrient", "food_nutrient", "food_portion"]
        );
    }

    #[test]
    fn test_branded_upc_reads_gtin_column() {
        let jobs = usda_jobs();
        let branded = jobs.iter().find(|j| j.table == "branded_food").unwrap();
        assert_eq!(branded.columns[1], ColumnMapping::new("upc", "gtin_upc"));
    }

    #[test]
    fn test_insert_sql() {
        let job = ImportJob::new(
            "nutrient.csv",
            "nutrient",
            vec![
                ColumnMapping::same("id"),
                ColumnMapping::same("name"),
                ColumnMapping::same("unit_name"),
            ],
        );
        assert_eq!(
            job.insert_sql(),
            "INSERT OR IGNORE INTO nutrient (id, name, unit_name) VALUES (?1, ?2, ?3)"
        );
    }
}
