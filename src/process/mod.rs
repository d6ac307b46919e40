// src/process/mod.rs
use anyhow::Result;
use tracing::debug;

use crate::schema::ColumnPartition;
use crate::table::Table;

/// Fully unpivot a validated wide table: for each source row and each date
/// column (original left-to-right order), emit one output row holding the
/// row's dimension values, the date-column name, and the cell value.
///
/// Output columns are the dimension columns in original order followed by
/// `date` and `value`. Nothing is filtered or aggregated, so the output has
/// exactly `rows × date_columns` rows.
pub fn wide_to_long(table: &Table, partition: &ColumnPartition) -> Table {
    let mut columns = partition.dimension_names();
    columns.push("date".to_string());
    columns.push("value".to_string());

    let mut rows = Vec::with_capacity(table.rows.len() * partition.dates.len());
    for row in &table.rows {
        let dims: Vec<String> = partition
            .dimensions
            .iter()
            .map(|(i, _)| row.get(*i).cloned().unwrap_or_default())
            .collect();
        for (i, date_name) in &partition.dates {
            let mut out = dims.clone();
            out.push(date_name.clone());
            out.push(row.get(*i).cloned().unwrap_or_default());
            rows.push(out);
        }
    }

    debug!(
        rows_wide = table.rows.len(),
        date_columns = partition.dates.len(),
        rows_long = rows.len(),
        "unpivoted wide table"
    );

    Table::new(columns, rows)
}

/// Row-wise union of homogeneous partitions sharing one header. Partition
/// order and row order within each partition are preserved; the combined
/// table carries a single copy of the header.
pub fn concat_partitions(parts: Vec<Table>) -> Result<Table> {
    let mut iter = parts.into_iter();
    let mut combined = match iter.next() {
        Some(t) => t,
        None => anyhow::bail!("no partitions to concatenate"),
    };
    for part in iter {
        if part.columns != combined.columns {
            anyhow::bail!(
                "partition header mismatch: expected {:?}, got {:?}",
                combined.columns,
                part.columns
            );
        }
        combined.rows.extend(part.rows);
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::partition_columns;

    fn wide_fixture() -> Table {
        Table::from_csv(
            b"geo_type,region,transportation_type,2020-01-13,2020-01-14\n\
              country/region,Albania,driving,100.0,95.3\n\
              country/region,Albania,walking,100.0,100.68\n",
        )
        .unwrap()
    }

    #[test]
    fn unpivot_has_rows_times_dates_rows() {
        let wide = wide_fixture();
        let part = partition_columns(&wide.columns);
        let long = wide_to_long(&wide, &part);

        assert_eq!(long.rows.len(), wide.rows.len() * part.dates.len());
        assert_eq!(
            long.columns,
            vec![
                "geo_type",
                "region",
                "transportation_type",
                "date",
                "value"
            ]
        );
    }

    #[test]
    fn unpivot_preserves_row_and_date_order() {
        let wide = wide_fixture();
        let part = partition_columns(&wide.columns);
        let long = wide_to_long(&wide, &part);

        assert_eq!(
            long.rows[0],
            vec![
                "country/region",
                "Albania",
                "driving",
                "2020-01-13",
                "100.0"
            ]
        );
        assert_eq!(
            long.rows[1],
            vec![
                "country/region",
                "Albania",
                "driving",
                "2020-01-14",
                "95.3"
            ]
        );
        assert_eq!(
            long.rows[2],
            vec![
                "country/region",
                "Albania",
                "walking",
                "2020-01-13",
                "100.0"
            ]
        );
    }

    #[test]
    fn unpivot_keeps_empty_cells() {
        let wide = Table::from_csv(b"region,20200101\nAlbania,\n").unwrap();
        let part = partition_columns(&wide.columns);
        let long = wide_to_long(&wide, &part);
        assert_eq!(long.rows, vec![vec!["Albania", "20200101", ""]]);
    }

    #[test]
    fn concat_preserves_partition_order() -> Result<()> {
        let a = Table::from_csv(b"state,visits\nWA,10\nOR,20\n")?;
        let b = Table::from_csv(b"state,visits\nCA,30\n")?;
        let combined = concat_partitions(vec![a, b])?;
        assert_eq!(combined.rows.len(), 3);
        assert_eq!(combined.rows[2], vec!["CA", "30"]);
        Ok(())
    }

    #[test]
    fn concat_rejects_header_mismatch() -> Result<()> {
        let a = Table::from_csv(b"state,visits\nWA,10\n")?;
        let b = Table::from_csv(b"region,visits\nCA,30\n")?;
        assert!(concat_partitions(vec![a, b]).is_err());
        Ok(())
    }

    #[test]
    fn concat_of_nothing_is_an_error() {
        assert!(concat_partitions(Vec::new()).is_err());
    }
}
