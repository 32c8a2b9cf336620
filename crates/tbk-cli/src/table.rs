//! Gene-by-cell count tables and per-gene result tables.

use anyhow::{Context, Result, bail};
use std::path::Path;

/// Placeholder written for missing values.
pub const MISSING: &str = "---";

/// Counts for many genes: one row per gene, one column per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CountTable {
    /// Header of the identifier column.
    pub id_column: String,
    /// Cell names (not interpreted).
    pub cells: Vec<String>,
    /// Gene identifiers, in file order.
    pub genes: Vec<String>,
    /// One count vector per gene; missing entries are NaN.
    pub rows: Vec<Vec<f64>>,
}

fn parse_value(raw: &str) -> Result<f64> {
    let s = raw.trim();
    if s.is_empty() || s == MISSING || s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    s.parse::<f64>().with_context(|| format!("not a number: {raw:?}"))
}

fn format_value(v: f64) -> String {
    if v.is_nan() { MISSING.to_string() } else { v.to_string() }
}

impl CountTable {
    /// Read a CSV count table.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("opening {}", path.display()))?;

        let header = reader.headers().with_context(|| format!("reading header of {}", path.display()))?;
        let mut cols = header.iter();
        let Some(id_column) = cols.next() else {
            bail!("{}: empty header", path.display());
        };
        let id_column = id_column.to_string();
        let cells: Vec<String> = cols.map(str::to_string).collect();

        let mut genes = Vec::new();
        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("{}: row {}", path.display(), i + 1))?;
            let mut fields = record.iter();
            let gene = fields.next().unwrap_or_default().to_string();
            let values = fields
                .map(parse_value)
                .collect::<Result<Vec<f64>>>()
                .with_context(|| format!("{}: gene {gene}", path.display()))?;
            genes.push(gene);
            rows.push(values);
        }

        Ok(Self { id_column, cells, genes, rows })
    }

    /// Write as CSV.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header = vec![self.id_column.clone()];
        header.extend(self.cells.iter().cloned());
        write_rows(path, &header, self.genes.iter().zip(&self.rows).map(|(g, r)| (g.as_str(), r.clone())))
    }
}

/// Write `header` followed by one `gene, values…` line per row; NaN becomes [`MISSING`].
pub fn write_rows<'a, I>(path: &Path, header: &[String], rows: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, Vec<f64>)>,
{
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    for (gene, values) in rows {
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(gene.to_string());
        record.extend(values.into_iter().map(format_value));
        writer.write_record(&record)?;
    }
    writer.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_missing_markers() {
        for s in ["", " ", "NA", "nan", "NaN", "---"] {
            assert!(parse_value(s).unwrap().is_nan(), "{s:?}");
        }
        assert_eq!(parse_value(" 12 ").unwrap(), 12.0);
        assert!(parse_value("twelve").is_err());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(f64::NAN), "---");
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(0.25), "0.25");
    }

    #[test]
    fn test_roundtrip_through_file() {
        let path = std::env::temp_dir().join(format!("tbk_table_{}.csv", std::process::id()));
        let table = CountTable {
            id_column: "gene".into(),
            cells: vec!["c1".into(), "c2".into(), "c3".into()],
            genes: vec!["a".into(), "b".into()],
            rows: vec![vec![1.0, 0.0, 5.0], vec![2.0, f64::NAN, 0.0]],
        };
        table.write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("b,2,---,0"));

        let back = CountTable::read(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back.genes, table.genes);
        assert_eq!(back.cells, table.cells);
        assert_eq!(back.rows[0], table.rows[0]);
        assert!(back.rows[1][1].is_nan());
    }
}
