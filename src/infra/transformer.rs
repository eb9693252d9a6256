//! Default CSV preprocessing and model inference.
//!
//! Preprocessing trims cells, drops blank rows and unnamed columns, and
//! rewrites formatted numbers ("$1,234.50", "(200)") into plain decimals.
//! Inference types every column and builds a budget model with one `amount`
//! measure and the remaining columns as dimensions.

use crate::app::ports::ResourceTransformerPort;
use crate::common::error::{CatalogError, Result};
use crate::domain::slugify;
use crate::pipeline::resource::Resource;
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

static FORMATTED_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<neg>-)?[$€£¥]?\s*(?P<int>\d{1,3}(?:,\d{3})+|\d+)(?P<frac>\.\d+)?$")
        .expect("valid number regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Number,
    Date,
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::String => "string",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Number)
    }
}

/// Rewrites a formatted number into a plain decimal, or `None` when the cell
/// is not a number.
pub fn normalize_number(cell: &str) -> Option<String> {
    let cell = cell.trim();
    let (negative, inner) = match cell.strip_prefix('(').and_then(|c| c.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, cell),
    };
    let caps = FORMATTED_NUMBER_RE.captures(inner)?;
    let negative = negative ^ caps.name("neg").is_some();
    let int = caps.name("int")?.as_str().replace(',', "");
    let frac = caps.name("frac").map(|m| m.as_str()).unwrap_or("");
    Some(format!("{}{}{}", if negative { "-" } else { "" }, int, frac))
}

struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_table(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CatalogError::Transform(format!("unreadable CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CatalogError::Transform("CSV has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CatalogError::Transform(format!("unreadable CSV row: {}", e)))?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(Table { headers, rows })
}

fn write_table(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| CatalogError::Transform(format!("could not flush CSV: {}", e)))
}

fn clean_table(table: Table) -> Table {
    let keep: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_empty())
        .map(|(i, _)| i)
        .collect();

    let headers = keep.iter().map(|&i| table.headers[i].clone()).collect();
    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            keep.iter()
                .map(|&i| {
                    let cell = row.get(i).map(String::as_str).unwrap_or("");
                    normalize_number(cell).unwrap_or_else(|| cell.to_string())
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();
    Table { headers, rows }
}

fn infer_column_type<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut seen = false;
    let (mut int, mut num, mut date) = (true, true, true);
    for v in values.filter(|v| !v.is_empty()) {
        seen = true;
        int &= v.parse::<i64>().is_ok();
        num &= v.parse::<f64>().is_ok();
        date &= NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok();
    }
    match (seen, int, num, date) {
        (false, ..) => ColumnType::String,
        (true, true, _, _) => ColumnType::Integer,
        (true, _, true, _) => ColumnType::Number,
        (true, _, _, true) => ColumnType::Date,
        _ => ColumnType::String,
    }
}

/// Mapping key for a dimension column. Keys already taken in `mapping`,
/// including the `amount` measure, get a `_2`, `_3` suffix.
fn dimension_key(header: &str, mapping: &Map<String, Value>) -> String {
    let base = slugify(header).replace('-', "_");
    let base = if base.is_empty() { "column".to_string() } else { base };

    let mut key = base.clone();
    let mut n = 1;
    while mapping.contains_key(&key) {
        n += 1;
        key = format!("{}_{}", base, n);
    }
    key
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvResourceTransformer;

impl CsvResourceTransformer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceTransformerPort for CsvResourceTransformer {
    async fn preprocess(&self, resource: &mut Resource) -> Result<()> {
        let table = read_table(resource.data.content().await?)?;
        let before = table.rows.len();
        let cleaned = clean_table(table);
        debug!(
            "Preprocessed {}: {} rows in, {} rows out",
            resource.metadata.name,
            before,
            cleaned.rows.len()
        );
        resource.data.replace_content(write_table(&cleaned)?);
        Ok(())
    }

    async fn infer_model(&self, resource: &mut Resource) -> Result<Value> {
        let table = read_table(resource.data.content().await?)?;
        let types: Vec<ColumnType> = (0..table.headers.len())
            .map(|i| {
                infer_column_type(
                    table
                        .rows
                        .iter()
                        .map(move |r| r.get(i).map(String::as_str).unwrap_or("")),
                )
            })
            .collect();

        let amount_idx = table
            .headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("amount"))
            .or_else(|| types.iter().position(|t| t.is_numeric()))
            .ok_or_else(|| {
                CatalogError::Transform(format!(
                    "no numeric column in {} to use as the amount",
                    resource.metadata.name
                ))
            })?;

        let mut mapping = Map::new();
        mapping.insert(
            "amount".to_string(),
            json!({
                "type": "measure",
                "column": table.headers[amount_idx],
                "datatype": "float",
            }),
        );
        for (i, header) in table.headers.iter().enumerate() {
            if i == amount_idx {
                continue;
            }
            let kind = if types[i] == ColumnType::Date { "date" } else { "attribute" };
            mapping.insert(
                dimension_key(header, &mapping),
                json!({
                    "type": kind,
                    "column": header,
                    "label": header,
                    "datatype": types[i].as_str(),
                }),
            );
        }

        let meta = &resource.metadata;
        Ok(json!({
            "dataset": {
                "name": slugify(&meta.name),
                "label": meta.name,
                "currency": meta.currency,
                "fiscalYear": meta.fiscal_year,
                "granularity": meta.granularity,
                "status": meta.status,
                "type": meta.resource_type,
            },
            "mapping": Value::Object(mapping),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::SourceLoaderPort;
    use crate::pipeline::resource::{CsvHandle, ResourceMetadata};
    use std::sync::Arc;

    struct StaticLoader(&'static str);

    #[async_trait]
    impl SourceLoaderPort for StaticLoader {
        async fn load(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    fn resource(csv: &'static str) -> Resource {
        Resource {
            data: CsvHandle::new("https://example.org/x.csv", Arc::new(StaticLoader(csv))),
            metadata: ResourceMetadata {
                path: Some("x.csv".to_string()),
                name: "Health".to_string(),
                currency: "USD".to_string(),
                date_last_updated: "2020-01-01 00:00:00".to_string(),
                date_published: "2020-01-01 00:00:00".to_string(),
                fiscal_year: "2020".to_string(),
                granularity: Some("monthly".to_string()),
                status: Some("final".to_string()),
                resource_type: "expenditure".to_string(),
            },
        }
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number("$1,234.50").as_deref(), Some("1234.50"));
        assert_eq!(normalize_number("(200)").as_deref(), Some("-200"));
        assert_eq!(normalize_number("-17").as_deref(), Some("-17"));
        assert_eq!(normalize_number("12,34"), None);
        assert_eq!(normalize_number("Ministry"), None);
    }

    #[tokio::test]
    async fn test_preprocess_cleans_rows_and_columns() {
        let mut r = resource(" date ,department,amount,\n2020-01-01, Health ,\"$1,000\",x\n,,,\n2020-02-01,Schools,(50),\n");
        CsvResourceTransformer.preprocess(&mut r).await.unwrap();

        let out = String::from_utf8(r.data.serialize().await.unwrap()).unwrap();
        assert_eq!(
            out,
            "date,department,amount\n2020-01-01,Health,1000\n2020-02-01,Schools,-50\n"
        );
    }

    #[tokio::test]
    async fn test_infer_model_maps_amount_and_dimensions() {
        let mut r = resource("date,department,amount\n2020-01-01,Health,1000\n2020-02-01,Schools,-50.5\n");
        let model = CsvResourceTransformer.infer_model(&mut r).await.unwrap();

        assert_eq!(model["mapping"]["amount"]["column"], "amount");
        assert_eq!(model["mapping"]["date"]["type"], "date");
        assert_eq!(model["mapping"]["department"]["datatype"], "string");
        assert_eq!(model["dataset"]["currency"], "USD");
        assert_eq!(model["dataset"]["fiscalYear"], "2020");
    }

    #[tokio::test]
    async fn test_every_column_gets_its_own_mapping_entry() {
        let mut r = resource("Total,Amount (text),Region,region\n10,a,North,n\n20,b,South,s\n");
        let model = CsvResourceTransformer.infer_model(&mut r).await.unwrap();

        let mapping = model["mapping"].as_object().unwrap();
        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping["amount"]["column"], "Total");
        assert_eq!(mapping["amount_text"]["column"], "Amount (text)");
        assert_eq!(mapping["region"]["column"], "Region");
        assert_eq!(mapping["region_2"]["column"], "region");
    }

    #[tokio::test]
    async fn test_dimension_never_replaces_the_measure() {
        let mut r = resource("Spend,Amount!\n10,x\n20,y\n");
        let model = CsvResourceTransformer.infer_model(&mut r).await.unwrap();

        assert_eq!(model["mapping"]["amount"]["type"], "measure");
        assert_eq!(model["mapping"]["amount"]["column"], "Spend");
        assert_eq!(model["mapping"]["amount_2"]["column"], "Amount!");
    }

    #[tokio::test]
    async fn test_infer_model_without_numbers_fails() {
        let mut r = resource("department\nHealth\n");
        let err = CsvResourceTransformer.infer_model(&mut r).await.unwrap_err();
        assert!(matches!(err, CatalogError::Transform(_)));
    }

    #[test]
    fn test_column_type_inference() {
        assert_eq!(infer_column_type(["1", "2", ""].into_iter()), ColumnType::Integer);
        assert_eq!(infer_column_type(["1", "2.5"].into_iter()), ColumnType::Number);
        assert_eq!(infer_column_type(["2020-01-01"].into_iter()), ColumnType::Date);
        assert_eq!(infer_column_type(["a", "1"].into_iter()), ColumnType::String);
        assert_eq!(infer_column_type(std::iter::empty()), ColumnType::String);
    }
}
