use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

use crate::sync::catalog::{Catalog, RowConverter, SqlValue};
use crate::sync::columns::ValueMap;

const PRODUCT_ID: &str = "productId";
const ACQUISITION_DATE: &str = "acquisitionDate";
const CLOUD_COVER: &str = "cloudCover";
const WRS_PATH: &str = "path";
const WRS_ROW: &str = "row";
const DOWNLOAD_URL: &str = "download_url";

const COLUMNS: &[&str] = &[
    PRODUCT_ID,
    ACQUISITION_DATE,
    CLOUD_COVER,
    WRS_PATH,
    WRS_ROW,
    DOWNLOAD_URL,
];

const CONVERTERS: &[RowConverter] = &[
    product_id,
    acquisition_date,
    cloud_cover,
    wrs_path,
    wrs_row,
    download_url,
];

// bounds are only looked up on first insert; a conflict only refreshes the
// url, and only when it differs
const UPSERT_SCENE: &str = "
INSERT INTO scenes AS s (
    product_id,
    acquisition_date,
    cloud_cover,
    wrs_path,
    wrs_row,
    scene_url,
    bounds)
VALUES (
    ?1,
    ?2,
    ?3,
    ?4,
    ?5,
    ?6,
    (SELECT boundary FROM wrs2paths WHERE wrs_path = ?4 AND wrs_row = ?5 LIMIT 1)
)
ON CONFLICT (product_id) DO UPDATE
    SET scene_url = excluded.scene_url
    WHERE s.scene_url <> excluded.scene_url
";

const MAINTENANCE: &str = "REINDEX scenes; ANALYZE scenes;";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// The AWS Landsat 8 scene list.
pub struct LandsatScenes;

impl Catalog for LandsatScenes {
    fn name(&self) -> &str {
        "landsat scene list"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    fn converters(&self) -> &'static [RowConverter] {
        CONVERTERS
    }

    fn upsert_statement(&self) -> &'static str {
        UPSERT_SCENE
    }

    fn maintenance_statement(&self) -> &'static str {
        MAINTENANCE
    }
}

fn raw<'a>(values: &'a ValueMap, column: &str) -> Result<&'a str> {
    let value = values
        .get(column)
        .map(|v| v.trim())
        .ok_or_else(|| anyhow!("column {} was not resolved", column))?;
    if value.is_empty() {
        return Err(anyhow!("{} is empty", column));
    }
    Ok(value)
}

fn integer(values: &ValueMap, column: &str) -> Result<SqlValue> {
    let value = raw(values, column)?;
    let parsed = value
        .parse()
        .with_context(|| format!("invalid {} \"{}\"", column, value))?;
    Ok(SqlValue::Integer(parsed))
}

fn product_id(values: &ValueMap) -> Result<SqlValue> {
    Ok(SqlValue::Text(raw(values, PRODUCT_ID)?.to_string()))
}

fn acquisition_date(values: &ValueMap) -> Result<SqlValue> {
    let value = raw(values, ACQUISITION_DATE)?;
    let parsed = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| anyhow!("invalid {} \"{}\"", ACQUISITION_DATE, value))?;
    Ok(SqlValue::Timestamp(parsed))
}

fn cloud_cover(values: &ValueMap) -> Result<SqlValue> {
    let value = raw(values, CLOUD_COVER)?;
    let parsed: f64 = value
        .parse()
        .with_context(|| format!("invalid {} \"{}\"", CLOUD_COVER, value))?;
    Ok(SqlValue::Real(parsed))
}

fn wrs_path(values: &ValueMap) -> Result<SqlValue> {
    integer(values, WRS_PATH)
}

fn wrs_row(values: &ValueMap) -> Result<SqlValue> {
    integer(values, WRS_ROW)
}

fn download_url(values: &ValueMap) -> Result<SqlValue> {
    Ok(SqlValue::Text(raw(values, DOWNLOAD_URL)?.to_string()))
}
