//! Tabular views of the pipeline rows as Polars DataFrames, and CSV persistence.
//!
//! Column names and order are fixed; readers validate the required columns
//! before converting back into rows.

use crate::error::{PvEvalError, Result};
use crate::types::{GroundTruthRow, MergedRow, ObjectRow, PredictionRow, Split};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

pub const OBJECT_COLUMNS: [&str; 17] = [
    "split",
    "image_id",
    "file_name",
    "img_width_px",
    "img_height_px",
    "category_id",
    "category_name",
    "x_min_px",
    "y_min_px",
    "width_px",
    "height_px",
    "x_max_px",
    "y_max_px",
    "area_px",
    "centroid_lat",
    "centroid_lon",
    "area_m2",
];

pub const GROUND_TRUTH_COLUMNS: [&str; 9] = [
    "split",
    "file_name",
    "image_id",
    "img_width_px",
    "img_height_px",
    "num_boxes_gt",
    "area_px_gt",
    "area_m2_gt",
    "has_solar_gt",
];

pub const PREDICTION_COLUMNS: [&str; 7] = [
    "split",
    "file_name",
    "image_path",
    "num_preds",
    "has_solar_pred",
    "max_conf_pred",
    "area_px_pred",
];

/// Validate that a DataFrame contains all required columns
///
/// # Returns
///
/// `Ok(())` if all columns are present, `MissingColumn` naming the first absent one otherwise
pub fn validate_columns(df: &DataFrame, required_columns: &[&str]) -> Result<()> {
    let column_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    for col in required_columns {
        if !column_names.iter().any(|c| c == col) {
            return Err(PvEvalError::MissingColumn(col.to_string()));
        }
    }

    Ok(())
}

fn strings<T>(rows: &[T], f: impl Fn(&T) -> &str) -> Vec<String> {
    rows.iter().map(|r| f(r).to_string()).collect()
}

#[allow(clippy::cast_possible_wrap)]
fn ints<T>(rows: &[T], f: impl Fn(&T) -> u64) -> Vec<i64> {
    rows.iter().map(|r| f(r) as i64).collect()
}

fn floats<T>(rows: &[T], f: impl Fn(&T) -> f64) -> Vec<f64> {
    rows.iter().map(f).collect()
}

/// Object-level annotations table.
pub fn objects_frame(rows: &[ObjectRow]) -> Result<DataFrame> {
    let df = df!(
        "split" => strings(rows, |r| r.split.as_str()),
        "image_id" => ints(rows, |r| r.image_id),
        "file_name" => strings(rows, |r| r.file_name.as_str()),
        "img_width_px" => ints(rows, |r| u64::from(r.img_width_px)),
        "img_height_px" => ints(rows, |r| u64::from(r.img_height_px)),
        "category_id" => ints(rows, |r| r.category_id),
        "category_name" => strings(rows, |r| r.category_name.as_str()),
        "x_min_px" => floats(rows, |r| r.x_min_px),
        "y_min_px" => floats(rows, |r| r.y_min_px),
        "width_px" => floats(rows, |r| r.width_px),
        "height_px" => floats(rows, |r| r.height_px),
        "x_max_px" => floats(rows, |r| r.x_max_px),
        "y_max_px" => floats(rows, |r| r.y_max_px),
        "area_px" => floats(rows, |r| r.area_px),
        "centroid_lat" => rows.iter().map(|r| r.centroid_lat).collect::<Vec<_>>(),
        "centroid_lon" => rows.iter().map(|r| r.centroid_lon).collect::<Vec<_>>(),
        "area_m2" => rows.iter().map(|r| r.area_m2).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

/// Image-level ground truth table.
pub fn ground_truth_frame(rows: &[GroundTruthRow]) -> Result<DataFrame> {
    let df = df!(
        "split" => strings(rows, |r| r.split.as_str()),
        "file_name" => strings(rows, |r| r.file_name.as_str()),
        "image_id" => ints(rows, |r| r.image_id),
        "img_width_px" => ints(rows, |r| u64::from(r.img_width_px)),
        "img_height_px" => ints(rows, |r| u64::from(r.img_height_px)),
        "num_boxes_gt" => ints(rows, |r| r.num_boxes_gt as u64),
        "area_px_gt" => floats(rows, |r| r.area_px_gt),
        "area_m2_gt" => floats(rows, |r| r.area_m2_gt),
        "has_solar_gt" => rows.iter().map(|r| r.has_solar_gt).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

/// Image-level prediction summary table.
pub fn predictions_frame(rows: &[PredictionRow]) -> Result<DataFrame> {
    let df = df!(
        "split" => strings(rows, |r| r.split.as_str()),
        "file_name" => strings(rows, |r| r.file_name.as_str()),
        "image_path" => strings(rows, |r| r.image_path.as_str()),
        "num_preds" => ints(rows, |r| r.num_preds as u64),
        "has_solar_pred" => rows.iter().map(|r| r.has_solar_pred).collect::<Vec<_>>(),
        "max_conf_pred" => floats(rows, |r| r.max_conf_pred),
        "area_px_pred" => floats(rows, |r| r.area_px_pred),
    )?;
    Ok(df)
}

/// Merged table: ground truth columns followed by the prediction-only columns.
pub fn merged_frame(rows: &[MergedRow]) -> Result<DataFrame> {
    let gts: Vec<GroundTruthRow> = rows.iter().map(|r| r.ground_truth.clone()).collect();
    let preds: Vec<PredictionRow> = rows.iter().map(|r| r.prediction.clone()).collect();

    let mut df = ground_truth_frame(&gts)?;
    let pred_df = predictions_frame(&preds)?;
    let extra = pred_df.select([
        "image_path",
        "num_preds",
        "has_solar_pred",
        "max_conf_pred",
        "area_px_pred",
    ])?;
    df.hstack_mut(extra.get_columns())?;
    Ok(df)
}

/// Write a DataFrame as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Read a CSV file with a header row, inferring types from the whole file.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn cast_column(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Series> {
    let series = df.column(name)?.as_materialized_series();
    Ok(series.cast(dtype)?)
}

/// String values of a column; nulls read as empty strings.
fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = cast_column(df, name, &DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect();
    Ok(values)
}

/// Float values of a column; nulls read as 0.0.
fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = cast_column(df, name, &DataType::Float64)?;
    let filled = series.f64()?.fill_null_with_values(0.0)?;
    Ok(filled.into_no_null_iter().collect())
}

fn uint_values(df: &DataFrame, name: &str) -> Result<Vec<u64>> {
    let series = cast_column(df, name, &DataType::Int64)?;
    series
        .i64()?
        .into_iter()
        .map(|v| match v {
            Some(v) if v >= 0 => Ok(v.unsigned_abs()),
            other => Err(PvEvalError::InvalidDataFrame(format!(
                "column {name} must hold non-negative integers, got {other:?}"
            ))),
        })
        .collect()
}

/// Boolean values of a column, accepting native booleans or "true"/"false" text.
fn bool_values(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let series = df.column(name)?.as_materialized_series();
    if matches!(series.dtype(), DataType::String) {
        return Ok(series
            .str()?
            .into_iter()
            .map(|v| matches!(v, Some("true" | "True" | "1")))
            .collect());
    }
    let series = series.cast(&DataType::Boolean)?;
    Ok(series.bool()?.into_iter().map(|v| v.unwrap_or(false)).collect())
}

fn split_values(df: &DataFrame) -> Result<Vec<Split>> {
    string_values(df, "split")?
        .iter()
        .map(|s| s.parse())
        .collect()
}

fn dimension(value: u64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        PvEvalError::InvalidDataFrame(format!("{column} value {value} does not fit in u32"))
    })
}

/// Rebuild ground truth rows from a table written by [`ground_truth_frame`].
pub fn ground_truth_from_frame(df: &DataFrame) -> Result<Vec<GroundTruthRow>> {
    validate_columns(df, &GROUND_TRUTH_COLUMNS)?;
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let splits = split_values(df)?;
    let files = string_values(df, "file_name")?;
    let ids = uint_values(df, "image_id")?;
    let widths = uint_values(df, "img_width_px")?;
    let heights = uint_values(df, "img_height_px")?;
    let counts = uint_values(df, "num_boxes_gt")?;
    let areas = float_values(df, "area_px_gt")?;
    let areas_m2 = float_values(df, "area_m2_gt")?;
    let flags = bool_values(df, "has_solar_gt")?;

    (0..df.height())
        .map(|i| {
            Ok(GroundTruthRow {
                split: splits[i],
                file_name: files[i].clone(),
                image_id: ids[i],
                img_width_px: dimension(widths[i], "img_width_px")?,
                img_height_px: dimension(heights[i], "img_height_px")?,
                num_boxes_gt: counts[i] as usize,
                area_px_gt: areas[i],
                area_m2_gt: areas_m2[i],
                has_solar_gt: flags[i],
            })
        })
        .collect()
}

/// Rebuild prediction rows from a table written by [`predictions_frame`].
pub fn predictions_from_frame(df: &DataFrame) -> Result<Vec<PredictionRow>> {
    validate_columns(df, &PREDICTION_COLUMNS)?;
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let splits = split_values(df)?;
    let files = string_values(df, "file_name")?;
    let paths = string_values(df, "image_path")?;
    let counts = uint_values(df, "num_preds")?;
    let flags = bool_values(df, "has_solar_pred")?;
    let confs = float_values(df, "max_conf_pred")?;
    let areas = float_values(df, "area_px_pred")?;

    Ok((0..df.height())
        .map(|i| PredictionRow {
            split: splits[i],
            file_name: files[i].clone(),
            image_path: paths[i].clone(),
            num_preds: counts[i] as usize,
            has_solar_pred: flags[i],
            max_conf_pred: confs[i],
            area_px_pred: areas[i],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gt_row(file: &str, boxes: usize) -> GroundTruthRow {
        GroundTruthRow {
            split: Split::Valid,
            file_name: file.to_string(),
            image_id: 3,
            img_width_px: 640,
            img_height_px: 480,
            num_boxes_gt: boxes,
            area_px_gt: boxes as f64 * 12.5,
            area_m2_gt: 0.0,
            has_solar_gt: boxes > 0,
        }
    }

    #[test]
    fn test_validate_columns_success() {
        let df = df! {
            "col1" => &[1, 2, 3],
            "col2" => &["a", "b", "c"],
        }
        .unwrap();

        assert!(validate_columns(&df, &["col1", "col2"]).is_ok());
    }

    #[test]
    fn test_validate_columns_missing() {
        let df = df! {
            "col1" => &[1, 2, 3],
        }
        .unwrap();

        match validate_columns(&df, &["col1", "col2"]) {
            Err(PvEvalError::MissingColumn(col)) => assert_eq!(col, "col2"),
            _ => panic!("Expected MissingColumn error"),
        }
    }

    #[test]
    fn test_ground_truth_frame_layout() {
        let df = ground_truth_frame(&[gt_row("a.jpg", 2), gt_row("b.jpg", 0)]).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, GROUND_TRUTH_COLUMNS);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_ground_truth_csv_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gt.csv");
        let rows = vec![gt_row("a.jpg", 2), gt_row("b.jpg", 0)];

        write_csv(&mut ground_truth_frame(&rows).unwrap(), &path).unwrap();
        let reloaded = ground_truth_from_frame(&read_csv(&path).unwrap()).unwrap();
        assert_eq!(reloaded, rows);
    }

    #[test]
    fn test_merged_frame_columns() {
        let merged = vec![MergedRow {
            ground_truth: gt_row("a.jpg", 1),
            prediction: PredictionRow {
                split: Split::Valid,
                file_name: "a.jpg".to_string(),
                image_path: "valid/a.jpg".to_string(),
                num_preds: 1,
                has_solar_pred: true,
                max_conf_pred: 0.5,
                area_px_pred: 11.0,
            },
        }];

        let df = merged_frame(&merged).unwrap();
        assert_eq!(df.width(), GROUND_TRUTH_COLUMNS.len() + 5);
        assert!(validate_columns(&df, &["image_path", "area_px_pred", "has_solar_gt"]).is_ok());
    }

    #[test]
    fn test_objects_frame_keeps_missing_geo_as_null() {
        let row = ObjectRow {
            split: Split::Train,
            image_id: 1,
            file_name: "a.jpg".to_string(),
            img_width_px: 10,
            img_height_px: 10,
            category_id: 1,
            category_name: "solar-panel".to_string(),
            x_min_px: 0.0,
            y_min_px: 0.0,
            width_px: 2.0,
            height_px: 2.0,
            x_max_px: 2.0,
            y_max_px: 2.0,
            area_px: 4.0,
            centroid_lat: None,
            centroid_lon: None,
            area_m2: Some(1.0),
        };
        let df = objects_frame(&[row]).unwrap();
        assert_eq!(df.width(), OBJECT_COLUMNS.len());
        assert_eq!(df.column("centroid_lat").unwrap().null_count(), 1);
    }
}
