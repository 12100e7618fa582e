use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::PlannerSettings;
use crate::model::QueueRow;

#[derive(Debug)]
pub enum ReportError {
    CannotRead(String, String),
    CannotParse(String, String),
    CannotWrite(String, String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error = match self {
            ReportError::CannotRead(what, why) => format!("Couldn't read {what}: {why}"),
            ReportError::CannotParse(what, why) => format!("Couldn't parse {what}: {why}"),
            ReportError::CannotWrite(what, why) => format!("Couldn't write {what}: {why}"),
        };
        write!(f, "{error}")
    }
}

impl std::error::Error for ReportError {}

/// Loads planner settings from a JSON file; every missing field keeps its
/// default.
pub fn load_settings(path: &Path) -> Result<PlannerSettings, ReportError> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path)
        .map_err(|why| ReportError::CannotRead(display.clone(), why.to_string()))?;
    serde_json::from_str(&content).map_err(|why| ReportError::CannotParse(display, why.to_string()))
}

/// Writes queue rows as CSV, one line per queued order.
pub fn write_queue_csv(path: &Path, rows: &[QueueRow]) -> Result<(), ReportError> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|why| ReportError::CannotWrite(display.clone(), why.to_string()))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|why| ReportError::CannotWrite(display.clone(), why.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|why| ReportError::CannotWrite(display.clone(), why.to_string()))?;
    }
    writer
        .flush()
        .map_err(|why| ReportError::CannotWrite(display, why.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_settings_round_trip_through_json() {
        let settings = PlannerSettings::default();
        let encoded = serde_json::to_string(&settings).expect("settings serialize");
        let decoded: PlannerSettings = serde_json::from_str(&encoded).expect("settings parse");

        assert_eq!(decoded.calendar.weekday_shifts, settings.calendar.weekday_shifts);
        assert_eq!(decoded.ga.generations, settings.ga.generations);
        assert_eq!(decoded.cost.ink_add_cost, settings.cost.ink_add_cost);
    }

    #[test]
    fn test_load_settings_reports_missing_files() {
        let result = load_settings(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ReportError::CannotRead(_, _))));
    }

    #[test]
    fn test_queue_csv_has_one_line_per_row_plus_header() {
        let dir = std::env::temp_dir().join("flexoplan-report-test");
        let path = dir.join("queue.csv");
        let now = chrono::NaiveDate::from_ymd_opt(2026, 3, 2)
            .expect("valid test date")
            .and_hms_opt(12, 0, 0)
            .expect("valid test time");
        let rows = vec![QueueRow {
            id: 1,
            order_id: 10,
            machine_id: 1,
            production_order: 1,
            reason: String::from("test"),
            probable_delivery_date: Some(now),
            setup_min: 0.0,
            label_changes_min: 0.0,
            print_min: 100.0,
            buffer_min: 1.0,
            total_min: 101.0,
            created_at: now,
            updated_at: now,
        }];

        write_queue_csv(&path, &rows).expect("csv written");
        let content = fs::read_to_string(&path).expect("csv readable");
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().expect("header line").contains("production_order"));

        fs::remove_dir_all(&dir).ok();
    }
}
