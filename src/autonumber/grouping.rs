// Grouping Key Derivation - Date bucket keys for autonumber partitions
// Keys always have the shape YEAR-QUARTER-MONTH-DAY; disabled parts stay as their token name

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use crate::ent_framework::ent_record::{EntityRecord, FieldValue};
use crate::ent_framework::ent_schema::{DatetimeType, EntitySchema, FieldDefinition, FieldType};
use crate::error::{AppError, AppResult};

pub const YEAR_TOKEN: &str = "YYYY";
pub const QUARTER_TOKEN: &str = "QQ";
pub const MONTH_TOKEN: &str = "MM";
pub const DAY_TOKEN: &str = "DD";

/// Calendar parts of a reference date, taken in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingComponents {
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub day: u32,
}

impl GroupingComponents {
    pub fn from_date(reference: DateTime<Utc>) -> Self {
        let month = reference.month();
        Self {
            year: reference.year(),
            quarter: (month + 2) / 3,
            month,
            day: reference.day(),
        }
    }
}

/// Build the bucket key for `reference` under `pattern`.
///
/// A part is filled in when its token occurs anywhere in the pattern, so
/// `"YYYYMM"` enables both year and month. The quarter is never zero padded.
pub fn derive_grouping_key(reference: DateTime<Utc>, pattern: &str) -> String {
    let parts = GroupingComponents::from_date(reference);

    let year = if pattern.contains(YEAR_TOKEN) {
        format!("{:04}", parts.year)
    } else {
        YEAR_TOKEN.to_string()
    };
    let quarter = if pattern.contains(QUARTER_TOKEN) {
        parts.quarter.to_string()
    } else {
        QUARTER_TOKEN.to_string()
    };
    let month = if pattern.contains(MONTH_TOKEN) {
        format!("{:02}", parts.month)
    } else {
        MONTH_TOKEN.to_string()
    };
    let day = if pattern.contains(DAY_TOKEN) {
        format!("{:02}", parts.day)
    } else {
        DAY_TOKEN.to_string()
    };

    let key = format!("{}-{}-{}-{}", year, quarter, month, day);
    debug!("Derived grouping key '{}' from pattern '{}'", key, pattern);
    key
}

/// Look up `field_name` on the schema and check it can act as a reference date
pub fn ensure_date_source<'a>(
    schema: &'a EntitySchema,
    field_name: &str,
) -> AppResult<&'a FieldDefinition> {
    match schema.field(field_name) {
        Some(definition) if definition.field_type.is_date_source() => Ok(definition),
        Some(definition) => Err(AppError::UnsupportedDateFieldType(format!(
            "field '{}' on '{}' is of type '{}'",
            field_name,
            schema.entity_type,
            definition.field_type.name()
        ))),
        None => Err(AppError::UnsupportedDateFieldType(format!(
            "field '{}' does not exist on '{}'",
            field_name, schema.entity_type
        ))),
    }
}

/// Read the reference date of `record` from the field described by `definition`
pub fn resolve_reference_date(
    record: &EntityRecord,
    definition: &FieldDefinition,
) -> AppResult<DateTime<Utc>> {
    let field = definition.name.as_str();
    let value = match record.get(field) {
        Some(value) if !value.is_empty() => value,
        _ => {
            return Err(AppError::MissingReferenceDate(format!(
                "field '{}' of {} {} is empty",
                field, record.entity_type, record.id
            )))
        }
    };

    match &definition.field_type {
        FieldType::Created | FieldType::Changed | FieldType::Timestamp => {
            let seconds = match value {
                FieldValue::Timestamp(seconds) | FieldValue::Int(seconds) => *seconds,
                FieldValue::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                    AppError::InvalidReferenceDate(format!(
                        "field '{}' holds '{}', expected epoch seconds",
                        field, text
                    ))
                })?,
                other => return Err(unexpected_value(field, other)),
            };
            DateTime::<Utc>::from_timestamp(seconds, 0).ok_or_else(|| {
                AppError::InvalidReferenceDate(format!(
                    "field '{}' holds out of range timestamp {}",
                    field, seconds
                ))
            })
        }
        FieldType::Datetime(datetime_type) => {
            let text = match value {
                FieldValue::Text(text) => text,
                other => return Err(unexpected_value(field, other)),
            };
            let format = datetime_type.storage_format();
            let naive = match datetime_type {
                DatetimeType::Date => {
                    NaiveDate::parse_from_str(text, format)
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                }
                DatetimeType::DateTime => {
                    NaiveDateTime::parse_from_str(text, format).ok()
                }
            };
            naive
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or_else(|| {
                    AppError::InvalidReferenceDate(format!(
                        "field '{}' holds '{}', expected format '{}'",
                        field, text, format
                    ))
                })
        }
        other => Err(AppError::UnsupportedDateFieldType(format!(
            "field '{}' is of type '{}'",
            field,
            other.name()
        ))),
    }
}

fn unexpected_value(field: &str, value: &FieldValue) -> AppError {
    AppError::InvalidReferenceDate(format!(
        "field '{}' holds an unexpected value {:?}",
        field, value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_all_tokens() {
        assert_eq!(derive_grouping_key(utc(2024, 2, 15), "YYYY-QQ-MM-DD"), "2024-1-02-15");
        assert_eq!(derive_grouping_key(utc(2024, 12, 1), "DD/MM/QQ/YYYY"), "2024-4-12-01");
    }

    #[test]
    fn test_no_tokens() {
        assert_eq!(derive_grouping_key(utc(2024, 2, 15), ""), "YYYY-QQ-MM-DD");
        assert_eq!(derive_grouping_key(utc(2024, 2, 15), "invoice"), "YYYY-QQ-MM-DD");
    }

    #[test]
    fn test_month_only() {
        assert_eq!(derive_grouping_key(utc(2023, 3, 9), "MM"), "YYYY-QQ-03-DD");
    }

    #[test]
    fn test_containment_not_position() {
        assert_eq!(derive_grouping_key(utc(2021, 7, 4), "YYYYMM"), "2021-QQ-07-DD");
        assert_eq!(derive_grouping_key(utc(2021, 7, 4), "xQQMMx"), "YYYY-3-07-DD");
    }

    #[test]
    fn test_quarter_boundaries() {
        assert_eq!(GroupingComponents::from_date(utc(2024, 1, 1)).quarter, 1);
        assert_eq!(GroupingComponents::from_date(utc(2024, 3, 31)).quarter, 1);
        assert_eq!(GroupingComponents::from_date(utc(2024, 4, 1)).quarter, 2);
        assert_eq!(GroupingComponents::from_date(utc(2024, 6, 30)).quarter, 2);
        assert_eq!(GroupingComponents::from_date(utc(2024, 7, 1)).quarter, 3);
        assert_eq!(GroupingComponents::from_date(utc(2024, 10, 1)).quarter, 4);
        assert_eq!(GroupingComponents::from_date(utc(2024, 12, 31)).quarter, 4);
    }

    #[test]
    fn test_ensure_date_source() {
        let schema = EntitySchema::new("invoice")
            .with_field(FieldDefinition::new("title", FieldType::String))
            .with_field(FieldDefinition::new(
                "issued",
                FieldType::Datetime(DatetimeType::Date),
            ));

        assert!(ensure_date_source(&schema, "created").is_ok());
        assert!(ensure_date_source(&schema, "issued").is_ok());
        assert!(matches!(
            ensure_date_source(&schema, "title"),
            Err(AppError::UnsupportedDateFieldType(_))
        ));
        assert!(matches!(
            ensure_date_source(&schema, "nope"),
            Err(AppError::UnsupportedDateFieldType(_))
        ));
    }

    #[test]
    fn test_resolve_epoch_in_utc() {
        // 2024-03-31T23:30:00Z, already April in UTC+1
        let record = EntityRecord::new("invoice", 1)
            .with_value("created", FieldValue::Timestamp(1_711_927_800));
        let definition = FieldDefinition::new("created", FieldType::Created);

        let date = resolve_reference_date(&record, &definition).unwrap();
        assert_eq!(derive_grouping_key(date, "YYYY QQ MM DD"), "2024-1-03-31");
    }

    #[test]
    fn test_resolve_epoch_text() {
        let record = EntityRecord::new("invoice", 1)
            .with_value("stamp", FieldValue::Text("0".to_string()));
        let definition = FieldDefinition::new("stamp", FieldType::Timestamp);

        let date = resolve_reference_date(&record, &definition).unwrap();
        assert_eq!(derive_grouping_key(date, "YYYYMMDD"), "1970-QQ-01-01");
    }

    #[test]
    fn test_resolve_calendar_formats() {
        let record = EntityRecord::new("invoice", 1)
            .with_value("issued", FieldValue::Text("2024-04-01".to_string()))
            .with_value("due", FieldValue::Text("2024-11-30T08:15:00".to_string()));

        let issued = FieldDefinition::new("issued", FieldType::Datetime(DatetimeType::Date));
        let due = FieldDefinition::new("due", FieldType::Datetime(DatetimeType::DateTime));

        let issued_date = resolve_reference_date(&record, &issued).unwrap();
        assert_eq!(derive_grouping_key(issued_date, "YYYY-QQ-MM-DD"), "2024-2-04-01");

        let due_date = resolve_reference_date(&record, &due).unwrap();
        assert_eq!(derive_grouping_key(due_date, "YYYY-QQ-MM-DD"), "2024-4-11-30");
    }

    #[test]
    fn test_resolve_missing() {
        let definition = FieldDefinition::new("created", FieldType::Created);

        let absent = EntityRecord::new("invoice", 1);
        assert!(matches!(
            resolve_reference_date(&absent, &definition),
            Err(AppError::MissingReferenceDate(_))
        ));

        let blank = EntityRecord::new("invoice", 1).with_value("created", FieldValue::Empty);
        assert!(matches!(
            resolve_reference_date(&blank, &definition),
            Err(AppError::MissingReferenceDate(_))
        ));
    }

    #[test]
    fn test_resolve_invalid() {
        let record = EntityRecord::new("invoice", 1)
            .with_value("issued", FieldValue::Text("2024-13-01".to_string()))
            .with_value("title", FieldValue::Text("hello".to_string()));

        let issued = FieldDefinition::new("issued", FieldType::Datetime(DatetimeType::Date));
        assert!(matches!(
            resolve_reference_date(&record, &issued),
            Err(AppError::InvalidReferenceDate(_))
        ));

        let title = FieldDefinition::new("title", FieldType::String);
        assert!(matches!(
            resolve_reference_date(&record, &title),
            Err(AppError::UnsupportedDateFieldType(_))
        ));
    }
}
