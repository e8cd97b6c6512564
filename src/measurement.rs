use crate::prelude::*;

use chrono::SecondsFormat;
use rinfluxdb::line_protocol::{Line, LineBuilder};
use serde::{Serialize, Serializer};

pub static MEASUREMENT: &str = "Victron";

/// One timestamped set of decoded values for a single register block.
///
/// Built once per block per poll cycle and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    measurement: &'static str,
    category: String,
    fields: Fields,
    #[serde(rename = "time", serialize_with = "serialize_rfc3339")]
    captured_at: DateTime<Utc>,
}

impl MeasurementRecord {
    /// Panics if `fields` is empty; callers only build records from a
    /// successful decode.
    pub fn build(category: &str, fields: Fields, captured_at: DateTime<Utc>) -> Self {
        assert!(
            !fields.is_empty(),
            "measurement record for {} built without fields",
            category
        );

        Self {
            measurement: MEASUREMENT,
            category: category.to_string(),
            fields,
            captured_at,
        }
    }

    pub fn measurement(&self) -> &str {
        self.measurement
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// RFC 3339 capture time with an explicit `+00:00` offset.
    pub fn timestamp(&self) -> String {
        self.captured_at.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    pub fn to_line(&self) -> Line {
        self.fields
            .iter()
            .fold(
                LineBuilder::new(self.measurement)
                    .insert_tag("category", self.category.as_str())
                    .set_timestamp(self.captured_at),
                |line, (name, value)| line.insert_field(*name, *value),
            )
            .build()
    }
}

fn serialize_rfc3339<S>(time: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, false))
}
