//! Tracking position codec.
//!
//! Converts between the raw value of the increasing field and the ordered
//! position a consumer tracks, and re-encodes positions into the `$gt`
//! filters that seed a reopened cursor.

use bson::{doc, Bson, Document, Timestamp};
use tail_core::TailError;

/// How the increasing field is interpreted.
///
/// Fixed at configuration time; never auto-detected. Switching strategies
/// over already-persisted tracking state is undefined and fails on decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackingStrategy {
    /// Compare the raw field value directly. Covers numbers, strings, dates
    /// and object ids, ordered by the server's BSON comparison.
    #[default]
    Literal,
    /// Decompose a BSON timestamp into its `(time, increment)` pair.
    Timestamp,
}

/// Last-seen position of a consumer on its increasing field.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingPosition {
    /// A directly comparable value. Change-stream resume tokens also live
    /// here, as opaque BSON documents that are never compared client-side.
    Literal(Bson),
    /// A decomposed BSON timestamp, ordered by `(time, increment)`.
    Temporal { time: u32, increment: u32 },
}

impl TrackingStrategy {
    /// Read the increasing field out of a delivered document.
    pub fn extract(&self, document: &Document, field: &str) -> Result<TrackingPosition, TailError> {
        let value = document
            .get(field)
            .ok_or_else(|| self.mismatch(field, "missing field"))?;
        match self {
            TrackingStrategy::Literal => match value {
                Bson::Int32(_)
                | Bson::Int64(_)
                | Bson::Double(_)
                | Bson::Decimal128(_)
                | Bson::String(_)
                | Bson::DateTime(_)
                | Bson::ObjectId(_) => Ok(TrackingPosition::Literal(value.clone())),
                other => Err(self.mismatch(field, type_name(other))),
            },
            TrackingStrategy::Timestamp => match value {
                Bson::Timestamp(ts) => Ok(TrackingPosition::Temporal {
                    time: ts.time,
                    increment: ts.increment,
                }),
                other => Err(self.mismatch(field, type_name(other))),
            },
        }
    }

    /// Decode a position previously written to a tracking record.
    ///
    /// Literal tracking accepts the stored value as-is (resume tokens are
    /// documents); timestamp tracking requires the stored BSON timestamp.
    pub fn position_from_bson(&self, field: &str, value: Bson) -> Result<TrackingPosition, TailError> {
        match self {
            TrackingStrategy::Literal => Ok(TrackingPosition::Literal(value)),
            TrackingStrategy::Timestamp => match value {
                Bson::Timestamp(ts) => Ok(TrackingPosition::Temporal {
                    time: ts.time,
                    increment: ts.increment,
                }),
                other => Err(self.mismatch(field, type_name(&other))),
            },
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            TrackingStrategy::Literal => "a comparable scalar",
            TrackingStrategy::Timestamp => "a BSON timestamp",
        }
    }

    fn mismatch(&self, field: &str, found: impl Into<String>) -> TailError {
        TailError::UnsupportedFieldType {
            field: field.to_string(),
            expected: self.expected(),
            found: found.into(),
        }
    }
}

impl TrackingPosition {
    /// Filter selecting documents strictly greater than this position, with
    /// the value encoded exactly as the source collection stores it.
    pub fn gt_filter(&self, field: &str) -> Document {
        doc! { field: { "$gt": self.to_bson() } }
    }

    /// Encoding used both in `$gt` filters and in tracking records.
    pub fn to_bson(&self) -> Bson {
        match self {
            TrackingPosition::Literal(value) => value.clone(),
            TrackingPosition::Temporal { time, increment } => Bson::Timestamp(Timestamp {
                time: *time,
                increment: *increment,
            }),
        }
    }
}

fn type_name(value: &Bson) -> String {
    format!("{:?}", value.element_type())
}
