use crate::error::{CreditError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CreditEventType {
    /// A grading/assessment subsystem reporting a requirement status.
    Status,
    /// A user initiating a credit request towards a provider.
    Request,
    /// A provider callback carrying the outcome for a request UUID.
    Response,
}

/// One row of the credit events CSV.
///
/// Column usage depends on the event type, so everything beyond the type is
/// optional here; the processor validates per type. `reason` holds a JSON
/// document as a string.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CreditEvent {
    pub r#type: CreditEventType,
    #[serde(default)]
    pub course_key: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

/// Reads credit events from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<CreditEvent>`,
/// trimming whitespace and tolerating short records so large event files can
/// be processed in a streaming fashion.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    /// Creates a new `EventReader` from any `Read` source (e.g. File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn events(self) -> impl Iterator<Item = Result<CreditEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CreditError::from))
    }
}
