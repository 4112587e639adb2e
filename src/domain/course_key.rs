use crate::error::CreditError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifies a course run as an (org, number, run) triple.
///
/// Parses the `course-v1:Org+Number+Run` form as well as the legacy
/// `Org/Number/Run` form. Always displays canonically as `course-v1:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CourseKey {
    pub org: String,
    pub course: String,
    pub run: String,
}

impl CourseKey {
    pub fn new(org: &str, course: &str, run: &str) -> Self {
        Self {
            org: org.to_string(),
            course: course.to_string(),
            run: run.to_string(),
        }
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "course-v1:{}+{}+{}", self.org, self.course, self.run)
    }
}

impl FromStr for CourseKey {
    type Err = CreditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, separator) = match s.strip_prefix("course-v1:") {
            Some(rest) => (rest, '+'),
            None => (s, '/'),
        };

        let mut parts = body.split(separator);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(org), Some(course), Some(run), None)
                if !org.is_empty() && !course.is_empty() && !run.is_empty() =>
            {
                Ok(Self::new(org, course, run))
            }
            _ => Err(CreditError::InvalidCourseKey(s.to_string())),
        }
    }
}

impl Serialize for CourseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CourseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
