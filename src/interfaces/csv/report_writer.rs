use crate::domain::request::CreditRequest;
use crate::error::Result;
use std::io::Write;

/// Writes the final state of credit requests as CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(sink),
        }
    }

    pub fn write_requests<'a, I>(&mut self, requests: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a CreditRequest>,
    {
        self.writer
            .write_record(["username", "course_key", "provider_id", "uuid", "status"])?;
        for request in requests {
            self.writer.write_record([
                request.username.as_str(),
                &request.course_key.to_string(),
                request.provider_id.as_str(),
                request.uuid.as_str(),
                &request.status.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::RequestStatus;

    #[test]
    fn test_report_format() {
        let mut request = CreditRequest::new(
            "course-v1:HogwartsX+Potions101+1T2015".parse().unwrap(),
            "hogwarts",
            "ron",
        );
        request.uuid = "557168d0f7664fe59097106c67c3f847".into();
        request.status = RequestStatus::Approved;

        let mut buffer = Vec::new();
        ReportWriter::new(&mut buffer)
            .write_requests([&request])
            .unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("username,course_key,provider_id,uuid,status")
        );
        assert_eq!(
            lines.next(),
            Some(
                "ron,course-v1:HogwartsX+Potions101+1T2015,hogwarts,\
                 557168d0f7664fe59097106c67c3f847,approved"
            )
        );
    }
}
