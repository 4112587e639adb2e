pub mod event_reader;
pub mod report_writer;
