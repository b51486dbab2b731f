pub mod report_writer;
