use clap::ValueEnum;

use nonengagers_slack_runtime::CsvUploadTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliCsvUploadTarget {
    Thread,
    DirectMessage,
}

impl From<CliCsvUploadTarget> for CsvUploadTarget {
    fn from(value: CliCsvUploadTarget) -> Self {
        match value {
            CliCsvUploadTarget::Thread => CsvUploadTarget::Thread,
            CliCsvUploadTarget::DirectMessage => CsvUploadTarget::DirectMessage,
        }
    }
}
