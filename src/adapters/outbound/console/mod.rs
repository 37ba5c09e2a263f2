/// Console adapters: progress and warnings on stderr
mod progress_reporter;

pub use progress_reporter::StderrProgressReporter;
