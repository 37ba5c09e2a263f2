/// ProgressReporter port for reporting progress during a scan
///
/// Messages are for people, not machines. Implementations decide what to
/// show for their verbosity level.
pub trait ProgressReporter {
    /// Reports a progress message (e.g. which directory is being scanned)
    fn report(&self, message: &str);

    /// Reports detail only shown at verbose level
    fn report_verbose(&self, message: &str);

    /// Reports an error or warning message
    ///
    /// # Arguments
    /// * `message` - The error/warning message
    fn report_error(&self, message: &str);

    /// Reports completion of an operation
    fn report_completion(&self, message: &str);
}

impl<T: ProgressReporter + ?Sized> ProgressReporter for &T {
    fn report(&self, message: &str) {
        (**self).report(message)
    }

    fn report_verbose(&self, message: &str) {
        (**self).report_verbose(message)
    }

    fn report_error(&self, message: &str) {
        (**self).report_error(message)
    }

    fn report_completion(&self, message: &str) {
        (**self).report_completion(message)
    }
}
