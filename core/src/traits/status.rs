/// Receives progress for long-running operations.
///
/// The cli drives a spinner from these; `()` drops them.
pub trait Reporter: Send + Sync {
    fn step(&self, message: &str);

    fn done(&self, message: &str) {
        self.step(message);
    }

    fn note(&self, message: &str) {
        self.step(message);
    }
}

impl Reporter for () {
    fn step(&self, _message: &str) {}
}
