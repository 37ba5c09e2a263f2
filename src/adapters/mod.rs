/// Adapters layer - Infrastructure implementations
///
/// This layer contains concrete implementations of the outbound ports:
/// the local file system, lockfile extractors, manifest matchers, the
/// CycloneDX formatter and the console.
pub mod outbound;
