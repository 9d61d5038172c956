/// A trait that can be implemented to report progress of the validation and fetch process
/// driven by [`super::PackageCache::get_or_fetch`] and its convenience wrappers.
pub trait CacheReporter: Send + Sync {
    /// Called when validation of a cache entry starts. Returns an opaque index passed back to
    /// [`Self::on_validate_complete`].
    fn on_validate_start(&self) -> usize;
    /// Called when validation of a cache entry completes, successfully or not.
    fn on_validate_complete(&self, index: usize);
    /// Called when a fetch (download) starts. Returns an opaque index passed back to the other
    /// `on_download_*` methods.
    fn on_download_start(&self) -> usize;
    /// Called with regular updates on the download progress.
    fn on_download_progress(&self, index: usize, progress: u64, total: Option<u64>);
    /// Called when a download completes.
    fn on_download_completed(&self, index: usize);
}
