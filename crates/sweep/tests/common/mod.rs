pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{NOW, ROOT, hours_ago, marker, repository, seed_upload_folder};
#[allow(unused_imports)]
pub use mocks::FailingStore;
