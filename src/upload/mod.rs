//! Image upload for signed-in users

mod router;
mod store;
pub mod validate;

pub use router::{UploadState, create_upload_router};
pub use store::ObjectStore;
