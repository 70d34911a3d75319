//! Services layer - Business logic
//!
//! Services sit on top of the repositories and are responsible for:
//! - Implementing the model operations (`connect`, `add_comment`, `tag_it_with`, ...)
//! - Validation and typed error reporting

pub mod post;
pub mod tag;
pub mod user;

pub use post::{PostService, PostServiceError};
pub use tag::{TagService, TagServiceError};
pub use user::{UserService, UserServiceError};
