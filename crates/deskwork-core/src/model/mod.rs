pub mod comment;
pub mod item;
pub mod user;

pub use comment::AuditComment;
pub use item::{ItemKind, ItemRef, SeqRef, Status};
pub use user::{Role, User};
