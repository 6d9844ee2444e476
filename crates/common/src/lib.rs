//! Shared types for the pharmacy ordering platform.
//!
//! Identifier newtypes keep document, actor, pharmacy and medicine ids from
//! being mixed up, and the pagination types are shared by every list query.

mod pagination;
mod types;

pub use pagination::{DEFAULT_LIMIT, MAX_LIMIT, Page, PageInfo, Pagination, PaginationError};
pub use types::{ActorId, DocumentId, IdParseError, MedicineId, PharmacyId};
