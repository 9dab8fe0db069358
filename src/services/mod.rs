//! Application services wiring domain types to the remote data service.
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod partners;
pub mod products;

pub use catalog::{Catalog, VariantSelection};
pub use checkout::{Checkout, SubmitError, SubmitGate, SubmittedOrder, CONFIRMATION_DISPLAY, SUBMIT_FAILED_MESSAGE};
pub use orders::{OrderDesk, OrderHistory};
pub use partners::{Partners, PendingApprovals};
pub use products::ProductBoard;
