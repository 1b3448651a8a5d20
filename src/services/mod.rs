//! Session-side services of the checkout core.

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod payments;
pub mod totals;

pub use addresses::AddressService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::{AddressEntryMode, CheckoutController, CheckoutStep};
pub use orders::OrderService;
pub use payments::{PaymentOutcome, PaymentService};
pub use totals::{TotalsOutcome, TotalsService};
