mod category;
mod date;
mod ids;
mod receipt;

pub use category::{Category, CategoryUpdate};
pub(crate) use category::{validate_color, validate_label};
pub use date::{ReceiptDate, DISPLAY_FORMAT, STORAGE_FORMAT};
pub use ids::{CategoryId, ReceiptId, UserId};
pub use receipt::{DraftReceipt, LineItem, Receipt, ReceiptEdit, WriteOffClass};
