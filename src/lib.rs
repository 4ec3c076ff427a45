pub mod catalog;
pub mod contact;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;
pub mod store;
pub mod wizard;

pub use state::AppState;
pub use storage::Storage;
pub use store::BookingStore;
pub use wizard::BookingWizard;
