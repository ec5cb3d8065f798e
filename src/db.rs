pub mod json_store;
pub use json_store::JsonStore;
pub mod photo_repo;
pub use photo_repo::PhotoRepository;
pub mod company_repo;
pub use company_repo::CompanyRepository;
