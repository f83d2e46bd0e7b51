//! Registry source clients
//!
//! One client per tier, each implementing its source trait from
//! [`crate::types`]:
//! - [`dataset_client::DatasetClient`] (Socrata open-data dataset)
//! - [`registry_api_client::RegistryApiClient`] (RUES detail API, two endpoints)
//! - [`registry_page_scraper::RegistryPageScraper`] (RUES public HTML pages)

pub mod dataset_client;
pub mod http;
pub mod registry_api_client;
pub mod registry_page_scraper;

pub use dataset_client::DatasetClient;
pub use registry_api_client::RegistryApiClient;
pub use registry_page_scraper::RegistryPageScraper;
