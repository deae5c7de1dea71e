pub mod address_lookup;
pub mod address_resolver;
pub mod config;
pub mod directory_api;
pub mod geocoding;
pub mod location_directory;
pub mod province;
pub mod request_queue;
pub mod static_locations;

#[cfg(test)]
pub(crate) mod test_support;
