pub mod hotspot_service;
pub mod verification_service;
