pub mod access_gateway;
pub mod admin_service;
pub mod audit;
pub mod permissions;
pub mod secure_link_service;
pub mod share_service;
pub mod storage;
pub mod worker;
