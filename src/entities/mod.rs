pub mod prelude;

pub mod audit_logs;
pub mod files;
pub mod secure_links;
pub mod share_grants;
pub mod users;
